//! Order record inspection.

use digitalhub_core::UserId;
use digitalhub_storefront::backend::PgDocumentStore;
use digitalhub_storefront::db::{self, PurchaseRepository};

use super::{CommandError, database_url};

/// Print a customer's order records, newest first.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a stored record is
/// malformed.
#[allow(clippy::print_stdout)]
pub async fn list(uid: &str, json: bool) -> Result<(), CommandError> {
    let pool = db::create_pool(&database_url()?).await?;
    let store = PgDocumentStore::new(pool);
    let purchases = PurchaseRepository::new(&store)
        .list_for_user(&UserId::new(uid))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&purchases)?);
        return Ok(());
    }

    if purchases.is_empty() {
        println!("No purchases for {uid}");
        return Ok(());
    }

    for purchase in &purchases {
        let record = &purchase.record;
        println!(
            "{}  {}  {:<20}  ${:>6}  {:<14}  {}",
            record.purchase_date.format("%Y-%m-%d %H:%M"),
            record.order_id,
            record.product_name,
            record.price,
            record.payment_method.display_name(),
            record.status.label(),
        );
    }
    println!("{} purchase(s)", purchases.len());
    Ok(())
}
