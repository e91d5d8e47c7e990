//! Synthetic account credentials and order ids.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rand::Rng;
use rand::seq::IndexedRandom;

use digitalhub_core::OrderId;

use crate::models::AccountDetails;

const ADJECTIVES: [&str; 7] = ["cool", "smart", "happy", "swift", "bright", "calm", "bold"];
const NOUNS: [&str; 7] = ["user", "star", "wave", "rock", "moon", "fire", "wind"];

/// Characters a generated password is drawn from.
pub const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%";

pub const PASSWORD_LENGTH: usize = 12;

const ORDER_SUFFIX_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ORDER_SUFFIX_LENGTH: usize = 5;

/// Millisecond timestamp of the last order id handed out.
static LAST_ORDER_MILLIS: AtomicU64 = AtomicU64::new(0);

/// Email domains used for a product's synthetic accounts.
#[must_use]
pub const fn email_domains(product_id: &str) -> [&'static str; 3] {
    match product_id.as_bytes() {
        b"spotify" => ["@spotify.com", "@gmail.com", "@yahoo.com"],
        b"prime" => ["@amazon.com", "@gmail.com", "@hotmail.com"],
        _ => ["@netflix.com", "@gmail.com", "@outlook.com"],
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, charset: &[u8]) -> char {
    charset.choose(rng).map_or('0', |&b| char::from(b))
}

/// Random username such as `swiftmoon417`.
pub fn generate_username<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("cool");
    let noun = NOUNS.choose(rng).copied().unwrap_or("user");
    let number: u16 = rng.random_range(1..=999);
    format!("{adjective}{noun}{number}")
}

/// Random password of [`PASSWORD_LENGTH`] characters from [`PASSWORD_CHARSET`].
pub fn generate_password<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..PASSWORD_LENGTH)
        .map(|_| pick(rng, PASSWORD_CHARSET))
        .collect()
}

/// Synthetic credentials for a purchase of `product_id`.
pub fn generate_account<R: Rng + ?Sized>(rng: &mut R, product_id: &str) -> AccountDetails {
    let username = generate_username(rng);
    let domain = email_domains(product_id)
        .choose(rng)
        .copied()
        .unwrap_or("@gmail.com");
    AccountDetails {
        email: format!("{username}{domain}"),
        password: generate_password(rng),
    }
}

/// Issue an order id: `DH`, the current time in base 36, and a random
/// five-character suffix.
///
/// Timestamps are strictly increasing within the process, so ids never
/// repeat even when issued within the same millisecond.
#[must_use]
pub fn next_order_id() -> OrderId {
    let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    let mut last = LAST_ORDER_MILLIS.load(Ordering::SeqCst);
    let millis = loop {
        let candidate = now.max(last + 1);
        match LAST_ORDER_MILLIS.compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => break candidate,
            Err(actual) => last = actual,
        }
    };

    let mut rng = rand::rng();
    let suffix: String = (0..ORDER_SUFFIX_LENGTH)
        .map(|_| pick(&mut rng, ORDER_SUFFIX_CHARSET))
        .collect();
    OrderId::from_parts(millis, &suffix)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_password_length_and_charset() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let password = generate_password(&mut rng);
            assert_eq!(password.chars().count(), PASSWORD_LENGTH);
            assert!(password.bytes().all(|b| PASSWORD_CHARSET.contains(&b)));
        }
    }

    #[test]
    fn test_username_shape() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let name = generate_username(&mut rng);
            let digits_at = name.find(|c: char| c.is_ascii_digit()).unwrap_or(name.len());
            let (word, number) = name.split_at(digits_at);
            assert!(ADJECTIVES.iter().any(|a| word.starts_with(a)), "{name}");
            assert!(NOUNS.iter().any(|n| word.ends_with(n)), "{name}");
            let number: u16 = number.parse().unwrap_or(0);
            assert!((1..=999).contains(&number), "{name}");
        }
    }

    #[test]
    fn test_account_email_uses_product_domains() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let account = generate_account(&mut rng, "spotify");
            assert!(
                email_domains("spotify")
                    .iter()
                    .any(|d| account.email.ends_with(d)),
                "{}",
                account.email
            );
        }
        assert_eq!(email_domains("unknown"), email_domains("netflix"));
    }

    #[test]
    fn test_order_ids_are_distinct() {
        let ids: HashSet<_> = (0..2000).map(|_| next_order_id()).collect();
        assert_eq!(ids.len(), 2000);
    }

    #[test]
    fn test_order_id_format() {
        let id = next_order_id();
        let s = id.as_str();
        assert!(s.starts_with("DH"));
        assert!(s.len() > 2 + ORDER_SUFFIX_LENGTH);
        assert!(
            s.chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }
}
