//! Display-only payment methods: deposit addresses, QR codes and the
//! mutually exclusive selection that unlocks confirmation.

use serde::Serialize;
use url::form_urlencoded;

use digitalhub_core::PaymentMethod;

const QR_CODE_ENDPOINT: &str = "https://api.qrserver.com/v1/create-qr-code/?size=200x200&data=";

/// Deposit address shown for a payment method.
#[must_use]
pub const fn deposit_address(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Usdt => "TQn9Y2khEsLMWD4y2bCCquCLa8k9sH6w32",
        PaymentMethod::Bitcoin => "bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh",
        PaymentMethod::Binance => "digitalhub_pay_2024",
    }
}

/// URL of a QR code image encoding `data`.
#[must_use]
pub fn qr_code_url(data: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(data.as_bytes()).collect();
    format!("{QR_CODE_ENDPOINT}{encoded}")
}

/// A payment method as presented at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentOption {
    pub method: PaymentMethod,
    pub name: &'static str,
    pub address: &'static str,
    pub qr_code_url: String,
}

/// Every payment option, in display order.
#[must_use]
pub fn options() -> Vec<PaymentOption> {
    PaymentMethod::ALL
        .into_iter()
        .map(|method| {
            let address = deposit_address(method);
            PaymentOption {
                method,
                name: method.display_name(),
                address,
                qr_code_url: qr_code_url(address),
            }
        })
        .collect()
}

/// At most one selected payment method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentSelection {
    selected: Option<PaymentMethod>,
}

impl PaymentSelection {
    /// Select `method`, deselecting any other. Selecting the current method
    /// again keeps it selected. Returns the previous selection.
    pub const fn select(&mut self, method: PaymentMethod) -> Option<PaymentMethod> {
        self.selected.replace(method)
    }

    #[must_use]
    pub const fn selected(&self) -> Option<PaymentMethod> {
        self.selected
    }

    /// Whether confirmation is enabled.
    #[must_use]
    pub const fn can_confirm(&self) -> bool {
        self.selected.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_is_mutually_exclusive() {
        let mut selection = PaymentSelection::default();
        assert!(!selection.can_confirm());

        selection.select(PaymentMethod::Bitcoin);
        let previous = selection.select(PaymentMethod::Usdt);

        assert_eq!(previous, Some(PaymentMethod::Bitcoin));
        assert_eq!(selection.selected(), Some(PaymentMethod::Usdt));
        assert!(selection.can_confirm());
    }

    #[test]
    fn test_reselect_is_not_a_toggle() {
        let mut selection = PaymentSelection::default();
        selection.select(PaymentMethod::Binance);
        selection.select(PaymentMethod::Binance);
        assert_eq!(selection.selected(), Some(PaymentMethod::Binance));
    }

    #[test]
    fn test_qr_code_url_encodes_data() {
        assert_eq!(
            qr_code_url("digitalhub_pay_2024"),
            "https://api.qrserver.com/v1/create-qr-code/?size=200x200&data=digitalhub_pay_2024"
        );
        assert!(qr_code_url("a b&c").ends_with("data=a+b%26c"));
    }

    #[test]
    fn test_options_cover_every_method() {
        let options = options();
        assert_eq!(options.len(), 3);
        assert!(options.iter().all(|o| o.qr_code_url.contains(o.address)));
    }
}
