//! Display-only payment methods offered at checkout.

use serde::{Deserialize, Serialize};

/// Error returned when a payment method name is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown payment method: {0}")]
pub struct UnknownPaymentMethod(pub String);

/// A payment method the customer can pick at checkout.
///
/// Methods are advisory: no funds move. Picking one only unlocks confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Usdt,
    Bitcoin,
    Binance,
}

impl PaymentMethod {
    /// Every method, in display order.
    pub const ALL: [Self; 3] = [Self::Usdt, Self::Bitcoin, Self::Binance];

    /// Wire name (`usdt`, `bitcoin`, `binance`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Usdt => "usdt",
            Self::Bitcoin => "bitcoin",
            Self::Binance => "binance",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Usdt => "USDT (TRC20)",
            Self::Bitcoin => "Bitcoin",
            Self::Binance => "Binance Pay",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = UnknownPaymentMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usdt" => Ok(Self::Usdt),
            "bitcoin" => Ok(Self::Bitcoin),
            "binance" => Ok(Self::Binance),
            other => Err(UnknownPaymentMethod(other.to_owned())),
        }
    }
}
