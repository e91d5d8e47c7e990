//! Static product catalog.
//!
//! Products are immutable and keyed by id. The profile page also renders
//! purchases of products no longer on sale, so [`display_info`] knows a few
//! more ids and falls back to a generic entry.

use rust_decimal::Decimal;
use serde::Serialize;

use digitalhub_core::Price;

/// A product offered at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub price_cents: i64,
    pub reference_cents: i64,
    pub image: &'static str,
    pub features: [&'static str; 4],
}

impl Product {
    /// Sale price.
    #[must_use]
    pub fn price(&self) -> Price {
        Price::usd_cents(self.price_cents)
    }

    /// Regular price the sale price is compared against.
    #[must_use]
    pub fn reference_price(&self) -> Price {
        Price::usd_cents(self.reference_cents)
    }

    /// Whole-number percentage saved against the reference price.
    #[must_use]
    pub fn savings_percent(&self) -> Decimal {
        self.price().savings_percent(&self.reference_price())
    }
}

/// Every product on sale.
pub static PRODUCTS: [Product; 3] = [
    Product {
        id: "netflix",
        name: "Netflix Premium",
        description: "Stream unlimited movies and TV shows in Ultra HD on up to 4 screens simultaneously. Access exclusive Netflix Originals and content from around the world.",
        price_cents: 1299,
        reference_cents: 1599,
        image: "https://upload.wikimedia.org/wikipedia/commons/0/08/Netflix_2015_logo.svg",
        features: [
            "4K Ultra HD streaming",
            "Watch on 4 screens at once",
            "Download content for offline viewing",
            "No ads or interruptions",
        ],
    },
    Product {
        id: "spotify",
        name: "Spotify Premium",
        description: "Enjoy ad-free music streaming with high-quality audio, offline downloads, and unlimited skips. Access over 70 million songs and exclusive podcasts.",
        price_cents: 999,
        reference_cents: 1299,
        image: "https://upload.wikimedia.org/wikipedia/commons/2/26/Spotify_logo_with_text.svg",
        features: [
            "320kbps high-quality audio",
            "Unlimited skips and replays",
            "Download music for offline",
            "No ads between songs",
        ],
    },
    Product {
        id: "prime",
        name: "Prime Video",
        description: "Watch thousands of movies and TV shows including award-winning Amazon Originals. Plus enjoy free shipping and other Prime benefits.",
        price_cents: 899,
        reference_cents: 1199,
        image: "https://upload.wikimedia.org/wikipedia/commons/f/f5/Prime_Video_logo.png",
        features: [
            "Thousands of movies & shows",
            "Amazon Original series",
            "Watch on any device",
            "Free fast shipping included",
        ],
    },
];

/// Look up a product on sale by id.
#[must_use]
pub fn find(id: &str) -> Option<&'static Product> {
    PRODUCTS.iter().find(|p| p.id == id)
}

/// Short display details for a purchase card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayInfo {
    pub name: &'static str,
    pub image: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub features: [&'static str; 4],
}

const FALLBACK: DisplayInfo = DisplayInfo {
    name: "Digital Product",
    image: "https://via.placeholder.com/60x60/6366f1/ffffff?text=DP",
    description: "Premium digital subscription service.",
    category: "Digital",
    features: ["Premium Access", "Full Features", "Multi-Device", "24/7 Support"],
};

/// Display details for any product id, with a generic fallback.
#[must_use]
pub fn display_info(product_id: &str) -> DisplayInfo {
    match product_id {
        "netflix" => DisplayInfo {
            name: "Netflix Premium",
            image: "https://upload.wikimedia.org/wikipedia/commons/0/08/Netflix_2015_logo.svg",
            description: "Stream on 4 screens at once in Ultra HD.",
            category: "Entertainment",
            features: ["4K Ultra HD", "4 Screens", "Downloads", "No Ads"],
        },
        "spotify" => DisplayInfo {
            name: "Spotify Premium",
            image: "https://upload.wikimedia.org/wikipedia/commons/2/26/Spotify_logo_with_text.svg",
            description: "Ad-free music and offline listening.",
            category: "Music",
            features: ["Ad-free", "Offline Mode", "High Quality", "Unlimited Skips"],
        },
        "prime" => DisplayInfo {
            name: "Amazon Prime Video",
            image: "https://upload.wikimedia.org/wikipedia/commons/f/f5/Prime_Video_logo.png",
            description: "Movies, TV shows, and Amazon Originals.",
            category: "Entertainment",
            features: ["HD Streaming", "Original Content", "Multiple Devices", "Fast Shipping"],
        },
        "youtube" => DisplayInfo {
            name: "YouTube Premium",
            image: "https://upload.wikimedia.org/wikipedia/commons/b/b8/YouTube_Logo_2017.svg",
            description: "Ad-free YouTube and YouTube Music.",
            category: "Entertainment",
            features: ["No Ads", "Background Play", "YouTube Music", "Offline Videos"],
        },
        "disney" => DisplayInfo {
            name: "Disney Plus",
            image: "https://upload.wikimedia.org/wikipedia/commons/3/3e/Disney%2B_logo.svg",
            description: "Disney, Pixar, Marvel, and more.",
            category: "Entertainment",
            features: ["4K Ultra HD", "Multiple Profiles", "Downloads", "Family Friendly"],
        },
        _ => FALLBACK,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_find() {
        assert_eq!(find("spotify").unwrap().name, "Spotify Premium");
        assert!(find("youtube").is_none());
        assert!(find("").is_none());
    }

    #[test]
    fn test_prices() {
        let netflix = find("netflix").unwrap();
        assert_eq!(netflix.price().display(), "$12.99");
        assert_eq!(netflix.reference_price().display(), "$15.99");
        assert_eq!(netflix.savings_percent(), Decimal::new(19, 0));
        assert_eq!(find("prime").unwrap().savings_percent(), Decimal::new(25, 0));
    }

    #[test]
    fn test_every_product_is_discounted() {
        for product in &PRODUCTS {
            assert!(product.price_cents < product.reference_cents, "{}", product.id);
        }
    }

    #[test]
    fn test_display_info_fallback() {
        assert_eq!(display_info("disney").name, "Disney Plus");
        assert_eq!(display_info("prime").name, "Amazon Prime Video");
        assert_eq!(display_info("unknown").name, "Digital Product");
    }
}
