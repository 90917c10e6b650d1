// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::format_price;

/// Payment methods accepted by the backend, serialized by wire key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Pix,
    Card,
    Boleto,
    Cash,
    Deposit,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Pix,
        PaymentMethod::Card,
        PaymentMethod::Boleto,
        PaymentMethod::Cash,
        PaymentMethod::Deposit,
    ];

    /// Wire key as sent in query strings and request bodies.
    pub fn key(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "pix",
            PaymentMethod::Card => "card",
            PaymentMethod::Boleto => "boleto",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Deposit => "deposit",
        }
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "Pix",
            PaymentMethod::Card => "Credit card",
            PaymentMethod::Boleto => "Boleto",
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Deposit => "Bank deposit",
        }
    }
}

/// Payment method as returned inside product payloads: `{key, name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethodInfo {
    pub key: PaymentMethod,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: String,
    pub path: String,
}

/// Seller info embedded in product detail responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductOwner {
    pub name: Option<String>,
    pub tel: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_new: bool,
    /// Price in integer cents.
    pub price: i64,
    pub accept_trade: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub product_images: Vec<ProductImage>,
    #[serde(default)]
    pub payment_methods: Vec<PaymentMethodInfo>,
    #[serde(default)]
    pub user: Option<ProductOwner>,
}

fn default_active() -> bool {
    true
}

impl Product {
    pub fn display_price(&self) -> String {
        format_price(self.price)
    }

    pub fn condition_label(&self) -> &'static str {
        if self.is_new {
            "New"
        } else {
            "Used"
        }
    }
}

/// Payload for creating or replacing an ad.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub is_new: bool,
    pub price: i64,
    pub accept_trade: bool,
    pub payment_methods: Vec<PaymentMethod>,
}

/// Search/filter criteria for the listings endpoint.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub query: Option<String>,
    pub is_new: Option<bool>,
    pub accept_trade: Option<bool>,
    pub payment_methods: Vec<PaymentMethod>,
}

impl ProductFilter {
    /// Render as query-string pairs; `payment_methods` repeats per method.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref query) = self.query {
            pairs.push(("query", query.clone()));
        }
        if let Some(is_new) = self.is_new {
            pairs.push(("is_new", is_new.to_string()));
        }
        if let Some(accept_trade) = self.accept_trade {
            pairs.push(("accept_trade", accept_trade.to_string()));
        }
        for method in &self.payment_methods {
            pairs.push(("payment_methods", method.key().to_string()));
        }
        pairs
    }
}
