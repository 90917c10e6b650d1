//! Data models for marketspace entities.
//!
//! This module contains all the data structures used to represent
//! marketplace data including:
//!
//! - `Product`, `ProductImage`, `ProductOwner`: classified-ad listings
//! - `ProductDraft`, `ProductFilter`: create/search request payloads
//! - `PaymentMethod`: accepted payment options
//! - `User`, `NewUser`: account data

pub mod product;
pub mod user;

pub use product::{
    PaymentMethod, PaymentMethodInfo, Product, ProductDraft, ProductFilter, ProductImage,
    ProductOwner,
};
pub use user::{NewUser, User};
