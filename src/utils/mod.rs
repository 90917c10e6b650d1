pub mod format;

pub use format::{format_phone, format_price, truncate_string};
