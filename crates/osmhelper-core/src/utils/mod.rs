//! Helpers for loosely-typed JSON payloads, dates and display formatting.

pub mod dates;
pub mod format;
pub mod json;

// Re-export commonly used functions at module level
pub use dates::{age_in_months, age_in_years, parse_date};
pub use format::{format_age, format_pence, initials};
