pub mod sanitizer;
pub mod types;

pub use sanitizer::{Sanitizer, SENSITIVE_HEADERS, SENSITIVE_KEYS};
pub use types::*;
