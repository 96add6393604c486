//! W-2 field extraction: dialect classification and table-driven rules.

mod classify;
mod normalize;
mod parser;
pub mod rules;

pub use classify::{classify, normalize_whitespace};
pub use normalize::{coerce, split_name};
pub use parser::{DialectParser, ParseOutcome, W2Parser};

use crate::error::ExtractionError;

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;
