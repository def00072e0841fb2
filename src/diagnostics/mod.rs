//! Mistake detection over a token list snapshot.

pub mod mistake;
pub mod search;

pub use mistake::{Mistake, MistakeCategory};
pub use search::{MistakeSearch, SearchPhase, find_mistakes};
