//! Document text and the position abstraction recognition is written against.

pub mod buffer;
pub mod source;

pub use buffer::{DocumentError, TextBuffer, TextEdit};
pub use source::{TextSource, is_line_break};
