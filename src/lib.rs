pub mod cancel;
pub mod completion;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod language;
pub mod logging;
pub mod metrics;
pub mod recognition;
pub mod session;
