//! Output module
//!
//! Persists raw response bodies for debugging blocked or malformed pages.

mod debug_sink;

pub use debug_sink::{sanitize_label, DebugSink};
