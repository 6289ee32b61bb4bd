//! narro-core: pure types, text preparation, and article extraction.
//!
//! No async runtime, no network or filesystem I/O.

pub mod readability;
pub mod text_prep;
pub mod types;
