//! narro-lib: article-to-audio engine.
//!
//! Headless rendering with a static-fetch fallback, readability extraction,
//! speech synthesis providers, pipeline orchestration, and HTTP API.
//! Depends on narro-core for pure types and text processing.

pub mod fetch;
pub mod pipeline;
pub mod render;
pub mod server;
pub mod source;
pub mod synth;

// Re-export narro-core for convenience
pub use narro_core;
