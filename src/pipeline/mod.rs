//! Pipeline stages around the backend conversion.
//!
//! Each submodule implements one step; [`crate::convert::process_document`]
//! runs them in order.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ (backend) ──▶ extract ──▶ export ──▶ postprocess ──▶ file
//! (path)    (document)    (PNG files)  (Markdown)  (cleanup)
//! ```
//!
//! 1. [`input`]   validate the source path and name the outputs
//! 2. [`extract`] render each table and picture to `images/`; blocking work
//!    runs in `spawn_blocking`
//! 3. [`encode`]  PNG bytes and data URIs
//! 4. [`export`]  Markdown with image links, placeholders or GFM tables
//! 5. [`postprocess`] deterministic whitespace and Unicode cleanup

pub mod encode;
pub mod export;
pub mod extract;
pub mod input;
pub mod postprocess;
