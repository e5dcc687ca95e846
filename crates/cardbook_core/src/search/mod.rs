//! Address-book search entry points.
//!
//! # Responsibility
//! - Filter the working set by a free-text query for display.
//! - Keep result shaping inside core.

pub mod filter;
