//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate merge, review and edit flows over the working set.
//! - Keep UI layers decoupled from storage and extraction details.

pub mod card_book_service;
pub mod duplicate_resolver;
pub mod edit_reconciler;
