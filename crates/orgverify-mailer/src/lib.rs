//! Transactional email client for rejection notices.
//!
//! Thin HTTP wrapper over the mail provider's REST API. Single-send
//! semantics (one notice per rejected location, ever) are enforced by the
//! database layer, not here.

mod client;
mod error;

pub use client::{MailClient, RejectionNotice, SentMessage};
pub use error::MailError;
