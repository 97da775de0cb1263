//! Inbox client: fetches the newest message from the external store and
//! normalizes its body for evaluation.

pub mod body;
pub mod client;
pub mod payload;

pub use client::{HttpInbox, InboxItem, InboxSource};
