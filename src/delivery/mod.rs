//! Delivery of items and notices to a conversation
//!
//! Adapters render messages for one transport. Text fields are already
//! truncated by [`ItemMessage::from_item`] before an adapter sees them.

mod console;

pub use console::ConsoleDelivery;

use crate::catalog::Item;
use crate::session::{ConversationId, Notice};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Item {id} rejected by transport: {reason}")]
    Rejected { id: i64, reason: String },

    #[error("Transport unavailable: {0}")]
    Transport(String),
}

/// An item ready to hand to a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMessage {
    pub item_id: i64,
    pub media_ref: String,
    /// Display name, sent as the media caption
    pub caption: String,
    /// Sent as a follow-up message when present
    pub description: Option<String>,
}

impl ItemMessage {
    /// Build the message for `item`, cutting caption and description to at
    /// most `limit` characters
    pub fn from_item(item: &Item, limit: usize) -> Self {
        Self {
            item_id: item.id,
            media_ref: item.media_ref.clone(),
            caption: truncate_chars(&item.name, limit).to_string(),
            description: item
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(|d| truncate_chars(d, limit).to_string()),
        }
    }
}

/// Longest prefix of `text` with at most `limit` characters
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Transport-specific sender
#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    /// Send one item. Failures are per item and do not affect other sends.
    async fn send_item(
        &self,
        to: ConversationId,
        message: &ItemMessage,
    ) -> Result<(), DeliveryError>;

    async fn send_notice(&self, to: ConversationId, notice: &Notice) -> Result<(), DeliveryError>;
}
