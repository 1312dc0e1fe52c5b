//! Plain-text delivery to standard output

use super::{DeliveryAdapter, DeliveryError, ItemMessage};
use crate::session::{ConversationId, Notice};
use async_trait::async_trait;
use tracing::debug;

/// Prints items and notices for the interactive `chat` command
#[derive(Debug, Default, Clone)]
pub struct ConsoleDelivery {
    show_keyboards: bool,
}

impl ConsoleDelivery {
    pub fn new(show_keyboards: bool) -> Self {
        Self { show_keyboards }
    }

    pub fn render_item(message: &ItemMessage) -> String {
        let mut out = format!(
            "[#{}] {}\n      {}",
            message.item_id, message.caption, message.media_ref
        );
        if let Some(description) = &message.description {
            out.push_str("\n      Description: ");
            out.push_str(description);
        }
        out
    }

    pub fn render_notice(&self, notice: &Notice) -> String {
        let mut out = notice.text();
        if self.show_keyboards {
            if let Some(keyboard) = notice.keyboard() {
                let buttons = keyboard.buttons();
                if !buttons.is_empty() {
                    out.push_str("\n  [ ");
                    out.push_str(&buttons.join(" | "));
                    out.push_str(" ]");
                }
            }
        }
        out
    }
}

#[async_trait]
impl DeliveryAdapter for ConsoleDelivery {
    async fn send_item(
        &self,
        to: ConversationId,
        message: &ItemMessage,
    ) -> Result<(), DeliveryError> {
        if message.media_ref.trim().is_empty() {
            return Err(DeliveryError::Rejected {
                id: message.item_id,
                reason: "no media reference".to_string(),
            });
        }

        debug!("Delivering item {} to conversation {}", message.item_id, to);
        println!("{}", Self::render_item(message));
        Ok(())
    }

    async fn send_notice(&self, _to: ConversationId, notice: &Notice) -> Result<(), DeliveryError> {
        println!("{}", self.render_notice(notice));
        Ok(())
    }
}
