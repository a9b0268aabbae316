//! Messaging Gateway
//!
//! Serves the operations of the messaging channel: send, history, and the
//! derived conversation list. Persistence always commits before any push is
//! attempted; the push path is best effort and never the record of truth.

use std::sync::Arc;
use tracing::{debug, info};

use super::presence::PresenceRegistry;
use super::protocol::{ConversationDto, LastMessageDto, MessageDto, ServerFrame};
use super::store::{Message, MessageStore};
use crate::auth::AuthManager;
use crate::error::{Error, Result};

pub struct ChatGateway {
    store: MessageStore,
    auth: Arc<AuthManager>,
    presence: Arc<PresenceRegistry>,
}

impl ChatGateway {
    pub fn new(store: MessageStore, auth: Arc<AuthManager>, presence: Arc<PresenceRegistry>) -> Self {
        Self {
            store,
            auth,
            presence,
        }
    }

    /// Validate, persist, then deliver. The insert has committed before
    /// either push is attempted; a receiver without a live handle simply
    /// misses the push and reads the message from history later.
    pub async fn send_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        content: &str,
    ) -> Result<Message> {
        if content.trim().is_empty() {
            return Err(Error::EmptyContent);
        }
        if self.auth.get_user(receiver_id).await?.is_none() {
            return Err(Error::UserNotFound { id: receiver_id });
        }

        let message = self.store.insert(sender_id, receiver_id, content).await?;

        let dto = MessageDto::from(&message);

        // Echo to the sender's own live handle, for UI reconciliation
        self.presence
            .push_to(sender_id, ServerFrame::ReceiveMessage(dto.clone()))
            .await;

        // Independently, push to the receiver if live; otherwise skip
        let delivered = self
            .presence
            .push_to(receiver_id, ServerFrame::ReceiveMessage(dto))
            .await;
        if !delivered {
            debug!(
                "[Chat] receiver {} offline, message {} awaits pull",
                receiver_id, message.id
            );
        }

        info!(
            "[Chat] message {} sent: {} -> {}",
            message.id, sender_id, receiver_id
        );

        Ok(message)
    }

    /// Authoritative pull path: all messages with `other_user_id`,
    /// ascending by (sent_at, id).
    pub async fn conversation_history(
        &self,
        user_id: i64,
        other_user_id: i64,
    ) -> Result<Vec<MessageDto>> {
        let messages = self.store.history_between(user_id, other_user_id).await?;
        Ok(messages.iter().map(MessageDto::from).collect())
    }

    /// Derived conversation list: one entry per counterparty with the most
    /// recent message. Recomputed on every call; nothing is cached.
    pub async fn user_conversations(&self, user_id: i64) -> Result<Vec<ConversationDto>> {
        let counterparties = self.store.counterparty_ids(user_id).await?;

        let mut conversations = Vec::with_capacity(counterparties.len());
        for other_id in counterparties {
            let Some(other) = self.auth.get_user(other_id).await? else {
                continue;
            };
            let Some(last) = self.store.last_message_between(user_id, other_id).await? else {
                continue;
            };
            conversations.push(ConversationDto {
                user_id: other.id,
                user_name: other.display_name(),
                last_message: LastMessageDto {
                    content: last.content,
                    sent_at: last.sent_at,
                },
            });
        }

        // Most recent conversation first, for a stable client ordering
        conversations.sort_by(|a, b| b.last_message.sent_at.cmp(&a.last_message.sent_at));

        Ok(conversations)
    }
}
