//! Wire protocol for the WebSocket channels
//!
//! Every frame travels as a JSON envelope `{ "type": ..., "payload": ... }`
//! with camelCase field names. The same `ServerFrame` enum covers both the
//! messaging and the notification channel; each connection only ever sees
//! the variants its channel produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::store::Message;

/// Client → Server frames (messaging channel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientFrame {
    /// Request to send a direct message.
    #[serde(rename = "sendMessage")]
    SendMessage(SendMessagePayload),
    /// Request the full history with one counterparty.
    #[serde(rename = "getConversationHistory")]
    GetConversationHistory(HistoryRequest),
    /// Request the conversation list; answered with a `userConversations` push.
    #[serde(rename = "getUserConversations")]
    GetUserConversations,
}

/// Server → Client frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerFrame {
    /// A persisted message, pushed to sender (echo) and receiver (if live).
    #[serde(rename = "receiveMessage")]
    ReceiveMessage(MessageDto),
    /// Reply to `getConversationHistory`, ascending by (sentAt, id).
    #[serde(rename = "conversationHistory")]
    ConversationHistory(Vec<MessageDto>),
    /// Reply to `getUserConversations`.
    #[serde(rename = "userConversations")]
    UserConversations(Vec<ConversationDto>),
    /// Best-effort presence change signals.
    #[serde(rename = "userConnected")]
    UserConnected(PresenceChange),
    #[serde(rename = "userDisconnected")]
    UserDisconnected(PresenceChange),
    /// New-content signal (notification channel).
    #[serde(rename = "newPostNotification")]
    NewPostNotification(NewPostPayload),
    /// Out-of-band error; the connection stays open.
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub receiver_id: i64,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    pub other_user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl From<&Message> for MessageDto {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id,
            sender_id: m.sender_id,
            receiver_id: m.receiver_id,
            content: m.content.clone(),
            sent_at: m.sent_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub user_id: i64,
    pub user_name: String,
    pub last_message: LastMessageDto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessageDto {
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceChange {
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPostPayload {
    pub has_new_post: bool,
    pub author_name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn client_frame_envelope_shape() {
        let frame = ClientFrame::SendMessage(SendMessagePayload {
            receiver_id: 7,
            content: "hi".into(),
        });
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""type":"sendMessage""#));
        assert!(json.contains(r#""receiverId":7"#));

        let parsed: ClientFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn get_user_conversations_has_no_payload() {
        let json = serde_json::to_string(&ClientFrame::GetUserConversations).unwrap();
        assert_eq!(json, r#"{"type":"getUserConversations"}"#);
        let parsed: ClientFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ClientFrame::GetUserConversations);
    }

    #[test]
    fn new_post_notification_field_names() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let frame = ServerFrame::NewPostNotification(NewPostPayload {
            has_new_post: true,
            author_name: "Ada Lovelace".into(),
            timestamp: ts,
        });
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""type":"newPostNotification""#));
        assert!(json.contains(r#""hasNewPost":true"#));
        assert!(json.contains(r#""authorName":"Ada Lovelace""#));
        assert!(json.contains(r#""timestamp""#));
    }

    #[test]
    fn message_dto_round_trip() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let dto = MessageDto {
            id: 1,
            sender_id: 2,
            receiver_id: 3,
            content: "hello".into(),
            sent_at: ts,
        };
        let json = serde_json::to_string(&ServerFrame::ReceiveMessage(dto.clone())).unwrap();
        assert!(json.contains(r#""senderId":2"#));
        assert!(json.contains(r#""sentAt""#));
        let parsed: ServerFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ServerFrame::ReceiveMessage(dto));
    }
}
