use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PairingState {
    Unpaired,
    Paired,
    Blocked,
}

impl PairingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairingState::Unpaired => "unpaired",
            PairingState::Paired => "paired",
            PairingState::Blocked => "blocked",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "paired" => PairingState::Paired,
            "blocked" => PairingState::Blocked,
            _ => PairingState::Unpaired,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InboundStatus {
    Queued,
    Delivered,
    Acked,
    Expired,
}

impl InboundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InboundStatus::Queued => "queued",
            InboundStatus::Delivered => "delivered",
            InboundStatus::Acked => "acked",
            InboundStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "delivered" => InboundStatus::Delivered,
            "acked" => InboundStatus::Acked,
            "expired" => InboundStatus::Expired,
            _ => InboundStatus::Queued,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutboundStatus {
    Pending,
    Sent,
    Failed,
}

impl OutboundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboundStatus::Pending => "pending",
            OutboundStatus::Sent => "sent",
            OutboundStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    PendingPairing,
    Paired,
    Expired,
    Disconnected,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::PendingPairing => "pending_pairing",
            SessionStatus::Paired => "paired",
            SessionStatus::Expired => "expired",
            SessionStatus::Disconnected => "disconnected",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "paired" => SessionStatus::Paired,
            "expired" => SessionStatus::Expired,
            "disconnected" => SessionStatus::Disconnected,
            _ => SessionStatus::PendingPairing,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Account {
    pub id: String,
    pub external_user_id: Option<String>,
    pub delivery_mode: String,
    pub rate_limit_per_min: i64,
    pub disabled_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Conversation {
    pub conversation_key: String,
    pub channel_id: String,
    pub user_key: String,
    pub account_id: Option<String>,
    pub pairing_state: PairingState,
    pub paired_at: Option<String>,
    pub last_seen_at: String,
    pub callback_url: Option<String>,
    pub callback_expires_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NormalizedMessage {
    pub user_id: String,
    pub text: String,
    pub channel_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InboundMessage {
    pub id: String,
    pub account_id: String,
    pub conversation_key: String,
    pub kakao_payload: serde_json::Value,
    pub normalized: Option<NormalizedMessage>,
    pub callback_url: Option<String>,
    pub callback_expires_at: Option<String>,
    pub status: InboundStatus,
    pub source_event_id: Option<String>,
    pub created_at: String,
    pub delivered_at: Option<String>,
    pub acked_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutboundMessage {
    pub id: String,
    pub account_id: String,
    pub inbound_message_id: Option<String>,
    pub conversation_key: String,
    pub kakao_target: String,
    pub response_payload: serde_json::Value,
    pub status: OutboundStatus,
    pub error_message: Option<String>,
    pub created_at: String,
    pub sent_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PairingCode {
    pub code: String,
    pub account_id: String,
    pub expires_at: String,
    pub used_at: Option<String>,
    pub used_by: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Session {
    pub id: String,
    pub pairing_code: String,
    pub status: SessionStatus,
    pub account_id: Option<String>,
    pub paired_conversation_key: Option<String>,
    pub expires_at: String,
    pub paired_at: Option<String>,
    pub created_at: String,
}

// --- Wire payloads (KakaoTalk webhook subset) ---

#[derive(Debug, Serialize, Deserialize)]
pub struct KakaoWebhookBody {
    #[serde(rename = "userRequest")]
    pub user_request: KakaoUserRequest,
    pub bot: Option<KakaoBot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KakaoUserRequest {
    pub user: KakaoUser,
    pub utterance: String,
    #[serde(rename = "callbackUrl", default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KakaoUser {
    pub id: String,
    #[serde(default)]
    pub properties: Option<KakaoUserProperties>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KakaoUserProperties {
    #[serde(rename = "plusfriendUserKey", default)]
    pub plusfriend_user_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KakaoBot {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

// --- Request DTOs for the agent-facing HTTP surface ---

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub message_id: String,
    pub response: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub success: bool,
    pub delivered_at: i64,
}

#[derive(Debug, Serialize)]
pub struct SessionCreateResponse {
    pub session_token: String,
    pub pairing_code: String,
    pub expires_in: i64,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paired_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kakao_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}
