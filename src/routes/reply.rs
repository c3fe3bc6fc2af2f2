use rocket::serde::json::Json;
use rocket::{post, State};

use crate::db::Db;
use crate::error::RelayError;
use crate::kakao_client::{CallbackError, KakaoClient};
use crate::messages;
use crate::models::{ReplyRequest, ReplyResponse};
use crate::routes::AccountAuth;

/// Agent-authored response to a previously delivered inbound message. Validates the
/// callback URL is still within its TTL before attempting delivery.
#[post("/openclaw/reply", data = "<body>")]
pub async fn agent_reply(
    db: &State<Db>,
    kakao: &State<KakaoClient>,
    auth: AccountAuth,
    body: Json<ReplyRequest>,
) -> Result<Json<ReplyResponse>, RelayError> {
    let inbound = {
        let conn = db.conn();
        messages::get_inbound(&conn, &body.message_id).map_err(|e| RelayError::Internal(e.to_string()))?
    };

    let Some(inbound) = inbound else {
        return Err(RelayError::NotFound("message"));
    };
    if inbound.account_id != auth.account_id {
        return Err(RelayError::NotFound("message"));
    }

    let Some(callback_url) = inbound.callback_url.clone() else {
        return Err(RelayError::CallbackExpired);
    };
    if let Some(expires_at) = &inbound.callback_expires_at {
        let expires = chrono::DateTime::parse_from_rfc3339(expires_at).map_err(|_| RelayError::CallbackExpired)?;
        if expires <= chrono::Utc::now() {
            return Err(RelayError::CallbackExpired);
        }
    }

    let outbound = {
        let conn = db.conn();
        messages::create_outbound(
            &conn,
            &auth.account_id,
            Some(&inbound.id),
            &inbound.conversation_key,
            &callback_url,
            &body.response,
        )
        .map_err(|e| RelayError::Internal(e.to_string()))?
    };

    if crate::debug_logging_enabled() {
        println!("📡 agent_reply: message_id={} account={}", body.message_id, auth.account_id);
    }

    match kakao.send_callback(&callback_url, &body.response).await {
        Ok(()) => {
            let conn = db.conn();
            messages::mark_outbound_sent(&conn, &outbound.id).map_err(|e| RelayError::Internal(e.to_string()))?;
        }
        Err(err) => {
            let message = err.message();
            let conn = db.conn();
            messages::mark_outbound_failed(&conn, &outbound.id, &message)
                .map_err(|e| RelayError::Internal(e.to_string()))?;
            drop(conn);
            return Err(match err {
                CallbackError::Blocked(m) => RelayError::CallbackFailed(m),
                CallbackError::Failed { message, .. } => RelayError::CallbackFailed(message),
            });
        }
    }

    Ok(Json(ReplyResponse {
        success: true,
        delivered_at: chrono::Utc::now().timestamp_millis(),
    }))
}
