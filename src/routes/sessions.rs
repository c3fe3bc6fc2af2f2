use rocket::serde::json::Json;
use rocket::{get, post, State};

use crate::config::RelayConfig;
use crate::db::Db;
use crate::error::RelayError;
use crate::models::{SessionCreateResponse, SessionStatusResponse};
use crate::session;

/// Plugin-initiated pairing, step 1: mint a bearer token plus a pairing code to be typed
/// into KakaoTalk chat as `/pair <CODE>`.
#[post("/v1/sessions/create")]
pub fn create_session(db: &State<Db>, config: &State<RelayConfig>) -> Result<Json<SessionCreateResponse>, RelayError> {
    let created = session::create_session(&db.conn(), config.session_pairing_ttl_secs)
        .map_err(|e| RelayError::Internal(e.to_string()))?;

    Ok(Json(SessionCreateResponse {
        session_token: created.session_token,
        pairing_code: created.pairing_code,
        expires_in: created.expires_in,
        status: "pending_pairing".to_string(),
    }))
}

/// Plugin-initiated pairing, step 2: the agent polls this until the user has typed the
/// code into KakaoTalk chat and the session flips to `paired`.
#[get("/v1/sessions/<token>/status")]
pub fn session_status(db: &State<Db>, token: &str) -> Result<Json<SessionStatusResponse>, RelayError> {
    let token_hash = session::hash_token(token);
    let session = session::get_status(&db.conn(), &token_hash)
        .map_err(|e| RelayError::Internal(e.to_string()))?
        .ok_or(RelayError::NotFound("session"))?;

    let kakao_user_id = session
        .paired_conversation_key
        .as_deref()
        .map(|key| key.split_once(':').map(|(_, user)| user).unwrap_or(key).to_string());

    Ok(Json(SessionStatusResponse {
        status: session.status.as_str().to_string(),
        paired_at: session.paired_at,
        kakao_user_id,
        account_id: session.account_id,
    }))
}
