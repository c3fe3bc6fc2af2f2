use rocket::serde::json::Json;
use rocket::{get, State};

use crate::db::Db;

#[get("/health")]
pub fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "kakao-openclaw-relay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[get("/v1/stats")]
pub fn stats(db: &State<Db>) -> Json<serde_json::Value> {
    let conn = db.conn();
    let now = chrono::Utc::now().to_rfc3339();
    let cutoff_24h = (chrono::Utc::now() - chrono::Duration::hours(24)).to_rfc3339();

    let account_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM accounts WHERE disabled_at IS NULL", [], |r| r.get(0))
        .unwrap_or(0);
    let paired_conversations: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM conversations WHERE pairing_state = 'paired'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);
    let queued_inbound: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM inbound_messages WHERE status = 'queued'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);
    // All timestamps are stored as RFC3339 strings (see db.rs), so cutoffs must be computed
    // the same way rather than via SQLite's datetime('now') — its "YYYY-MM-DD HH:MM:SS"
    // shape isn't lexicographically comparable against our "...T...+00:00" strings.
    let delivered_inbound_24h: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM inbound_messages WHERE status IN ('delivered', 'acked') AND delivered_at > ?1",
            [&cutoff_24h],
            |r| r.get(0),
        )
        .unwrap_or(0);
    let outbound_sent_24h: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM outbound_messages WHERE status = 'sent' AND sent_at > ?1",
            [&cutoff_24h],
            |r| r.get(0),
        )
        .unwrap_or(0);
    let outbound_failed_24h: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM outbound_messages WHERE status = 'failed' AND created_at > ?1",
            [&cutoff_24h],
            |r| r.get(0),
        )
        .unwrap_or(0);
    let active_pairing_codes: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pairing_codes WHERE used_at IS NULL AND expires_at > ?1",
            [&now],
            |r| r.get(0),
        )
        .unwrap_or(0);
    let pending_sessions: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sessions WHERE status = 'pending_pairing'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    Json(serde_json::json!({
        "accounts": account_count,
        "paired_conversations": paired_conversations,
        "queued_inbound": queued_inbound,
        "delivered_inbound_24h": delivered_inbound_24h,
        "outbound_sent_24h": outbound_sent_24h,
        "outbound_failed_24h": outbound_failed_24h,
        "active_pairing_codes": active_pairing_codes,
        "pending_sessions": pending_sessions,
    }))
}

#[rocket::catch(429)]
pub fn too_many_requests() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Too many requests"}))
}

#[rocket::catch(404)]
pub fn not_found() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Not found"}))
}

/// Catches the bare 401 `AccountAuth`/`AgentIdentity` forward on a missing or garbage bearer
/// token, rendering the same JSON shape `RelayError::Unauthorized` would.
#[rocket::catch(401)]
pub fn unauthorized() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "SESSION_NOT_PAIRED", "message": "not authorized"}))
}
