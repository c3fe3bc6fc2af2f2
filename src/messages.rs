use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{InboundMessage, InboundStatus, NormalizedMessage, OutboundMessage, OutboundStatus};

pub struct CreateInbound<'a> {
    pub account_id: &'a str,
    pub conversation_key: &'a str,
    pub kakao_payload: serde_json::Value,
    pub normalized: Option<NormalizedMessage>,
    pub callback_url: Option<&'a str>,
    pub callback_expires_at: Option<&'a str>,
    pub source_event_id: Option<&'a str>,
}

pub fn create_inbound(conn: &Connection, input: CreateInbound) -> rusqlite::Result<InboundMessage> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let normalized_json = input
        .normalized
        .as_ref()
        .map(|n| serde_json::to_string(n).unwrap_or_default());

    conn.execute(
        "INSERT INTO inbound_messages
            (id, account_id, conversation_key, kakao_payload, normalized, callback_url, callback_expires_at, status, source_event_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'queued', ?8, ?9)",
        params![
            &id,
            input.account_id,
            input.conversation_key,
            serde_json::to_string(&input.kakao_payload).unwrap_or_default(),
            normalized_json,
            input.callback_url,
            input.callback_expires_at,
            input.source_event_id,
            &now,
        ],
    )?;

    Ok(get_inbound(conn, &id)?.expect("inbound message just inserted must exist"))
}

pub fn get_inbound(conn: &Connection, id: &str) -> rusqlite::Result<Option<InboundMessage>> {
    conn.query_row(
        "SELECT id, account_id, conversation_key, kakao_payload, normalized, callback_url, callback_expires_at, status, source_event_id, created_at, delivered_at, acked_at
         FROM inbound_messages WHERE id = ?1",
        [id],
        row_to_inbound,
    )
    .optional()
}

/// Oldest-first queued messages for an account, used to backfill a freshly subscribed SSE stream.
pub fn find_queued_by_account_id(conn: &Connection, account_id: &str) -> rusqlite::Result<Vec<InboundMessage>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, conversation_key, kakao_payload, normalized, callback_url, callback_expires_at, status, source_event_id, created_at, delivered_at, acked_at
         FROM inbound_messages WHERE account_id = ?1 AND status = 'queued' ORDER BY created_at ASC",
    )?;
    let rows = stmt
        .query_map([account_id], row_to_inbound)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

/// `queued -> delivered`. Idempotent: a no-op if already delivered or beyond.
pub fn mark_delivered(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE inbound_messages SET status = 'delivered', delivered_at = ?1 WHERE id = ?2 AND status = 'queued'",
        params![&now, id],
    )
}

/// `delivered -> acked`. Optional — agents may rely on delivered-on-push semantics instead.
pub fn mark_acked(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE inbound_messages SET status = 'acked', acked_at = ?1 WHERE id = ?2 AND status = 'delivered'",
        params![&now, id],
    )
}

pub fn create_outbound(
    conn: &Connection,
    account_id: &str,
    inbound_message_id: Option<&str>,
    conversation_key: &str,
    kakao_target: &str,
    response_payload: &serde_json::Value,
) -> rusqlite::Result<OutboundMessage> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO outbound_messages
            (id, account_id, inbound_message_id, conversation_key, kakao_target, response_payload, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7)",
        params![
            &id,
            account_id,
            inbound_message_id,
            conversation_key,
            kakao_target,
            serde_json::to_string(response_payload).unwrap_or_default(),
            &now,
        ],
    )?;
    get_outbound(conn, &id).map(|o| o.expect("outbound message just inserted must exist"))
}

pub fn get_outbound(conn: &Connection, id: &str) -> rusqlite::Result<Option<OutboundMessage>> {
    conn.query_row(
        "SELECT id, account_id, inbound_message_id, conversation_key, kakao_target, response_payload, status, error_message, created_at, sent_at
         FROM outbound_messages WHERE id = ?1",
        [id],
        row_to_outbound,
    )
    .optional()
}

pub fn mark_outbound_sent(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE outbound_messages SET status = 'sent', sent_at = ?1 WHERE id = ?2",
        params![&now, id],
    )
}

pub fn mark_outbound_failed(conn: &Connection, id: &str, error: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE outbound_messages SET status = 'failed', error_message = ?1 WHERE id = ?2",
        params![error, id],
    )
}

fn row_to_inbound(row: &rusqlite::Row) -> rusqlite::Result<InboundMessage> {
    let payload_str: String = row.get(3)?;
    let normalized_str: Option<String> = row.get(4)?;
    let status: String = row.get(7)?;
    Ok(InboundMessage {
        id: row.get(0)?,
        account_id: row.get(1)?,
        conversation_key: row.get(2)?,
        kakao_payload: serde_json::from_str(&payload_str).unwrap_or(serde_json::json!({})),
        normalized: normalized_str.and_then(|s| serde_json::from_str(&s).ok()),
        callback_url: row.get(5)?,
        callback_expires_at: row.get(6)?,
        status: InboundStatus::from_str(&status),
        source_event_id: row.get(8)?,
        created_at: row.get(9)?,
        delivered_at: row.get(10)?,
        acked_at: row.get(11)?,
    })
}

fn row_to_outbound(row: &rusqlite::Row) -> rusqlite::Result<OutboundMessage> {
    let payload_str: String = row.get(5)?;
    let status: String = row.get(6)?;
    Ok(OutboundMessage {
        id: row.get(0)?,
        account_id: row.get(1)?,
        inbound_message_id: row.get(2)?,
        conversation_key: row.get(3)?,
        kakao_target: row.get(4)?,
        response_payload: serde_json::from_str(&payload_str).unwrap_or(serde_json::json!({})),
        status: match status.as_str() {
            "sent" => OutboundStatus::Sent,
            "failed" => OutboundStatus::Failed,
            _ => OutboundStatus::Pending,
        },
        error_message: row.get(7)?,
        created_at: row.get(8)?,
        sent_at: row.get(9)?,
    })
}
