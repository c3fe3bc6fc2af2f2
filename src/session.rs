use hmac::{Hmac, Mac};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::Sha256;

use crate::conversation;
use crate::db::generate_relay_token;
use crate::models::{Session, SessionStatus};

type HmacSha256 = Hmac<Sha256>;

const CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_GROUP_LEN: usize = 4;
/// HMAC key used only to hash session/relay tokens at rest — distinct from the tokens
/// themselves, so a DB dump alone can't be replayed as a bearer credential.
const TOKEN_HASH_KEY: &[u8] = b"kakao-openclaw-relay.session-token-hash.v1";

#[derive(Debug)]
pub enum PairError {
    InvalidCode,
    AlreadyPaired,
    Db(rusqlite::Error),
}

impl From<rusqlite::Error> for PairError {
    fn from(e: rusqlite::Error) -> Self {
        PairError::Db(e)
    }
}

pub struct CreatedSession {
    pub session_token: String,
    pub pairing_code: String,
    pub expires_in: i64,
}

/// Result of a successful plugin-initiated pairing: both topics a `pairing_complete`
/// event must reach (the session's own topic, and the freshly-minted account's).
pub struct PairedSession {
    pub account_id: String,
    pub session_id: String,
}

/// Mint a plugin-initiated session: a bearer token (hashed at rest) plus a pairing code to
/// be typed into KakaoTalk chat. Starts `pending_pairing` with a short TTL.
pub fn create_session(conn: &Connection, ttl_secs: i64) -> rusqlite::Result<CreatedSession> {
    let id = uuid::Uuid::new_v4().to_string();
    let token = generate_relay_token();
    let token_hash = hash_token(&token);
    let code = generate_code();
    let now = chrono::Utc::now();
    let expires_at = (now + chrono::Duration::seconds(ttl_secs)).to_rfc3339();

    conn.execute(
        "INSERT INTO sessions (id, token_hash, pairing_code, status, account_id, paired_conversation_key, expires_at, paired_at, created_at)
         VALUES (?1, ?2, ?3, 'pending_pairing', NULL, NULL, ?4, NULL, ?5)",
        params![&id, &token_hash, &code, &expires_at, &now.to_rfc3339()],
    )?;

    Ok(CreatedSession {
        session_token: token,
        pairing_code: code,
        expires_in: ttl_secs,
    })
}

pub fn get_by_token(conn: &Connection, token: &str) -> rusqlite::Result<Option<Session>> {
    get_by_token_hash(conn, &hash_token(token))
}

pub fn get_by_token_hash(conn: &Connection, token_hash: &str) -> rusqlite::Result<Option<Session>> {
    conn.query_row(
        "SELECT id, pairing_code, status, account_id, paired_conversation_key, expires_at, paired_at, created_at
         FROM sessions WHERE token_hash = ?1",
        [token_hash],
        row_to_session,
    )
    .optional()
}

/// Lazily expire a `pending_pairing` session whose TTL has lapsed, then return its status.
pub fn get_status(conn: &Connection, token_hash: &str) -> rusqlite::Result<Option<Session>> {
    let Some(session) = get_by_token_hash(conn, token_hash)? else {
        return Ok(None);
    };
    if session.status == SessionStatus::PendingPairing {
        let now = chrono::Utc::now();
        if let Ok(expires) = chrono::DateTime::parse_from_rfc3339(&session.expires_at)
            && expires <= now
        {
            conn.execute(
                "UPDATE sessions SET status = 'expired' WHERE id = ?1",
                [&session.id],
            )?;
            return get_by_token_hash(conn, token_hash);
        }
    }
    Ok(Some(session))
}

/// Verify a pairing code typed into KakaoTalk chat against a pending session. On success,
/// in one transaction: mints a fresh Account, pins the session to it, and marks it `paired`
/// with a far-future expiry (it no longer needs to lapse).
pub fn verify_pairing_code(
    conn: &mut Connection,
    code: &str,
    conversation_key: &str,
) -> Result<PairedSession, PairError> {
    let normalized = code.trim().to_uppercase();
    let tx = conn.transaction()?;
    let now = chrono::Utc::now();
    let now_str = now.to_rfc3339();

    let row: Option<(String, String)> = tx
        .query_row(
            "SELECT id, expires_at FROM sessions WHERE pairing_code = ?1 AND status = 'pending_pairing'",
            [&normalized],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;

    let Some((session_id, expires_at)) = row else {
        return Err(PairError::InvalidCode);
    };

    let expires = chrono::DateTime::parse_from_rfc3339(&expires_at).map_err(|_| PairError::InvalidCode)?;
    if expires <= now {
        return Err(PairError::InvalidCode);
    }

    let account_id = uuid::Uuid::new_v4().to_string();
    let token_hash = hash_token(&generate_relay_token());
    tx.execute(
        "INSERT INTO accounts (id, external_user_id, token_hash, delivery_mode, rate_limit_per_min, disabled_at, created_at, updated_at)
         VALUES (?1, NULL, ?2, 'relay', 60, NULL, ?3, ?3)",
        params![&account_id, &token_hash, &now_str],
    )?;

    // Pin the Conversation row to the new account before committing, mirroring
    // pairing::verify — an already-paired conversation aborts the whole transaction
    // (code/session stay untouched) rather than silently minting an orphan account.
    if !conversation::pair(&tx, conversation_key, &account_id)? {
        return Err(PairError::AlreadyPaired);
    }

    // Far-future expiry: a paired session no longer has a meaningful TTL to lapse.
    let far_future = (now + chrono::Duration::days(365 * 100)).to_rfc3339();
    tx.execute(
        "UPDATE sessions SET status = 'paired', account_id = ?1, paired_conversation_key = ?2, paired_at = ?3, expires_at = ?4 WHERE id = ?5",
        params![&account_id, conversation_key, &now_str, &far_future, &session_id],
    )?;

    tx.commit()?;
    Ok(PairedSession { account_id, session_id })
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let raw: String = (0..CODE_GROUP_LEN * 2)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect();
    format!("{}-{}", &raw[..CODE_GROUP_LEN], &raw[CODE_GROUP_LEN..])
}

pub fn hash_token(token: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(TOKEN_HASH_KEY).expect("HMAC accepts any key length");
    mac.update(token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    let status: String = row.get(2)?;
    Ok(Session {
        id: row.get(0)?,
        pairing_code: row.get(1)?,
        status: SessionStatus::from_str(&status),
        account_id: row.get(3)?,
        paired_conversation_key: row.get(4)?,
        expires_at: row.get(5)?,
        paired_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}
