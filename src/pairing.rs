use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::conversation;
use crate::models::PairingCode;

/// Code alphabet excludes visually ambiguous glyphs (O/0, I/1), matching the shape the user
/// is asked to type back into KakaoTalk chat.
const CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_GROUP_LEN: usize = 4;
const MAX_ACTIVE_CODES_PER_ACCOUNT: i64 = 5;
const MAX_GENERATION_ATTEMPTS: u32 = 10;

#[derive(Debug)]
pub enum GenerateError {
    TooManyActiveCodes,
    Db(rusqlite::Error),
}

impl From<rusqlite::Error> for GenerateError {
    fn from(e: rusqlite::Error) -> Self {
        GenerateError::Db(e)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum VerifyError {
    Invalid,
    Expired,
    AlreadyUsed,
    AlreadyPaired,
}

/// Generate a human-typeable `XXXX-XXXX` pairing code for `account_id`. Rejects if the
/// account already has `MAX_ACTIVE_CODES_PER_ACCOUNT` unused, unexpired codes.
pub fn generate(
    conn: &Connection,
    account_id: &str,
    ttl_secs: i64,
    metadata: Option<serde_json::Value>,
) -> Result<PairingCode, GenerateError> {
    let now = chrono::Utc::now();
    let now_str = now.to_rfc3339();

    let active: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pairing_codes WHERE account_id = ?1 AND used_at IS NULL AND expires_at > ?2",
        params![account_id, &now_str],
        |r| r.get(0),
    )?;
    if active >= MAX_ACTIVE_CODES_PER_ACCOUNT {
        return Err(GenerateError::TooManyActiveCodes);
    }

    let expires_at = (now + chrono::Duration::seconds(ttl_secs)).to_rfc3339();
    let metadata_json = metadata.as_ref().map(|m| serde_json::to_string(m).unwrap_or_default());

    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let code = generate_code();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO pairing_codes (code, account_id, expires_at, used_at, used_by, metadata, created_at)
             VALUES (?1, ?2, ?3, NULL, NULL, ?4, ?5)",
            params![&code, account_id, &expires_at, metadata_json, &now_str],
        )?;
        if inserted == 1 {
            return Ok(get(conn, &code)?.expect("pairing code just inserted must exist"));
        }
    }

    Err(GenerateError::Db(rusqlite::Error::QueryReturnedNoRows))
}

pub fn get(conn: &Connection, code: &str) -> rusqlite::Result<Option<PairingCode>> {
    conn.query_row(
        "SELECT code, account_id, expires_at, used_at, used_by, metadata, created_at FROM pairing_codes WHERE code = ?1",
        [code],
        row_to_code,
    )
    .optional()
}

/// Verify `code` against `conversation_key`: consumes the code and pairs the conversation
/// in one transaction. Returns the account id on success. Idempotent under retry once
/// consumed — a second call always returns `AlreadyUsed`, never re-mutates state.
pub fn verify(conn: &mut Connection, code: &str, conversation_key: &str) -> Result<String, VerifyError> {
    let normalized = code.trim().to_uppercase();
    let tx = conn.transaction().map_err(|_| VerifyError::Invalid)?;

    let row: Option<(String, String, Option<String>)> = tx
        .query_row(
            "SELECT account_id, expires_at, used_at FROM pairing_codes WHERE code = ?1",
            [&normalized],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
        .map_err(|_| VerifyError::Invalid)?;

    let Some((account_id, expires_at, used_at)) = row else {
        return Err(VerifyError::Invalid);
    };

    if used_at.is_some() {
        return Err(VerifyError::AlreadyUsed);
    }

    let now = chrono::Utc::now();
    let expires = chrono::DateTime::parse_from_rfc3339(&expires_at).map_err(|_| VerifyError::Invalid)?;
    if expires <= now {
        return Err(VerifyError::Expired);
    }

    // Pin the conversation before burning the code: an already-paired conversation must
    // abort the whole attempt (code stays unused) rather than mutate and report success.
    let paired = conversation::pair(&tx, conversation_key, &account_id).map_err(|_| VerifyError::Invalid)?;
    if !paired {
        return Err(VerifyError::AlreadyPaired);
    }

    let now_str = now.to_rfc3339();
    tx.execute(
        "UPDATE pairing_codes SET used_at = ?1, used_by = ?2 WHERE code = ?3",
        params![&now_str, conversation_key, &normalized],
    )
    .map_err(|_| VerifyError::Invalid)?;

    tx.commit().map_err(|_| VerifyError::Invalid)?;
    Ok(account_id)
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let raw: String = (0..CODE_GROUP_LEN * 2)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect();
    format!("{}-{}", &raw[..CODE_GROUP_LEN], &raw[CODE_GROUP_LEN..])
}

fn row_to_code(row: &rusqlite::Row) -> rusqlite::Result<PairingCode> {
    let metadata_str: Option<String> = row.get(5)?;
    Ok(PairingCode {
        code: row.get(0)?,
        account_id: row.get(1)?,
        expires_at: row.get(2)?,
        used_at: row.get(3)?,
        used_by: row.get(4)?,
        metadata: metadata_str.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get(6)?,
    })
}
