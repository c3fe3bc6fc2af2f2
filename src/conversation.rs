use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Conversation, PairingState};

/// Find the conversation keyed by `channel_id:user_key`, or create it in state `unpaired`.
/// Refreshes `last_seen_at` and, when supplied, the callback URL and its expiry on every call.
pub fn find_or_create(
    conn: &Connection,
    channel_id: &str,
    user_key: &str,
    callback_url: Option<&str>,
    callback_expires_at: Option<&str>,
) -> rusqlite::Result<Conversation> {
    let key = conversation_key(channel_id, user_key);
    let now = chrono::Utc::now().to_rfc3339();

    let existing = get(conn, &key)?;
    if existing.is_some() {
        conn.execute(
            "UPDATE conversations SET last_seen_at = ?1,
                callback_url = COALESCE(?2, callback_url),
                callback_expires_at = COALESCE(?3, callback_expires_at)
             WHERE conversation_key = ?4",
            params![&now, callback_url, callback_expires_at, &key],
        )?;
    } else {
        conn.execute(
            "INSERT INTO conversations
                (conversation_key, channel_id, user_key, account_id, pairing_state, paired_at, last_seen_at, callback_url, callback_expires_at)
             VALUES (?1, ?2, ?3, NULL, 'unpaired', NULL, ?4, ?5, ?6)",
            params![&key, channel_id, user_key, &now, callback_url, callback_expires_at],
        )?;
    }

    Ok(get(conn, &key)?.expect("conversation just upserted must exist"))
}

pub fn get(conn: &Connection, key: &str) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        "SELECT conversation_key, channel_id, user_key, account_id, pairing_state, paired_at, last_seen_at, callback_url, callback_expires_at
         FROM conversations WHERE conversation_key = ?1",
        [key],
        row_to_conversation,
    )
    .optional()
}

/// Transition to `paired`, pinning the given account. Rejects a transition to `paired`
/// without an account id by returning `Ok(false)`.
pub fn pair(conn: &Connection, key: &str, account_id: &str) -> rusqlite::Result<bool> {
    let Some(existing) = get(conn, key)? else {
        return Ok(false);
    };
    if existing.pairing_state == PairingState::Paired {
        return Ok(false);
    }
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE conversations SET pairing_state = 'paired', account_id = ?1, paired_at = ?2 WHERE conversation_key = ?3",
        params![account_id, &now, key],
    )?;
    Ok(true)
}

pub fn unpair(conn: &Connection, key: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE conversations SET pairing_state = 'unpaired', account_id = NULL, paired_at = NULL WHERE conversation_key = ?1",
        [key],
    )
}

pub fn block(conn: &Connection, key: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE conversations SET pairing_state = 'blocked' WHERE conversation_key = ?1",
        [key],
    )
}

pub fn conversation_key(channel_id: &str, user_key: &str) -> String {
    format!("{channel_id}:{user_key}")
}

fn row_to_conversation(row: &rusqlite::Row) -> rusqlite::Result<Conversation> {
    let pairing_state: String = row.get(4)?;
    Ok(Conversation {
        conversation_key: row.get(0)?,
        channel_id: row.get(1)?,
        user_key: row.get(2)?,
        account_id: row.get(3)?,
        pairing_state: PairingState::from_str(&pairing_state),
        paired_at: row.get(5)?,
        last_seen_at: row.get(6)?,
        callback_url: row.get(7)?,
        callback_expires_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE conversations (
                conversation_key TEXT PRIMARY KEY, channel_id TEXT, user_key TEXT,
                account_id TEXT, pairing_state TEXT DEFAULT 'unpaired', paired_at TEXT,
                last_seen_at TEXT, callback_url TEXT, callback_expires_at TEXT
            );",
        )
        .unwrap();
        conn
    }

    #[test]
    fn find_or_create_is_idempotent_on_key() {
        let conn = test_conn();
        let a = find_or_create(&conn, "ch1", "u1", None, None).unwrap();
        let b = find_or_create(&conn, "ch1", "u1", None, None).unwrap();
        assert_eq!(a.conversation_key, b.conversation_key);
        assert_eq!(a.pairing_state, PairingState::Unpaired);
    }

    #[test]
    fn pair_requires_existing_conversation() {
        let conn = test_conn();
        assert!(!pair(&conn, "nope", "acc1").unwrap());
        find_or_create(&conn, "ch1", "u1", None, None).unwrap();
        let key = conversation_key("ch1", "u1");
        assert!(pair(&conn, &key, "acc1").unwrap());
        let row = get(&conn, &key).unwrap().unwrap();
        assert_eq!(row.pairing_state, PairingState::Paired);
        assert_eq!(row.account_id.as_deref(), Some("acc1"));
    }

    #[test]
    fn unpair_clears_account_and_paired_at() {
        let conn = test_conn();
        find_or_create(&conn, "ch1", "u1", None, None).unwrap();
        let key = conversation_key("ch1", "u1");
        pair(&conn, &key, "acc1").unwrap();
        unpair(&conn, &key).unwrap();
        let row = get(&conn, &key).unwrap().unwrap();
        assert_eq!(row.pairing_state, PairingState::Unpaired);
        assert!(row.account_id.is_none());
        assert!(row.paired_at.is_none());
    }
}
