use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

pub struct Db {
    pub conn: Mutex<Connection>,
}

/// Generate an account-facing relay token: `relay_<32 hex chars>`. Shown to the caller once;
/// only its HMAC hash is persisted (see `crate::session`).
pub fn generate_relay_token() -> String {
    format!("relay_{:032x}", uuid::Uuid::new_v4().as_u128())
}

impl Db {
    pub fn new(path: &str) -> Self {
        let conn = Connection::open(path).expect("Failed to open database");
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .expect("Failed to set pragmas");
        let db = Db {
            conn: Mutex::new(conn),
        };
        db.migrate();
        db
    }

    /// Convenience accessor matching the teacher's `db.conn()` call sites; panics on a poisoned
    /// mutex the same way the teacher's routes do (a previous panicking handler is itself a bug).
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    fn migrate(&self) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                external_user_id TEXT,
                token_hash TEXT NOT NULL UNIQUE,
                delivery_mode TEXT NOT NULL DEFAULT 'relay',
                rate_limit_per_min INTEGER NOT NULL DEFAULT 60,
                disabled_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_accounts_token_hash ON accounts(token_hash);

            CREATE TABLE IF NOT EXISTS conversations (
                conversation_key TEXT PRIMARY KEY,
                channel_id TEXT NOT NULL,
                user_key TEXT NOT NULL,
                account_id TEXT REFERENCES accounts(id) ON DELETE SET NULL,
                pairing_state TEXT NOT NULL DEFAULT 'unpaired',
                paired_at TEXT,
                last_seen_at TEXT NOT NULL,
                callback_url TEXT,
                callback_expires_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_conversations_account ON conversations(account_id);

            CREATE TABLE IF NOT EXISTS inbound_messages (
                id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                conversation_key TEXT NOT NULL REFERENCES conversations(conversation_key) ON DELETE CASCADE,
                kakao_payload TEXT NOT NULL,
                normalized TEXT,
                callback_url TEXT,
                callback_expires_at TEXT,
                status TEXT NOT NULL DEFAULT 'queued',
                source_event_id TEXT,
                created_at TEXT NOT NULL,
                delivered_at TEXT,
                acked_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_inbound_account_status ON inbound_messages(account_id, status);
            CREATE INDEX IF NOT EXISTS idx_inbound_callback_expiry ON inbound_messages(status, callback_expires_at);

            CREATE TABLE IF NOT EXISTS outbound_messages (
                id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                inbound_message_id TEXT REFERENCES inbound_messages(id) ON DELETE SET NULL,
                conversation_key TEXT NOT NULL,
                kakao_target TEXT NOT NULL,
                response_payload TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                error_message TEXT,
                created_at TEXT NOT NULL,
                sent_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_outbound_account ON outbound_messages(account_id);

            CREATE TABLE IF NOT EXISTS pairing_codes (
                code TEXT PRIMARY KEY,
                account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                expires_at TEXT NOT NULL,
                used_at TEXT,
                used_by TEXT,
                metadata TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_pairing_codes_account ON pairing_codes(account_id);
            CREATE INDEX IF NOT EXISTS idx_pairing_codes_expiry ON pairing_codes(used_at, expires_at);

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                token_hash TEXT NOT NULL UNIQUE,
                pairing_code TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending_pairing',
                account_id TEXT REFERENCES accounts(id) ON DELETE SET NULL,
                paired_conversation_key TEXT,
                expires_at TEXT NOT NULL,
                paired_at TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_token_hash ON sessions(token_hash);
            CREATE INDEX IF NOT EXISTS idx_sessions_pairing_code ON sessions(pairing_code);
            CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions(status, expires_at);",
        )
        .expect("Failed to run migrations");
    }
}
