use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// Interval between reaper sweeps (seconds).
const REAPER_INTERVAL_SECS: u64 = 60;

/// Result of one full reaper sweep, across its four independent jobs.
#[derive(Debug, Clone, Default)]
pub struct ReaperResult {
    pub expired_inbound: i64,
    pub expired_sessions: i64,
    pub expired_pairing_codes: i64,
    pub expired_auth_sessions: i64,
}

/// Spawns a background task that periodically expires stale relay state: queued inbound
/// messages whose callback window has lapsed, pending sessions and unused pairing codes
/// past their TTL, and (stubbed — no Portal/Admin session table in this core) auth sessions.
pub fn spawn_reaper(db_path: String) {
    tokio::spawn(async move {
        let conn = Arc::new(Mutex::new(match Connection::open(&db_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("⚠️ reaper: failed to open DB: {e}");
                return;
            }
        }));
        {
            let db = conn.lock().unwrap_or_else(|e| e.into_inner());
            db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
                .ok();
        }

        // Initial delay: let the server finish starting up before the first sweep.
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;

        loop {
            {
                let db = conn.lock().unwrap_or_else(|e| {
                    eprintln!("WARN: reaper DB mutex poisoned, recovering");
                    e.into_inner()
                });
                let result = run_sweep(&db);
                let total = result.expired_inbound
                    + result.expired_sessions
                    + result.expired_pairing_codes
                    + result.expired_auth_sessions;
                if total > 0 {
                    println!(
                        "🧹 reaper: expired {} inbound, {} sessions, {} pairing codes",
                        result.expired_inbound, result.expired_sessions, result.expired_pairing_codes
                    );
                }
            }
            tokio::time::sleep(std::time::Duration::from_secs(REAPER_INTERVAL_SECS)).await;
        }
    });
}

/// Execute one sweep. Each of the four jobs runs in its own short transaction and its
/// failure does not prevent the others from running.
pub fn run_sweep(conn: &Connection) -> ReaperResult {
    ReaperResult {
        expired_inbound: expire_inbound_messages(conn),
        expired_sessions: expire_pending_sessions(conn),
        expired_pairing_codes: expire_pairing_codes(conn),
        // No Portal/Admin auth-session table exists in this core; kept as an explicit
        // fourth job so a future Portal crate has a natural slot to wire into.
        expired_auth_sessions: 0,
    }
}

fn expire_inbound_messages(conn: &Connection) -> i64 {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE inbound_messages SET status = 'expired'
         WHERE status = 'queued' AND callback_expires_at IS NOT NULL AND callback_expires_at < ?1",
        [&now],
    )
    .map(|n| n as i64)
    .unwrap_or_else(|e| {
        eprintln!("⚠️ reaper: inbound sweep failed: {e}");
        0
    })
}

fn expire_pending_sessions(conn: &Connection) -> i64 {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE sessions SET status = 'expired'
         WHERE status = 'pending_pairing' AND expires_at < ?1",
        [&now],
    )
    .map(|n| n as i64)
    .unwrap_or_else(|e| {
        eprintln!("⚠️ reaper: session sweep failed: {e}");
        0
    })
}

fn expire_pairing_codes(conn: &Connection) -> i64 {
    // Pairing codes have no explicit status column; "active" means unused and unexpired.
    // There's nothing further to mutate on expiry besides noticing it, so this sweep just
    // counts codes that have lapsed (used by admin-facing metrics / tests).
    let now = chrono::Utc::now().to_rfc3339();
    conn.query_row(
        "SELECT COUNT(*) FROM pairing_codes WHERE used_at IS NULL AND expires_at < ?1",
        [&now],
        |r| r.get(0),
    )
    .unwrap_or_else(|e| {
        eprintln!("⚠️ reaper: pairing code sweep failed: {e}");
        0
    })
}
