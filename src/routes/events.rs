use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::response::stream::{Event, EventStream};
use rocket::{get, State};
use tokio::time::{interval, Duration};
use uuid::Uuid;

use crate::broker::Broker;
use crate::config::RelayConfig;
use crate::db::Db;
use crate::messages;
use crate::models::SessionStatus;
use crate::routes::bearer_token;
use crate::session;

/// A stream subscriber is either an already-paired account or a session still waiting
/// to be paired (subscribed on `session:<id>` until a `pairing_complete` event arrives).
pub enum AgentIdentity {
    Account(String),
    Session(String),
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AgentIdentity {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(token) = bearer_token(req) else {
            return Outcome::Forward(Status::Unauthorized);
        };
        let Some(db) = req.guard::<&State<Db>>().await.succeeded() else {
            return Outcome::Forward(Status::InternalServerError);
        };
        let token_hash = session::hash_token(&token);
        let conn = db.conn();

        let account_id: Option<String> = conn
            .query_row(
                "SELECT id FROM accounts WHERE token_hash = ?1 AND disabled_at IS NULL",
                [&token_hash],
                |r| r.get(0),
            )
            .ok();
        if let Some(account_id) = account_id {
            return Outcome::Success(AgentIdentity::Account(account_id));
        }

        match session::get_by_token_hash(&conn, &token_hash) {
            // A paired session's token now identifies its account — subscribe on the
            // account topic directly rather than the now-stale `session:<id>` one.
            Ok(Some(s)) if s.status == SessionStatus::Paired => match s.account_id {
                Some(account_id) => Outcome::Success(AgentIdentity::Account(account_id)),
                None => Outcome::Forward(Status::Unauthorized),
            },
            Ok(Some(s)) => Outcome::Success(AgentIdentity::Session(s.id)),
            _ => Outcome::Forward(Status::Unauthorized),
        }
    }
}

/// Removes this subscription from the Broker when the stream ends, however it ends —
/// client disconnect drops the generator's locals same as a normal return.
struct SubscriptionGuard<'a> {
    broker: &'a Broker,
    topic: String,
    id: Uuid,
}

impl Drop for SubscriptionGuard<'_> {
    fn drop(&mut self) {
        self.broker.unsubscribe(&self.topic, self.id);
    }
}

/// Long-lived SSE stream: an already-paired account receives its queued backlog then live
/// `message` events; a pending session receives `connected` and waits for `pairing_complete`.
#[get("/v1/events")]
pub fn agent_events(
    db: &State<Db>,
    broker: &State<Broker>,
    config: &State<RelayConfig>,
    identity: AgentIdentity,
) -> EventStream![] {
    let topic = match &identity {
        AgentIdentity::Account(account_id) => account_id.clone(),
        AgentIdentity::Session(session_id) => format!("session:{session_id}"),
    };

    let (sub_id, mut rx) = broker.subscribe(&topic);

    let backlog = match &identity {
        AgentIdentity::Account(account_id) => {
            let conn = db.conn();
            messages::find_queued_by_account_id(&conn, account_id).unwrap_or_default()
        }
        AgentIdentity::Session(_) => Vec::new(),
    };

    let connected_payload = match &identity {
        AgentIdentity::Account(account_id) => {
            serde_json::json!({"accountId": account_id, "status": "paired"})
        }
        AgentIdentity::Session(session_id) => {
            serde_json::json!({"sessionId": session_id, "status": "pending_pairing"})
        }
    };

    let heartbeat_secs = config.heartbeat_interval_secs;

    EventStream! {
        let _guard = SubscriptionGuard { broker: broker.inner(), topic, id: sub_id };

        for msg in backlog {
            {
                let conn = db.conn();
                let _ = messages::mark_delivered(&conn, &msg.id);
            }
            yield Event::json(&serde_json::json!({
                "id": msg.id,
                "conversationKey": msg.conversation_key,
                "kakaoPayload": msg.kakao_payload,
                "normalized": msg.normalized,
                "createdAt": msg.created_at,
            })).event("message");
        }

        yield Event::json(&connected_payload).event("connected");

        let mut heartbeat = interval(Duration::from_secs(heartbeat_secs));

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(event) => {
                            yield Event::json(&event.data).event(event.event_type);
                        }
                        None => break,
                    }
                }
                _ = heartbeat.tick() => {
                    yield Event::comment("ping");
                }
            }
        }
    }
}
