mod events;
mod kakao;
mod reply;
mod sessions;
mod system;

pub use events::agent_events;
pub use kakao::kakao_webhook;
pub use reply::agent_reply;
pub use sessions::{create_session, session_status};
pub use system::{health, not_found, stats, too_many_requests, unauthorized};

use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::State;

use crate::db::Db;
use crate::models::SessionStatus;
use crate::session;

/// Bearer token presented by an already-paired account (`Authorization: Bearer <relay token>`).
pub struct AccountAuth {
    pub account_id: String,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AccountAuth {
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
            return Outcome::Success(AccountAuth { account_id });
        }

        // A session's own bearer token remains valid after it pairs — the plugin never learns
        // a separate account token, so a paired session's token doubles as the account's.
        match session::get_by_token_hash(&conn, &token_hash) {
            Ok(Some(s)) if s.status == SessionStatus::Paired => match s.account_id {
                Some(account_id) => Outcome::Success(AccountAuth { account_id }),
                None => Outcome::Forward(Status::Unauthorized),
            },
            _ => Outcome::Forward(Status::Unauthorized),
        }
    }
}

fn bearer_token(req: &Request<'_>) -> Option<String> {
    req.headers()
        .get_one("Authorization")
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}
