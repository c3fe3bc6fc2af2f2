use hmac::{Hmac, Mac};
use rocket::data::{Data, ToByteUnit};
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::{post, State};
use sha2::Sha256;

use crate::broker::{Broker, BrokerEvent};
use crate::config::RelayConfig;
use crate::conversation;
use crate::db::Db;
use crate::error::RelayError;
use crate::messages::{self, CreateInbound};
use crate::models::{KakaoWebhookBody, NormalizedMessage, PairingState};
use crate::pairing;
use crate::rate_limit::RateLimiter;
use crate::session;

type HmacSha256 = Hmac<Sha256>;

/// The raw `X-Kakao-Signature` header, carried through unparsed so it can be checked
/// against an HMAC computed over the exact request bytes (a `Json<_>` data guard would
/// have already consumed and reserialized the body by the time a handler sees it).
pub struct KakaoSignatureHeader(Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for KakaoSignatureHeader {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(KakaoSignatureHeader(
            req.headers().get_one("X-Kakao-Signature").map(str::to_string),
        ))
    }
}

/// Returns an error iff a secret is configured and the signature is missing or doesn't match.
fn verify_signature(secret: &str, signature: &KakaoSignatureHeader, raw_body: &[u8]) -> Result<(), RelayError> {
    let provided = signature
        .0
        .as_deref()
        .and_then(|h| h.strip_prefix("sha256="))
        .ok_or_else(|| RelayError::Validation("missing X-Kakao-Signature header".to_string()))?;
    let provided_bytes =
        hex::decode(provided).map_err(|_| RelayError::Validation("malformed X-Kakao-Signature header".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(raw_body);
    mac.verify_slice(&provided_bytes)
        .map_err(|_| RelayError::Validation("signature mismatch".to_string()))
}

/// Receives KakaoTalk business-chat webhooks. Must answer within the 5s skill timeout, so
/// the only synchronous work here is a DB upsert/insert and a non-blocking broker publish.
#[post("/kakao/webhook", data = "<body>")]
pub async fn kakao_webhook(
    db: &State<Db>,
    broker: &State<Broker>,
    config: &State<RelayConfig>,
    limiter: &State<RateLimiter>,
    signature: KakaoSignatureHeader,
    body: Data<'_>,
) -> Result<Json<serde_json::Value>, RelayError> {
    let raw = body
        .open(1.mebibytes())
        .into_bytes()
        .await
        .map_err(|e| RelayError::Validation(format!("failed to read request body: {e}")))?;
    if !raw.is_complete() {
        return Err(RelayError::Validation("request body exceeds size limit".to_string()));
    }
    let raw = raw.into_inner();

    if let Some(secret) = &config.kakao_signature_secret {
        verify_signature(secret, &signature, &raw)?;
    }

    let body: KakaoWebhookBody =
        serde_json::from_slice(&raw).map_err(|e| RelayError::Validation(format!("malformed webhook body: {e}")))?;

    if crate::debug_logging_enabled() {
        println!(
            "📡 kakao_webhook: bot={:?} utterance={:?}",
            body.bot.as_ref().map(|b| &b.id),
            body.user_request.utterance
        );
    }

    let channel_id = body
        .bot
        .as_ref()
        .map(|b| b.id.clone())
        .unwrap_or_else(|| "default".to_string());

    let user_key = body
        .user_request
        .user
        .properties
        .as_ref()
        .and_then(|p| p.plusfriend_user_key.clone())
        .unwrap_or_else(|| body.user_request.user.id.clone());

    let callback_url = body.user_request.callback_url.as_deref().filter(|s| !s.is_empty());
    let callback_expires_at = callback_url
        .map(|_| (chrono::Utc::now() + chrono::Duration::seconds(config.callback_ttl_secs)).to_rfc3339());

    let mut conn = db.conn();
    let conversation = match conversation::find_or_create(
        &conn,
        &channel_id,
        &user_key,
        callback_url,
        callback_expires_at.as_deref(),
    ) {
        Ok(c) => c,
        Err(e) => {
            // Lenient on the webhook path: log and ack anyway to avoid a KakaoTalk retry storm.
            eprintln!("⚠️ kakao_webhook: failed to upsert conversation: {e}");
            return Ok(text_reply("Something went wrong. Please try again."));
        }
    };

    let utterance = body.user_request.utterance.trim();
    if let Some(reply) = handle_command(&mut conn, &conversation.conversation_key, utterance, config, limiter, broker) {
        return Ok(reply);
    }

    if conversation.pairing_state != PairingState::Paired {
        return Ok(text_reply(
            "This conversation isn't connected yet. Send /pair <CODE> with the code shown in your agent.",
        ));
    }

    let Some(account_id) = conversation.account_id.clone() else {
        return Ok(text_reply("This conversation isn't connected yet."));
    };

    let normalized = NormalizedMessage {
        user_id: user_key.clone(),
        text: utterance.to_string(),
        channel_id: channel_id.clone(),
    };

    let inbound = messages::create_inbound(
        &conn,
        CreateInbound {
            account_id: &account_id,
            conversation_key: &conversation.conversation_key,
            kakao_payload: serde_json::to_value(&body).unwrap_or_default(),
            normalized: Some(normalized.clone()),
            callback_url,
            callback_expires_at: callback_expires_at.as_deref(),
            source_event_id: None,
        },
    );

    match inbound {
        Ok(inbound) => {
            broker.publish(
                &account_id,
                BrokerEvent {
                    event_type: "message",
                    data: serde_json::json!({
                        "id": inbound.id,
                        "conversationKey": inbound.conversation_key,
                        "kakaoPayload": inbound.kakao_payload,
                        "normalized": normalized,
                        "createdAt": inbound.created_at,
                    }),
                },
            );
            Ok(Json(serde_json::json!({"version": "2.0", "useCallback": true})))
        }
        Err(e) => {
            eprintln!("⚠️ kakao_webhook: failed to enqueue inbound message: {e}");
            Ok(text_reply("Something went wrong. Please try again."))
        }
    }
}

/// Parse and dispatch `/pair`, `/unpair`, `/status`, `/help`. Returns `Some(reply)` when the
/// utterance was a command (always answered with a text template, not `useCallback`).
fn handle_command(
    conn: &mut rusqlite::Connection,
    conversation_key: &str,
    utterance: &str,
    config: &RelayConfig,
    limiter: &RateLimiter,
    broker: &Broker,
) -> Option<Json<serde_json::Value>> {
    if let Some(rest) = utterance.strip_prefix("/pair") {
        let code = rest.trim();
        if code.is_empty() {
            return Some(text_reply("Usage: /pair <CODE>"));
        }

        let rl_key = format!("pair-gen:{conversation_key}");
        let info = limiter.check_with_info(
            &rl_key,
            config.pairing_rate_limit_max,
            config.pairing_rate_limit_window_secs,
        );
        if !info.allowed {
            return Some(text_reply("Too many pairing attempts. Please wait a few minutes and try again."));
        }

        return Some(handle_pair(conn, conversation_key, code, broker));
    }

    if utterance == "/unpair" {
        let row = conversation::get(conn, conversation_key).ok().flatten();
        return Some(match row {
            Some(c) if c.pairing_state == PairingState::Paired => {
                conversation::unpair(conn, conversation_key).ok();
                text_reply("Disconnected. Send /pair <CODE> to reconnect.")
            }
            _ => text_reply("This conversation isn't connected."),
        });
    }

    if utterance == "/status" {
        let row = conversation::get(conn, conversation_key).ok().flatten();
        return Some(match row {
            Some(c) if c.pairing_state == PairingState::Paired => {
                text_reply(&format!("Connected since {}.", c.paired_at.unwrap_or_default()))
            }
            _ => text_reply("Not connected. Send /pair <CODE> to connect."),
        });
    }

    if utterance == "/help" {
        return Some(text_reply(
            "Commands: /pair <CODE> to connect, /unpair to disconnect, /status to check connection.",
        ));
    }

    None
}

fn handle_pair(conn: &mut rusqlite::Connection, conversation_key: &str, code: &str, broker: &Broker) -> Json<serde_json::Value> {
    match session::verify_pairing_code(conn, code, conversation_key) {
        Ok(paired) => {
            let kakao_user_id = conversation_key.split_once(':').map(|(_, u)| u).unwrap_or(conversation_key);
            let paired_at = chrono::Utc::now().to_rfc3339();
            let event = BrokerEvent {
                event_type: "pairing_complete",
                data: serde_json::json!({
                    "kakaoUserId": kakao_user_id,
                    "accountId": paired.account_id,
                    "pairedAt": paired_at,
                }),
            };
            broker.publish(&format!("session:{}", paired.session_id), event.clone());
            broker.publish(&paired.account_id, event);
            return text_reply("Connected! You can now chat with your agent.");
        }
        Err(session::PairError::InvalidCode) => {}
        Err(session::PairError::AlreadyPaired) => {
            return text_reply("This conversation is already connected to an agent.");
        }
        Err(session::PairError::Db(e)) => {
            eprintln!("⚠️ handle_pair: session verify failed: {e}");
            return text_reply("Something went wrong. Please try again.");
        }
    }

    match pairing::verify(conn, code, conversation_key) {
        Ok(_account_id) => text_reply("Connected! You can now chat with your agent."),
        Err(pairing::VerifyError::Invalid) => text_reply("That code wasn't recognized."),
        Err(pairing::VerifyError::Expired) => text_reply("That code has expired. Please request a new one."),
        Err(pairing::VerifyError::AlreadyUsed) => text_reply("That code has already been used."),
        Err(pairing::VerifyError::AlreadyPaired) => text_reply("This conversation is already connected to an agent."),
    }
}

fn text_reply(text: &str) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": "2.0",
        "template": { "outputs": [{ "simpleText": { "text": text } }] }
    }))
}
