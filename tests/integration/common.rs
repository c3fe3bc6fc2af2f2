use kakao_openclaw_relay::config::RelayConfig;
use kakao_openclaw_relay::db::Db;
use kakao_openclaw_relay::{rocket_with_config, rocket_with_db};
use rocket::local::blocking::Client;

/// Wraps a tracked Client and deletes its temp sqlite file (plus WAL/SHM siblings) on drop,
/// so a long test run doesn't leave hundreds of throwaway `.db` files behind.
pub struct TestClient {
    client: Option<Client>,
    db_path: String,
}

impl Drop for TestClient {
    fn drop(&mut self) {
        drop(self.client.take());
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_path));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_path));
    }
}

impl std::ops::Deref for TestClient {
    type Target = Client;
    fn deref(&self) -> &Client {
        self.client.as_ref().unwrap()
    }
}

pub fn test_client() -> TestClient {
    let db_path = format!(
        "/tmp/relay_test_{}.db",
        uuid::Uuid::new_v4().to_string().split('-').next().unwrap()
    );
    let rocket = rocket_with_db(&db_path);
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient {
        client: Some(client),
        db_path,
    }
}

/// Same as `test_client`, but with a webhook signature secret configured, for exercising
/// the `/kakao/webhook` HMAC check.
pub fn test_client_with_signature_secret(secret: &str) -> TestClient {
    let db_path = format!(
        "/tmp/relay_test_{}.db",
        uuid::Uuid::new_v4().to_string().split('-').next().unwrap()
    );
    let mut config = RelayConfig::from_env();
    config.database_path = db_path.clone();
    config.kakao_signature_secret = Some(secret.to_string());
    let rocket = rocket_with_config(config);
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient {
        client: Some(client),
        db_path,
    }
}

/// Creates a paired account end to end: spins up a plugin session, then types its pairing
/// code into KakaoTalk chat as a `/pair` command. Returns (relay bearer token, account_id,
/// conversation_key) — the token is the raw `session_token`, which doubles as the account's
/// bearer token once the session is paired (see `session::verify_pairing_code`).
pub fn pair_new_account(client: &TestClient, channel_id: &str, user_id: &str) -> (String, String, String) {
    let created: serde_json::Value = client
        .post("/v1/sessions/create")
        .dispatch()
        .into_json()
        .expect("sessions/create returns json");
    let session_token = created["session_token"].as_str().unwrap().to_string();
    let pairing_code = created["pairing_code"].as_str().unwrap().to_string();

    let webhook_body = kakao_webhook_body(channel_id, user_id, &format!("/pair {pairing_code}"), None);
    let reply = send_webhook(client, &webhook_body);
    assert!(reply["template"]["outputs"][0]["simpleText"]["text"]
        .as_str()
        .unwrap()
        .contains("Connected"));

    let status: serde_json::Value = client
        .get(format!("/v1/sessions/{session_token}/status"))
        .dispatch()
        .into_json()
        .expect("status returns json");
    let account_id = status["account_id"].as_str().unwrap().to_string();
    let conversation_key = format!("{channel_id}:{user_id}");

    (session_token, account_id, conversation_key)
}

/// Builds a minimal KakaoTalk webhook body JSON for `POST /kakao/webhook`.
pub fn kakao_webhook_body(
    channel_id: &str,
    user_id: &str,
    utterance: &str,
    callback_url: Option<&str>,
) -> serde_json::Value {
    serde_json::json!({
        "userRequest": {
            "user": { "id": user_id, "properties": { "plusfriendUserKey": user_id } },
            "utterance": utterance,
            "callbackUrl": callback_url,
        },
        "bot": { "id": channel_id, "name": "test-bot" }
    })
}

/// Inserts an account row directly, bypassing HTTP — stands in for portal-side account
/// provisioning, which this relay's own surface never exposes (only session pairing does).
pub fn create_bare_account(client: &TestClient) -> String {
    let db = client.rocket().state::<Db>().expect("Db managed");
    let conn = db.conn();
    let account_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let token_hash = format!("test-hash-{account_id}");
    conn.execute(
        "INSERT INTO accounts (id, external_user_id, token_hash, delivery_mode, rate_limit_per_min, disabled_at, created_at, updated_at)
         VALUES (?1, NULL, ?2, 'relay', 60, NULL, ?3, ?3)",
        rusqlite::params![&account_id, &token_hash, &now],
    )
    .expect("insert account");
    account_id
}

pub fn send_webhook(client: &TestClient, body: &serde_json::Value) -> serde_json::Value {
    use rocket::http::ContentType;
    client
        .post("/kakao/webhook")
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch()
        .into_json()
        .expect("kakao/webhook returns json")
}
