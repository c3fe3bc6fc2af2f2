use kakao_openclaw_relay::{db::Db, messages};
use rocket::http::{ContentType, Header, Status};

use crate::common::{kakao_webhook_body, pair_new_account, send_webhook, test_client};

fn queued_message_id(client: &crate::common::TestClient, account_id: &str) -> String {
    let db = client.rocket().state::<Db>().unwrap();
    let conn = db.conn();
    messages::find_queued_by_account_id(&conn, account_id)
        .unwrap()
        .into_iter()
        .next()
        .expect("a queued message exists")
        .id
}

fn reply_request<'c>(
    client: &'c crate::common::TestClient,
    token: &str,
    message_id: &str,
    response: serde_json::Value,
) -> rocket::local::blocking::LocalResponse<'c> {
    client
        .post("/openclaw/reply")
        .header(ContentType::JSON)
        .header(Header::new("Authorization", format!("Bearer {token}")))
        .body(serde_json::json!({"message_id": message_id, "response": response}).to_string())
        .dispatch()
}

#[test]
fn reply_to_unknown_message_is_not_found() {
    let client = test_client();
    let (token, _account_id, _key) = pair_new_account(&client, "ch1", "u1");

    let res = reply_request(&client, &token, "does-not-exist", serde_json::json!({}));
    assert_eq!(res.status(), Status::NotFound);
}

#[test]
fn reply_without_auth_is_unauthorized() {
    let client = test_client();
    let res = client
        .post("/openclaw/reply")
        .header(ContentType::JSON)
        .body(r#"{"message_id": "x", "response": {}}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn reply_without_callback_url_is_callback_expired() {
    let client = test_client();
    let (token, account_id, _key) = pair_new_account(&client, "ch1", "u1");

    send_webhook(&client, &kakao_webhook_body("ch1", "u1", "hi", None));
    let message_id = queued_message_id(&client, &account_id);

    let res = reply_request(&client, &token, &message_id, serde_json::json!({"text": "hello"}));
    assert_eq!(res.status(), Status::BadRequest);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["error"], "CALLBACK_EXPIRED");
}

#[test]
fn reply_to_disallowed_callback_host_is_callback_failed() {
    let client = test_client();
    let (token, account_id, _key) = pair_new_account(&client, "ch1", "u1");

    send_webhook(
        &client,
        &kakao_webhook_body("ch1", "u1", "hi", Some("https://not-kakao.example.com/cb")),
    );
    let message_id = queued_message_id(&client, &account_id);

    let res = reply_request(&client, &token, &message_id, serde_json::json!({"text": "hello"}));
    assert_eq!(res.status(), Status::BadGateway);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["error"], "CALLBACK_FAILED");

    let stats: serde_json::Value = client.get("/v1/stats").dispatch().into_json().unwrap();
    assert_eq!(stats["outbound_failed_24h"], 1);
}

#[test]
fn reply_cannot_be_claimed_by_a_different_account() {
    let client = test_client();
    let (_token_a, account_a, _key_a) = pair_new_account(&client, "ch1", "u1");
    let (token_b, _account_b, _key_b) = pair_new_account(&client, "ch2", "u2");

    send_webhook(
        &client,
        &kakao_webhook_body("ch1", "u1", "hi", Some("https://bot-pf.kakao.com/cb/abc")),
    );
    let message_id = queued_message_id(&client, &account_a);

    let res = reply_request(&client, &token_b, &message_id, serde_json::json!({}));
    assert_eq!(res.status(), Status::NotFound);
}
