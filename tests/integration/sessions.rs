use rocket::http::Status;

use crate::common::{kakao_webhook_body, send_webhook, test_client};

#[test]
fn create_session_returns_pending_pairing() {
    let client = test_client();
    let res = client.post("/v1/sessions/create").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["status"], "pending_pairing");
    assert!(body["session_token"].as_str().unwrap().starts_with("relay_"));
    assert_eq!(body["pairing_code"].as_str().unwrap().len(), 9);
}

#[test]
fn status_transitions_to_paired_after_chat_command() {
    let client = test_client();
    let created: serde_json::Value = client.post("/v1/sessions/create").dispatch().into_json().unwrap();
    let token = created["session_token"].as_str().unwrap();
    let code = created["pairing_code"].as_str().unwrap();

    let before: serde_json::Value = client
        .get(format!("/v1/sessions/{token}/status"))
        .dispatch()
        .into_json()
        .unwrap();
    assert_eq!(before["status"], "pending_pairing");

    send_webhook(&client, &kakao_webhook_body("ch1", "u1", &format!("/pair {code}"), None));

    let after: serde_json::Value = client
        .get(format!("/v1/sessions/{token}/status"))
        .dispatch()
        .into_json()
        .unwrap();
    assert_eq!(after["status"], "paired");
    assert_eq!(after["kakao_user_id"], "u1");
    assert!(after["account_id"].as_str().is_some());
}

#[test]
fn status_for_unknown_token_is_not_found() {
    let client = test_client();
    let res = client.get("/v1/sessions/relay_deadbeef/status").dispatch();
    assert_eq!(res.status(), Status::NotFound);
}
