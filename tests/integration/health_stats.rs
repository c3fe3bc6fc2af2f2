use crate::common::test_client;
use rocket::http::Status;

#[test]
fn health_reports_ok() {
    let client = test_client();
    let res = client.get("/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["status"], "ok");
}

#[test]
fn stats_reflects_account_and_conversation_counts() {
    let client = test_client();

    let before: serde_json::Value = client.get("/v1/stats").dispatch().into_json().unwrap();
    assert_eq!(before["accounts"], 0);
    assert_eq!(before["paired_conversations"], 0);

    crate::common::pair_new_account(&client, "ch1", "u1");

    let after: serde_json::Value = client.get("/v1/stats").dispatch().into_json().unwrap();
    assert_eq!(after["accounts"], 1);
    assert_eq!(after["paired_conversations"], 1);
}

#[test]
fn unknown_route_returns_404() {
    let client = test_client();
    let res = client.get("/nope").dispatch();
    assert_eq!(res.status(), Status::NotFound);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["error"], "Not found");
}
