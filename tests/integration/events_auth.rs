use rocket::http::{Header, Status};

use crate::common::{pair_new_account, test_client};

// The stream itself never terminates (heartbeat loop), so these only check the response
// status/headers and never read the body — matching the teacher's own choice not to drive
// its SSE endpoint over HTTP in tests.

#[test]
fn events_without_bearer_token_is_unauthorized() {
    let client = test_client();
    let res = client.get("/v1/events").dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn events_with_garbage_token_is_unauthorized() {
    let client = test_client();
    let res = client
        .get("/v1/events")
        .header(Header::new("Authorization", "Bearer not-a-real-token"))
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn unauthorized_response_carries_the_relay_error_json_shape() {
    let client = test_client();
    let res = client.get("/v1/events").dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["error"], "SESSION_NOT_PAIRED");
    assert!(body["message"].as_str().is_some());
}

#[test]
fn events_with_paired_account_token_opens_the_stream() {
    let client = test_client();
    let (token, _account_id, _key) = pair_new_account(&client, "ch1", "u1");

    let res = client
        .get("/v1/events")
        .header(Header::new("Authorization", format!("Bearer {token}")))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    assert_eq!(res.content_type(), Some(rocket::http::ContentType::EventStream));
}
