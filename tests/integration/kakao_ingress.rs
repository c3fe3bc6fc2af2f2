use crate::common::{kakao_webhook_body, pair_new_account, send_webhook, test_client};

fn simple_text(reply: &serde_json::Value) -> &str {
    reply["template"]["outputs"][0]["simpleText"]["text"].as_str().unwrap()
}

#[test]
fn unpaired_conversation_is_told_to_pair() {
    let client = test_client();
    let body = kakao_webhook_body("ch1", "u1", "hello there", None);
    let reply = send_webhook(&client, &body);
    assert!(simple_text(&reply).contains("/pair"));
}

#[test]
fn pair_with_unknown_code_is_rejected() {
    let client = test_client();
    let body = kakao_webhook_body("ch1", "u1", "/pair ZZZZ-ZZZZ", None);
    let reply = send_webhook(&client, &body);
    assert!(simple_text(&reply).contains("wasn't recognized"));
}

#[test]
fn pair_with_no_code_shows_usage() {
    let client = test_client();
    let body = kakao_webhook_body("ch1", "u1", "/pair", None);
    let reply = send_webhook(&client, &body);
    assert!(simple_text(&reply).contains("Usage"));
}

#[test]
fn paired_conversation_reports_status_and_can_unpair() {
    let client = test_client();
    pair_new_account(&client, "ch1", "u1");

    let status = send_webhook(&client, &kakao_webhook_body("ch1", "u1", "/status", None));
    assert!(simple_text(&status).contains("Connected since"));

    let unpair = send_webhook(&client, &kakao_webhook_body("ch1", "u1", "/unpair", None));
    assert!(simple_text(&unpair).contains("Disconnected"));

    let status_after = send_webhook(&client, &kakao_webhook_body("ch1", "u1", "/status", None));
    assert!(simple_text(&status_after).contains("Not connected"));
}

#[test]
fn help_lists_commands() {
    let client = test_client();
    let reply = send_webhook(&client, &kakao_webhook_body("ch1", "u1", "/help", None));
    assert!(simple_text(&reply).contains("/pair"));
    assert!(simple_text(&reply).contains("/unpair"));
}

#[test]
fn paired_message_is_queued_with_use_callback() {
    let client = test_client();
    pair_new_account(&client, "ch1", "u1");

    let reply = send_webhook(
        &client,
        &kakao_webhook_body("ch1", "u1", "what's the weather", Some("https://bot-pf.kakao.com/cb/abc")),
    );
    assert_eq!(reply["useCallback"], true);

    let stats: serde_json::Value = client.get("/v1/stats").dispatch().into_json().unwrap();
    assert_eq!(stats["queued_inbound"], 1);
}

#[test]
fn pairing_rate_limit_kicks_in_after_repeated_attempts() {
    let client = test_client();
    let body = kakao_webhook_body("ch1", "u1", "/pair ZZZZ-ZZZZ", None);

    // RelayConfig defaults to 3 attempts per window for pairing.
    for _ in 0..3 {
        send_webhook(&client, &body);
    }
    let limited = send_webhook(&client, &body);
    assert!(simple_text(&limited).contains("Too many pairing attempts"));
}
