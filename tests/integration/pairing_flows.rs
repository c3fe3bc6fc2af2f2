use kakao_openclaw_relay::{db::Db, pairing};

use crate::common::{create_bare_account, kakao_webhook_body, send_webhook, test_client};

fn simple_text(reply: &serde_json::Value) -> &str {
    reply["template"]["outputs"][0]["simpleText"]["text"].as_str().unwrap()
}

#[test]
fn portal_pairing_code_pairs_the_conversation_typing_it_in_chat() {
    let client = test_client();
    let account_id = create_bare_account(&client);

    let code = {
        let db = client.rocket().state::<Db>().unwrap();
        let conn = db.conn();
        pairing::generate(&conn, &account_id, 600, None).unwrap().code
    };

    let reply = send_webhook(&client, &kakao_webhook_body("ch1", "u1", &format!("/pair {code}"), None));
    assert!(simple_text(&reply).contains("Connected"));

    let status = send_webhook(&client, &kakao_webhook_body("ch1", "u1", "/status", None));
    assert!(simple_text(&status).contains("Connected since"));
}

#[test]
fn portal_pairing_code_cannot_be_reused() {
    let client = test_client();
    let account_id = create_bare_account(&client);

    let code = {
        let db = client.rocket().state::<Db>().unwrap();
        let conn = db.conn();
        pairing::generate(&conn, &account_id, 600, None).unwrap().code
    };

    send_webhook(&client, &kakao_webhook_body("ch1", "u1", &format!("/pair {code}"), None));
    let second = send_webhook(&client, &kakao_webhook_body("ch2", "u2", &format!("/pair {code}"), None));
    assert!(simple_text(&second).contains("already been used"));
}

#[test]
fn generate_rejects_beyond_max_active_codes_through_the_db_layer() {
    let client = test_client();
    let account_id = create_bare_account(&client);
    let db = client.rocket().state::<Db>().unwrap();
    let conn = db.conn();

    for _ in 0..5 {
        pairing::generate(&conn, &account_id, 600, None).unwrap();
    }
    assert!(matches!(
        pairing::generate(&conn, &account_id, 600, None),
        Err(pairing::GenerateError::TooManyActiveCodes)
    ));
}
