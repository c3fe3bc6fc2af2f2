use hmac::{Hmac, Mac};
use rocket::http::{ContentType, Status};
use sha2::Sha256;

use crate::common::{kakao_webhook_body, test_client_with_signature_secret};

type HmacSha256 = Hmac<Sha256>;

fn sign(secret: &str, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body.as_bytes());
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

#[test]
fn valid_signature_is_accepted() {
    let client = test_client_with_signature_secret("shh-its-a-secret");
    let body = kakao_webhook_body("ch1", "u1", "hello there", None).to_string();
    let signature = sign("shh-its-a-secret", &body);

    let res = client
        .post("/kakao/webhook")
        .header(ContentType::JSON)
        .header(rocket::http::Header::new("X-Kakao-Signature", signature))
        .body(&body)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn missing_signature_is_rejected_when_secret_is_configured() {
    let client = test_client_with_signature_secret("shh-its-a-secret");
    let body = kakao_webhook_body("ch1", "u1", "hello there", None).to_string();

    let res = client.post("/kakao/webhook").header(ContentType::JSON).body(&body).dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn wrong_signature_is_rejected() {
    let client = test_client_with_signature_secret("shh-its-a-secret");
    let body = kakao_webhook_body("ch1", "u1", "hello there", None).to_string();
    let signature = sign("wrong-secret", &body);

    let res = client
        .post("/kakao/webhook")
        .header(ContentType::JSON)
        .header(rocket::http::Header::new("X-Kakao-Signature", signature))
        .body(&body)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn no_secret_configured_skips_verification_entirely() {
    let client = crate::common::test_client();
    let body = kakao_webhook_body("ch1", "u1", "hello there", None).to_string();

    let res = client.post("/kakao/webhook").header(ContentType::JSON).body(&body).dispatch();
    assert_eq!(res.status(), Status::Ok);
}
