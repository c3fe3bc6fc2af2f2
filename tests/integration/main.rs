// Integration test suite for the KakaoTalk <-> OpenClaw relay.
//
// Organized into focused modules by feature area, mirroring the shape of the
// relay's own component design. All modules share common::TestClient for DB
// lifecycle management.

mod common;

mod events_auth;
mod health_stats;
mod kakao_ingress;
mod pairing_flows;
mod reply_dispatch;
mod sessions;
mod signature_verification;
