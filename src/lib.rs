pub mod broker;
pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod kakao_client;
pub mod messages;
pub mod models;
pub mod pairing;
pub mod rate_limit;
pub mod reaper;
pub mod routes;
pub mod session;

use std::env;

use broker::Broker;
use config::RelayConfig;
use db::Db;
use kakao_client::KakaoClient;
use rate_limit::RateLimiter;
use rocket_cors::CorsOptions;

pub fn rocket() -> rocket::Rocket<rocket::Build> {
    let config = RelayConfig::from_env();
    rocket_with_config(config)
}

pub fn rocket_with_db(db_path: &str) -> rocket::Rocket<rocket::Build> {
    let mut config = RelayConfig::from_env();
    config.database_path = db_path.to_string();
    rocket_with_config(config)
}

pub fn rocket_with_config(config: RelayConfig) -> rocket::Rocket<rocket::Build> {
    build_rocket(config)
}

fn build_rocket(config: RelayConfig) -> rocket::Rocket<rocket::Build> {
    if let Some(parent) = std::path::Path::new(&config.database_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let db = Db::new(&config.database_path);
    let broker = Broker::new(config.sse_queue_capacity);
    let rate_limiter = RateLimiter::new();
    let kakao_client = KakaoClient::new();
    let reaper_db_path = config.database_path.clone();

    let cors = CorsOptions::default()
        .to_cors()
        .expect("Failed to create CORS");

    let figment = rocket::Config::figment()
        .merge(("port", config.port))
        .merge(("limits.json", 1024 * 1024));

    rocket::custom(figment)
        .manage(db)
        .manage(broker)
        .manage(config)
        .manage(rate_limiter)
        .manage(kakao_client)
        .attach(cors)
        .register(
            "/",
            rocket::catchers![routes::too_many_requests, routes::not_found, routes::unauthorized],
        )
        .mount(
            "/",
            rocket::routes![
                routes::health,
                routes::stats,
                routes::kakao_webhook,
                routes::create_session,
                routes::session_status,
                routes::agent_events,
                routes::agent_reply,
            ],
        )
        .attach(rocket::fairing::AdHoc::on_liftoff("Reaper", |_rocket| {
            Box::pin(async move {
                reaper::spawn_reaper(reaper_db_path);
                println!("🧹 Reaper started");
            })
        }))
}

/// Exposed for tests and operators who want the raw env-var lookup without booting Rocket.
pub fn database_path_from_env() -> String {
    env::var("DATABASE_PATH").unwrap_or_else(|_| "data/relay.db".to_string())
}

/// Gate for the handful of call sites that log per-request detail rather than a warning —
/// `println!`/`eprintln!` on the hot path stay terse unless an operator opts in.
pub fn debug_logging_enabled() -> bool {
    env::var("LOG_LEVEL").map(|v| v.eq_ignore_ascii_case("debug")).unwrap_or(false)
}
