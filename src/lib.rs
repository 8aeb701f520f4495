pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod p2p;
pub mod policy;
pub mod presence;
pub mod rate_limit;
pub mod registry;
pub mod relay;
pub mod retention;
pub mod routes;
pub mod voice;

use config::AppConfig;
use db::Db;
use events::EventBus;
use p2p::TransferRegistry;
use rate_limit::{RateLimitConfig, RateLimiter};
use registry::ConnectionRegistry;
use rocket_cors::CorsOptions;
use std::sync::Arc;
use voice::CallRegistry;

pub fn rocket() -> rocket::Rocket<rocket::Build> {
    let db_path = config::resolve_database_path();
    rocket_with_db(&db_path)
}

pub fn rocket_with_db_and_config(db_path: &str, rate_config: RateLimitConfig) -> rocket::Rocket<rocket::Build> {
    build_rocket(db_path, rate_config, AppConfig::from_env())
}

pub fn rocket_with_db(db_path: &str) -> rocket::Rocket<rocket::Build> {
    build_rocket(db_path, RateLimitConfig::from_env(), AppConfig::from_env())
}

fn build_rocket(db_path: &str, rate_limit_config: RateLimitConfig, app_config: AppConfig) -> rocket::Rocket<rocket::Build> {
    let db = Db::new(db_path);
    let events = EventBus::new();

    // Background tasks get their own handles. `EventBus` is a cheap clone
    // of the broadcast sender (same channel); the idle sweep opens its own
    // SQLite connection to the same file, following `retention`'s
    // own-connection convention rather than sharing the managed `Db`'s lock.
    let events_for_bg = Arc::new(events.clone());
    auth::spawn_idle_sweep(Arc::new(Db::new(db_path)), events_for_bg.clone(), app_config.clone());
    retention::spawn_blob_gc_task(db_path.to_string());

    let transfers = TransferRegistry::default();
    p2p::spawn_expiry_sweep(
        transfers.clone(),
        events_for_bg,
        app_config.p2p_handshake_timeout_secs,
        app_config.p2p_transfer_timeout_secs,
    );

    let cors = CorsOptions::default()
        .to_cors()
        .expect("failed to build CORS fairing");

    // Encrypted file blobs arrive base64-encoded inside a JSON body; raise
    // the default limit to comfortably cover a 5MB upload (5MB file is
    // ~6.7MB base64 plus envelope overhead).
    let figment = rocket::Config::figment().merge(("limits.json", 10 * 1024 * 1024));

    rocket::custom(figment)
        .manage(db)
        .manage(events)
        .manage(app_config)
        .manage(rate_limit_config)
        .manage(RateLimiter::new())
        .manage(ConnectionRegistry::default())
        .manage(CallRegistry::default())
        .manage(transfers)
        .attach(cors)
        .register(
            "/",
            rocket::catchers![routes::too_many_requests, routes::not_found, routes::unauthorized],
        )
        .mount(
            "/",
            rocket::routes![
                // Session & Token Authority (spec §4.1, §6)
                routes::register,
                routes::login,
                routes::logout,
                routes::logout_all,
                routes::refresh,
                routes::get_public_key,
                // Admin (spec §7, SPEC_FULL.md §10)
                routes::force_logout,
                routes::force_room_leave,
                routes::global_announcement,
                // Realtime Event Dispatcher (spec §4.2, §6)
                routes::stream,
                // Room Policy Engine + Ciphertext Relay, room half (spec §4.3/§4.5)
                routes::create_room,
                routes::join_room,
                routes::leave_room,
                routes::get_rooms,
                routes::get_users_in_room,
                routes::get_room_counts,
                routes::room_history,
                routes::send_room_message,
                routes::update_room_policy,
                routes::invite_to_room,
                routes::list_room_invites,
                routes::accept_room_invite,
                // Ciphertext Relay, DM half (spec §4.3)
                routes::send_dm,
                routes::fetch_offline_pms,
                routes::get_missed_pm_summary,
                // Ciphertext Relay, group half (spec §4.3)
                routes::create_group,
                routes::invite_to_group,
                routes::invite_to_group_pending,
                routes::list_group_invites,
                routes::accept_group_invite,
                routes::send_group_message,
                routes::group_members,
                routes::group_history,
                // Reactions (spec §4.3)
                routes::react_to_message,
                // Friend graph (spec §4.7, §6)
                routes::send_friend_request,
                routes::accept_friend_request,
                routes::reject_friend_request,
                routes::list_friends,
                routes::pending_friend_requests,
                routes::block_user,
                routes::unblock_user,
                // Presence (spec §4.7)
                routes::set_my_presence,
                routes::get_my_presence,
                routes::get_friend_presence,
                // Encrypted file blobs (SPEC_FULL.md §10 supplement)
                routes::upload_file,
                routes::file_meta,
                routes::download_file,
                // WebRTC signaling, DM voice (spec §4.4)
                routes::voice_dm_invite,
                routes::voice_dm_accept,
                routes::voice_dm_decline,
                routes::voice_dm_sdp,
                routes::voice_dm_ice,
                routes::voice_dm_end,
                // WebRTC signaling, room voice roster (spec §4.4)
                routes::voice_room_join,
                routes::voice_room_leave,
                routes::voice_room_signal,
                routes::voice_room_set_cap,
                // WebRTC signaling, P2P file transfer (spec §4.4)
                routes::p2p_offer,
                routes::p2p_answer,
                routes::p2p_decline,
                routes::p2p_ice,
                routes::p2p_mark_active,
                routes::p2p_mark_done,
                routes::p2p_mark_failed,
                // Liveness
                routes::health,
            ],
        )
}
