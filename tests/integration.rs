//! End-to-end tests over the HTTP surface, one `Client` (and backing
//! SQLite file) per test so they can run in parallel without contention.
//! `common` holds the register/login/bearer-header plumbing shared across
//! every section below.

mod common;

use common::*;
use echochat_core::registry::ConnectionRegistry;
use rocket::http::{ContentType, Header, Status};
use serde_json::json;

// --- Liveness ---

#[test]
fn test_health() {
    let client = test_client();
    let res = client.get("/api/v1/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
}

// --- Session & Token Authority (spec §4.1) ---

#[test]
fn test_register_and_login() {
    let client = test_client();
    let tokens = register_and_login(&client, "alice");
    assert!(!tokens.access.is_empty());
    assert!(!tokens.refresh.is_empty());
}

#[test]
fn test_register_duplicate_username_conflicts() {
    let client = test_client();
    assert_eq!(register(&client, "alice", "correct horse battery staple"), Status::Ok);
    assert_eq!(register(&client, "alice", "another password entirely"), Status::Conflict);
}

#[test]
fn test_login_bad_password_is_unauthorized() {
    let client = test_client();
    register(&client, "alice", "correct horse battery staple");
    let res = client
        .post("/login")
        .header(ContentType::JSON)
        .body(json!({"username": "alice", "password": "wrong password"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn test_login_unknown_user_indistinguishable_from_bad_password() {
    // Credential failure and "user does not exist" must not be
    // distinguishable from the outside.
    let client = test_client();
    register(&client, "alice", "correct horse battery staple");
    let known_wrong = client
        .post("/login")
        .header(ContentType::JSON)
        .body(json!({"username": "alice", "password": "wrong password"}).to_string())
        .dispatch();
    let unknown = client
        .post("/login")
        .header(ContentType::JSON)
        .body(json!({"username": "nobody", "password": "wrong password"}).to_string())
        .dispatch();
    assert_eq!(known_wrong.status(), unknown.status());
    let known_body: serde_json::Value = known_wrong.into_json().unwrap();
    let unknown_body: serde_json::Value = unknown.into_json().unwrap();
    assert_eq!(known_body["kind"], unknown_body["kind"]);
}

#[test]
fn test_lockout_after_repeated_bad_logins() {
    // After LockoutAttempts consecutive bad logins, the next attempt
    // returns LoginLocked even with the right password.
    let client = test_client();
    register(&client, "alice", "correct horse battery staple");
    for _ in 0..5 {
        let res = client
            .post("/login")
            .header(ContentType::JSON)
            .body(json!({"username": "alice", "password": "wrong"}).to_string())
            .dispatch();
        assert_eq!(res.status(), Status::Unauthorized);
    }
    let res = client
        .post("/login")
        .header(ContentType::JSON)
        .body(json!({"username": "alice", "password": "correct horse battery staple"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["kind"], "LoginLocked");
}

#[test]
fn test_refresh_rotation_single_use() {
    // A refresh jti may be used exactly once; the second attempt with the
    // same token fails closed.
    let client = test_client();
    let tokens = register_and_login(&client, "alice");

    let res = client
        .post("/token/refresh")
        .header(ContentType::JSON)
        .body(json!({"refresh_token": tokens.refresh}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    let new_access = body["access_token"].as_str().unwrap().to_string();
    let new_refresh = body["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(new_access, tokens.access);
    assert_ne!(new_refresh, tokens.refresh);

    let replay = client
        .post("/token/refresh")
        .header(ContentType::JSON)
        .body(json!({"refresh_token": tokens.refresh}).to_string())
        .dispatch();
    assert_eq!(replay.status(), Status::Unauthorized);

    let res2 = client
        .post("/token/refresh")
        .header(ContentType::JSON)
        .body(json!({"refresh_token": new_refresh}).to_string())
        .dispatch();
    assert_eq!(res2.status(), Status::Ok);
}

#[test]
fn test_logout_revokes_session_immediately() {
    let client = test_client();
    let tokens = register_and_login(&client, "alice");

    let res = client.post("/logout").header(bearer(&tokens.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get("/api/v1/friends").header(bearer(&tokens.access)).dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn test_logout_all_revokes_every_session() {
    let client = test_client();
    register(&client, "alice", "correct horse battery staple");
    let first = login(&client, "alice", "correct horse battery staple");
    let second = login(&client, "alice", "correct horse battery staple");

    let res = client.post("/logout/all").header(bearer(&first.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);

    assert_eq!(
        client.get("/api/v1/friends").header(bearer(&first.access)).dispatch().status(),
        Status::Unauthorized
    );
    assert_eq!(
        client.get("/api/v1/friends").header(bearer(&second.access)).dispatch().status(),
        Status::Unauthorized
    );
}

#[test]
fn test_get_public_key() {
    let client = test_client();
    register_and_login(&client, "alice");
    let res = client.get("/get_public_key?username=alice").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["public_key"], "pub-alice");
}

#[test]
fn test_protected_route_requires_bearer() {
    let client = test_client();
    let res = client.get("/api/v1/friends").dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

// --- Room Policy Engine + Ciphertext Relay, room half (spec §4.3/§4.5) ---

#[test]
fn test_create_and_join_room() {
    let client = test_client();
    let tokens = register_and_login(&client, "alice");
    let room = create_room(&client, &tokens.access, "lobby");
    assert_eq!(room["name"], "lobby");

    let bob = register_and_login(&client, "bob");
    let res = client.post("/api/v1/rooms/lobby/join").header(bearer(&bob.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["room"], "lobby");
    assert_eq!(body["history"].as_array().unwrap().len(), 0);
}

#[test]
fn test_send_room_message_and_read_history() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    create_room(&client, &alice.access, "lobby");

    let res = client
        .post("/api/v1/rooms/lobby/messages")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"room": "lobby", "message": "hello room"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let msg: serde_json::Value = res.into_json().unwrap();
    assert_eq!(msg["message"], "hello room");

    let res = client.get("/api/v1/rooms/lobby/history").header(bearer(&alice.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let page: serde_json::Value = res.into_json().unwrap();
    let messages = page["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["message"], "hello room");
}

#[test]
fn test_room_cipher_uses_placeholder_in_message_field() {
    // When `cipher` carries the payload, `message` is a fixed placeholder
    // rather than the real (or blank) text — the server never inspects
    // ciphertext.
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    create_room(&client, &alice.access, "lobby");

    let res = client
        .post("/api/v1/rooms/lobby/messages")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"room": "lobby", "cipher": "ECR1:opaque-blob"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let msg: serde_json::Value = res.into_json().unwrap();
    assert_eq!(msg["cipher"], "ECR1:opaque-blob");
    assert_eq!(msg["message"], "[encrypted message]");
}

#[test]
fn test_room_send_rejects_both_message_and_cipher() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    create_room(&client, &alice.access, "lobby");

    let res = client
        .post("/api/v1/rooms/lobby/messages")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"room": "lobby", "message": "hi", "cipher": "EC1:x"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn test_non_member_cannot_send_to_room() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    create_room(&client, &alice.access, "lobby");
    let bob = register_and_login(&client, "bob");

    let res = client
        .post("/api/v1/rooms/lobby/messages")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"room": "lobby", "message": "hi"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["kind"], "NotInRoom");
}

#[test]
fn test_readonly_room_blocks_non_admin() {
    // Admin sets readonly=true; a non-admin send returns ReadOnly.
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    create_room(&client, &alice.access, "news");
    let bob = register_and_login(&client, "bob");
    client.post("/api/v1/rooms/news/join").header(bearer(&bob.access)).dispatch();

    let res = client
        .put("/api/v1/rooms/news/policy")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"readonly": true, "set_by": "alice"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post("/api/v1/rooms/news/messages")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"room": "news", "message": "hi"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["kind"], "ReadOnly");
}

#[test]
fn test_locked_room_blocks_non_override_member() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    create_room(&client, &alice.access, "lobby");
    let bob = register_and_login(&client, "bob");
    client.post("/api/v1/rooms/lobby/join").header(bearer(&bob.access)).dispatch();

    client
        .put("/api/v1/rooms/lobby/policy")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"locked": true, "set_by": "alice"}).to_string())
        .dispatch();

    let res = client
        .post("/api/v1/rooms/lobby/messages")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"room": "lobby", "message": "hi"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
    assert_eq!(res.into_json::<serde_json::Value>().unwrap()["kind"], "Locked");

    // The owner is exempt via role override and can still post.
    let res = client
        .post("/api/v1/rooms/lobby/messages")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"room": "lobby", "message": "still here"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn test_slowmode_blocks_rapid_resend() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    create_room(&client, &alice.access, "lobby");
    let bob = register_and_login(&client, "bob");
    client.post("/api/v1/rooms/lobby/join").header(bearer(&bob.access)).dispatch();

    client
        .put("/api/v1/rooms/lobby/policy")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"slowmode_seconds": 30, "set_by": "alice"}).to_string())
        .dispatch();

    let first = client
        .post("/api/v1/rooms/lobby/messages")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"room": "lobby", "message": "one"}).to_string())
        .dispatch();
    assert_eq!(first.status(), Status::Ok);

    let second = client
        .post("/api/v1/rooms/lobby/messages")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"room": "lobby", "message": "two"}).to_string())
        .dispatch();
    assert_eq!(second.status(), Status::Forbidden);
    assert_eq!(second.into_json::<serde_json::Value>().unwrap()["kind"], "SlowMode");
}

#[test]
fn test_room_history_pagination_is_newest_first_and_strictly_older() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    create_room(&client, &alice.access, "lobby");

    let mut ids = Vec::new();
    for i in 0..5 {
        let res = client
            .post("/api/v1/rooms/lobby/messages")
            .header(ContentType::JSON)
            .header(bearer(&alice.access))
            .body(json!({"room": "lobby", "message": format!("msg-{i}")}).to_string())
            .dispatch();
        let msg: serde_json::Value = res.into_json().unwrap();
        ids.push(msg["id"].as_str().unwrap().to_string());
    }

    // Anchoring on the last message (msg-4) and paging strictly older,
    // newest-first within the page: msg-3 then msg-2.
    let res = client
        .get(format!("/api/v1/rooms/lobby/history?before_id={}&limit=2", ids[4]))
        .header(bearer(&alice.access))
        .dispatch();
    let page: serde_json::Value = res.into_json().unwrap();
    let messages = page["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["message"], "msg-3");
    assert_eq!(messages[1]["message"], "msg-2");
}

#[test]
fn test_room_autoscaling_sub_room_on_capacity() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let body = json!({"name": "packed", "capacity": 1});
    let res = client
        .post("/api/v1/rooms")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    // alice (the creator) already occupies the one slot.

    let bob = register_and_login(&client, "bob");
    let res = client.post("/api/v1/rooms/packed/join").header(bearer(&bob.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let joined: serde_json::Value = res.into_json().unwrap();
    assert_eq!(joined["room"], "packed(2)");
}

#[test]
fn test_room_invite_and_accept() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    create_room(&client, &alice.access, "lobby");
    let bob = register_and_login(&client, "bob");

    let res = client
        .post("/api/v1/rooms/invite")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"room": "lobby", "invitee": "bob"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get("/api/v1/rooms/invites").header(bearer(&bob.access)).dispatch();
    let invites: serde_json::Value = res.into_json().unwrap();
    let invite_id = invites[0]["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("/api/v1/rooms/invites/{invite_id}/accept"))
        .header(bearer(&bob.access))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    // Bob is now a member and can post without a separate join call.
    let res = client
        .post("/api/v1/rooms/lobby/messages")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"room": "lobby", "message": "thanks for the invite"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

// --- Reactions (spec §4.3/§4.4) ---

#[test]
fn test_reaction_finality() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    create_room(&client, &alice.access, "lobby");
    let carol = register_and_login(&client, "carol");
    client.post("/api/v1/rooms/lobby/join").header(bearer(&carol.access)).dispatch();

    let res = client
        .post("/api/v1/rooms/lobby/messages")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"room": "lobby", "message": "hi"}).to_string())
        .dispatch();
    let msg: serde_json::Value = res.into_json().unwrap();
    let message_id = msg["id"].as_str().unwrap().to_string();

    let res = client
        .post("/api/v1/reactions")
        .header(ContentType::JSON)
        .header(bearer(&carol.access))
        .body(json!({"room": "lobby", "message_id": message_id, "emoji": "👍"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let reactions: serde_json::Value = res.into_json().unwrap();
    assert_eq!(reactions["counts"]["👍"], 1);

    let res = client
        .post("/api/v1/reactions")
        .header(ContentType::JSON)
        .header(bearer(&carol.access))
        .body(json!({"room": "lobby", "message_id": message_id, "emoji": "❤️"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Conflict);
    assert_eq!(res.into_json::<serde_json::Value>().unwrap()["kind"], "ReactionFinal");
}

#[test]
fn test_reaction_rejects_disallowed_emoji() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    create_room(&client, &alice.access, "lobby");
    let res = client
        .post("/api/v1/rooms/lobby/messages")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"room": "lobby", "message": "hi"}).to_string())
        .dispatch();
    let msg: serde_json::Value = res.into_json().unwrap();

    let res = client
        .post("/api/v1/reactions")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"room": "lobby", "message_id": msg["id"], "emoji": "🦀"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

// --- Ciphertext Relay, DM half (spec §4.3) ---

#[test]
fn test_dm_offline_spool_and_summary_drain_exactly_once() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");

    // Bob is offline (no registered connection): the DM lands in the spool.
    let res = client
        .post("/api/v1/dm")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"to": "bob", "cipher": "EC1:opaque-envelope"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get("/api/v1/dm/missed_summary").header(bearer(&bob.access)).dispatch();
    let summary: serde_json::Value = res.into_json().unwrap();
    assert_eq!(summary, json!([{"sender": "alice", "count": 1}]));

    let res = client
        .get("/api/v1/dm/offline?from_user=alice&peek=false")
        .header(bearer(&bob.access))
        .dispatch();
    let messages: serde_json::Value = res.into_json().unwrap();
    assert_eq!(messages.as_array().unwrap().len(), 1);
    assert_eq!(messages[0]["cipher"], "EC1:opaque-envelope");

    // Drained exactly once: a repeat fetch returns nothing, and the
    // summary no longer lists alice.
    let res = client
        .get("/api/v1/dm/offline?from_user=alice&peek=false")
        .header(bearer(&bob.access))
        .dispatch();
    let messages: serde_json::Value = res.into_json().unwrap();
    assert_eq!(messages.as_array().unwrap().len(), 0);

    let res = client.get("/api/v1/dm/missed_summary").header(bearer(&bob.access)).dispatch();
    let summary: serde_json::Value = res.into_json().unwrap();
    assert_eq!(summary.as_array().unwrap().len(), 0);
}

#[test]
fn test_dm_peek_does_not_drain() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");

    client
        .post("/api/v1/dm")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"to": "bob", "cipher": "EC1:x"}).to_string())
        .dispatch();

    let res = client.get("/api/v1/dm/offline?from_user=alice&peek=true").header(bearer(&bob.access)).dispatch();
    assert_eq!(res.into_json::<serde_json::Value>().unwrap().as_array().unwrap().len(), 1);

    // Still there, since peek never drains.
    let res = client.get("/api/v1/dm/offline?from_user=alice&peek=true").header(bearer(&bob.access)).dispatch();
    assert_eq!(res.into_json::<serde_json::Value>().unwrap().as_array().unwrap().len(), 1);
}

#[test]
fn test_dm_delivered_live_when_recipient_connected() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");

    // Simulate Bob holding a live connection without driving the SSE stream
    // itself — the registry is the single source of truth the DM relay
    // consults to decide online-push vs. offline-spool.
    client.rocket().state::<ConnectionRegistry>().unwrap().register("bob-conn-1", "bob");

    let res = client
        .post("/api/v1/dm")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"to": "bob", "cipher": "EC1:live"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    // Nothing spooled: the message was delivered live, not queued offline.
    let res = client.get("/api/v1/dm/missed_summary").header(bearer(&bob.access)).dispatch();
    assert_eq!(res.into_json::<serde_json::Value>().unwrap().as_array().unwrap().len(), 0);
}

#[test]
fn test_dm_to_unknown_user_not_found() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let res = client
        .post("/api/v1/dm")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"to": "nobody", "cipher": "EC1:x"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::NotFound);
}

#[test]
fn test_blocked_user_cannot_dm() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");

    let res = client.post("/api/v1/blocks/alice").header(bearer(&bob.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post("/api/v1/dm")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"to": "bob", "cipher": "EC1:x"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}

// --- Friend graph (SPEC_FULL.md supplement) ---

#[test]
fn test_friend_request_accept_and_list() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");

    let res = client.post("/api/v1/friends/requests/bob").header(bearer(&alice.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get("/api/v1/friends/requests/pending").header(bearer(&bob.access)).dispatch();
    let pending: serde_json::Value = res.into_json().unwrap();
    assert_eq!(pending, json!(["alice"]));

    let res = client.post("/api/v1/friends/requests/alice/accept").header(bearer(&bob.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get("/api/v1/friends").header(bearer(&alice.access)).dispatch();
    assert_eq!(res.into_json::<serde_json::Value>().unwrap(), json!(["bob"]));
    let res = client.get("/api/v1/friends").header(bearer(&bob.access)).dispatch();
    assert_eq!(res.into_json::<serde_json::Value>().unwrap(), json!(["alice"]));
}

#[test]
fn test_friend_request_reject() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");

    client.post("/api/v1/friends/requests/bob").header(bearer(&alice.access)).dispatch();
    let res = client.post("/api/v1/friends/requests/alice/reject").header(bearer(&bob.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get("/api/v1/friends").header(bearer(&alice.access)).dispatch();
    assert_eq!(res.into_json::<serde_json::Value>().unwrap().as_array().unwrap().len(), 0);
}

#[test]
fn test_blocked_user_cannot_send_friend_request() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");
    client.post("/api/v1/blocks/alice").header(bearer(&bob.access)).dispatch();

    let res = client.post("/api/v1/friends/requests/bob").header(bearer(&alice.access)).dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}

#[test]
fn test_unblock_restores_ability_to_dm() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");
    client.post("/api/v1/blocks/alice").header(bearer(&bob.access)).dispatch();
    client.post("/api/v1/blocks/alice/remove").header(bearer(&bob.access)).dispatch();

    let res = client
        .post("/api/v1/dm")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"to": "bob", "cipher": "EC1:x"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

// --- Presence Fan-out (spec §4.9) ---

#[test]
fn test_set_and_get_my_presence() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let res = client
        .post("/api/v1/presence")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"online": true, "state": "busy", "custom_status": "in a meeting"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get("/api/v1/presence/me").header(bearer(&alice.access)).dispatch();
    let snap: serde_json::Value = res.into_json().unwrap();
    assert_eq!(snap["presence"], "busy");
    assert_eq!(snap["custom_status"], "in a meeting");
}

#[test]
fn test_invisible_presence_observed_as_offline_by_friend() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");
    client.post("/api/v1/friends/requests/bob").header(bearer(&alice.access)).dispatch();
    client.post("/api/v1/friends/requests/alice/accept").header(bearer(&bob.access)).dispatch();

    client.rocket().state::<ConnectionRegistry>().unwrap().register("alice-conn-1", "alice");
    client
        .post("/api/v1/presence")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"online": true, "state": "invisible"}).to_string())
        .dispatch();

    let res = client.get("/api/v1/presence/alice").header(bearer(&bob.access)).dispatch();
    let snap: serde_json::Value = res.into_json().unwrap();
    assert_eq!(snap["presence"], "offline");
}

#[test]
fn test_non_friend_presence_lookup_forbidden() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");
    client
        .post("/api/v1/presence")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"online": true}).to_string())
        .dispatch();

    let res = client.get("/api/v1/presence/alice").header(bearer(&bob.access)).dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}

// --- Groups (spec §6 group surface) ---

#[test]
fn test_group_create_invite_message_history() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");

    let res = client
        .post("/api/v1/groups")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"name": "friends"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let group: serde_json::Value = res.into_json().unwrap();
    let group_id = group["id"].as_i64().unwrap();

    let res = client
        .post(format!("/api/v1/groups/{group_id}/invite/bob"))
        .header(bearer(&alice.access))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post(format!("/api/v1/groups/{group_id}/messages"))
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"group_id": group_id, "message": "hi all"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get(format!("/api/v1/groups/{group_id}/members")).header(bearer(&alice.access)).dispatch();
    let members: serde_json::Value = res.into_json().unwrap();
    let members = members.as_array().unwrap();
    assert!(members.iter().any(|m| m == "alice"));
    assert!(members.iter().any(|m| m == "bob"));

    let res = client.get(format!("/api/v1/groups/{group_id}/history")).header(bearer(&alice.access)).dispatch();
    let page: serde_json::Value = res.into_json().unwrap();
    assert_eq!(page["messages"].as_array().unwrap().len(), 1);
}

#[test]
fn test_group_pending_invite_accept_flow() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let carol = register_and_login(&client, "carol");
    let res = client
        .post("/api/v1/groups")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"name": "project"}).to_string())
        .dispatch();
    let group: serde_json::Value = res.into_json().unwrap();
    let group_id = group["id"].as_i64().unwrap();

    let res = client
        .post("/api/v1/groups/invite")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"group_id": group_id, "invitee": "carol"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get("/api/v1/groups/invites").header(bearer(&carol.access)).dispatch();
    let invites: serde_json::Value = res.into_json().unwrap();
    let invite_id = invites[0]["id"].as_str().unwrap().to_string();

    let res = client.post(format!("/api/v1/groups/invites/{invite_id}/accept")).header(bearer(&carol.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get(format!("/api/v1/groups/{group_id}/members")).header(bearer(&carol.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn test_non_member_cannot_read_group_history() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let eve = register_and_login(&client, "eve");
    let res = client
        .post("/api/v1/groups")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"name": "private-group"}).to_string())
        .dispatch();
    let group: serde_json::Value = res.into_json().unwrap();
    let group_id = group["id"].as_i64().unwrap();

    let res = client.get(format!("/api/v1/groups/{group_id}/history")).header(bearer(&eve.access)).dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}

// --- WebRTC Signaling Relay: DM voice call state machine (spec §4.4) ---

#[test]
fn test_voice_dm_call_full_lifecycle() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");
    client.rocket().state::<ConnectionRegistry>().unwrap().register("bob-conn", "bob");

    let res = client
        .post("/api/v1/voice/dm/invite")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"to": "bob"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let call: serde_json::Value = res.into_json().unwrap();
    assert_eq!(call["state"], "ringing");
    let call_id = call["call_id"].as_str().unwrap().to_string();

    let res = client
        .post("/api/v1/voice/dm/accept")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"call_id": call_id}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    assert_eq!(res.into_json::<serde_json::Value>().unwrap()["state"], "accepted");

    let res = client
        .post("/api/v1/voice/dm/sdp?kind=offer")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"call_id": call_id, "sdp": {"type": "offer", "sdp": "v=0"}}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post("/api/v1/voice/dm/sdp?kind=answer")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"call_id": call_id, "sdp": {"type": "answer", "sdp": "v=0"}}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post("/api/v1/voice/dm/ice")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"call_id": call_id, "candidate": {"candidate": "..."}}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post("/api/v1/voice/dm/end")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"call_id": call_id}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn test_voice_dm_decline_ends_call() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");
    client.rocket().state::<ConnectionRegistry>().unwrap().register("bob-conn", "bob");

    let res = client
        .post("/api/v1/voice/dm/invite")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"to": "bob"}).to_string())
        .dispatch();
    let call: serde_json::Value = res.into_json().unwrap();
    let call_id = call["call_id"].as_str().unwrap().to_string();

    let res = client
        .post("/api/v1/voice/dm/decline")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"call_id": call_id}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    // The call no longer exists; a second accept after decline is rejected.
    let res = client
        .post("/api/v1/voice/dm/accept")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"call_id": call_id}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::NotFound);
}

#[test]
fn test_voice_dm_invalid_transition_is_call_state_error() {
    // Accepting an already-Accepted call is not a valid transition.
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");
    client.rocket().state::<ConnectionRegistry>().unwrap().register("bob-conn", "bob");

    let res = client
        .post("/api/v1/voice/dm/invite")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"to": "bob"}).to_string())
        .dispatch();
    let call_id = res.into_json::<serde_json::Value>().unwrap()["call_id"].as_str().unwrap().to_string();

    client
        .post("/api/v1/voice/dm/accept")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"call_id": call_id}).to_string())
        .dispatch();

    let res = client
        .post("/api/v1/voice/dm/accept")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"call_id": call_id}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Conflict);
    assert_eq!(res.into_json::<serde_json::Value>().unwrap()["kind"], "CallStateError");
}

#[test]
fn test_voice_dm_invite_requires_callee_online() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    register_and_login(&client, "bob"); // never registers a connection

    let res = client
        .post("/api/v1/voice/dm/invite")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"to": "bob"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::NotFound);
}

// --- WebRTC Signaling Relay: room voice roster (spec §4.4) ---

#[test]
fn test_voice_room_cap_enforcement_and_forced_reduction() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    create_room(&client, &alice.access, "music");
    let bob = register_and_login(&client, "bob");
    let carol = register_and_login(&client, "carol");

    let registry = client.rocket().state::<ConnectionRegistry>().unwrap();
    registry.register("alice-conn", "alice");
    registry.register("bob-conn", "bob");
    registry.register("carol-conn", "carol");

    let res = client
        .put("/api/v1/voice/room/music/cap")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"cap": 2}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let join = |conn_id: &str, token: &str| {
        client
            .post("/api/v1/voice/room/join")
            .header(ContentType::JSON)
            .header(bearer(token))
            .header(Header::new("X-Connection-Id", conn_id.to_string()))
            .body(json!({"room": "music"}).to_string())
            .dispatch()
            .status()
    };
    assert_eq!(join("alice-conn", &alice.access), Status::Ok);
    assert_eq!(join("bob-conn", &bob.access), Status::Ok);
    let third = join("carol-conn", &carol.access);
    assert_eq!(third, Status::Conflict);

    // Lowering the cap to 1 forces out exactly one of the two seated
    // members (uniformly at random — we only assert the invariant holds).
    let res = client
        .put("/api/v1/voice/room/music/cap")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"cap": 1}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let roster: serde_json::Value = res.into_json().unwrap();
    assert_eq!(roster["users"].as_array().unwrap().len(), 1);
}

#[test]
fn test_voice_room_non_owner_cannot_set_cap() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    create_room(&client, &alice.access, "music");
    let bob = register_and_login(&client, "bob");
    client.post("/api/v1/rooms/music/join").header(bearer(&bob.access)).dispatch();

    let res = client
        .put("/api/v1/voice/room/music/cap")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"cap": 1}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}

#[test]
fn test_voice_room_initiator_tiebreaker() {
    // Only the lexicographically smaller username may send an `offer`.
    let client = test_client();
    let alice = register_and_login(&client, "alice"); // "alice" < "bob"
    create_room(&client, &alice.access, "music");
    let bob = register_and_login(&client, "bob");
    client.post("/api/v1/rooms/music/join").header(bearer(&bob.access)).dispatch();

    let registry = client.rocket().state::<ConnectionRegistry>().unwrap();
    registry.register("alice-conn", "alice");
    registry.register("bob-conn", "bob");
    client
        .post("/api/v1/voice/room/join")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .header(Header::new("X-Connection-Id", "alice-conn"))
        .body(json!({"room": "music"}).to_string())
        .dispatch();
    client
        .post("/api/v1/voice/room/join")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .header(Header::new("X-Connection-Id", "bob-conn"))
        .body(json!({"room": "music"}).to_string())
        .dispatch();

    let alice_offers = client
        .post("/api/v1/voice/room/signal?kind=offer")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"room": "music", "to": "bob", "payload": {"sdp": "v=0"}}).to_string())
        .dispatch();
    assert_eq!(alice_offers.status(), Status::Ok);

    let bob_offers = client
        .post("/api/v1/voice/room/signal?kind=offer")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"room": "music", "to": "alice", "payload": {"sdp": "v=0"}}).to_string())
        .dispatch();
    assert_eq!(bob_offers.status(), Status::Conflict);
}

// --- WebRTC Signaling Relay: P2P file transfer (spec §4.4) ---

#[test]
fn test_p2p_decline_blocks_subsequent_ice() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");
    client.rocket().state::<ConnectionRegistry>().unwrap().register("bob-conn", "bob");

    let res = client
        .post("/api/v1/p2p/offer")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"transfer_id": "t1", "to": "bob", "meta": {"name": "photo.png", "size": 1024}}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post("/api/v1/p2p/decline")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"transfer_id": "t1"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    // Dropped: the transfer no longer exists for either side.
    let res = client
        .post("/api/v1/p2p/ice")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"transfer_id": "t1", "candidate": {"candidate": "..."}}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::NotFound);
}

#[test]
fn test_p2p_full_transfer_lifecycle() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");
    client.rocket().state::<ConnectionRegistry>().unwrap().register("bob-conn", "bob");

    client
        .post("/api/v1/p2p/offer")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"transfer_id": "t2", "to": "bob", "meta": {"name": "a.bin"}}).to_string())
        .dispatch();

    let res = client
        .post("/api/v1/p2p/answer")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"transfer_id": "t2", "sdp": {"type": "answer"}}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.post("/api/v1/p2p/t2/active").header(bearer(&alice.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post("/api/v1/p2p/ice")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"transfer_id": "t2", "candidate": {"candidate": "..."}}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.post("/api/v1/p2p/t2/done").header(bearer(&bob.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);

    // The transfer is gone once terminal; a second "done" finds nothing.
    let res = client.post("/api/v1/p2p/t2/done").header(bearer(&alice.access)).dispatch();
    assert_eq!(res.status(), Status::NotFound);
}

#[test]
fn test_p2p_offer_requires_receiver_online() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    register_and_login(&client, "bob");

    let res = client
        .post("/api/v1/p2p/offer")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"transfer_id": "t3", "to": "bob", "meta": {}}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::NotFound);
}

// --- Encrypted file blobs (SPEC_FULL.md supplement) ---

#[test]
fn test_upload_and_download_encrypted_file() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let ciphertext = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"not really encrypted bytes");

    let res = client
        .post("/api/v1/files")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(
            json!({
                "scope": "dm",
                "iv": "deadbeef",
                "ciphertext": ciphertext,
                "sha256": "abc123",
                "mime_hint": "image/png",
                "wrapped_keys": {"bob": "d2VsbA=="}
            })
            .to_string(),
        )
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    let file_id = body["id"].as_str().unwrap().to_string();

    let res = client.get(format!("/api/v1/files/{file_id}/meta")).header(bearer(&alice.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let meta: serde_json::Value = res.into_json().unwrap();
    assert_eq!(meta["owner"], "alice");
    assert_eq!(meta["mime_hint"], "image/png");

    let res = client.get(format!("/api/v1/files/{file_id}/blob")).header(bearer(&alice.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);
    assert_eq!(res.into_bytes().unwrap(), b"not really encrypted bytes");
}

#[test]
fn test_upload_rejects_invalid_scope() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let res = client
        .post("/api/v1/files")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(
            json!({
                "scope": "public",
                "iv": "x",
                "ciphertext": "eA==",
                "sha256": "x",
                "mime_hint": "text/plain",
                "wrapped_keys": {}
            })
            .to_string(),
        )
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

// --- Anti-abuse Governor (spec §4.6) ---

#[test]
fn test_dm_rate_limit_enforced() {
    let config = echochat_core::rate_limit::RateLimitConfig {
        dm_send_max: 2,
        dm_send_window_secs: 60,
        ..Default::default()
    };
    let client = test_client_with_rate_limits(config);
    let alice = register_and_login(&client, "alice");
    register_and_login(&client, "bob");
    register_and_login(&client, "carol");

    for to in ["bob", "carol"] {
        let res = client
            .post("/api/v1/dm")
            .header(ContentType::JSON)
            .header(bearer(&alice.access))
            .body(json!({"to": to, "cipher": "EC1:x"}).to_string())
            .dispatch();
        assert_eq!(res.status(), Status::Ok);
    }

    let res = client
        .post("/api/v1/dm")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"to": "bob", "cipher": "EC1:x"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::TooManyRequests);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["kind"], "RateLimited");
    assert!(body["retry_after_secs"].as_u64().unwrap() > 0);
}

#[test]
fn test_room_create_rate_limit_enforced() {
    let config = echochat_core::rate_limit::RateLimitConfig {
        room_create_max: 1,
        room_create_window_secs: 60,
        ..Default::default()
    };
    let client = test_client_with_rate_limits(config);
    let alice = register_and_login(&client, "alice");
    create_room(&client, &alice.access, "first");

    let res = client
        .post("/api/v1/rooms")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"name": "second"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::TooManyRequests);
}

// --- Admin surface (SPEC_FULL.md supplement) ---

#[test]
fn test_admin_force_logout() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    client.promote_to_admin("alice");
    let bob = register_and_login(&client, "bob");

    let res = client.post("/api/v1/admin/users/bob/force_logout").header(bearer(&alice.access)).dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get("/api/v1/friends").header(bearer(&bob.access)).dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn test_non_admin_cannot_force_logout() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    let bob = register_and_login(&client, "bob");
    let res = client.post("/api/v1/admin/users/bob/force_logout").header(bearer(&alice.access)).dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}

#[test]
fn test_admin_global_announcement() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    client.promote_to_admin("alice");

    let res = client
        .post("/api/v1/admin/announcements")
        .header(ContentType::JSON)
        .header(bearer(&alice.access))
        .body(json!({"message": "maintenance at midnight"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn test_admin_force_room_leave() {
    let client = test_client();
    let alice = register_and_login(&client, "alice");
    client.promote_to_admin("alice");
    create_room(&client, &alice.access, "lobby");
    let bob = register_and_login(&client, "bob");
    client.post("/api/v1/rooms/lobby/join").header(bearer(&bob.access)).dispatch();

    let res = client
        .post("/api/v1/admin/rooms/lobby/members/bob/remove")
        .header(bearer(&alice.access))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    // Removed from membership: bob can no longer post there.
    let res = client
        .post("/api/v1/rooms/lobby/messages")
        .header(ContentType::JSON)
        .header(bearer(&bob.access))
        .body(json!({"room": "lobby", "message": "still here?"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}
