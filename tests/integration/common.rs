use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::Client;

/// Wrapper around Client that auto-deletes the temp DB on drop.
/// Prevents /tmp/chat_test_*.db file accumulation.
/// Uses Option<Client> so we can drop the DB connection before deleting the file.
pub struct TestClient {
    client: Option<Client>,
    db_path: String,
}

impl Drop for TestClient {
    fn drop(&mut self) {
        // Drop client first to release SQLite connection (WAL mode holds the file)
        drop(self.client.take());
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_path));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_path));
    }
}

impl std::ops::Deref for TestClient {
    type Target = Client;
    fn deref(&self) -> &Client {
        self.client.as_ref().unwrap()
    }
}

impl TestClient {
    /// Directly flips `is_admin` in the backing SQLite file. There is no
    /// API-level path to mint an admin (`register` always sets is_admin =
    /// false), so admin-route tests reach past the HTTP surface here.
    pub fn promote_to_admin(&self, username: &str) {
        let conn = rusqlite::Connection::open(&self.db_path).expect("open test db");
        conn.execute("UPDATE users SET is_admin = 1 WHERE username = ?1", rusqlite::params![username])
            .expect("promote test user to admin");
    }
}

fn new_db_path() -> String {
    format!("/tmp/echochat_test_{}.db", uuid::Uuid::new_v4().to_string().split('-').next().unwrap())
}

pub fn test_client() -> TestClient {
    let db_path = new_db_path();
    let rocket = echochat_core::rocket_with_db(&db_path);
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient { client: Some(client), db_path }
}

/// Create a test client with custom rate limit configuration.
/// Useful for testing configurable rate limits without env var races.
pub fn test_client_with_rate_limits(config: echochat_core::rate_limit::RateLimitConfig) -> TestClient {
    let db_path = new_db_path();
    let rocket = echochat_core::rocket_with_db_and_config(&db_path, config);
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient { client: Some(client), db_path }
}

/// Register a fresh user with throwaway keypair material (the server never
/// validates these are real X25519/RSA keys — it only stores and relays
/// them) and return nothing; call `login` separately to obtain tokens.
pub fn register(client: &Client, username: &str, password: &str) -> Status {
    let body = serde_json::json!({
        "username": username,
        "email": format!("{username}@example.test"),
        "password": password,
        "public_key": format!("pub-{username}"),
        "encrypted_private_key": format!("enc-priv-{username}"),
    });
    client.post("/register").header(ContentType::JSON).body(body.to_string()).dispatch().status()
}

pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub fn login(client: &Client, username: &str, password: &str) -> TokenPair {
    let body = serde_json::json!({"username": username, "password": password});
    let res = client.post("/login").header(ContentType::JSON).body(body.to_string()).dispatch();
    assert_eq!(res.status(), Status::Ok, "login failed: {:?}", res.into_string());
    let json: serde_json::Value = res.into_json().unwrap();
    TokenPair {
        access: json["access_token"].as_str().unwrap().to_string(),
        refresh: json["refresh_token"].as_str().unwrap().to_string(),
    }
}

/// Register-then-login convenience for tests that just need a bearer token.
pub fn register_and_login(client: &Client, username: &str) -> TokenPair {
    let status = register(client, username, "correct horse battery staple");
    assert_eq!(status, Status::Ok, "register failed for {username}");
    login(client, username, "correct horse battery staple")
}

pub fn bearer(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("Bearer {token}"))
}

pub fn create_room(client: &Client, token: &str, name: &str) -> serde_json::Value {
    let body = serde_json::json!({"name": name});
    let res = client
        .post("/api/v1/rooms")
        .header(ContentType::JSON)
        .header(bearer(token))
        .body(body.to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok, "create_room failed: {:?}", res.into_string());
    res.into_json().unwrap()
}
