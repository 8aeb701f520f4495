//! Storage Gateway. One `Mutex<Connection>` behind `Db`, migrated with the
//! same idempotent `CREATE TABLE IF NOT EXISTS` / best-effort `ALTER TABLE`
//! discipline the teacher repo uses — every migration is safe to re-run and
//! a failing `ALTER TABLE ADD COLUMN` (column already exists) is silently
//! ignored via `.ok()` rather than aborting startup.

mod files;
mod friends;
mod groups;
mod messages;
mod offline;
mod presence;
mod reactions;
mod rooms;
mod sessions;
mod users;

pub use files::*;
pub use friends::*;
pub use groups::*;
pub use messages::*;
pub use offline::*;
pub use presence::*;
pub use reactions::*;
pub use rooms::*;
pub use sessions::*;
pub use users::*;

use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    pub fn new(path: &str) -> Self {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path).expect("failed to open database");
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .expect("failed to set pragmas");
        let db = Db { conn: Mutex::new(conn) };
        db.migrate();
        db
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Used by the `/health` route: any successful trivial query means
    /// storage is reachable.
    pub fn is_healthy(&self) -> bool {
        self.conn().query_row("SELECT 1", [], |_| Ok(())).is_ok()
    }

    fn migrate(&self) {
        let conn = self.conn();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                username_ci TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                email_ci TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                recovery_pin_hash TEXT,
                public_key TEXT NOT NULL,
                encrypted_private_key TEXT NOT NULL,
                is_admin INTEGER NOT NULL DEFAULT 0,
                roles TEXT NOT NULL DEFAULT '[]',
                lockout_count INTEGER NOT NULL DEFAULT 0,
                locked_until INTEGER,
                last_login_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS auth_sessions (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL REFERENCES users(username) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                last_activity_at TEXT NOT NULL,
                fingerprint TEXT,
                terminated_at TEXT,
                termination_reason TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON auth_sessions(username);

            CREATE TABLE IF NOT EXISTS auth_tokens (
                jti TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES auth_sessions(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                issued_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                revoked INTEGER NOT NULL DEFAULT 0,
                consumed INTEGER NOT NULL DEFAULT 0,
                parent_jti TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_tokens_session ON auth_tokens(session_id);

            CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                category TEXT NOT NULL DEFAULT 'general',
                subcategory TEXT,
                visibility TEXT NOT NULL DEFAULT 'public',
                is_18plus INTEGER NOT NULL DEFAULT 0,
                is_nsfw INTEGER NOT NULL DEFAULT 0,
                created_by TEXT NOT NULL,
                parent_room TEXT,
                capacity INTEGER,
                locked INTEGER NOT NULL DEFAULT 0,
                readonly INTEGER NOT NULL DEFAULT 0,
                slowmode_seconds INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS room_members (
                room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                username TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'member',
                joined_at TEXT NOT NULL,
                last_post_at TEXT,
                PRIMARY KEY (room_id, username)
            );
            CREATE INDEX IF NOT EXISTS idx_room_members_user ON room_members(username);

            CREATE TABLE IF NOT EXISTS room_invites (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                invitee TEXT NOT NULL,
                inviter TEXT NOT NULL,
                created_at TEXT NOT NULL,
                consumed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                owner TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS group_members (
                group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                username TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'member',
                joined_at TEXT NOT NULL,
                PRIMARY KEY (group_id, username)
            );

            CREATE TABLE IF NOT EXISTS group_invites (
                id TEXT PRIMARY KEY,
                group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                invitee TEXT NOT NULL,
                inviter TEXT NOT NULL,
                created_at TEXT NOT NULL,
                consumed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                scope TEXT NOT NULL,
                scope_id TEXT NOT NULL,
                author TEXT NOT NULL,
                message TEXT,
                cipher TEXT,
                created_at TEXT NOT NULL,
                seq INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_scope ON messages(scope, scope_id, seq);

            CREATE TABLE IF NOT EXISTS message_reactions (
                message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                username TEXT NOT NULL,
                emoji TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (message_id, username)
            );

            CREATE TABLE IF NOT EXISTS offline_messages (
                id TEXT PRIMARY KEY,
                recipient TEXT NOT NULL,
                sender TEXT NOT NULL,
                cipher TEXT NOT NULL,
                created_at TEXT NOT NULL,
                delivered_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_offline_recipient ON offline_messages(recipient, created_at);

            CREATE TABLE IF NOT EXISTS file_blobs (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                scope TEXT NOT NULL,
                iv TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                ciphertext BLOB NOT NULL,
                size INTEGER NOT NULL,
                mime_hint TEXT NOT NULL,
                created_at TEXT NOT NULL,
                ref_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS file_blob_keys (
                file_id TEXT NOT NULL REFERENCES file_blobs(id) ON DELETE CASCADE,
                username TEXT NOT NULL,
                wrapped_key TEXT NOT NULL,
                PRIMARY KEY (file_id, username)
            );

            CREATE TABLE IF NOT EXISTS presence (
                username TEXT PRIMARY KEY,
                state TEXT NOT NULL DEFAULT 'online',
                custom_status TEXT,
                last_seen TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS friendships (
                user_a TEXT NOT NULL,
                user_b TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (user_a, user_b)
            );

            CREATE TABLE IF NOT EXISTS friend_requests (
                from_user TEXT NOT NULL,
                to_user TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (from_user, to_user)
            );

            CREATE TABLE IF NOT EXISTS blocks (
                blocker TEXT NOT NULL,
                blocked TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (blocker, blocked)
            );
            ",
        )
        .expect("failed to run migrations");

        // Idempotent best-effort column additions for forward migrations,
        // following the teacher's `ALTER TABLE ... .ok()` convention.
        conn.execute_batch("ALTER TABLE rooms ADD COLUMN parent_room TEXT;").ok();
    }
}

/// Normalize a username/email for case-insensitive uniqueness checks while
/// preserving the original case for display.
pub fn ci(s: &str) -> String {
    s.to_lowercase()
}
