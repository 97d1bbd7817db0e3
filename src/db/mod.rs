//! Database layer (SQLite via sqlx).

pub mod sqlite;

pub use sqlite::SqliteDb;

/// Table names as constants.
pub mod tables {
    pub const USERS: &str = "users";
    pub const TRACKS: &str = "tracks";
    /// Append-only ranking log (user ↔ track at a point in time)
    pub const USER_TOP_TRACKS: &str = "user_top_tracks";
}
