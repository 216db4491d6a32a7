/// Application name
pub const APP_NAME: &str = "Murmur";

/// Maximum message body size in bytes (16 KiB)
pub const MAX_MESSAGE_LEN: usize = 16 * 1024;

/// Maximum chatroom name length in characters
pub const MAX_CHATROOM_NAME_LEN: usize = 128;

/// Default number of attempts for a submit, including the first one
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default delay before the first retry, in milliseconds
pub const DEFAULT_RETRY_BASE_MS: u64 = 100;

/// Upper bound on a single retry delay, in milliseconds
pub const DEFAULT_RETRY_MAX_MS: u64 = 2_000;

/// File name of the SQLite document store inside the data directory
pub const DATABASE_FILE_NAME: &str = "murmur.db";
