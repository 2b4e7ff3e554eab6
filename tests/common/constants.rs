//! Shared constants for end-to-end tests
//!
//! When test credentials or sample data change, update only this file.

// ============================================================================
// Test User
// ============================================================================

/// The single handle accepted by the test server
pub const TEST_USER: &str = "collector";

// ============================================================================
// Sample Records
// ============================================================================

pub const ARTIST_1: &str = "Miles Davis";
pub const ALBUM_1: &str = "Kind of Blue";
pub const GENRE_1: &str = "Jazz";
pub const YEAR_1: &str = "1959";
pub const STORE_1: &str = "Disk Union";

pub const ARTIST_2: &str = "Can";
pub const ALBUM_2: &str = "Tago Mago";
pub const GENRE_2: &str = "Krautrock";
pub const YEAR_2: &str = "1971";
pub const STORE_2: &str = "Rough Trade";

/// Smallest byte sequence sniffed as `image/png`
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52,
];

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
