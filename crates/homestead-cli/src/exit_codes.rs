//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Input error - invalid identifier, channel, plan or argument value
pub const INPUT_ERROR: i32 = 2;

/// Authorization error - missing or rejected auth token
pub const AUTH_ERROR: i32 = 3;

/// Not found - origin, package, channel, secret or key does not exist
pub const NOT_FOUND: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Integrity error - bad signature or checksum mismatch
pub const INTEGRITY_ERROR: i32 = 6;

/// Build error - build script failed or leaked a secret
pub const BUILD_ERROR: i32 = 7;

/// Conflict - the origin, package or secret already exists
pub const CONFLICT: i32 = 8;
