//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

#![allow(dead_code)]

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Init error - `kpt pkg init` or `kpt live init` failed
pub const INIT_ERROR: i32 = 2;

/// Descriptor error - Kptfile cannot be read or parsed
pub const DESCRIPTOR_ERROR: i32 = 3;

/// Apply error - `kpt live apply` failed
pub const APPLY_ERROR: i32 = 4;

/// Destroy error - `kpt live destroy` failed
pub const DESTROY_ERROR: i32 = 5;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 6;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;

/// Interrupted by the user (128 + SIGINT)
pub const CANCELLED: i32 = 130;
