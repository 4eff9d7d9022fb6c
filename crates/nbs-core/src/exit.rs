//! Process exit codes shared by the chat and bus command surfaces.

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
/// Chat file or events directory missing.
pub const NOT_FOUND: i32 = 2;
/// Poll timed out, or the named event file does not exist.
pub const TIMEOUT: i32 = 3;
pub const EVENT_NOT_FOUND: i32 = 3;
pub const INVALID_ARGS: i32 = 4;
pub const DEDUPLICATED: i32 = 5;
