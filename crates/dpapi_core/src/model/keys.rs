//! Well-known provenance keys and object type names.
//!
//! Callers may use any key; these are the conventional ones shared by
//! provenance producers and query tools.

pub const KEY_TYPE: &str = "TYPE";
pub const KEY_NAME: &str = "NAME";
pub const KEY_INODE: &str = "INODE";
pub const KEY_PATH: &str = "PATH";
pub const KEY_ARGV: &str = "ARGV";
pub const KEY_ENV: &str = "ENV";
pub const KEY_FREEZETIME: &str = "FREEZETIME";
pub const KEY_EXECTIME: &str = "EXECTIME";
pub const KEY_FORKPARENT: &str = "FORKPARENT";
pub const KEY_PID: &str = "PID";
pub const KEY_CREATE: &str = "CREATE";
pub const KEY_UNLINK: &str = "UNLINK";

/// Cross-reference key for data inputs.
pub const KEY_INPUT: &str = "INPUT";

pub const TYPE_PROC: &str = "PROC";
pub const TYPE_FILE: &str = "FILE";
pub const TYPE_NONPASS_FILE: &str = "NP_FILE";
pub const TYPE_PIPE: &str = "PIPE";
pub const TYPE_DIR: &str = "DIR";
