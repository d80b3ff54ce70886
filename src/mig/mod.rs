//! MIG conventions
//!
//! Return codes that MIG-generated stubs produce on their own (as opposed
//! to codes that come back from the remote side), and the message layout
//! calculator used to size requests and bound replies.

pub mod layout;

pub use layout::{FieldSize, LayoutBuilder, MessageField, MessageLayout};

/// Reply didn't match the expected shape
pub const MIG_TYPE_ERROR: i32 = -300;
/// Reply id didn't match the request
pub const MIG_REPLY_MISMATCH: i32 = -301;
/// Server raised an exception
pub const MIG_REMOTE_ERROR: i32 = -302;
/// Bad request message id
pub const MIG_BAD_ID: i32 = -303;
/// Server found bad arguments
pub const MIG_BAD_ARGUMENTS: i32 = -304;
/// Server won't reply
pub const MIG_NO_REPLY: i32 = -305;
/// Array not large enough for the data
pub const MIG_ARRAY_TOO_LARGE: i32 = -307;
/// Server died before replying
pub const MIG_SERVER_DIED: i32 = -308;

/// Offset between a routine's request id and its reply id
pub const MIG_REPLY_ID_OFFSET: i32 = 100;
