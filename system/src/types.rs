pub type ConnectionId = u64;

/// Opaque id a client uses to tell its own edits apart from others'.
pub type SenderId = String;
