//! State machine of the code-room relay.
//!
//! Nothing in this crate performs I/O. The server crate owns a
//! [`RelayEngine`], feeds it connection events one at a time and performs the
//! [`Outgoing`] deliveries it returns.

pub extern crate serde;
pub extern crate serde_json;

mod membership;
mod message;
mod registry;
mod relay;
mod room_id;
mod types;

pub use membership::*;
pub use message::*;
pub use registry::*;
pub use relay::*;
pub use room_id::*;
pub use types::*;
