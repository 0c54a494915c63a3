//! In-process fan-out of form events to connected clients.
//!
//! Connections register an unbounded sender and join either a session group
//! (one group per chat session) or the admin group. Broadcasts walk the
//! target groups under the registry lock, so events for one connection
//! arrive in broadcast order; a send to a dropped receiver prunes the
//! connection instead of failing the broadcast. Delivery is at most once,
//! there is no replay for connections that join late.

mod event;
mod hub;

pub use event::HubEvent;
pub use hub::{ConnectionId, DeliveryReport, FanoutHub};
