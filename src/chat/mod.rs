//! Real-time chat over WebSockets.
//!
//! Each case is a room backed by a tokio broadcast channel; a connection
//! subscribes to a room after a `join_case` frame passes the participation
//! check. Messages sent over the socket are persisted through the same
//! repository as the REST message endpoints and then fanned out, so both
//! paths converge on the `messages` table and ordering within a room is the
//! database's insert order.
//!
//! The handshake is authenticated with the session JWT passed as a `token`
//! query parameter; a bad token fails the request before the upgrade.

mod protocol;
mod rooms;
mod session;

pub use protocol::{ClientEvent, ServerEvent};
pub use rooms::ChatRooms;
pub use session::ws_handler;
