//! WebSocket Live Stream
//!
//! Pushes every newly stored log record to connected viewers.
//!
//! ## Architecture
//!
//! - **Hub**: control loop owning the subscriber set; serializes
//!   registration, unregistration and broadcast
//! - **Subscriber**: one viewer's bounded outbound queue
//! - **Handler**: WebSocket upgrade plus the inbound/outbound drains
//!
//! ## Usage
//!
//! Clients connect to `/ws` and only listen. Each text frame is one record:
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8080/ws');
//!
//! ws.onmessage = (event) => {
//!   const record = JSON.parse(event.data);
//!   if (record.id === -1) {
//!     // history was cleared
//!   }
//! };
//! ```

mod handler;
mod hub;
mod subscriber;

pub use handler::{serve_subscriber, websocket_handler};
pub use hub::{Fanout, Hub, HubConfig, HubError, HubLoop, SubscriberSet};
pub use subscriber::{Offer, OutboundQueue, Subscriber, SubscriberId};
