//! Lifecycle of the push connection to the store's event stream: reconnect
//! backoff, the retry countdown and the WebSocket transport itself.

mod backoff;
mod connection_manager;
mod transport;

pub use backoff::{BackoffClock, JitterSource, MAX_INTERVAL, ThreadRngJitter, next_interval};
pub use connection_manager::{
    Action, ConnectionManager, ConnectionState, EventSink, StatusLine, rearm_delay,
};
pub use transport::{Capability, ChannelEvent, Endpoint, EndpointError, PushChannel, TransportError};
