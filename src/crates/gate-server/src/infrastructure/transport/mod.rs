//! Message transport: the MQTT adapter and its test double.
//!
//! - `mqtt` connects to the broker, listens on the command topic, and
//!   implements [`MessagePublisher`] for replies and status lines.
//! - `mock` records publishes in memory so use cases can be tested without
//!   a broker.
//!
//! [`MessagePublisher`]: crate::application::outbound::MessagePublisher

pub mod mock;
pub mod mqtt;
