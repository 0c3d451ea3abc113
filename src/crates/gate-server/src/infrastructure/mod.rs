//! Infrastructure layer for the gate service.
//!
//! Contains the adapters that touch the outside world: the MQTT transport,
//! the record file and configuration on disk, and the weather HTTP client.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `gate_core`, but MUST NOT be imported by the `application` or domain
//! layers (test doubles excepted).

pub mod storage;
pub mod transport;
pub mod weather;
