// src/core/mod.rs

//! The central module containing the registry, message model and publish
//! path of the push bridge.

pub mod bridge;
pub mod errors;
pub mod message;
pub mod metrics;
pub mod registry;
pub mod transport;

pub use bridge::PublishBridge;
pub use errors::PushError;
pub use message::CommandMessage;
pub use registry::SessionRegistry;
