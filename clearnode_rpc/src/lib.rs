//! This crate provides the domain types and wire messages of the ClearNode
//! state-channel protocol, shared between the client and any tooling that
//! speaks the protocol.

pub mod auth;
pub mod domain;
pub mod event;
pub mod intent;
pub mod macros;
pub mod rpc;
