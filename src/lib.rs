//! Facade over the Yellow SDK workspace: the ClearNode protocol types and
//! the state-channel provider client, gated behind the `rpc` and `client`
//! features.

#[cfg(feature = "rpc")]
pub use clearnode_rpc;

#[cfg(feature = "client")]
pub use yellow_client;
