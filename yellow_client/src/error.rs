use {
    crate::{
        contract::ContractError,
        signer::SignerError,
        websocket::{CloseReason, TransportError},
    },
    clearnode_rpc::rpc::ValidationError,
    serde::{Deserialize, Serialize},
    std::fmt::Display,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Internal client errors. These are classified into [`Fallback`] values
/// before they leave a public provider operation.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to connect: {0}")]
    ConnectionFailed(TransportError),

    #[error("Connection closed: {0}")]
    ConnectionClosed(CloseReason),

    #[error("Failed to close connection: {0}")]
    ClosingFailed(TransportError),

    #[error("Websocket transport error: {0}")]
    Transport(TransportError),

    #[error("Not connected")]
    NotConnected,

    #[error("Internal error: Channel closed")]
    ChannelClosed,

    #[error("Serialization failed: {0}")]
    Serialization(serde_json::Error),

    #[error("Deserialization failed: {0}")]
    Deserialization(serde_json::Error),

    #[error("Request rejected by relay: {0}")]
    Relay(String),

    #[error("Response not received before the deadline")]
    ResponseTimeout,
}

/// Reason codes of the closed operational failure set.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackReason {
    /// Transport or relay unreachable; the surrounding kernel may fail over.
    YellowUnavailable,

    /// Authentication handshake failed, or the session expired and could not
    /// be renewed.
    YellowAuthFailed,

    /// On-chain transaction reverted or failed to mine.
    YellowTxFailed,

    /// Message response or receipt not received before the deadline.
    YellowTimeout,

    /// Operation attempted against a channel in dispute.
    YellowChannelDispute,

    /// Resize request exceeds the unified on-chain balance.
    InsufficientBalance,

    /// Transfer amount exceeds the sender's allocation.
    InsufficientChannelBalance,

    /// No solver responded within the quote timeout.
    NoSolverQuotes,

    /// A required intent parameter is missing or malformed.
    MissingParams,

    /// Intent source or destination chain unknown to the configuration.
    UnsupportedChain,
}

/// Discriminated failure value returned by every public provider operation
/// that can fail semantically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{reason}: {message}")]
pub struct Fallback {
    pub reason: FallbackReason,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl Fallback {
    pub fn new(reason: FallbackReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        reason: FallbackReason,
        message: impl Into<String>,
        cause: impl Display,
    ) -> Self {
        Self {
            reason,
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }
}

impl From<ClientError> for Fallback {
    fn from(err: ClientError) -> Self {
        let reason = match &err {
            ClientError::ResponseTimeout => FallbackReason::YellowTimeout,
            _ => FallbackReason::YellowUnavailable,
        };

        Self::new(reason, err.to_string())
    }
}

impl From<ContractError> for Fallback {
    fn from(err: ContractError) -> Self {
        Self::new(FallbackReason::YellowTxFailed, err.to_string())
    }
}

impl From<SignerError> for Fallback {
    fn from(err: SignerError) -> Self {
        Self::with_cause(
            FallbackReason::YellowAuthFailed,
            "owner wallet failed to sign",
            err,
        )
    }
}

impl From<ValidationError> for Fallback {
    fn from(err: ValidationError) -> Self {
        Self::new(FallbackReason::MissingParams, err.to_string())
    }
}
