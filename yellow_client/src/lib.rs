//! Client for the ClearNode state-channel relay.
//!
//! The entry point is [`YellowProvider`]: it owns the WebSocket connection to
//! the relay, authenticates with an ephemeral session key delegated by the
//! owner wallet, keeps a cache of channel states, and drives channel
//! lifecycle operations and cross-chain intents against the custody and
//! adjudicator contracts.

pub use {
    channels::ChannelStore,
    contract::{ChannelTx, ContractClient, ContractError, OnChainBalance, TxOutcome},
    error::{ClientError, Fallback, FallbackReason},
    provider::{TransferParams, YellowEvent, YellowProvider},
    session::SessionManager,
    signer::{LocalWallet, SignerError, TypedDataSigner},
};
use {
    clearnode_rpc::{
        auth::{Allowance, CLEARNODE_WEBSOCKET_ADDRESS, DEFAULT_AUTH_SCOPE},
        domain::{Address, U256},
    },
    std::{collections::BTreeMap, sync::Arc, time::Duration},
    tokio_tungstenite::tungstenite::client::IntoClientRequest,
};

pub mod channels;
pub mod contract;
pub mod error;
pub mod provider;
pub mod session;
pub mod signer;
pub mod websocket;

pub type HttpRequest<T> = http::Request<T>;

pub const DEFAULT_CHALLENGE_DURATION_SECS: u32 = 3600;
pub const DEFAULT_SESSION_EXPIRY_SECS: u32 = 3600;
pub const DEFAULT_RECONNECT_INITIAL_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_QUOTE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors generated while validating a [`YellowConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid relay URL: {0}")]
    RelayUrl(#[from] url::ParseError),

    #[error("Relay URL must use the ws or wss scheme")]
    RelayScheme,

    #[error("Node RPC URL is empty")]
    EmptyRpcUrl,

    #[error("Chain ID must be non-zero")]
    ZeroChainId,

    #[error("Custody contract address is zero")]
    ZeroCustody,

    #[error("Adjudicator contract address is zero")]
    ZeroAdjudicator,

    #[error("Challenge duration must be non-zero")]
    ZeroChallengeDuration,

    #[error("Session expiry must be non-zero")]
    ZeroSessionExpiry,
}

/// The chain-name table used to resolve intent source and destination chains.
pub fn default_networks() -> BTreeMap<String, u64> {
    BTreeMap::from([
        ("ethereum".to_owned(), 1),
        ("optimism".to_owned(), 10),
        ("polygon".to_owned(), 137),
        ("base".to_owned(), 8453),
        ("arbitrum".to_owned(), 42161),
        ("sepolia".to_owned(), 11155111),
    ])
}

/// Provider configuration.
#[derive(Debug, Clone)]
pub struct YellowConfig {
    /// The ClearNode websocket address. The default address is
    /// `wss://clearnet-sandbox.yellow.com/ws`.
    pub relay_url: String,

    /// Custody contract receiving the channel lifecycle transactions.
    pub custody_address: Address,

    /// Adjudicator contract resolving disputes.
    pub adjudicator_address: Address,

    /// Chain the custody and adjudicator contracts live on.
    pub chain_id: u64,

    /// Node endpoint for on-chain reads and submissions.
    pub rpc_url: String,

    /// Dispute window in seconds, conveyed to the custody contract as an
    /// arbitrary-precision integer.
    pub challenge_duration_secs: u32,

    /// Lifetime of each session key in seconds.
    pub session_expiry_secs: u32,

    /// Base delay of the exponential reconnect backoff.
    pub reconnect_initial_delay: Duration,

    /// Reconnect attempts before the provider declares itself unavailable.
    pub max_reconnect_attempts: u32,

    /// How long `execute_intent` waits for solver quotes.
    pub quote_timeout: Duration,

    /// Deadline applied to every relay request/response pair.
    pub rpc_timeout: Duration,

    /// Application scope requested during authentication.
    pub auth_scope: Arc<str>,

    /// Token allowances requested for each session key.
    pub allowances: Vec<Allowance>,

    /// Chain name to chain id table for intent validation.
    pub networks: BTreeMap<String, u64>,
}

impl YellowConfig {
    pub fn new(
        custody_address: Address,
        adjudicator_address: Address,
        chain_id: u64,
        rpc_url: impl Into<String>,
    ) -> Self {
        Self {
            relay_url: CLEARNODE_WEBSOCKET_ADDRESS.into(),
            custody_address,
            adjudicator_address,
            chain_id,
            rpc_url: rpc_url.into(),
            challenge_duration_secs: DEFAULT_CHALLENGE_DURATION_SECS,
            session_expiry_secs: DEFAULT_SESSION_EXPIRY_SECS,
            reconnect_initial_delay: DEFAULT_RECONNECT_INITIAL_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            quote_timeout: DEFAULT_QUOTE_TIMEOUT,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            auth_scope: DEFAULT_AUTH_SCOPE.into(),
            allowances: Vec::new(),
            networks: default_networks(),
        }
    }

    pub fn with_relay_url(mut self, relay_url: impl Into<String>) -> Self {
        self.relay_url = relay_url.into();
        self
    }

    pub fn with_challenge_duration(mut self, secs: u32) -> Self {
        self.challenge_duration_secs = secs;
        self
    }

    pub fn with_session_expiry(mut self, secs: u32) -> Self {
        self.session_expiry_secs = secs;
        self
    }

    pub fn with_reconnect(mut self, initial_delay: Duration, max_attempts: u32) -> Self {
        self.reconnect_initial_delay = initial_delay;
        self.max_reconnect_attempts = max_attempts;
        self
    }

    pub fn with_quote_timeout(mut self, timeout: Duration) -> Self {
        self.quote_timeout = timeout;
        self
    }

    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    pub fn with_auth_scope(mut self, scope: impl Into<Arc<str>>) -> Self {
        self.auth_scope = scope.into();
        self
    }

    pub fn with_allowances(mut self, allowances: Vec<Allowance>) -> Self {
        self.allowances = allowances;
        self
    }

    pub fn with_network(mut self, name: impl Into<String>, chain_id: u64) -> Self {
        self.networks.insert(name.into(), chain_id);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.relay_url)?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::RelayScheme);
        }

        if self.rpc_url.is_empty() {
            return Err(ConfigError::EmptyRpcUrl);
        }

        if self.chain_id == 0 {
            return Err(ConfigError::ZeroChainId);
        }

        if self.custody_address == Address::ZERO {
            return Err(ConfigError::ZeroCustody);
        }

        if self.adjudicator_address == Address::ZERO {
            return Err(ConfigError::ZeroAdjudicator);
        }

        if self.challenge_duration_secs == 0 {
            return Err(ConfigError::ZeroChallengeDuration);
        }

        if self.session_expiry_secs == 0 {
            return Err(ConfigError::ZeroSessionExpiry);
        }

        Ok(())
    }

    /// The dispute window as the arbitrary-precision integer the custody
    /// contract expects.
    pub fn challenge_duration(&self) -> U256 {
        U256::from(self.challenge_duration_secs)
    }

    /// Resolves a chain name from the network table.
    pub fn network_id(&self, name: &str) -> Option<u64> {
        self.networks.get(name).copied()
    }

    pub(crate) fn ws_request(&self) -> Result<HttpRequest<()>, ClientError> {
        self.relay_url
            .as_str()
            .into_client_request()
            .map_err(ClientError::Transport)
    }
}
