use {
    async_trait::async_trait,
    clearnode_rpc::domain::{Address, Allocation, ChannelId, StateIntent, B256, U256},
};

/// Errors surfaced by the on-chain client. Revert reasons are preserved so
/// they can be carried into the reported failure.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("Transaction reverted: {reason}")]
    Reverted { reason: String },

    #[error("Transaction not mined before the deadline")]
    Timeout,

    #[error("Node RPC error: {0}")]
    Rpc(String),
}

/// A channel lifecycle transaction handed to the custody contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTx {
    pub channel_id: ChannelId,
    pub token: Address,
    pub chain_id: u64,

    /// Purpose of the state update carried by this transaction.
    pub intent: StateIntent,

    /// The allocation set of the state being submitted.
    pub allocations: Vec<Allocation>,

    /// Dispute window in seconds.
    pub challenge_duration: U256,

    /// Counterparty signatures over the submitted state.
    pub state_signatures: Vec<String>,
}

/// Result of a submitted and mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_hash: B256,

    /// Block the transaction was mined in, when the receipt carries it.
    pub block_number: Option<u64>,
}

/// A single balance slot read from the custody contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnChainBalance {
    pub destination: Address,
    pub token: Address,
    pub amount: U256,
}

/// Typed client for the custody/adjudicator contract pair.
///
/// Submission methods resolve once the transaction is mined, returning the
/// hash and receipt data.
#[async_trait]
pub trait ContractClient: Send + Sync {
    /// Chain the client submits to and reads from.
    fn chain_id(&self) -> u64;

    async fn create_channel(&self, tx: ChannelTx) -> Result<TxOutcome, ContractError>;

    async fn resize(&self, tx: ChannelTx) -> Result<TxOutcome, ContractError>;

    async fn close(&self, tx: ChannelTx) -> Result<TxOutcome, ContractError>;

    /// Withdraws the caller's final allocation from custody.
    async fn withdraw(
        &self,
        channel_id: &ChannelId,
        token: Address,
    ) -> Result<TxOutcome, ContractError>;

    /// Reads the current balance slots of a channel.
    async fn read_balances(
        &self,
        channel_id: &ChannelId,
    ) -> Result<Vec<OnChainBalance>, ContractError>;
}
