//! Cross-chain intent types: the user-supplied request, the normalized solver
//! quote, and the clearing result returned once an intent settles.

use {
    crate::{
        domain::{Address, Amount, B256, ChannelId, IntentId, SolverId},
        rpc::{QuoteUpdate, SettlementUpdate, ValidationError},
    },
    serde::{Deserialize, Serialize},
    std::sync::Arc,
};

/// A user-supplied cross-chain execution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentParams {
    /// Chain name the input funds live on, e.g. `arbitrum`.
    pub source_chain: Arc<str>,

    /// Chain name the output funds are delivered to.
    pub destination_chain: Arc<str>,

    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: Amount,
    pub min_amount_out: Amount,

    /// Unix-seconds timestamp the intent must settle by.
    pub deadline: u64,
}

impl IntentParams {
    /// Field-level validation, independent of the current time.
    pub fn validate_fields(&self) -> Result<(), ValidationError> {
        if self.source_chain.is_empty() {
            return Err(ValidationError::MissingField("sourceChain"));
        }

        if self.destination_chain.is_empty() {
            return Err(ValidationError::MissingField("destinationChain"));
        }

        if self.token_in == Address::ZERO {
            return Err(ValidationError::ZeroAddress("tokenIn"));
        }

        if self.token_out == Address::ZERO {
            return Err(ValidationError::ZeroAddress("tokenOut"));
        }

        self.amount_in.parse()?;
        self.min_amount_out.parse()?;

        Ok(())
    }

    /// Full validation as performed before routing: fields plus the deadline
    /// being in the future.
    pub fn validate(&self, now: u64) -> Result<(), ValidationError> {
        self.validate_fields()?;

        if self.deadline <= now {
            return Err(ValidationError::Deadline);
        }

        Ok(())
    }
}

/// Normalized solver quote for an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YellowQuote {
    pub solver_id: SolverId,
    pub channel_id: ChannelId,
    pub amount_in: Amount,
    pub amount_out: Amount,

    /// Estimated execution time in seconds.
    pub estimated_time_secs: u64,

    /// Unix-seconds timestamp of the quote.
    pub timestamp: u64,
}

impl YellowQuote {
    /// Normalizes a raw quote notification, stamping `received_at` when the
    /// solver did not provide a timestamp.
    pub fn from_update(update: QuoteUpdate, received_at: u64) -> Self {
        Self {
            solver_id: update.solver_id,
            channel_id: update.channel_id,
            amount_in: update.amount_in,
            amount_out: update.amount_out,
            estimated_time_secs: update.estimated_time_secs,
            timestamp: update.timestamp.unwrap_or(received_at),
        }
    }
}

/// Cryptographic evidence of a settled final state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementProof {
    pub state_hash: B256,
    pub signatures: Vec<String>,

    /// On-chain settlement transaction hash, when already submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
}

/// The result of a completed off-chain match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearingResult {
    pub intent_id: IntentId,
    pub channel_id: ChannelId,
    pub quote: YellowQuote,

    /// Matched input amount.
    pub amount_in: Amount,

    /// Matched output amount.
    pub amount_out: Amount,

    /// Net settlement delta of the channel after the match.
    pub net_settlement: Amount,

    pub proof: SettlementProof,
}

impl ClearingResult {
    /// Builds the result from the final settlement notification and the quote
    /// that was accepted for the intent.
    pub fn from_settlement(channel_id: ChannelId, quote: YellowQuote, update: SettlementUpdate) -> Self {
        Self {
            intent_id: update.intent_id,
            channel_id,
            quote,
            amount_in: update.amount_in,
            amount_out: update.amount_out,
            net_settlement: update.net_settlement,
            proof: SettlementProof {
                state_hash: update.state_hash,
                signatures: update.signatures,
                tx_hash: update.tx_hash,
            },
        }
    }
}
