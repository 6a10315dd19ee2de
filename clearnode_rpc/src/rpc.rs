//! Wire messages of the ClearNode WebSocket protocol.
//!
//! Frames are JSON objects carrying a method name and a method-specific
//! payload. The protocol has no request ids; responses are correlated by the
//! method name they come back under (see [`RequestPayload::RESPONSE_METHOD`]).

use {
    crate::{
        domain::{Address, Amount, AmountError, Channel, ChannelId, IntentId, SolverId, B256},
        intent::IntentParams,
    },
    alloy_primitives::keccak256,
    serde::{de::DeserializeOwned, Deserialize, Serialize},
    std::sync::Arc,
};

#[cfg(test)]
mod tests;

/// Errors covering payload validation problems.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing or empty required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid amount: {0}")]
    Amount(#[from] AmountError),

    #[error("Zero address in field: {0}")]
    ZeroAddress(&'static str),

    #[error("Deadline is not in the future")]
    Deadline,
}

/// A single protocol frame: a method name plus its raw payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub method: Arc<str>,

    #[serde(default)]
    pub params: serde_json::Value,
}

/// Method names that requests are sent under and responses come back under.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Method {
    AuthRequest,
    AuthChallenge,
    AuthVerify,
    CreateChannel,
    ResizeChannel,
    CloseChannel,
    Transfer,
    GetLedgerBalances,
    SubmitIntent,
    Error,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// The method a response to this request method arrives under. Identity
    /// for everything except `auth_request`, which is answered by
    /// `auth_challenge`.
    pub fn response_method(self) -> Method {
        match self {
            Self::AuthRequest => Self::AuthChallenge,
            other => other,
        }
    }
}

/// Trait that adds strong typing to the protocol requests: the response
/// payload type, the method the request is sent under, and the method its
/// response is expected back under.
///
/// Implemented for all possible request types.
pub trait RequestPayload: Serialize + Sized {
    /// The type of a successful response.
    type Response: DeserializeOwned;

    /// Method the request is sent under.
    const METHOD: Method;

    /// Method the response comes back under. This is what waiters correlate
    /// on; for most requests it equals [`Self::METHOD`], the auth handshake
    /// being the exception (`auth_request` is answered by `auth_challenge`).
    const RESPONSE_METHOD: Method;

    /// Validates the request parameters.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Error frame sent by the relay when it rejects a request. The `method`
/// field names the request being rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub method: Arc<str>,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

/// Data structure representing `create_channel` request params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannel {
    /// Chain the channel collateral lives on.
    pub chain_id: u64,

    /// Token the channel is denominated in.
    pub token: Address,

    /// The other channel participant.
    pub counterparty: Address,

    /// Funds the caller locks into the channel.
    pub initial_allocation: Amount,
}

impl RequestPayload for CreateChannel {
    type Response = ChannelResponse;

    const METHOD: Method = Method::CreateChannel;
    const RESPONSE_METHOD: Method = Method::CreateChannel;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.chain_id == 0 {
            return Err(ValidationError::MissingField("chainId"));
        }

        if self.counterparty == Address::ZERO {
            return Err(ValidationError::ZeroAddress("counterparty"));
        }

        if self.token == Address::ZERO {
            return Err(ValidationError::ZeroAddress("token"));
        }

        self.initial_allocation.parse()?;

        Ok(())
    }
}

/// Data structure representing `resize_channel` request params. The delta is
/// the additional amount allocated into the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeChannel {
    pub channel_id: ChannelId,
    pub delta: Amount,
}

impl RequestPayload for ResizeChannel {
    type Response = ChannelResponse;

    const METHOD: Method = Method::ResizeChannel;
    const RESPONSE_METHOD: Method = Method::ResizeChannel;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.channel_id.as_ref().is_empty() {
            return Err(ValidationError::MissingField("channelId"));
        }

        self.delta.parse()?;

        Ok(())
    }
}

/// Data structure representing `close_channel` request params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseChannel {
    pub channel_id: ChannelId,

    /// Whether to withdraw the final allocation from custody after closing.
    #[serde(default)]
    pub withdraw: bool,
}

impl RequestPayload for CloseChannel {
    type Response = ChannelResponse;

    const METHOD: Method = Method::CloseChannel;
    const RESPONSE_METHOD: Method = Method::CloseChannel;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.channel_id.as_ref().is_empty() {
            return Err(ValidationError::MissingField("channelId"));
        }

        Ok(())
    }
}

/// Data structure representing `transfer` request params. The signature is
/// produced by the session key over [`Transfer::digest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub channel_id: ChannelId,
    pub to: Address,
    pub amount: Amount,
    pub signature: String,
}

impl Transfer {
    /// Canonical digest of a transfer, signed by the sender's session key.
    pub fn digest(channel_id: &ChannelId, to: Address, amount: &Amount) -> B256 {
        let mut data = Vec::with_capacity(
            channel_id.as_ref().len() + Address::len_bytes() + amount.as_ref().len(),
        );

        data.extend_from_slice(channel_id.as_ref().as_bytes());
        data.extend_from_slice(to.as_slice());
        data.extend_from_slice(amount.as_ref().as_bytes());

        keccak256(data)
    }
}

impl RequestPayload for Transfer {
    type Response = TransferResponse;

    const METHOD: Method = Method::Transfer;
    const RESPONSE_METHOD: Method = Method::Transfer;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.channel_id.as_ref().is_empty() {
            return Err(ValidationError::MissingField("channelId"));
        }

        if self.to == Address::ZERO {
            return Err(ValidationError::ZeroAddress("to"));
        }

        if self.signature.is_empty() {
            return Err(ValidationError::MissingField("signature"));
        }

        self.amount.parse()?;

        Ok(())
    }
}

/// Data structure representing `get_ledger_balances` request params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLedgerBalances {
    /// Participant whose unified balances and channels are requested.
    pub participant: Address,
}

impl RequestPayload for GetLedgerBalances {
    type Response = LedgerBalancesResponse;

    const METHOD: Method = Method::GetLedgerBalances;
    const RESPONSE_METHOD: Method = Method::GetLedgerBalances;
}

/// Data structure representing `submit_intent` request params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitIntent {
    /// Channel the intent is routed through.
    pub channel_id: ChannelId,

    #[serde(flatten)]
    pub intent: IntentParams,
}

impl RequestPayload for SubmitIntent {
    type Response = SubmitIntentResponse;

    const METHOD: Method = Method::SubmitIntent;
    const RESPONSE_METHOD: Method = Method::SubmitIntent;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.channel_id.as_ref().is_empty() {
            return Err(ValidationError::MissingField("channelId"));
        }

        self.intent.validate_fields()
    }
}

/// Response to the channel lifecycle requests (`create_channel`,
/// `resize_channel`, `close_channel`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResponse {
    pub channel: Channel,

    /// Counterparty signatures over the negotiated state, forwarded to the
    /// custody contract with the on-chain leg of the operation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<String>,
}

/// Response to a `transfer` request: the updated allocation set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub channel: Channel,
}

/// One unified (cross-channel) balance entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerBalance {
    pub token: Address,
    pub chain_id: u64,
    pub amount: Amount,
}

/// Response to a `get_ledger_balances` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerBalancesResponse {
    #[serde(default)]
    pub balances: Vec<LedgerBalance>,

    #[serde(default)]
    pub channels: Vec<Channel>,
}

/// Acknowledgment of a `submit_intent` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitIntentResponse {
    pub intent_id: IntentId,
}

/// A solver quote delivered while an intent is being routed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteUpdate {
    pub intent_id: IntentId,
    pub solver_id: SolverId,
    pub channel_id: ChannelId,
    pub amount_in: Amount,
    pub amount_out: Amount,

    #[serde(rename = "estimatedTime")]
    pub estimated_time_secs: u64,

    /// Quote timestamp in unix seconds; filled with the receive time when the
    /// solver omits it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// Progress notification for an intent that is being executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentProgress {
    pub intent_id: IntentId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
}

/// Final clearing data for a settled intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementUpdate {
    pub intent_id: IntentId,
    pub amount_in: Amount,
    pub amount_out: Amount,

    /// Net settlement delta of the channel after the match.
    pub net_settlement: Amount,

    /// Hash of the final channel state the participants signed.
    pub state_hash: B256,

    /// Participant signatures over the final state.
    pub signatures: Vec<String>,

    /// On-chain settlement transaction, if it was already submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
}

/// Terminal failure notification for an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentFailure {
    pub intent_id: IntentId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Inbound notifications pushed by the relay outside of request/response
/// pairs: channel lifecycle events and intent lifecycle events.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ChannelCreated(Channel),
    ChannelJoined(Channel),
    ChannelOpened(Channel),
    ChannelChallenged(Channel),
    ChannelCheckpointed(Channel),
    ChannelResized(Channel),
    ChannelClosed(Channel),
    SolverQuoted(QuoteUpdate),
    ExecutionStarted(IntentProgress),
    SettlementSubmitted(IntentProgress),
    Settled(SettlementUpdate),
    IntentFailed(IntentFailure),
    IntentExpired(IntentFailure),

    /// Anything this client does not recognize. Kept verbatim so the event
    /// mapper can still classify it conservatively.
    Unknown {
        method: Arc<str>,
        params: serde_json::Value,
    },
}

impl Notification {
    /// Parses a raw frame into a notification. Unrecognized methods and
    /// malformed payloads of known methods both land in
    /// [`Notification::Unknown`].
    pub fn from_raw(raw: RawMessage) -> Self {
        fn parse<T, F>(raw: RawMessage, wrap: F) -> Notification
        where
            T: DeserializeOwned,
            F: FnOnce(T) -> Notification,
        {
            match serde_json::from_value(raw.params.clone()) {
                Ok(data) => wrap(data),
                Err(_) => Notification::Unknown {
                    method: raw.method,
                    params: raw.params,
                },
            }
        }

        match raw.method.as_ref() {
            "created" => parse(raw, Self::ChannelCreated),
            "joined" => parse(raw, Self::ChannelJoined),
            "opened" => parse(raw, Self::ChannelOpened),
            "challenged" => parse(raw, Self::ChannelChallenged),
            "checkpointed" => parse(raw, Self::ChannelCheckpointed),
            "resized" => parse(raw, Self::ChannelResized),
            "closed" => parse(raw, Self::ChannelClosed),
            "solver_quoted" | "quote_accepted" => parse(raw, Self::SolverQuoted),
            "execution_started" | "routing_started" => parse(raw, Self::ExecutionStarted),
            "settlement_submitted" => parse(raw, Self::SettlementSubmitted),
            "settled" | "settlement_finalized" => parse(raw, Self::Settled),
            "failed" | "canceled" => parse(raw, Self::IntentFailed),
            "expired" => parse(raw, Self::IntentExpired),
            _ => Self::Unknown {
                method: raw.method,
                params: raw.params,
            },
        }
    }

    /// Canonical relay event name of this notification.
    pub fn method(&self) -> &str {
        match self {
            Self::ChannelCreated(_) => "created",
            Self::ChannelJoined(_) => "joined",
            Self::ChannelOpened(_) => "opened",
            Self::ChannelChallenged(_) => "challenged",
            Self::ChannelCheckpointed(_) => "checkpointed",
            Self::ChannelResized(_) => "resized",
            Self::ChannelClosed(_) => "closed",
            Self::SolverQuoted(_) => "solver_quoted",
            Self::ExecutionStarted(_) => "execution_started",
            Self::SettlementSubmitted(_) => "settlement_submitted",
            Self::Settled(_) => "settled",
            Self::IntentFailed(_) => "failed",
            Self::IntentExpired(_) => "expired",
            Self::Unknown { method, .. } => method.as_ref(),
        }
    }

    /// The channel payload, for channel lifecycle notifications.
    pub fn channel(&self) -> Option<&Channel> {
        match self {
            Self::ChannelCreated(channel)
            | Self::ChannelJoined(channel)
            | Self::ChannelOpened(channel)
            | Self::ChannelChallenged(channel)
            | Self::ChannelCheckpointed(channel)
            | Self::ChannelResized(channel)
            | Self::ChannelClosed(channel) => Some(channel),
            _ => None,
        }
    }

    /// The intent this notification refers to, for intent lifecycle
    /// notifications.
    pub fn intent_id(&self) -> Option<&IntentId> {
        match self {
            Self::SolverQuoted(update) => Some(&update.intent_id),
            Self::ExecutionStarted(update) | Self::SettlementSubmitted(update) => {
                Some(&update.intent_id)
            }
            Self::Settled(update) => Some(&update.intent_id),
            Self::IntentFailed(update) | Self::IntentExpired(update) => Some(&update.intent_id),
            _ => None,
        }
    }
}
