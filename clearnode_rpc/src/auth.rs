//! Session-key authentication payloads.
//!
//! A provider authenticates with the ClearNode by generating an ephemeral
//! secp256k1 session key and having the owner wallet delegate authority to it
//! through an EIP-712 signature over the relay-issued challenge.

use {
    crate::{
        domain::{Address, Amount, B256, U256},
        rpc::{Method, RequestPayload, ValidationError},
    },
    alloy_sol_types::{sol, Eip712Domain, SolStruct},
    k256::ecdsa::SigningKey,
    serde::{Deserialize, Serialize},
    std::{borrow::Cow, sync::Arc},
};

pub use k256;

pub const CLEARNODE_WEBSOCKET_ADDRESS: &str = "wss://clearnet-sandbox.yellow.com/ws";

pub const DEFAULT_AUTH_SCOPE: &str = "app";

const EIP712_DOMAIN_NAME: &str = "ClearNode";
const EIP712_DOMAIN_VERSION: &str = "1";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature has invalid length")]
    Length,

    #[error("Signature is malformed")]
    Malformed,

    #[error("Unable to recover the signer")]
    Recovery,
}

/// A spending limit the session key is allowed to operate within.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allowance {
    pub asset: Address,
    pub amount: Amount,
}

/// Data structure representing `auth_request` params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    /// The owner wallet delegating authority.
    pub wallet: Address,

    /// Address derived from the freshly generated session key.
    pub session_key: Address,

    /// Token allowances requested for the session.
    pub allowances: Vec<Allowance>,

    /// Session expiry as a unix-seconds timestamp.
    pub expire: u64,

    /// Application scope the session is restricted to.
    pub scope: Arc<str>,
}

impl RequestPayload for AuthRequest {
    type Response = AuthChallenge;

    const METHOD: Method = Method::AuthRequest;
    const RESPONSE_METHOD: Method = Method::AuthChallenge;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.session_key == Address::ZERO {
            return Err(ValidationError::ZeroAddress("sessionKey"));
        }

        if self.expire == 0 {
            return Err(ValidationError::MissingField("expire"));
        }

        if self.scope.is_empty() {
            return Err(ValidationError::MissingField("scope"));
        }

        for allowance in &self.allowances {
            allowance.amount.parse()?;
        }

        Ok(())
    }
}

/// Data structure representing the `auth_challenge` response params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub challenge: Arc<str>,
}

/// Data structure representing `auth_verify` params, carrying the owner
/// wallet's signature over the challenge typed data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthVerify {
    pub challenge: Arc<str>,
    pub signature: String,
}

impl RequestPayload for AuthVerify {
    type Response = AuthConfirmation;

    const METHOD: Method = Method::AuthVerify;
    const RESPONSE_METHOD: Method = Method::AuthVerify;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.challenge.is_empty() {
            return Err(ValidationError::MissingField("challenge"));
        }

        if self.signature.is_empty() {
            return Err(ValidationError::MissingField("signature"));
        }

        Ok(())
    }
}

/// Confirmation of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfirmation {
    /// The ClearNode's own participant address, used as the default
    /// counterparty for channels opened on behalf of an intent.
    pub address: Address,
}

sol! {
    /// Typed-data payload the owner wallet signs to delegate channel
    /// authority to a session key.
    struct SessionAuthorization {
        string challenge;
        string scope;
        address wallet;
        address session_key;
        uint256 expire;
    }
}

/// An EIP-712 payload: domain, primary type, JSON message, and the signing
/// hash external wallets are expected to produce a signature over.
#[derive(Debug, Clone)]
pub struct TypedData {
    pub domain: Eip712Domain,
    pub primary_type: &'static str,
    pub message: serde_json::Value,
    pub signing_hash: B256,
}

pub fn auth_domain(chain_id: u64) -> Eip712Domain {
    Eip712Domain {
        name: Some(Cow::Borrowed(EIP712_DOMAIN_NAME)),
        version: Some(Cow::Borrowed(EIP712_DOMAIN_VERSION)),
        chain_id: Some(U256::from(chain_id)),
        verifying_contract: None,
        salt: None,
    }
}

/// Builds the typed data an owner wallet signs in response to an
/// `auth_challenge`.
pub fn session_typed_data(
    challenge: &str,
    scope: &str,
    wallet: Address,
    session_key: Address,
    expire: u64,
    chain_id: u64,
) -> TypedData {
    let domain = auth_domain(chain_id);

    let payload = SessionAuthorization {
        challenge: challenge.to_owned(),
        scope: scope.to_owned(),
        wallet,
        session_key,
        expire: U256::from(expire),
    };

    let signing_hash = payload.eip712_signing_hash(&domain);

    let message = serde_json::json!({
        "challenge": challenge,
        "scope": scope,
        "wallet": wallet,
        "sessionKey": session_key,
        "expire": expire,
    });

    TypedData {
        domain,
        primary_type: "SessionAuthorization",
        message,
        signing_hash,
    }
}

/// Derives the Ethereum address of a secp256k1 signing key.
pub fn key_address(key: &SigningKey) -> Address {
    Address::from_private_key(key)
}

/// Signs a 32-byte hash with a recoverable secp256k1 signature, encoded as
/// `r || s || v` with the Ethereum +27 recovery byte.
pub fn sign_hash(key: &SigningKey, hash: B256) -> Result<Vec<u8>, k256::ecdsa::Error> {
    let (signature, recovery): (k256::ecdsa::Signature, _) =
        key.sign_prehash_recoverable(hash.as_slice())?;

    let mut out = signature.to_bytes().to_vec();
    out.push(recovery.to_byte() + 27);

    Ok(out)
}

/// Recovers the signer address of a [`sign_hash`]-style signature.
pub fn recover_signer(signature: &[u8], hash: B256) -> Result<Address, SignatureError> {
    use k256::ecdsa::{RecoveryId, Signature as Sig, VerifyingKey};

    let sig = Sig::try_from(signature.get(..64).ok_or(SignatureError::Length)?)
        .map_err(|_| SignatureError::Malformed)?;
    let recovery = RecoveryId::try_from(signature.get(64).ok_or(SignatureError::Length)? % 27)
        .map_err(|_| SignatureError::Malformed)?;

    let recovered_key = VerifyingKey::recover_from_prehash(hash.as_slice(), &sig, recovery)
        .map_err(|_| SignatureError::Recovery)?;

    Ok(Address::from_public_key(&recovered_key))
}
