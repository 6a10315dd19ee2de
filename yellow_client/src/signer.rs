use {
    async_trait::async_trait,
    clearnode_rpc::{
        auth::{k256::ecdsa::SigningKey, key_address, sign_hash, TypedData},
        domain::Address,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Signing rejected: {0}")]
    Rejected(String),

    #[error("Signing failed: {0}")]
    Signature(#[from] clearnode_rpc::auth::k256::ecdsa::Error),
}

/// The owner wallet, reduced to the single capability this client needs:
/// signing EIP-712 typed data.
#[async_trait]
pub trait TypedDataSigner: Send + Sync {
    /// The wallet address authority is delegated from.
    fn address(&self) -> Address;

    /// Signs the typed-data payload, returning a 65-byte `r || s || v`
    /// signature.
    async fn sign_typed_data(&self, payload: &TypedData) -> Result<Vec<u8>, SignerError>;
}

/// In-process wallet backed by a raw secp256k1 key.
pub struct LocalWallet {
    key: SigningKey,
}

impl LocalWallet {
    pub fn random() -> Self {
        Self {
            key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    pub fn from_signing_key(key: SigningKey) -> Self {
        Self { key }
    }
}

#[async_trait]
impl TypedDataSigner for LocalWallet {
    fn address(&self) -> Address {
        key_address(&self.key)
    }

    async fn sign_typed_data(&self, payload: &TypedData) -> Result<Vec<u8>, SignerError> {
        Ok(sign_hash(&self.key, payload.signing_hash)?)
    }
}
