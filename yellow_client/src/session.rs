use {
    crate::{
        error::{Fallback, FallbackReason},
        signer::TypedDataSigner,
        websocket::{Client, ResponseFuture},
        YellowConfig,
    },
    clearnode_rpc::{
        auth::{
            k256::ecdsa::SigningKey,
            key_address,
            session_typed_data,
            sign_hash,
            Allowance,
            AuthRequest,
            AuthVerify,
        },
        domain::{hex, Address, B256},
        rpc::RequestPayload,
    },
    std::{
        sync::{Arc, Mutex, MutexGuard},
        time::Duration,
    },
};

pub(crate) fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

struct SessionState {
    key: SigningKey,
    address: Address,
    expiry: u64,
    clearnode: Address,
}

/// Manages the ephemeral session key: generates a fresh keypair for each
/// handshake, runs the challenge/verify exchange against the relay on behalf
/// of the owner wallet, tracks expiry and re-authenticates lazily.
pub struct SessionManager {
    scope: Arc<str>,
    session_ttl_secs: u64,
    chain_id: u64,
    allowances: Vec<Allowance>,
    state: Mutex<Option<SessionState>>,
    handshake: tokio::sync::Mutex<()>,
}

impl SessionManager {
    pub fn new(config: &YellowConfig) -> Self {
        Self {
            scope: config.auth_scope.clone(),
            session_ttl_secs: u64::from(config.session_expiry_secs),
            chain_id: config.chain_id,
            allowances: config.allowances.clone(),
            state: Mutex::new(None),
            handshake: tokio::sync::Mutex::new(()),
        }
    }

    fn state(&self) -> MutexGuard<'_, Option<SessionState>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Whether an unexpired authenticated session exists.
    pub fn is_authenticated(&self) -> bool {
        self.state()
            .as_ref()
            .is_some_and(|state| state.expiry > unix_now())
    }

    pub fn session_address(&self) -> Option<Address> {
        self.state().as_ref().map(|state| state.address)
    }

    /// The ClearNode participant address learned during the handshake.
    pub fn clearnode_address(&self) -> Option<Address> {
        self.state().as_ref().map(|state| state.clearnode)
    }

    pub fn invalidate(&self) {
        *self.state() = None;
    }

    /// Signs a digest with the session key, hex-encoded for the wire.
    pub fn sign(&self, digest: B256) -> Result<String, Fallback> {
        let guard = self.state();

        let Some(state) = guard.as_ref() else {
            return Err(Fallback::new(
                FallbackReason::YellowAuthFailed,
                "no active session",
            ));
        };

        let signature = sign_hash(&state.key, digest).map_err(|err| {
            Fallback::with_cause(
                FallbackReason::YellowAuthFailed,
                "session key failed to sign",
                err,
            )
        })?;

        Ok(hex::encode_prefixed(signature))
    }

    /// Ensures an authenticated, unexpired session, transparently running the
    /// handshake when there is none. At most one handshake is in flight at a
    /// time; concurrent callers wait for the winner.
    pub async fn ensure(
        &self,
        client: &Client,
        wallet: &dyn TypedDataSigner,
        timeout: Duration,
    ) -> Result<(), Fallback> {
        if self.is_authenticated() {
            return Ok(());
        }

        let _flight = self.handshake.lock().await;

        if self.is_authenticated() {
            return Ok(());
        }

        self.authenticate(client, wallet, timeout).await
    }

    async fn authenticate(
        &self,
        client: &Client,
        wallet: &dyn TypedDataSigner,
        timeout: Duration,
    ) -> Result<(), Fallback> {
        let key = SigningKey::random(&mut rand::thread_rng());
        let session_address = key_address(&key);
        let wallet_address = wallet.address();
        let expire = unix_now() + self.session_ttl_secs;

        tracing::debug!(%session_address, "starting auth handshake");

        let challenge = await_handshake(
            client.request(AuthRequest {
                wallet: wallet_address,
                session_key: session_address,
                allowances: self.allowances.clone(),
                expire,
                scope: self.scope.clone(),
            }),
            timeout,
        )
        .await?;

        let typed = session_typed_data(
            &challenge.challenge,
            &self.scope,
            wallet_address,
            session_address,
            expire,
            self.chain_id,
        );

        let signature = wallet.sign_typed_data(&typed).await.map_err(Fallback::from)?;

        let confirmation = await_handshake(
            client.request(AuthVerify {
                challenge: challenge.challenge.clone(),
                signature: hex::encode_prefixed(signature),
            }),
            timeout,
        )
        .await?;

        *self.state() = Some(SessionState {
            key,
            address: session_address,
            expiry: expire,
            clearnode: confirmation.address,
        });

        tracing::info!(%session_address, "session authenticated");

        Ok(())
    }
}

async fn await_handshake<T>(
    response: ResponseFuture<T>,
    timeout: Duration,
) -> Result<T::Response, Fallback>
where
    T: RequestPayload,
{
    match tokio::time::timeout(timeout, response).await {
        Ok(Ok(response)) => Ok(response),

        Ok(Err(err)) => Err(Fallback::with_cause(
            FallbackReason::YellowAuthFailed,
            "authentication handshake failed",
            err,
        )),

        Err(_) => Err(Fallback::new(
            FallbackReason::YellowAuthFailed,
            "authentication handshake timed out",
        )),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashSet};

    #[test]
    fn generated_session_addresses_are_distinct() {
        let mut addresses = HashSet::new();

        for _ in 0..100 {
            let key = SigningKey::random(&mut rand::thread_rng());

            assert!(addresses.insert(key_address(&key)));
        }
    }

    #[test]
    fn expired_session_is_not_authenticated() {
        let config = YellowConfig::new(
            Address::repeat_byte(0x11),
            Address::repeat_byte(0x22),
            1,
            "http://localhost:8545",
        );

        let manager = SessionManager::new(&config);
        assert!(!manager.is_authenticated());

        let key = SigningKey::random(&mut rand::thread_rng());
        let address = key_address(&key);

        *manager.state() = Some(SessionState {
            key,
            address,
            expiry: unix_now() - 1,
            clearnode: Address::repeat_byte(0x33),
        });

        assert!(!manager.is_authenticated());
        assert_eq!(manager.session_address(), Some(address));

        manager.invalidate();
        assert!(manager.session_address().is_none());
    }

    #[test]
    fn signing_without_a_session_fails_with_auth_reason() {
        let config = YellowConfig::new(
            Address::repeat_byte(0x11),
            Address::repeat_byte(0x22),
            1,
            "http://localhost:8545",
        );

        let manager = SessionManager::new(&config);
        let err = manager.sign(B256::random()).unwrap_err();

        assert_eq!(err.reason, FallbackReason::YellowAuthFailed);
    }
}
