use {
    crate::{
        channels::ChannelStore,
        contract::{ChannelTx, ContractClient},
        error::{ClientError, Fallback, FallbackReason},
        session::SessionManager,
        signer::TypedDataSigner,
        websocket::{Client, CloseFrame, ConnectionHandler, ReconnectPolicy},
        ConfigError,
        YellowConfig,
    },
    clearnode_rpc::{
        domain::{Address, Amount, Channel, ChannelId, ChannelStatus, IntentId, StateIntent, U256},
        event::{map_event_name, ExecutionStatus},
        rpc::{
            ChannelResponse,
            CloseChannel,
            CreateChannel,
            GetLedgerBalances,
            Notification,
            RequestPayload,
            ResizeChannel,
            Transfer,
        },
    },
    std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    tokio::sync::broadcast,
};

mod intent;

/// Events emitted by the provider, derived from relay messages through the
/// event mapper.
#[derive(Debug, Clone)]
pub enum YellowEvent {
    Connected,
    Disconnected,
    ChannelChanged(Channel),
    IntentStatus {
        status: ExecutionStatus,
        is_terminal: bool,
        intent_id: Option<IntentId>,
    },
}

/// Relay-side updates fanned out to in-flight operations.
#[derive(Debug, Clone)]
pub(crate) enum RelayUpdate {
    Notification(Notification),
    Connected,
    Down,
}

/// Parameters of [`YellowProvider::transfer`].
#[derive(Debug, Clone)]
pub struct TransferParams {
    pub channel_id: ChannelId,
    pub to: Address,
    pub amount: Amount,
}

struct ProviderHandler {
    channels: Arc<ChannelStore>,
    session: Arc<SessionManager>,
    events_tx: broadcast::Sender<YellowEvent>,
    updates_tx: broadcast::Sender<RelayUpdate>,
    available: Arc<AtomicBool>,
}

impl ConnectionHandler for ProviderHandler {
    fn connected(&mut self) {
        self.available.store(true, Ordering::SeqCst);
        // A freshly established socket is unauthenticated, whether this is
        // the first connect or a reconnect.
        self.session.invalidate();
        self.events_tx.send(YellowEvent::Connected).ok();
        self.updates_tx.send(RelayUpdate::Connected).ok();
    }

    fn disconnected(&mut self, _frame: Option<CloseFrame<'static>>) {
        self.available.store(false, Ordering::SeqCst);
        self.session.invalidate();
        self.events_tx.send(YellowEvent::Disconnected).ok();
        self.updates_tx.send(RelayUpdate::Down).ok();
    }

    fn notification(&mut self, notification: Notification) {
        if let Some(channel) = notification.channel() {
            match self.channels.update(channel.clone()) {
                Ok(()) => {
                    self.events_tx
                        .send(YellowEvent::ChannelChanged(channel.clone()))
                        .ok();
                }

                Err(error) => {
                    tracing::warn!(%error, "ignoring malformed channel notification");
                }
            }
        } else {
            let mapped = map_event_name(notification.method());

            if mapped.status != ExecutionStatus::Unknown {
                self.events_tx
                    .send(YellowEvent::IntentStatus {
                        status: mapped.status,
                        is_terminal: mapped.is_terminal,
                        intent_id: notification.intent_id().cloned(),
                    })
                    .ok();
            }
        }

        self.updates_tx
            .send(RelayUpdate::Notification(notification))
            .ok();
    }

    fn inbound_error(&mut self, error: ClientError) {
        tracing::warn!(%error, "relay inbound error");
    }

    fn outbound_error(&mut self, error: ClientError) {
        tracing::warn!(%error, "relay outbound error");
    }
}

/// The user-facing provider.
///
/// Composes the relay connection, the session-key manager, the channel cache
/// and the on-chain contract client behind a uniform surface whose semantic
/// failures are reported as [`Fallback`] values rather than raised.
pub struct YellowProvider {
    pub(crate) config: YellowConfig,
    pub(crate) client: Client,
    pub(crate) session: Arc<SessionManager>,
    pub(crate) channels: Arc<ChannelStore>,
    pub(crate) contract: Arc<dyn ContractClient>,
    pub(crate) wallet: Arc<dyn TypedDataSigner>,
    events_tx: broadcast::Sender<YellowEvent>,
    pub(crate) updates_tx: broadcast::Sender<RelayUpdate>,
    available: Arc<AtomicBool>,
}

impl YellowProvider {
    /// Creates a provider from a validated configuration. Configuration
    /// problems are programmer errors and fail construction.
    pub fn new(
        config: YellowConfig,
        wallet: Arc<dyn TypedDataSigner>,
        contract: Arc<dyn ContractClient>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let session = Arc::new(SessionManager::new(&config));
        let channels = Arc::new(ChannelStore::new());
        let (events_tx, _) = broadcast::channel(64);
        let (updates_tx, _) = broadcast::channel(256);
        let available = Arc::new(AtomicBool::new(false));

        let client = Client::new(
            ProviderHandler {
                channels: channels.clone(),
                session: session.clone(),
                events_tx: events_tx.clone(),
                updates_tx: updates_tx.clone(),
                available: available.clone(),
            },
            ReconnectPolicy {
                initial_delay: config.reconnect_initial_delay,
                max_attempts: config.max_reconnect_attempts,
            },
        );

        Ok(Self {
            config,
            client,
            session,
            channels,
            contract,
            wallet,
            events_tx,
            updates_tx,
            available,
        })
    }

    /// Subscribes to provider events.
    pub fn events(&self) -> broadcast::Receiver<YellowEvent> {
        self.events_tx.subscribe()
    }

    /// Whether the relay connection is currently usable.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Opens the relay connection and authenticates.
    pub async fn connect(&self) -> Result<(), Fallback> {
        let request = self.config.ws_request().map_err(|err| {
            Fallback::with_cause(
                FallbackReason::YellowUnavailable,
                "failed to build the relay request",
                err,
            )
        })?;

        self.client.connect(request).await.map_err(|err| {
            Fallback::with_cause(
                FallbackReason::YellowUnavailable,
                "failed to reach the relay",
                err,
            )
        })?;

        self.session
            .ensure(&self.client, self.wallet.as_ref(), self.config.rpc_timeout)
            .await
    }

    /// Closes the relay connection, dropping the session key and the channel
    /// cache.
    pub async fn disconnect(&self) -> Result<(), Fallback> {
        self.client.disconnect().await.ok();
        self.session.invalidate();
        self.channels.clear();

        Ok(())
    }

    pub(crate) async fn ready(&self) -> Result<(), Fallback> {
        if !self.is_available() {
            return Err(Fallback::new(
                FallbackReason::YellowUnavailable,
                "relay connection is down",
            ));
        }

        self.session
            .ensure(&self.client, self.wallet.as_ref(), self.config.rpc_timeout)
            .await
    }

    /// Sends a request and awaits its response under the configured deadline.
    pub(crate) async fn call<T>(&self, payload: T) -> Result<T::Response, Fallback>
    where
        T: RequestPayload,
    {
        payload.validate().map_err(Fallback::from)?;

        let response = self.client.request(payload);

        match tokio::time::timeout(self.config.rpc_timeout, response).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(Fallback::from(ClientError::ResponseTimeout)),
        }
    }

    fn cache(&self, channel: Channel) -> Result<(), Fallback> {
        self.channels.update(channel.clone()).map_err(|err| {
            Fallback::with_cause(
                FallbackReason::YellowUnavailable,
                "relay returned a malformed channel",
                err,
            )
        })?;

        self.events_tx
            .send(YellowEvent::ChannelChanged(channel))
            .ok();

        Ok(())
    }

    fn channel_tx(&self, channel: &Channel, intent: StateIntent, signatures: Vec<String>) -> ChannelTx {
        ChannelTx {
            channel_id: channel.channel_id.clone(),
            token: channel.token,
            chain_id: channel.chain_id,
            intent,
            allocations: channel.allocations.clone(),
            challenge_duration: self.config.challenge_duration(),
            state_signatures: signatures,
        }
    }

    async fn channel_snapshot(&self, channel_id: &ChannelId) -> Result<Channel, Fallback> {
        match self.channels.get(channel_id) {
            Some(channel) => Ok(channel),
            None => {
                self.channels
                    .read_on_chain(self.contract.as_ref(), channel_id)
                    .await
            }
        }
    }

    /// Opens a channel: negotiates it with the relay, submits the on-chain
    /// creation transaction, awaits its receipt and caches the result.
    pub async fn create_channel(&self, params: CreateChannel) -> Result<Channel, Fallback> {
        self.ready().await?;

        let ChannelResponse {
            mut channel,
            signatures,
        } = self.call(params).await?;

        let outcome = self
            .contract
            .create_channel(self.channel_tx(&channel, StateIntent::Initialize, signatures))
            .await
            .map_err(Fallback::from)?;

        channel.tx_hash = Some(outcome.tx_hash);
        self.cache(channel.clone())?;

        tracing::info!(channel = %channel.channel_id, tx = %outcome.tx_hash, "channel created");

        Ok(channel)
    }

    /// Grows a channel allocation. The relay acknowledges the new state
    /// first, then the resize transaction is submitted on-chain.
    pub async fn resize_channel(&self, params: ResizeChannel) -> Result<Channel, Fallback> {
        let delta = params.delta.parse().map_err(|err| {
            Fallback::with_cause(FallbackReason::MissingParams, "invalid resize delta", err)
        })?;

        self.ready().await?;

        let current = self.channel_snapshot(&params.channel_id).await?;

        let unified = self.unified_balance(current.token, current.chain_id).await?;
        if delta > unified {
            return Err(Fallback::new(
                FallbackReason::InsufficientBalance,
                format!("resize delta {delta} exceeds the unified balance {unified}"),
            ));
        }

        let ChannelResponse {
            mut channel,
            signatures,
        } = self.call(params).await?;

        let outcome = self
            .contract
            .resize(self.channel_tx(&channel, StateIntent::Resize, signatures))
            .await
            .map_err(Fallback::from)?;

        channel.tx_hash = Some(outcome.tx_hash);
        self.cache(channel.clone())?;

        Ok(channel)
    }

    /// Cooperatively closes a channel and optionally withdraws the final
    /// allocation from custody. Refused while the channel is disputed.
    pub async fn close_channel(&self, params: CloseChannel) -> Result<Channel, Fallback> {
        if let Some(cached) = self.channels.get(&params.channel_id) {
            if cached.status == ChannelStatus::Dispute {
                return Err(Fallback::new(
                    FallbackReason::YellowChannelDispute,
                    "channel is in dispute; wait for the challenge to resolve",
                ));
            }
        }

        self.ready().await?;

        let withdraw = params.withdraw;

        let ChannelResponse {
            mut channel,
            signatures,
        } = self.call(params).await?;

        let outcome = self
            .contract
            .close(self.channel_tx(&channel, StateIntent::Finalize, signatures))
            .await
            .map_err(Fallback::from)?;

        if withdraw {
            self.contract
                .withdraw(&channel.channel_id, channel.token)
                .await
                .map_err(Fallback::from)?;
        }

        channel.status = ChannelStatus::Final;
        channel.tx_hash = Some(outcome.tx_hash);
        self.cache(channel.clone())?;

        Ok(channel)
    }

    /// Sends an off-chain transfer signed with the session key. The
    /// allocation check runs against the cached channel state only: an
    /// over-allocated transfer, or one against a channel the cache does not
    /// know, is refused without contacting the relay or the chain.
    pub async fn transfer(&self, params: TransferParams) -> Result<Channel, Fallback> {
        let amount = params.amount.parse().map_err(|err| {
            Fallback::with_cause(FallbackReason::MissingParams, "invalid transfer amount", err)
        })?;

        let Some(channel) = self.channels.get(&params.channel_id) else {
            return Err(Fallback::new(
                FallbackReason::YellowUnavailable,
                format!("channel {} is not in the local cache", params.channel_id),
            ));
        };

        let available = channel.allocation_of(self.wallet.address()).map_err(|err| {
            Fallback::with_cause(
                FallbackReason::YellowUnavailable,
                "cached channel holds malformed allocations",
                err,
            )
        })?;

        if amount > available {
            return Err(Fallback::new(
                FallbackReason::InsufficientChannelBalance,
                format!("transfer amount {amount} exceeds the sender allocation {available}"),
            ));
        }

        self.ready().await?;

        let digest = Transfer::digest(&params.channel_id, params.to, &params.amount);
        let signature = self.session.sign(digest)?;

        let response = self
            .call(Transfer {
                channel_id: params.channel_id,
                to: params.to,
                amount: params.amount,
                signature,
            })
            .await?;

        self.cache(response.channel.clone())?;

        Ok(response.channel)
    }

    /// Lists known channels, preferring the relay ledger and falling back to
    /// on-chain reads while disconnected.
    pub async fn get_channels(&self) -> Result<Vec<Channel>, Fallback> {
        if self.is_available() {
            self.ready().await?;

            let response = self
                .call(GetLedgerBalances {
                    participant: self.wallet.address(),
                })
                .await?;

            let mut channels = Vec::with_capacity(response.channels.len());

            for channel in response.channels {
                match self.channels.update(channel.clone()) {
                    Ok(()) => channels.push(channel),
                    Err(error) => {
                        tracing::warn!(%error, "skipping malformed channel from relay");
                    }
                }
            }

            return Ok(channels);
        }

        let mut channels = Vec::new();

        for cached in self.channels.all() {
            channels.push(
                self.channels
                    .read_on_chain(self.contract.as_ref(), &cached.channel_id)
                    .await?,
            );
        }

        Ok(channels)
    }

    /// Reads the authoritative on-chain state of a channel.
    pub async fn get_channel_state(&self, channel_id: &ChannelId) -> Result<Channel, Fallback> {
        self.channels
            .read_on_chain(self.contract.as_ref(), channel_id)
            .await
    }

    /// Unified balance for `(token, chain_id)`: the relay ledger when it
    /// responds, the custody contract when the ledger is unreachable.
    pub(crate) async fn unified_balance(
        &self,
        token: Address,
        chain_id: u64,
    ) -> Result<U256, Fallback> {
        let response = match self
            .call(GetLedgerBalances {
                participant: self.wallet.address(),
            })
            .await
        {
            Ok(response) => response,

            Err(fallback)
                if matches!(
                    fallback.reason,
                    FallbackReason::YellowUnavailable | FallbackReason::YellowTimeout
                ) =>
            {
                tracing::debug!(%fallback, "relay ledger unreachable, reading balances on-chain");

                return self.unified_balance_on_chain(token, chain_id).await;
            }

            Err(fallback) => return Err(fallback),
        };

        let mut total = U256::ZERO;

        for balance in response.balances {
            if balance.token == token && balance.chain_id == chain_id {
                total = total.saturating_add(balance.amount.parse().unwrap_or(U256::ZERO));
            }
        }

        Ok(total)
    }

    /// Sums the caller's on-chain allocations across the cached channels for
    /// the given token and chain.
    async fn unified_balance_on_chain(
        &self,
        token: Address,
        chain_id: u64,
    ) -> Result<U256, Fallback> {
        let wallet = self.wallet.address();
        let mut total = U256::ZERO;

        for cached in self.channels.all() {
            if cached.token != token || cached.chain_id != chain_id {
                continue;
            }

            let channel = self
                .channels
                .read_on_chain(self.contract.as_ref(), &cached.channel_id)
                .await?;

            let allocation = channel.allocation_of(wallet).map_err(|err| {
                Fallback::with_cause(
                    FallbackReason::YellowUnavailable,
                    "custody contract returned malformed balances",
                    err,
                )
            })?;

            total = total.saturating_add(allocation);
        }

        Ok(total)
    }
}
