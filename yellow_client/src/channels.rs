use {
    crate::{
        contract::{ContractClient, OnChainBalance},
        error::{Fallback, FallbackReason},
    },
    clearnode_rpc::domain::{
        Address,
        Amount,
        Channel,
        ChannelId,
        ChannelStatus,
        InvalidChannel,
        U256,
    },
    std::{
        collections::HashMap,
        sync::{Mutex, MutexGuard},
    },
};

/// In-memory cache of channel states, keyed by channel id.
///
/// The cache is authoritative for what the relay has told us; on-chain reads
/// through [`ChannelStore::read_on_chain`] are authoritative for finality.
#[derive(Debug, Default)]
pub struct ChannelStore {
    inner: Mutex<HashMap<ChannelId, Channel>>,
}

impl ChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, HashMap<ChannelId, Channel>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Inserts or replaces a channel. Values violating the structural
    /// invariant are rejected.
    pub fn update(&self, channel: Channel) -> Result<(), InvalidChannel> {
        channel.validate()?;

        self.inner().insert(channel.channel_id.clone(), channel);

        Ok(())
    }

    pub fn get(&self, channel_id: &ChannelId) -> Option<Channel> {
        self.inner().get(channel_id).cloned()
    }

    pub fn all(&self) -> Vec<Channel> {
        self.inner().values().cloned().collect()
    }

    /// Finds a cached ACTIVE channel for the given token and chain.
    pub fn find_open(&self, token: Address, chain_id: u64) -> Option<Channel> {
        self.inner()
            .values()
            .filter(|channel| {
                channel.status == ChannelStatus::Active
                    && channel.token == token
                    && channel.chain_id == chain_id
            })
            .min_by(|a, b| a.channel_id.as_ref().cmp(b.channel_id.as_ref()))
            .cloned()
    }

    pub fn clear(&self) {
        self.inner().clear();
    }

    /// Reconstructs a minimal channel from the custody contract balances,
    /// used when the relay is unreachable. The result refreshes the cache.
    pub async fn read_on_chain(
        &self,
        contract: &dyn ContractClient,
        channel_id: &ChannelId,
    ) -> Result<Channel, Fallback> {
        let balances = contract
            .read_balances(channel_id)
            .await
            .map_err(Fallback::from)?;

        let channel = channel_from_balances(channel_id.clone(), contract.chain_id(), balances)?;

        self.inner().insert(channel_id.clone(), channel.clone());

        Ok(channel)
    }
}

fn channel_from_balances(
    channel_id: ChannelId,
    chain_id: u64,
    balances: Vec<OnChainBalance>,
) -> Result<Channel, Fallback> {
    let Some(first) = balances.first() else {
        return Err(Fallback::new(
            FallbackReason::YellowUnavailable,
            format!("custody contract has no balances for channel {channel_id}"),
        ));
    };

    let token = first.token;
    let total: U256 = balances
        .iter()
        .fold(U256::ZERO, |acc, balance| acc.saturating_add(balance.amount));

    // Zero collateral means the channel was settled and withdrawn.
    let status = if total.is_zero() {
        ChannelStatus::Final
    } else {
        ChannelStatus::Active
    };

    Ok(Channel {
        channel_id,
        status,
        allocations: balances
            .into_iter()
            .map(|balance| clearnode_rpc::domain::Allocation {
                destination: balance.destination,
                token: balance.token,
                amount: Amount::from_u256(balance.amount),
            })
            .collect(),
        token,
        chain_id,
        tx_hash: None,
    })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::contract::{ChannelTx, ContractError, TxOutcome},
        async_trait::async_trait,
        clearnode_rpc::domain::Allocation,
    };

    fn channel(id: &str, status: ChannelStatus, token: Address, chain_id: u64) -> Channel {
        Channel {
            channel_id: id.into(),
            status,
            allocations: vec![Allocation {
                destination: Address::repeat_byte(0xaa),
                token,
                amount: "1000".into(),
            }],
            token,
            chain_id,
            tx_hash: None,
        }
    }

    struct StaticBalances {
        chain_id: u64,
        balances: Vec<OnChainBalance>,
    }

    #[async_trait]
    impl ContractClient for StaticBalances {
        fn chain_id(&self) -> u64 {
            self.chain_id
        }

        async fn create_channel(&self, _tx: ChannelTx) -> Result<TxOutcome, ContractError> {
            Err(ContractError::Rpc("not supported".into()))
        }

        async fn resize(&self, _tx: ChannelTx) -> Result<TxOutcome, ContractError> {
            Err(ContractError::Rpc("not supported".into()))
        }

        async fn close(&self, _tx: ChannelTx) -> Result<TxOutcome, ContractError> {
            Err(ContractError::Rpc("not supported".into()))
        }

        async fn withdraw(
            &self,
            _channel_id: &ChannelId,
            _token: Address,
        ) -> Result<TxOutcome, ContractError> {
            Err(ContractError::Rpc("not supported".into()))
        }

        async fn read_balances(
            &self,
            _channel_id: &ChannelId,
        ) -> Result<Vec<OnChainBalance>, ContractError> {
            Ok(self.balances.clone())
        }
    }

    #[test]
    fn update_get_and_clear() {
        let store = ChannelStore::new();
        let token = Address::repeat_byte(0x11);

        store
            .update(channel("ch-1", ChannelStatus::Active, token, 1))
            .unwrap();

        assert_eq!(store.get(&"ch-1".into()).unwrap().status, ChannelStatus::Active);
        assert_eq!(store.all().len(), 1);

        store.clear();
        assert!(store.get(&"ch-1".into()).is_none());
    }

    #[test]
    fn rejects_structurally_invalid_channels() {
        let store = ChannelStore::new();

        let mut invalid = channel("ch-1", ChannelStatus::Active, Address::repeat_byte(0x11), 1);
        invalid.allocations.clear();

        assert!(store.update(invalid).is_err());
        assert!(store.get(&"ch-1".into()).is_none());
    }

    #[test]
    fn find_open_matches_token_chain_and_status() {
        let store = ChannelStore::new();
        let token = Address::repeat_byte(0x11);
        let other_token = Address::repeat_byte(0x22);

        store
            .update(channel("ch-initial", ChannelStatus::Initial, token, 1))
            .unwrap();
        store
            .update(channel("ch-other-token", ChannelStatus::Active, other_token, 1))
            .unwrap();
        store
            .update(channel("ch-other-chain", ChannelStatus::Active, token, 2))
            .unwrap();
        store
            .update(channel("ch-match", ChannelStatus::Active, token, 1))
            .unwrap();

        let found = store.find_open(token, 1).unwrap();
        assert_eq!(found.channel_id, "ch-match".into());

        assert!(store.find_open(other_token, 2).is_none());
    }

    #[tokio::test]
    async fn read_on_chain_reconstructs_and_caches() {
        let store = ChannelStore::new();
        let token = Address::repeat_byte(0x11);

        let contract = StaticBalances {
            chain_id: 137,
            balances: vec![
                OnChainBalance {
                    destination: Address::repeat_byte(0xaa),
                    token,
                    amount: U256::from(700),
                },
                OnChainBalance {
                    destination: Address::repeat_byte(0xbb),
                    token,
                    amount: U256::from(300),
                },
            ],
        };

        let channel = store.read_on_chain(&contract, &"ch-1".into()).await.unwrap();

        assert_eq!(channel.status, ChannelStatus::Active);
        assert_eq!(channel.chain_id, 137);
        assert_eq!(channel.allocations.len(), 2);
        assert_eq!(channel.allocation_of(Address::repeat_byte(0xaa)).unwrap(), U256::from(700));

        // Cache was refreshed.
        assert_eq!(store.get(&"ch-1".into()).unwrap(), channel);
    }

    #[tokio::test]
    async fn read_on_chain_marks_drained_channels_final() {
        let store = ChannelStore::new();

        let contract = StaticBalances {
            chain_id: 1,
            balances: vec![OnChainBalance {
                destination: Address::repeat_byte(0xaa),
                token: Address::repeat_byte(0x11),
                amount: U256::ZERO,
            }],
        };

        let channel = store.read_on_chain(&contract, &"ch-1".into()).await.unwrap();

        assert_eq!(channel.status, ChannelStatus::Final);
    }

    #[tokio::test]
    async fn read_on_chain_requires_balances() {
        let store = ChannelStore::new();

        let contract = StaticBalances {
            chain_id: 1,
            balances: vec![],
        };

        let err = store
            .read_on_chain(&contract, &"ch-missing".into())
            .await
            .unwrap_err();

        assert_eq!(err.reason, FallbackReason::YellowUnavailable);
    }
}
