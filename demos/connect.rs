use {
    async_trait::async_trait,
    clearnode_rpc::domain::{Address, ChannelId},
    std::sync::Arc,
    structopt::StructOpt,
    yellow_client::{
        ChannelTx,
        ContractClient,
        ContractError,
        LocalWallet,
        OnChainBalance,
        TxOutcome,
        TypedDataSigner,
        YellowConfig,
        YellowProvider,
    },
};

#[derive(StructOpt)]
struct Args {
    /// Specify the ClearNode websocket address.
    #[structopt(short, long, default_value = "wss://clearnet-sandbox.yellow.com/ws")]
    address: String,

    /// Chain ID of the custody deployment.
    #[structopt(short, long, default_value = "11155111")]
    chain_id: u64,
}

/// Stub chain client; the demo only exercises the relay-side flows.
struct OfflineChain {
    chain_id: u64,
}

#[async_trait]
impl ContractClient for OfflineChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn create_channel(&self, _tx: ChannelTx) -> Result<TxOutcome, ContractError> {
        Err(ContractError::Rpc("demo runs without a chain connection".into()))
    }

    async fn resize(&self, _tx: ChannelTx) -> Result<TxOutcome, ContractError> {
        Err(ContractError::Rpc("demo runs without a chain connection".into()))
    }

    async fn close(&self, _tx: ChannelTx) -> Result<TxOutcome, ContractError> {
        Err(ContractError::Rpc("demo runs without a chain connection".into()))
    }

    async fn withdraw(
        &self,
        _channel_id: &ChannelId,
        _token: Address,
    ) -> Result<TxOutcome, ContractError> {
        Err(ContractError::Rpc("demo runs without a chain connection".into()))
    }

    async fn read_balances(
        &self,
        _channel_id: &ChannelId,
    ) -> Result<Vec<OnChainBalance>, ContractError> {
        Err(ContractError::Rpc("demo runs without a chain connection".into()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::from_args();

    let wallet = Arc::new(LocalWallet::random());
    println!("owner wallet: {}", wallet.address());

    let config = YellowConfig::new(
        Address::repeat_byte(0x11),
        Address::repeat_byte(0x22),
        args.chain_id,
        "http://localhost:8545",
    )
    .with_relay_url(args.address.as_str());

    let provider = YellowProvider::new(
        config,
        wallet,
        Arc::new(OfflineChain {
            chain_id: args.chain_id,
        }),
    )?;

    let mut events = provider.events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("event: {event:?}");
        }
    });

    provider.connect().await?;
    println!("connected and authenticated");

    let channels = provider.get_channels().await?;
    println!("known channels: {}", channels.len());

    for channel in channels {
        println!("  {} [{}]", channel.channel_id, channel.status);
    }

    provider.disconnect().await.ok();

    Ok(())
}
