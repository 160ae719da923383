use anyhow::{Context, Result};
use pool_sync::{BatchConfig, Chain, FactoryPager, PoolSync, PoolType, RpcReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let chain: Chain = std::env::var("CHAIN")
        .unwrap_or_else(|_| "ethereum".to_string())
        .parse()?;

    // pin every read to one block so all batches observe the same state
    let mut reader = RpcReader::from_env()?;
    if let Ok(block) = std::env::var("BLOCK") {
        reader = reader.at_block(block.parse()?);
    }

    let pool_sync = PoolSync::builder()
        .chain(chain)
        .rate_limit(20)
        .build()?;

    // page the first few hundred pairs straight out of the factory
    let factory = chain
        .factory(&PoolType::UniswapV2)
        .context("no UniswapV2 factory on this chain")?;
    let pairs = FactoryPager::new(factory, BatchConfig::default())
        .get_range(&reader, 0, 200)
        .await?;
    let sample: Vec<_> = pairs.into_iter().flatten().collect();

    let result = pool_sync
        .sync_pools(&reader, PoolType::UniswapV2, &sample)
        .await?;

    println!(
        "Synced {} of {} pools",
        result.synced(),
        result.len()
    );
    let pools = result.into_pools();
    println!("{}", serde_json::to_string_pretty(&pools[..pools.len().min(3)])?);
    Ok(())
}
