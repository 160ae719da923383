//! PoolSync: batched, defensive retrieval of liquidity pool state
//!
//! An adapter describes the calls one pool family needs. The batch driver runs an adapter over an
//! ordered list of addresses and returns an index aligned result where every entry is either a
//! fully populated pool or a sentinel. `PoolSync` shards large address lists across many batches.

pub use batch::{execute_batch, execute_packed, BatchConfig, BatchRequest, BatchResult};
pub use builder::PoolSyncBuilder;
pub use chain::Chain;
pub use errors::{BatchError, FetchError, PoolSyncError, SkipReason};
pub use factory::FactoryPager;
pub use packer::{pack, unpack};
pub use pool_sync::PoolSync;
pub use pools::{
    BalancerV2Pool, CurvePool, MaverickPool, Pool, PoolAdapter, PoolKind, PoolStructure, PoolType,
    Slot0Layout, TickSource, TickWindowPool, UniswapV2Pool, UniswapV3Pool,
};
pub use reader::{CallOutcome, RpcReader, StateReader};
pub use validator::CallBudget;

pub mod batch;
mod builder;
mod chain;
pub mod errors;
pub mod factory;
pub mod names;
pub mod packer;
mod pool_sync;
pub mod pools;
pub mod reader;
mod util;
pub mod validator;

#[cfg(test)]
mod tests;
