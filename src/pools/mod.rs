//! Core definitions for pool synchronization
//!
//! `PoolType` names the protocols that can be synced. Dexes often take an entire codebase, change
//! a fee, and ship it under a new name, so many pool types share one on-chain shape. Each shape is
//! a `PoolAdapter` variant: the calls it issues, how each result is decoded, and the record it
//! produces. Records are collected in the `Pool` enum.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chain::Chain;
use crate::errors::{FetchError, PoolSyncError};
use crate::reader::StateReader;
use crate::validator::FetchContext;

pub mod abi;
pub mod pool_structures;
pub mod tick_window;

pub use pool_structures::balancer_v2_structure::BalancerV2Pool;
pub use pool_structures::curve_structure::{CurveCoins, CurvePool};
pub use pool_structures::maverick_structure::MaverickPool;
pub use pool_structures::tick_window_structure::TickWindowPool;
pub use pool_structures::v2_structure::UniswapV2Pool;
pub use pool_structures::v3_structure::UniswapV3Pool;
pub use pool_structures::PoolStructure;

/// Enumerates the supported pool types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolType {
    UniswapV2,
    SushiSwapV2,
    PancakeSwapV2,
    BaseSwapV2,

    UniswapV3,
    SushiSwapV3,
    PancakeSwapV3,
    Slipstream,

    MaverickV2,

    CurveTwoCrypto,
    CurveTriCrypto,

    BalancerV2,
}

impl PoolType {
    pub fn is_v2(&self) -> bool {
        matches!(
            self,
            PoolType::UniswapV2 | PoolType::SushiSwapV2 | PoolType::PancakeSwapV2 | PoolType::BaseSwapV2
        )
    }

    pub fn is_v3(&self) -> bool {
        matches!(
            self,
            PoolType::UniswapV3 | PoolType::SushiSwapV3 | PoolType::PancakeSwapV3 | PoolType::Slipstream
        )
    }

    pub fn is_maverick(&self) -> bool {
        self == &PoolType::MaverickV2
    }

    pub fn is_curve(&self) -> bool {
        self == &PoolType::CurveTwoCrypto || self == &PoolType::CurveTriCrypto
    }

    pub fn is_balancer(&self) -> bool {
        self == &PoolType::BalancerV2
    }

    /// Layout of `slot0` for the v3 style pools
    pub fn slot0_layout(&self) -> Slot0Layout {
        match self {
            PoolType::Slipstream => Slot0Layout::Slipstream,
            _ => Slot0Layout::Uniswap,
        }
    }

    /// Build the default adapter for this pool type on `chain`. Addresses the adapter depends on
    /// are taken from the chain tables
    pub fn adapter(&self, chain: Chain) -> Result<PoolAdapter, PoolSyncError> {
        if !chain.supported(self) {
            return Err(PoolSyncError::UnsupportedPoolType);
        }

        let adapter = if self.is_v2() {
            PoolAdapter::UniswapV2Pair {
                resolve_names: true,
            }
        } else if self.is_v3() {
            PoolAdapter::UniswapV3State {
                slot0: self.slot0_layout(),
            }
        } else if self.is_maverick() {
            PoolAdapter::Maverick {
                resolve_names: true,
            }
        } else if self.is_curve() {
            let coins = if *self == PoolType::CurveTriCrypto {
                CurveCoins::Three
            } else {
                CurveCoins::Two
            };
            PoolAdapter::CurvePool {
                factory: chain
                    .factory(self)
                    .ok_or(PoolSyncError::UnsupportedPoolType)?,
                coins,
                resolve_names: true,
            }
        } else {
            PoolAdapter::BalancerWeightedPool {
                vault: chain
                    .balancer_vault()
                    .ok_or(PoolSyncError::UnsupportedPoolType)?,
            }
        };
        Ok(adapter)
    }
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Shape of the value returned by `slot0`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot0Layout {
    /// Uniswap and its forks, seven return words
    Uniswap,
    /// Aerodrome Slipstream, no fee protocol field, six return words
    Slipstream,
}

impl Slot0Layout {
    pub fn words(&self) -> usize {
        match self {
            Slot0Layout::Uniswap => 7,
            Slot0Layout::Slipstream => 6,
        }
    }
}

/// Where the tick window scanner takes the current tick from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TickSource {
    /// Read the tick from the pool's `slot0`
    Pool,
    /// Use the tick the caller supplies alongside each address
    Supplied,
}

/// The record shape an adapter produces, also the tag of a packed buffer
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolKind {
    UniswapV2 = 1,
    UniswapV3 = 2,
    TickWindow = 3,
    Curve = 4,
    Balancer = 5,
    Maverick = 6,
}

impl TryFrom<u8> for PoolKind {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(PoolKind::UniswapV2),
            2 => Ok(PoolKind::UniswapV3),
            3 => Ok(PoolKind::TickWindow),
            4 => Ok(PoolKind::Curve),
            5 => Ok(PoolKind::Balancer),
            6 => Ok(PoolKind::Maverick),
            other => Err(other),
        }
    }
}

impl PoolKind {
    /// The tuple type a record of this kind is encoded as
    pub fn pool_repr(&self) -> DynSolType {
        match self {
            PoolKind::UniswapV2 => UniswapV2Pool::pool_repr(),
            PoolKind::UniswapV3 => UniswapV3Pool::pool_repr(),
            PoolKind::TickWindow => TickWindowPool::pool_repr(),
            PoolKind::Curve => CurvePool::pool_repr(),
            PoolKind::Balancer => BalancerV2Pool::pool_repr(),
            PoolKind::Maverick => MaverickPool::pool_repr(),
        }
    }

    /// Rebuild a record of this kind from its decoded tuple fields
    pub fn decode_pool(&self, data: &[DynSolValue]) -> Option<Pool> {
        match self {
            PoolKind::UniswapV2 => UniswapV2Pool::from_sol_values(data).map(Pool::UniswapV2),
            PoolKind::UniswapV3 => UniswapV3Pool::from_sol_values(data).map(Pool::UniswapV3),
            PoolKind::TickWindow => TickWindowPool::from_sol_values(data).map(Pool::TickWindow),
            PoolKind::Curve => CurvePool::from_sol_values(data).map(Pool::Curve),
            PoolKind::Balancer => BalancerV2Pool::from_sol_values(data).map(Pool::Balancer),
            PoolKind::Maverick => MaverickPool::from_sol_values(data).map(Pool::Maverick),
        }
    }
}

/// A protocol adapter: which calls to make for one address and how to read them back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolAdapter {
    /// token0, token1, getReserves and the decimals of both tokens
    UniswapV2Pair { resolve_names: bool },
    /// slot0, liquidity, fee and tickSpacing
    UniswapV3State { slot0: Slot0Layout },
    /// slot0 (unless the tick is supplied), tickSpacing and one tickBitmap per word in the window
    UniswapV3TickBitmapWindow {
        slot0: Slot0Layout,
        half_width: u32,
        source: TickSource,
    },
    /// Coins resolved through the pool's factory
    CurvePool {
        factory: Address,
        coins: CurveCoins,
        resolve_names: bool,
    },
    /// Pool id, vault tokens and balances, weights, swap fee
    BalancerWeightedPool { vault: Address },
    /// tokenA, tokenB and their decimals
    Maverick { resolve_names: bool },
}

impl PoolAdapter {
    /// A tick window adapter whose half width is derived from a number of ticks to fetch
    pub fn tick_window(slot0: Slot0Layout, ticks_to_fetch: u32, source: TickSource) -> Self {
        PoolAdapter::UniswapV3TickBitmapWindow {
            slot0,
            half_width: tick_window::half_width_for(ticks_to_fetch),
            source,
        }
    }

    pub fn kind(&self) -> PoolKind {
        match self {
            PoolAdapter::UniswapV2Pair { .. } => PoolKind::UniswapV2,
            PoolAdapter::UniswapV3State { .. } => PoolKind::UniswapV3,
            PoolAdapter::UniswapV3TickBitmapWindow { .. } => PoolKind::TickWindow,
            PoolAdapter::CurvePool { .. } => PoolKind::Curve,
            PoolAdapter::BalancerWeightedPool { .. } => PoolKind::Balancer,
            PoolAdapter::Maverick { .. } => PoolKind::Maverick,
        }
    }

    /// True when the caller has to supply the current tick of every address
    pub fn needs_ticks(&self) -> bool {
        matches!(
            self,
            PoolAdapter::UniswapV3TickBitmapWindow {
                source: TickSource::Supplied,
                ..
            }
        )
    }

    /// Turn off display name resolution, saving one call per token
    pub fn without_names(self) -> Self {
        match self {
            PoolAdapter::UniswapV2Pair { .. } => PoolAdapter::UniswapV2Pair {
                resolve_names: false,
            },
            PoolAdapter::CurvePool { factory, coins, .. } => PoolAdapter::CurvePool {
                factory,
                coins,
                resolve_names: false,
            },
            PoolAdapter::Maverick { .. } => PoolAdapter::Maverick {
                resolve_names: false,
            },
            other => other,
        }
    }

    /// Run this adapter's pipeline for a single address
    pub(crate) async fn fetch<R: StateReader + ?Sized>(
        &self,
        ctx: &mut FetchContext<'_, R>,
        address: Address,
        supplied_tick: Option<i32>,
    ) -> Result<Pool, FetchError> {
        let pool = match self {
            PoolAdapter::UniswapV2Pair { resolve_names } => {
                UniswapV2Pool::fetch(ctx, address, *resolve_names)
                    .await?
                    .into_typed_pool()
            }
            PoolAdapter::UniswapV3State { slot0 } => {
                UniswapV3Pool::fetch(ctx, address, *slot0).await?.into_typed_pool()
            }
            PoolAdapter::UniswapV3TickBitmapWindow {
                slot0,
                half_width,
                source,
            } => {
                let tick = match source {
                    TickSource::Pool => None,
                    TickSource::Supplied => supplied_tick,
                };
                TickWindowPool::fetch(ctx, address, *slot0, *half_width, tick)
                    .await?
                    .into_typed_pool()
            }
            PoolAdapter::CurvePool {
                factory,
                coins,
                resolve_names,
            } => CurvePool::fetch(ctx, address, *factory, *coins, *resolve_names)
                .await?
                .into_typed_pool(),
            PoolAdapter::BalancerWeightedPool { vault } => {
                BalancerV2Pool::fetch(ctx, address, *vault).await?.into_typed_pool()
            }
            PoolAdapter::Maverick { resolve_names } => {
                MaverickPool::fetch(ctx, address, *resolve_names)
                    .await?
                    .into_typed_pool()
            }
        };
        Ok(pool)
    }
}

/// Represents a populated pool from any of the supported adapters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pool {
    UniswapV2(UniswapV2Pool),
    UniswapV3(UniswapV3Pool),
    TickWindow(TickWindowPool),
    Curve(CurvePool),
    Balancer(BalancerV2Pool),
    Maverick(MaverickPool),
}

impl Pool {
    pub fn address(&self) -> Address {
        match self {
            Pool::UniswapV2(pool) => pool.address,
            Pool::UniswapV3(pool) => pool.address,
            Pool::TickWindow(pool) => pool.address,
            Pool::Curve(pool) => pool.address,
            Pool::Balancer(pool) => pool.address,
            Pool::Maverick(pool) => pool.address,
        }
    }

    pub fn kind(&self) -> PoolKind {
        match self {
            Pool::UniswapV2(_) => PoolKind::UniswapV2,
            Pool::UniswapV3(_) => PoolKind::UniswapV3,
            Pool::TickWindow(_) => PoolKind::TickWindow,
            Pool::Curve(_) => PoolKind::Curve,
            Pool::Balancer(_) => PoolKind::Balancer,
            Pool::Maverick(_) => PoolKind::Maverick,
        }
    }

    /// The record's fields as ABI values, in the order of its kind's `pool_repr`
    pub fn to_sol_values(&self) -> Vec<DynSolValue> {
        match self {
            Pool::UniswapV2(pool) => pool.to_sol_values(),
            Pool::UniswapV3(pool) => pool.to_sol_values(),
            Pool::TickWindow(pool) => pool.to_sol_values(),
            Pool::Curve(pool) => pool.to_sol_values(),
            Pool::Balancer(pool) => pool.to_sol_values(),
            Pool::Maverick(pool) => pool.to_sol_values(),
        }
    }

    pub fn get_v2(&self) -> Option<&UniswapV2Pool> {
        match self {
            Pool::UniswapV2(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn get_v3(&self) -> Option<&UniswapV3Pool> {
        match self {
            Pool::UniswapV3(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn get_tick_window(&self) -> Option<&TickWindowPool> {
        match self {
            Pool::TickWindow(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn get_curve(&self) -> Option<&CurvePool> {
        match self {
            Pool::Curve(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn get_balancer(&self) -> Option<&BalancerV2Pool> {
        match self {
            Pool::Balancer(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn get_maverick(&self) -> Option<&MaverickPool> {
        match self {
            Pool::Maverick(pool) => Some(pool),
            _ => None,
        }
    }
}
