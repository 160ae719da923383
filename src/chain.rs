//! Chain Support and Pool Type Management
//!
//! This module defines the supported blockchain networks (Chains), the pool types
//! each one supports and the contract addresses adapters are configured with.

use crate::errors::PoolSyncError;
use crate::PoolType;
use alloy_primitives::{address, Address};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Enum representing supported blockchain networks
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Chain {
    /// Ethereum mainnet
    Ethereum,
    /// Base chain
    Base,
}

/// Static mapping of supported pool types for each chain
///
/// Not all protocols are deployed on all chains, and the contract addresses
/// for the same protocol differ across chains.
static CHAIN_POOLS: Lazy<HashMap<Chain, HashSet<PoolType>>> = Lazy::new(|| {
    let mut m = HashMap::new();

    m.insert(
        Chain::Ethereum,
        [
            PoolType::UniswapV2,
            PoolType::SushiSwapV2,
            PoolType::PancakeSwapV2,
            PoolType::UniswapV3,
            PoolType::SushiSwapV3,
            PoolType::PancakeSwapV3,
            PoolType::MaverickV2,
            PoolType::CurveTwoCrypto,
            PoolType::CurveTriCrypto,
            PoolType::BalancerV2,
        ]
        .iter()
        .cloned()
        .collect(),
    );

    m.insert(
        Chain::Base,
        [
            PoolType::UniswapV2,
            PoolType::SushiSwapV2,
            PoolType::PancakeSwapV2,
            PoolType::BaseSwapV2,
            PoolType::UniswapV3,
            PoolType::SushiSwapV3,
            PoolType::PancakeSwapV3,
            PoolType::Slipstream,
            PoolType::MaverickV2,
            PoolType::CurveTwoCrypto,
            PoolType::CurveTriCrypto,
            PoolType::BalancerV2,
        ]
        .iter()
        .cloned()
        .collect(),
    );

    m
});

/// Factories that pairs are paged from (v2) or coins are resolved through (curve)
static FACTORIES: Lazy<HashMap<(Chain, PoolType), Address>> = Lazy::new(|| {
    HashMap::from([
        // Ethereum
        (
            (Chain::Ethereum, PoolType::UniswapV2),
            address!("5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f"),
        ),
        (
            (Chain::Ethereum, PoolType::SushiSwapV2),
            address!("C0AEe478e3658e2610c5F7A4A2E1777cE9e4f2Ac"),
        ),
        (
            (Chain::Ethereum, PoolType::PancakeSwapV2),
            address!("1097053Fd2ea711dad45caCcc45EfF7548fCB362"),
        ),
        (
            (Chain::Ethereum, PoolType::CurveTwoCrypto),
            address!("98EE851a00abeE0d95D08cF4CA2BdCE32aeaAF7F"),
        ),
        (
            (Chain::Ethereum, PoolType::CurveTriCrypto),
            address!("0c0e5f2fF0ff18a3be9b835635039256dC4B4963"),
        ),
        // Base
        (
            (Chain::Base, PoolType::UniswapV2),
            address!("8909Dc15e40173Ff4699343b6eB8132c65e18eC6"),
        ),
        (
            (Chain::Base, PoolType::SushiSwapV2),
            address!("71524B4f93c58fcbF659783284E38825f0622859"),
        ),
        (
            (Chain::Base, PoolType::PancakeSwapV2),
            address!("02a84c1b3BBD7401a5f7fa98a384EBC70bB5749E"),
        ),
        (
            (Chain::Base, PoolType::BaseSwapV2),
            address!("FDa619b6d20975be80A10332cD39b9a4b0FAa8BB"),
        ),
        (
            (Chain::Base, PoolType::CurveTwoCrypto),
            address!("c9Fe0C63Af9A39402e8a5514f9c43Af0322b665F"),
        ),
        (
            (Chain::Base, PoolType::CurveTriCrypto),
            address!("A5961898870943c68037F6848d2D866Ed2016bcB"),
        ),
    ])
});

const BALANCER_VAULT: Address = address!("BA12222222228d8Ba445958a75a0704d566BF2C8");

impl Chain {
    /// Determines if a given pool type is supported on this chain
    pub fn supported(&self, pool_type: &PoolType) -> bool {
        CHAIN_POOLS
            .get(self)
            .map(|pools| pools.contains(pool_type))
            .unwrap_or(false)
    }

    /// The factory of `pool_type` on this chain, if it has one we page or resolve through
    pub fn factory(&self, pool_type: &PoolType) -> Option<Address> {
        FACTORIES.get(&(*self, *pool_type)).copied()
    }

    /// The Balancer V2 vault, deployed at the same address on every supported chain
    pub fn balancer_vault(&self) -> Option<Address> {
        self.supported(&PoolType::BalancerV2).then_some(BALANCER_VAULT)
    }
}

// Display implementation for Chain, used for logging and debugging purposes
impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for Chain {
    type Err = PoolSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ethereum" | "eth" | "mainnet" => Ok(Chain::Ethereum),
            "base" => Ok(Chain::Base),
            other => Err(PoolSyncError::UnknownChain(other.to_string())),
        }
    }
}
