use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};

use super::v3_structure::{read_slot0, read_tick_spacing};
use super::{as_int, as_uint, as_vec, int_value, uint_array, PoolStructure};
use crate::errors::{FetchError, SkipReason};
use crate::pools::abi::IUniswapV3Pool;
use crate::pools::tick_window::TickWindow;
use crate::pools::{Pool, PoolKind, Slot0Layout};
use crate::reader::StateReader;
use crate::validator::{FetchContext, MAX_TICK, MIN_TICK};

/// Tick bitmap words around the current tick of a v3 pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TickWindowPool {
    pub address: Address,
    pub tick: i32,
    pub tick_spacing: i32,
    pub word_positions: Vec<i16>,
    pub bitmaps: Vec<U256>,
}

impl TickWindowPool {
    pub(crate) async fn fetch<R: StateReader + ?Sized>(
        ctx: &mut FetchContext<'_, R>,
        address: Address,
        layout: Slot0Layout,
        half_width: u32,
        supplied_tick: Option<i32>,
    ) -> Result<Self, FetchError> {
        let tick = match supplied_tick {
            Some(tick) if (MIN_TICK..=MAX_TICK).contains(&i64::from(tick)) => tick,
            Some(_) => return Err(SkipReason::ValueOutOfRange("tick").into()),
            None => read_slot0(ctx, address, layout).await?.1,
        };
        let tick_spacing = read_tick_spacing(ctx, address).await?;
        let window = TickWindow::new(tick, tick_spacing, half_width)?;

        let mut word_positions = Vec::with_capacity(window.word_count());
        let mut bitmaps = Vec::with_capacity(window.word_count());
        for word_position in window.words() {
            let calldata = IUniswapV3Pool::tickBitmapCall {
                wordPosition: word_position,
            }
            .abi_encode();
            let bitmap = ctx.call_word(address, calldata).await?;
            word_positions.push(word_position);
            bitmaps.push(U256::from_be_bytes(bitmap.0));
        }

        Ok(Self {
            address,
            tick,
            tick_spacing,
            word_positions,
            bitmaps,
        })
    }

    /// Expand the fetched bitmaps into the initialized ticks they mark, in ascending order.
    /// Bits that would land outside the valid tick range are ignored
    pub fn initialized_ticks(&self) -> Vec<i32> {
        let mut ticks = Vec::new();
        for (word, bitmap) in self.word_positions.iter().zip(&self.bitmaps) {
            if bitmap.is_zero() {
                continue;
            }
            for bit in 0..256 {
                if !bitmap.bit(bit) {
                    continue;
                }
                let compressed = i64::from(*word) * 256 + bit as i64;
                let tick = compressed * i64::from(self.tick_spacing);
                if (MIN_TICK..=MAX_TICK).contains(&tick) {
                    ticks.push(tick as i32);
                }
            }
        }
        ticks
    }
}

impl PoolStructure for TickWindowPool {
    const KIND: PoolKind = PoolKind::TickWindow;

    fn pool_repr() -> DynSolType {
        DynSolType::Tuple(vec![
            DynSolType::Address,
            DynSolType::Int(24),
            DynSolType::Int(24),
            DynSolType::Array(Box::new(DynSolType::Int(16))),
            DynSolType::Array(Box::new(DynSolType::Uint(256))),
        ])
    }

    fn to_sol_values(&self) -> Vec<DynSolValue> {
        vec![
            DynSolValue::Address(self.address),
            int_value(self.tick.into(), 24),
            int_value(self.tick_spacing.into(), 24),
            DynSolValue::Array(
                self.word_positions
                    .iter()
                    .map(|w| int_value((*w).into(), 16))
                    .collect(),
            ),
            uint_array(self.bitmaps.iter().copied(), 256),
        ]
    }

    fn from_sol_values(data: &[DynSolValue]) -> Option<Self> {
        let [address, tick, tick_spacing, word_positions, bitmaps] = data else {
            return None;
        };
        let word_positions = as_vec(word_positions, |v| as_int(v, 16).map(|w| w as i16))?;
        let bitmaps = as_vec(bitmaps, as_uint)?;
        if word_positions.len() != bitmaps.len() {
            return None;
        }
        Some(Self {
            address: address.as_address()?,
            tick: as_int(tick, 24)? as i32,
            tick_spacing: as_int(tick_spacing, 24)? as i32,
            word_positions,
            bitmaps,
        })
    }

    fn into_typed_pool(self) -> Pool {
        Pool::TickWindow(self)
    }
}
