//! Tick window math
//!
//! A v3 pool records which ticks are initialized in a bitmap of 256 bit words. Given the current
//! tick and the spacing, the window covers `half_width` spacings on either side of the tick and
//! every bitmap word those ticks fall into.

use std::ops::RangeInclusive;

use crate::errors::SkipReason;
use crate::validator::{MAX_TICK, MIN_TICK};

/// Half width, in spacings, of a window meant to hold `ticks_to_fetch` ticks
pub fn half_width_for(ticks_to_fetch: u32) -> u32 {
    ticks_to_fetch.div_ceil(2)
}

/// Symmetric window of bitmap words around a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickWindow {
    pub min_tick: i64,
    pub max_tick: i64,
    pub min_word: i16,
    pub max_word: i16,
}

impl TickWindow {
    pub fn new(current_tick: i32, tick_spacing: i32, half_width: u32) -> Result<Self, SkipReason> {
        if tick_spacing <= 0 {
            return Err(SkipReason::ValueOutOfRange("tick spacing"));
        }
        if !(MIN_TICK..=MAX_TICK).contains(&i64::from(current_tick)) {
            return Err(SkipReason::ValueOutOfRange("tick"));
        }

        let tick_range = i64::from(half_width) * i64::from(tick_spacing);
        let min_tick = i64::from(current_tick) - tick_range;
        let max_tick = i64::from(current_tick) + tick_range;

        // arithmetic shift, negative ticks round toward negative infinity
        let min_word = i16::try_from(min_tick >> 8)
            .map_err(|_| SkipReason::ValueOutOfRange("word position"))?;
        let max_word = i16::try_from(max_tick >> 8)
            .map_err(|_| SkipReason::ValueOutOfRange("word position"))?;

        Ok(Self {
            min_tick,
            max_tick,
            min_word,
            max_word,
        })
    }

    pub fn word_count(&self) -> usize {
        (i32::from(self.max_word) - i32::from(self.min_word) + 1) as usize
    }

    /// Word positions in ascending order
    pub fn words(&self) -> RangeInclusive<i16> {
        self.min_word..=self.max_word
    }
}
