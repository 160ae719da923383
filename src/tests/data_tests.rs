use std::time::Duration;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;

use super::mock::{addr, uint_word, words, MockReader};
use crate::batch::{execute_batch, execute_packed, BatchConfig, BatchRequest};
use crate::errors::{BatchError, SkipReason};
use crate::factory::FactoryPager;
use crate::names::{placeholder_name, resolve_symbol};
use crate::packer::{pack, unpack};
use crate::pools::abi::{IBalancerPool, IBalancerVault, IERC20, IUniswapV2Factory, IUniswapV2Pair};
use crate::pools::{CurveCoins, PoolAdapter, Slot0Layout, TickSource};
use crate::reader::CallOutcome;
use crate::validator::{CallBudget, FetchContext, GasMeter};

const WETH: u8 = 0x10;
const USDC: u8 = 0x11;
const DAI: u8 = 0x12;

fn tokens() -> MockReader {
    let mut reader = MockReader::new();
    reader
        .erc20(addr(WETH), 18, "WETH")
        .erc20(addr(USDC), 6, "USDC")
        .erc20(addr(DAI), 18, "DAI");
    reader
}

fn v2_adapter() -> PoolAdapter {
    PoolAdapter::UniswapV2Pair {
        resolve_names: true,
    }
}

fn with_diagnostics() -> BatchConfig {
    BatchConfig::default().with_diagnostics(true)
}

#[tokio::test]
async fn missing_contract_leaves_sentinel_in_place() {
    let mut reader = tokens();
    reader
        .v2_pair(addr(0xA1), addr(WETH), addr(USDC), (1_000, 2_000))
        .v2_pair(addr(0xC1), addr(USDC), addr(DAI), (5, 7));
    let addresses = [addr(0xA1), addr(0xB1), addr(0xC1)];

    let result = execute_batch(
        &reader,
        &v2_adapter(),
        BatchRequest::new(&addresses),
        &with_diagnostics(),
    )
    .await
    .unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result.synced(), 2);
    assert!(result.pools[1].is_none());

    let first = result.pools[0].as_ref().unwrap().get_v2().unwrap();
    assert_eq!(first.address, addr(0xA1));
    assert_eq!((first.token0, first.token1), (addr(WETH), addr(USDC)));
    assert_eq!((first.token0_decimals, first.token1_decimals), (18, 6));
    assert_eq!(first.token0_reserves, U256::from(1_000));
    assert_eq!(first.token1_reserves, U256::from(2_000));
    assert_eq!(first.token0_name.as_deref(), Some("WETH"));
    assert_eq!(first.token1_name.as_deref(), Some("USDC"));

    let third = result.pools[2].as_ref().unwrap();
    assert_eq!(third.address(), addr(0xC1));

    let diagnostics = result.diagnostics.unwrap();
    assert_eq!(diagnostics[0], None);
    assert_eq!(
        diagnostics[1],
        Some(SkipReason::NotAContract(addr(0xB1)).to_string())
    );
    assert_eq!(diagnostics[2], None);
}

#[tokio::test]
async fn reverting_decimals_skip_only_that_pool() {
    let mut reader = tokens();
    let broken = addr(0x20);
    reader.contract(broken);
    reader.reverts(broken, IERC20::decimalsCall {}.abi_encode());
    reader
        .v2_pair(addr(0xA1), broken, addr(USDC), (1, 1))
        .v2_pair(addr(0xA2), addr(WETH), addr(USDC), (1, 1));
    let addresses = [addr(0xA1), addr(0xA2)];

    let result = execute_batch(
        &reader,
        &v2_adapter(),
        BatchRequest::new(&addresses),
        &with_diagnostics(),
    )
    .await
    .unwrap();

    assert!(result.pools[0].is_none());
    assert!(result.pools[1].is_some());
    assert_eq!(
        result.diagnostics.unwrap()[0],
        Some(SkipReason::RemoteCallReverted.to_string())
    );
}

#[tokio::test]
async fn decimals_outside_range_are_skipped_not_clamped() {
    let mut reader = tokens();
    let zero = addr(0x21);
    let huge = addr(0x22);
    let padded = addr(0x23);
    let max = addr(0x24);
    reader.erc20(zero, 0, "ZERO").erc20(huge, 256, "HUGE").erc20(max, 255, "MAX");
    reader.contract(padded);
    reader.returns(
        padded,
        IERC20::decimalsCall {}.abi_encode(),
        words(&[uint_word(18), uint_word(0)]),
    );
    for (pool, token) in [(0xA1, zero), (0xA2, huge), (0xA3, padded), (0xA4, max)] {
        reader.v2_pair(addr(pool), token, addr(WETH), (1, 1));
    }
    let addresses = [addr(0xA1), addr(0xA2), addr(0xA3), addr(0xA4)];

    let result = execute_batch(
        &reader,
        &v2_adapter(),
        BatchRequest::new(&addresses),
        &with_diagnostics(),
    )
    .await
    .unwrap();

    let diagnostics = result.diagnostics.clone().unwrap();
    assert_eq!(
        diagnostics[0],
        Some(SkipReason::DecimalsOutOfRange(U256::ZERO).to_string())
    );
    assert_eq!(
        diagnostics[1],
        Some(SkipReason::DecimalsOutOfRange(U256::from(256)).to_string())
    );
    assert_eq!(
        diagnostics[2],
        Some(
            SkipReason::DecodeLengthMismatch {
                expected: 32,
                actual: 64
            }
            .to_string()
        )
    );
    let kept = result.pools[3].as_ref().unwrap().get_v2().unwrap();
    assert_eq!(kept.token0_decimals, 255);
}

#[tokio::test]
async fn symbol_resolution_is_total() {
    let mut reader = MockReader::new();
    let bytes32 = addr(0x30);
    let reverting = addr(0x31);
    let empty = addr(0x32);
    let missing = addr(0x33);

    let mut mkr = [0u8; 32];
    mkr[..3].copy_from_slice(b"MKR");
    reader.contract(bytes32);
    reader.returns(bytes32, IERC20::symbolCall {}.abi_encode(), mkr.to_vec());
    reader.contract(reverting);
    reader.erc20(empty, 18, "");

    let mut meter = GasMeter::new(None);
    let mut ctx = FetchContext::new(&reader, CallBudget::default(), &mut meter);

    assert_eq!(resolve_symbol(&mut ctx, bytes32).await.unwrap(), "MKR");
    for token in [reverting, empty, missing] {
        let name = resolve_symbol(&mut ctx, token).await.unwrap();
        assert_eq!(name, placeholder_name(token));
        assert_eq!(name, format!("UNK_{}", alloy_primitives::hex::encode(token)));
    }
}

#[tokio::test]
async fn calls_over_the_gas_cap_run_out_of_gas() {
    let mut reader = tokens();
    reader.v2_pair(addr(0xA1), addr(WETH), addr(USDC), (1, 1));
    reader.burns(addr(WETH), IERC20::decimalsCall {}.abi_encode(), 25_000);
    let addresses = [addr(0xA1)];

    let result = execute_batch(
        &reader,
        &v2_adapter(),
        BatchRequest::new(&addresses),
        &with_diagnostics(),
    )
    .await
    .unwrap();
    assert!(result.pools[0].is_none());
    assert_eq!(
        result.diagnostics.unwrap()[0],
        Some(SkipReason::RemoteCallExceededCap.to_string())
    );

    let generous = BatchConfig::default().with_budget(CallBudget::default().with_gas_cap(30_000));
    let result = execute_batch(&reader, &v2_adapter(), BatchRequest::new(&addresses), &generous)
        .await
        .unwrap();
    assert!(result.pools[0].is_some());
}

#[tokio::test(start_paused = true)]
async fn stalled_calls_time_out() {
    let mut reader = tokens();
    reader.v2_pair(addr(0xA1), addr(WETH), addr(USDC), (1, 1));
    reader.stalls(
        addr(0xA1),
        IUniswapV2Pair::token0Call {}.abi_encode(),
        Duration::from_secs(60),
    );
    let addresses = [addr(0xA1)];

    let result = execute_batch(
        &reader,
        &v2_adapter(),
        BatchRequest::new(&addresses),
        &with_diagnostics(),
    )
    .await
    .unwrap();
    assert_eq!(
        result.diagnostics.unwrap()[0],
        Some(SkipReason::RemoteCallExceededCap.to_string())
    );
}

#[tokio::test]
async fn oversized_returns_are_rejected() {
    let mut reader = tokens();
    reader.v2_pair(addr(0xA1), addr(WETH), addr(USDC), (1, 1));
    reader.returns(
        addr(0xA1),
        IUniswapV2Pair::getReservesCall {}.abi_encode(),
        vec![0u8; 5000],
    );
    let addresses = [addr(0xA1)];

    let result = execute_batch(
        &reader,
        &v2_adapter(),
        BatchRequest::new(&addresses),
        &with_diagnostics(),
    )
    .await
    .unwrap();
    assert_eq!(
        result.diagnostics.unwrap()[0],
        Some(
            SkipReason::ReturnDataTooLarge {
                limit: 4096,
                actual: 5000
            }
            .to_string()
        )
    );
}

#[tokio::test]
async fn reserves_wider_than_112_bits_are_skipped() {
    let mut reader = tokens();
    reader.v2_pair(addr(0xA1), addr(WETH), addr(USDC), (1, 1));
    let too_wide = (U256::from(1u8) << 112usize).to_be_bytes::<32>().to_vec();
    reader.returns(
        addr(0xA1),
        IUniswapV2Pair::getReservesCall {}.abi_encode(),
        words(&[too_wide, uint_word(1), uint_word(1)]),
    );
    let addresses = [addr(0xA1)];

    let result = execute_batch(&reader, &v2_adapter(), BatchRequest::new(&addresses), &BatchConfig::default())
        .await
        .unwrap();
    assert!(result.pools[0].is_none());
}

#[tokio::test]
async fn healthy_pair_costs_three_code_checks_and_five_calls() {
    let mut reader = tokens();
    reader.v2_pair(addr(0xA1), addr(WETH), addr(USDC), (1, 1));
    let addresses = [addr(0xA1)];
    let adapter = v2_adapter().without_names();

    let exact = BatchConfig::default().with_gas_ceiling(Some(3 * 2_600 + 5 * 20_000));
    let result = execute_batch(&reader, &adapter, BatchRequest::new(&addresses), &exact)
        .await
        .unwrap();
    let pool = result.pools[0].as_ref().unwrap().get_v2().unwrap();
    assert_eq!(pool.token0_name, None);

    let short = BatchConfig::default().with_gas_ceiling(Some(3 * 2_600 + 5 * 20_000 - 1));
    let err = execute_batch(&reader, &adapter, BatchRequest::new(&addresses), &short)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BatchError::GasCeilingExceeded {
            ceiling: 3 * 2_600 + 5 * 20_000 - 1
        }
    );
}

#[tokio::test]
async fn transport_failure_fails_the_whole_batch() {
    let mut reader = tokens();
    reader.v2_pair(addr(0xA1), addr(WETH), addr(USDC), (1, 1));
    reader.fail_transport(1);
    let addresses = [addr(0xA1), addr(0xA1)];

    let err = execute_batch(&reader, &v2_adapter(), BatchRequest::new(&addresses), &BatchConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::Transport(_)));
}

#[tokio::test]
async fn v3_state_follows_slot0_layout() {
    let mut reader = MockReader::new();
    reader
        .v3_pool(addr(0xA1), -120, 60, 7)
        .v3_pool(addr(0xA2), 100, 1, 6);
    let addresses = [addr(0xA1), addr(0xA2)];

    let uniswap = PoolAdapter::UniswapV3State {
        slot0: Slot0Layout::Uniswap,
    };
    let result = execute_batch(&reader, &uniswap, BatchRequest::new(&addresses), &BatchConfig::default())
        .await
        .unwrap();
    let pool = result.pools[0].as_ref().unwrap().get_v3().unwrap();
    assert_eq!(pool.sqrt_price, U256::from(1u64 << 60));
    assert_eq!(pool.tick, -120);
    assert_eq!(pool.liquidity, 5_000_000);
    assert_eq!(pool.fee, 3000);
    assert_eq!(pool.tick_spacing, 60);
    // six word slot0 is not a uniswap slot0
    assert!(result.pools[1].is_none());

    let slipstream = PoolAdapter::UniswapV3State {
        slot0: Slot0Layout::Slipstream,
    };
    let result = execute_batch(&reader, &slipstream, BatchRequest::new(&addresses), &BatchConfig::default())
        .await
        .unwrap();
    assert!(result.pools[0].is_none());
    assert_eq!(result.pools[1].as_ref().unwrap().get_v3().unwrap().tick, 100);
}

#[tokio::test]
async fn tick_window_reads_every_word_in_range() {
    let mut reader = MockReader::new();
    reader.v3_pool(addr(0xA1), 100, 10, 7);
    reader.bitmap(addr(0xA1), 0, U256::from(0b1001u8));

    let adapter = PoolAdapter::UniswapV3TickBitmapWindow {
        slot0: Slot0Layout::Uniswap,
        half_width: 3,
        source: TickSource::Pool,
    };
    let addresses = [addr(0xA1)];
    let result = execute_batch(&reader, &adapter, BatchRequest::new(&addresses), &BatchConfig::default())
        .await
        .unwrap();

    let window = result.pools[0].as_ref().unwrap().get_tick_window().unwrap();
    assert_eq!(window.tick, 100);
    assert_eq!(window.word_positions, vec![0]);
    assert_eq!(window.bitmaps, vec![U256::from(0b1001u8)]);
    assert_eq!(window.initialized_ticks(), vec![0, 30]);
}

#[tokio::test]
async fn supplied_ticks_replace_slot0() {
    let mut reader = MockReader::new();
    // slot0 reports a tick far from the supplied one
    reader.v3_pool(addr(0xA1), 50_000, 10, 7);
    reader
        .bitmap(addr(0xA1), -1, U256::from(1u8))
        .bitmap(addr(0xA1), 0, U256::from(2u8));

    let adapter = PoolAdapter::UniswapV3TickBitmapWindow {
        slot0: Slot0Layout::Uniswap,
        half_width: 1,
        source: TickSource::Supplied,
    };
    let addresses = [addr(0xA1)];
    let result = execute_batch(
        &reader,
        &adapter,
        BatchRequest::new(&addresses).with_ticks(&[-10]),
        &BatchConfig::default(),
    )
    .await
    .unwrap();
    let window = result.pools[0].as_ref().unwrap().get_tick_window().unwrap();
    assert_eq!(window.tick, -10);
    assert_eq!(window.word_positions, vec![-1, 0]);

    let err = execute_batch(
        &reader,
        &adapter,
        BatchRequest::new(&[addr(0xA1), addr(0xA2)]).with_ticks(&[-10]),
        &BatchConfig::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err,
        BatchError::TickListMismatch {
            addresses: 2,
            ticks: 1
        }
    );

    let err = execute_batch(&reader, &adapter, BatchRequest::new(&addresses), &BatchConfig::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BatchError::TickListMismatch {
            addresses: 1,
            ticks: 0
        }
    );
}

#[tokio::test]
async fn curve_pools_resolve_coins_through_factory() {
    let factory = addr(0xF1);
    let mut reader = tokens();
    reader
        .curve_pool(factory, addr(0xA1), &[addr(WETH), addr(USDC), addr(DAI)])
        .curve_pool(factory, addr(0xA2), &[addr(WETH), addr(0x40), addr(DAI)]);
    let addresses = [addr(0xA1), addr(0xA2)];

    let adapter = PoolAdapter::CurvePool {
        factory,
        coins: CurveCoins::Three,
        resolve_names: true,
    };
    let result = execute_batch(&reader, &adapter, BatchRequest::new(&addresses), &BatchConfig::default())
        .await
        .unwrap();
    let pool = result.pools[0].as_ref().unwrap().get_curve().unwrap();
    assert_eq!(pool.tokens, vec![addr(WETH), addr(USDC), addr(DAI)]);
    assert_eq!(pool.decimals, vec![18, 6, 18]);
    assert_eq!(
        pool.names,
        Some(vec!["WETH".to_string(), "USDC".to_string(), "DAI".to_string()])
    );
    // second coin has no code
    assert!(result.pools[1].is_none());

    // a two coin adapter sees a three word return
    let two = PoolAdapter::CurvePool {
        factory,
        coins: CurveCoins::Two,
        resolve_names: false,
    };
    let result = execute_batch(&reader, &two, BatchRequest::new(&addresses[..1]), &BatchConfig::default())
        .await
        .unwrap();
    assert!(result.pools[0].is_none());
}

#[tokio::test]
async fn maverick_pools_need_both_tokens() {
    let mut reader = tokens();
    reader
        .maverick_pool(addr(0xA1), addr(WETH), addr(DAI))
        .maverick_pool(addr(0xA2), addr(WETH), addr(0x40));
    let addresses = [addr(0xA1), addr(0xA2), addr(0xA3)];

    let adapter = PoolAdapter::Maverick {
        resolve_names: false,
    };
    let result = execute_batch(&reader, &adapter, BatchRequest::new(&addresses), &BatchConfig::default())
        .await
        .unwrap();
    let pool = result.pools[0].as_ref().unwrap().get_maverick().unwrap();
    assert_eq!((pool.token_a, pool.token_b), (addr(WETH), addr(DAI)));
    assert_eq!((pool.token_a_decimals, pool.token_b_decimals), (18, 18));
    assert_eq!(pool.token_a_name, None);
    assert!(result.pools[1].is_none());
    assert!(result.pools[2].is_none());
}

#[tokio::test]
async fn balancer_weights_degrade_to_zero() {
    let vault = addr(0xBA);
    let pool_id = B256::repeat_byte(0x77);
    let mut reader = tokens();
    reader.balancer_pool(vault, addr(0xA1), pool_id, &[addr(WETH), addr(USDC)], &[100, 200]);
    reader.reverts(addr(0xA1), IBalancerPool::getNormalizedWeightsCall {}.abi_encode());

    let adapter = PoolAdapter::BalancerWeightedPool { vault };
    let addresses = [addr(0xA1)];
    let result = execute_batch(&reader, &adapter, BatchRequest::new(&addresses), &BatchConfig::default())
        .await
        .unwrap();

    let pool = result.pools[0].as_ref().unwrap().get_balancer().unwrap();
    assert_eq!(pool.pool_id, pool_id);
    assert_eq!(pool.tokens, vec![addr(WETH), addr(USDC)]);
    assert_eq!(pool.decimals, vec![18, 6]);
    assert_eq!(pool.balances, vec![U256::from(100), U256::from(200)]);
    assert_eq!(pool.weights, vec![U256::ZERO, U256::ZERO]);
    assert_eq!(pool.swap_fee, U256::from(3_000_000_000_000_000u64));
    assert_eq!(pool.get_balance(&addr(USDC)), U256::from(200));
}

#[tokio::test]
async fn balancer_entries_skip_on_critical_failures() {
    let vault = addr(0xBA);
    let mut reader = tokens();
    reader.balancer_pool(vault, addr(0xA1), B256::repeat_byte(1), &[addr(WETH), addr(USDC)], &[1, 2]);
    reader.balancer_pool(vault, addr(0xA2), B256::repeat_byte(2), &[addr(WETH), addr(0x40)], &[1, 2]);
    reader.balancer_pool(vault, addr(0xA3), B256::repeat_byte(3), &[addr(WETH)], &[1]);
    reader.reverts(addr(0xA3), IBalancerPool::getSwapFeePercentageCall {}.abi_encode());

    // tokens and balances of different lengths
    let lopsided = DynSolValue::Tuple(vec![
        DynSolValue::Array(vec![DynSolValue::Address(addr(WETH)), DynSolValue::Address(addr(USDC))]),
        DynSolValue::Array(vec![DynSolValue::Uint(U256::from(1), 256)]),
        DynSolValue::Uint(U256::ZERO, 256),
    ]);
    reader.returns(
        vault,
        IBalancerVault::getPoolTokensCall {
            poolId: B256::repeat_byte(1),
        }
        .abi_encode(),
        lopsided.abi_encode_params(),
    );

    let adapter = PoolAdapter::BalancerWeightedPool { vault };
    let addresses = [addr(0xA1), addr(0xA2), addr(0xA3)];
    let result = execute_batch(&reader, &adapter, BatchRequest::new(&addresses), &with_diagnostics())
        .await
        .unwrap();

    assert_eq!(result.synced(), 0);
    let diagnostics = result.diagnostics.unwrap();
    assert_eq!(diagnostics[0], Some(SkipReason::TokenListMismatch.to_string()));
    assert_eq!(
        diagnostics[1],
        Some(SkipReason::NotAContract(addr(0x40)).to_string())
    );
    assert_eq!(diagnostics[2], Some(SkipReason::RemoteCallReverted.to_string()));
}

#[tokio::test]
async fn packed_batches_round_trip() {
    let mut reader = tokens();
    reader
        .v2_pair(addr(0xA1), addr(WETH), addr(USDC), (1_000, 2_000))
        .v2_pair(addr(0xC1), addr(USDC), addr(DAI), (5, 7));
    let addresses = [addr(0xA1), addr(0xB1), addr(0xC1)];
    let config = with_diagnostics();

    let buffer = execute_packed(&reader, &v2_adapter(), BatchRequest::new(&addresses), &config)
        .await
        .unwrap();
    let decoded = unpack(&buffer).unwrap();
    let direct = execute_batch(&reader, &v2_adapter(), BatchRequest::new(&addresses), &config)
        .await
        .unwrap();
    assert_eq!(decoded, direct);
    assert_eq!(pack(&decoded), buffer);

    let tight = config.with_max_payload_bytes(16);
    let err = execute_packed(&reader, &v2_adapter(), BatchRequest::new(&addresses), &tight)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BatchError::PayloadTooLarge {
            limit: 16,
            actual: buffer.len()
        }
    );
}

#[tokio::test]
async fn factory_ranges_clamp_to_pair_count() {
    let factory = addr(0xF2);
    let pairs = [addr(0xA1), addr(0xA2), addr(0xA3)];
    let mut reader = MockReader::new();
    reader.v2_factory(factory, &pairs);
    let pager = FactoryPager::new(factory, BatchConfig::default());

    assert_eq!(pager.pair_count(&reader).await.unwrap(), 3);
    assert_eq!(
        pager.get_range(&reader, 1, 10).await.unwrap(),
        vec![Some(addr(0xA2)), Some(addr(0xA3))]
    );
    assert!(pager.get_range(&reader, 5, 10).await.unwrap().is_empty());

    reader.respond(
        factory,
        IUniswapV2Factory::allPairsCall {
            index: U256::from(1),
        }
        .abi_encode(),
        CallOutcome::Reverted(Bytes::new()),
    );
    assert_eq!(
        pager.get_range(&reader, 0, 3).await.unwrap(),
        vec![Some(addr(0xA1)), None, Some(addr(0xA3))]
    );

    let silent = addr(0xF3);
    reader.contract(silent);
    let err = FactoryPager::new(silent, BatchConfig::default())
        .get_range(&reader, 0, 3)
        .await
        .unwrap_err();
    assert_eq!(err, BatchError::FactoryUnavailable(silent));
}

#[tokio::test]
async fn empty_batches_are_empty() {
    let reader = MockReader::new();
    let addresses: [Address; 0] = [];
    let result = execute_batch(&reader, &v2_adapter(), BatchRequest::new(&addresses), &BatchConfig::default())
        .await
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(reader.call_count(), 0);
}
