//! Bindings for every remote call issued by the adapters. Only the calldata side of these
//! bindings is used, return data is decoded by the validator.
use alloy_sol_types::sol;

sol! {
    interface IERC20 {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }

    interface IUniswapV2Pair {
        function token0() external view returns (address);
        function token1() external view returns (address);
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }

    interface IUniswapV2Factory {
        function allPairsLength() external view returns (uint256);
        function allPairs(uint256 index) external view returns (address);
    }

    interface IUniswapV3Pool {
        function slot0() external view returns (
            uint160 sqrtPriceX96,
            int24 tick,
            uint16 observationIndex,
            uint16 observationCardinality,
            uint16 observationCardinalityNext,
            uint8 feeProtocol,
            bool unlocked
        );
        function liquidity() external view returns (uint128);
        function fee() external view returns (uint24);
        function tickSpacing() external view returns (int24);
        function tickBitmap(int16 wordPosition) external view returns (uint256);
    }

    // The two and three coin factories share a selector, the width of the return differs
    interface ICurveFactory {
        function get_coins(address pool) external view returns (address[2]);
    }

    interface IBalancerPool {
        function getPoolId() external view returns (bytes32);
        function getNormalizedWeights() external view returns (uint256[]);
        function getSwapFeePercentage() external view returns (uint256);
    }

    interface IBalancerVault {
        function getPoolTokens(bytes32 poolId) external view returns (address[] tokens, uint256[] balances, uint256 lastChangeBlock);
    }

    interface IMaverickV2Pool {
        function tokenA() external view returns (address);
        function tokenB() external view returns (address);
    }
}
