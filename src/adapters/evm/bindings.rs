use alloy::sol;

sol! {
    /// Price lens: quotes a hypothetical buy or sell and names the router
    #[sol(rpc)]
    interface ILens {
        function getAmountOut(address token, uint256 amountIn, bool isBuy)
            external view returns (address router, uint256 amountOut);
    }

    #[sol(rpc)]
    interface IERC20 {
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    #[sol(rpc)]
    interface IRouter {
        struct SellParams {
            uint256 amountIn;
            uint256 amountOutMin;
            address token;
            address to;
            uint256 deadline;
        }

        function sell(SellParams calldata params) external returns (uint256 amountOut);
    }
}
