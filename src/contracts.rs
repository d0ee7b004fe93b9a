//! ABI bindings for the circle factory, bonding curve and circle tokens, plus the gateway
//! that turns typed calls into signed submissions or `eth_call` reads.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use crate::curve::CurveParameters;
use crate::error::{AppError, AppResult};
use crate::metrics::{metrics, OpLabel};
use crate::rpc::{CallRequest, ChainRpc};
use crate::transactor::{ChainTransactor, Credential, SubmissionLocks};

sol! {
    interface ICircleFactory {
        function createCircle(
            string name,
            string symbol,
            string description,
            uint8 curveType,
            uint256 basePrice,
            uint256 k,
            uint256 m,
            uint256 n
        ) external payable returns (uint256 circleId);

        function circles(uint256 circleId) external view returns (
            uint256 id,
            address owner,
            address tokenAddress,
            address bondingCurve,
            string name,
            string symbol,
            string description,
            bool active,
            uint8 curveType,
            uint256 createdAt
        );
    }

    interface IBondingCurve {
        function buyTokens(address token, uint256 amount, uint256 maxCost) external payable;
        function sellTokens(address token, uint256 amount, uint256 minRefund) external;
        function getCurrentPrice(address token) external view returns (uint256);
        function calculateBuyCost(address token, uint256 amount) external view returns (uint256 cost, uint256 fee);
        function calculateSellRefund(address token, uint256 amount) external view returns (uint256 refund, uint256 fee);
    }

    interface ICircleToken {
        function balanceOf(address account) external view returns (uint256);
        function totalSupply() external view returns (uint256);
    }
}

/// Arguments for `createCircle` after validation.
#[derive(Debug, Clone)]
pub struct NewCircle {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub base_price: U256,
    pub params: CurveParameters,
}

/// Factory's view of a circle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainCircle {
    pub id: U256,
    pub owner: Address,
    pub token_address: Address,
    pub bonding_curve: Address,
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub active: bool,
    pub curve_type: u8,
    pub created_at: U256,
}

/// Cost (buy) or refund (sell) and the fee included in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub amount: U256,
    pub fee: U256,
}

#[async_trait]
pub trait CircleContracts: Send + Sync {
    async fn create_circle(&self, credential: &Credential, circle: &NewCircle) -> AppResult<B256>;
    async fn buy_tokens(
        &self,
        credential: &Credential,
        token: Address,
        amount: U256,
        max_cost: U256,
    ) -> AppResult<B256>;
    async fn sell_tokens(
        &self,
        credential: &Credential,
        token: Address,
        amount: U256,
        min_refund: U256,
    ) -> AppResult<B256>;
    async fn circle_record(&self, chain_circle_id: u64) -> AppResult<ChainCircle>;
    async fn current_price(&self, token: Address) -> AppResult<U256>;
    async fn balance_of(&self, token: Address, account: Address) -> AppResult<U256>;
    async fn buy_quote(&self, token: Address, amount: U256) -> AppResult<Quote>;
    async fn sell_quote(&self, token: Address, amount: U256) -> AppResult<Quote>;
    async fn total_supply(&self, token: Address) -> AppResult<U256>;
}

pub struct ContractGateway {
    rpc: Arc<dyn ChainRpc>,
    transactor: ChainTransactor,
    locks: SubmissionLocks,
    factory: Address,
    bonding_curve: Address,
}

impl ContractGateway {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        transactor: ChainTransactor,
        locks: SubmissionLocks,
        factory: Address,
        bonding_curve: Address,
    ) -> Self {
        Self {
            rpc,
            transactor,
            locks,
            factory,
            bonding_curve,
        }
    }

    /// Prepare, sign and broadcast. Returns once the node accepts the raw tx.
    async fn submit(
        &self,
        op: &'static str,
        credential: &Credential,
        to: Address,
        data: Vec<u8>,
        value: U256,
    ) -> AppResult<B256> {
        let signer = credential.signer()?;
        let _guard = self.locks.acquire(signer.address()).await;
        let t0 = Instant::now();

        let prepared = self
            .transactor
            .prepare(&signer, to, data.into(), value)
            .await?;

        let res = self.rpc.send_raw_transaction(&prepared.raw).await;
        metrics()
            .submit_ms
            .observe(t0.elapsed().as_secs_f64() * 1000.0);
        match res {
            Ok(hash) => {
                if hash != prepared.hash {
                    tracing::warn!(
                        op,
                        local = %prepared.hash,
                        node = %hash,
                        "node reported a different tx hash"
                    );
                }
                metrics()
                    .chain_submissions_total
                    .get_or_create(&OpLabel { op })
                    .inc();
                tracing::info!(
                    op,
                    tx_hash = %hash,
                    from = %prepared.from,
                    nonce = prepared.nonce,
                    gas_price = prepared.gas_price,
                    gas_limit = prepared.gas_limit,
                    "submitted"
                );
                Ok(hash)
            }
            Err(e) => {
                metrics().broadcast_failures_total.inc();
                tracing::warn!(op, tx_hash = %prepared.hash, error = %e, "broadcast failed");
                Err(AppError::Broadcast {
                    tx_hash: prepared.hash.to_string(),
                    cause: e.to_string(),
                })
            }
        }
    }

    async fn view<C>(&self, to: Address, call: C) -> AppResult<C::Return>
    where
        C: SolCall + Send,
        C::Return: Send,
    {
        let req = CallRequest::view(to, call.abi_encode().into());
        let out: Bytes = self.rpc.call(&req).await?;
        C::abi_decode_returns(&out)
            .map_err(|e| AppError::BadGateway(format!("decode {}: {e}", C::SIGNATURE)))
    }
}

#[async_trait]
impl CircleContracts for ContractGateway {
    async fn create_circle(&self, credential: &Credential, circle: &NewCircle) -> AppResult<B256> {
        let (k, m, n) = circle.params.call_args();
        let data = ICircleFactory::createCircleCall {
            name: circle.name.clone(),
            symbol: circle.symbol.clone(),
            description: circle.description.clone(),
            curveType: circle.params.curve_type().tag(),
            basePrice: circle.base_price,
            k,
            m,
            n,
        }
        .abi_encode();
        self.submit("create_circle", credential, self.factory, data, U256::ZERO)
            .await
    }

    async fn buy_tokens(
        &self,
        credential: &Credential,
        token: Address,
        amount: U256,
        max_cost: U256,
    ) -> AppResult<B256> {
        let data = IBondingCurve::buyTokensCall {
            token,
            amount,
            maxCost: max_cost,
        }
        .abi_encode();
        // The curve pulls payment from msg.value and refunds any excess.
        self.submit("buy", credential, self.bonding_curve, data, max_cost)
            .await
    }

    async fn sell_tokens(
        &self,
        credential: &Credential,
        token: Address,
        amount: U256,
        min_refund: U256,
    ) -> AppResult<B256> {
        let data = IBondingCurve::sellTokensCall {
            token,
            amount,
            minRefund: min_refund,
        }
        .abi_encode();
        self.submit("sell", credential, self.bonding_curve, data, U256::ZERO)
            .await
    }

    async fn circle_record(&self, chain_circle_id: u64) -> AppResult<ChainCircle> {
        let r = self
            .view(
                self.factory,
                ICircleFactory::circlesCall {
                    circleId: U256::from(chain_circle_id),
                },
            )
            .await?;
        Ok(ChainCircle {
            id: r.id,
            owner: r.owner,
            token_address: r.tokenAddress,
            bonding_curve: r.bondingCurve,
            name: r.name,
            symbol: r.symbol,
            description: r.description,
            active: r.active,
            curve_type: r.curveType,
            created_at: r.createdAt,
        })
    }

    async fn current_price(&self, token: Address) -> AppResult<U256> {
        self.view(self.bonding_curve, IBondingCurve::getCurrentPriceCall { token })
            .await
    }

    async fn balance_of(&self, token: Address, account: Address) -> AppResult<U256> {
        self.view(token, ICircleToken::balanceOfCall { account })
            .await
    }

    async fn buy_quote(&self, token: Address, amount: U256) -> AppResult<Quote> {
        let r = self
            .view(
                self.bonding_curve,
                IBondingCurve::calculateBuyCostCall { token, amount },
            )
            .await?;
        Ok(Quote {
            amount: r.cost,
            fee: r.fee,
        })
    }

    async fn sell_quote(&self, token: Address, amount: U256) -> AppResult<Quote> {
        let r = self
            .view(
                self.bonding_curve,
                IBondingCurve::calculateSellRefundCall { token, amount },
            )
            .await?;
        Ok(Quote {
            amount: r.refund,
            fee: r.fee,
        })
    }

    async fn total_supply(&self, token: Address) -> AppResult<U256> {
        self.view(token, ICircleToken::totalSupplyCall {}).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetryClass;
    use crate::testing::{FakeRpc, TEST_KEY};
    use alloy::primitives::keccak256;
    use alloy::sol_types::SolValue;

    const FACTORY: Address = Address::repeat_byte(0xf0);
    const CURVE: Address = Address::repeat_byte(0xc0);
    const TOKEN: Address = Address::repeat_byte(0x70);

    fn gateway(rpc: Arc<FakeRpc>) -> ContractGateway {
        ContractGateway::new(
            rpc.clone(),
            ChainTransactor::new(rpc, 11_155_111),
            SubmissionLocks::new(true),
            FACTORY,
            CURVE,
        )
    }

    #[tokio::test]
    async fn create_encodes_factory_call_with_zero_value() {
        let rpc = Arc::new(FakeRpc::new());
        let gw = gateway(rpc.clone());
        let circle = NewCircle {
            name: "Rustaceans".into(),
            symbol: "CRAB".into(),
            description: "systems folks".into(),
            base_price: U256::from(10u64.pow(15)),
            params: CurveParameters::Linear {
                k: U256::from(10u64.pow(15)),
            },
        };

        let hash = gw
            .create_circle(&Credential::new(TEST_KEY), &circle)
            .await
            .unwrap();

        let sent = rpc.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(hash, keccak256(&sent[0]));

        let est = rpc.estimates.lock().unwrap();
        assert_eq!(est[0].to, FACTORY);
        assert_eq!(est[0].value, U256::ZERO);
        let decoded = ICircleFactory::createCircleCall::abi_decode(&est[0].data).unwrap();
        assert_eq!(decoded.name, "Rustaceans");
        assert_eq!(decoded.curveType, 0);
        assert_eq!(decoded.k, U256::from(10u64.pow(15)));
        assert_eq!(decoded.m, U256::ZERO);
        assert_eq!(decoded.n, U256::ZERO);
    }

    #[tokio::test]
    async fn buy_sends_max_cost_as_value() {
        let rpc = Arc::new(FakeRpc::new());
        let max_cost = U256::from(10u64.pow(18));
        gateway(rpc.clone())
            .buy_tokens(&Credential::new(TEST_KEY), TOKEN, U256::from(100), max_cost)
            .await
            .unwrap();

        let est = rpc.estimates.lock().unwrap();
        assert_eq!(est[0].to, CURVE);
        assert_eq!(est[0].value, max_cost);
        let decoded = IBondingCurve::buyTokensCall::abi_decode(&est[0].data).unwrap();
        assert_eq!(decoded.token, TOKEN);
        assert_eq!(decoded.amount, U256::from(100));
        assert_eq!(decoded.maxCost, max_cost);
    }

    #[tokio::test]
    async fn sell_sends_no_value() {
        let rpc = Arc::new(FakeRpc::new());
        gateway(rpc.clone())
            .sell_tokens(&Credential::new(TEST_KEY), TOKEN, U256::from(5), U256::from(1))
            .await
            .unwrap();
        let est = rpc.estimates.lock().unwrap();
        assert_eq!(est[0].value, U256::ZERO);
        let decoded = IBondingCurve::sellTokensCall::abi_decode(&est[0].data).unwrap();
        assert_eq!(decoded.minRefund, U256::from(1));
    }

    #[tokio::test]
    async fn broadcast_failure_is_out_of_band_and_names_hash() {
        let rpc = Arc::new(FakeRpc::new().failing("send_raw"));
        let err = gateway(rpc)
            .buy_tokens(&Credential::new(TEST_KEY), TOKEN, U256::from(1), U256::from(1))
            .await
            .unwrap_err();
        assert_eq!(err.retry(), RetryClass::OutOfBand);
        assert!(err.tx_hash().is_some_and(|h| h.starts_with("0x")));
    }

    #[tokio::test]
    async fn bad_credential_never_touches_the_node() {
        let rpc = Arc::new(FakeRpc::new());
        let err = gateway(rpc.clone())
            .sell_tokens(&Credential::new("0x1234"), TOKEN, U256::from(1), U256::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.retry(), RetryClass::Never);
        assert!(rpc.estimates.lock().unwrap().is_empty());
        assert!(rpc.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn decodes_circle_record() {
        let rpc = Arc::new(FakeRpc::new());
        let owner = Address::repeat_byte(0x0a);
        let ret = (
            U256::from(7),
            owner,
            TOKEN,
            CURVE,
            String::from("Rustaceans"),
            String::from("CRAB"),
            String::from("systems folks"),
            true,
            U256::from(2u8),
            U256::from(1_700_000_000u64),
        )
            .abi_encode_params();
        rpc.respond(ICircleFactory::circlesCall::SELECTOR, ret);

        let rec = gateway(rpc.clone()).circle_record(7).await.unwrap();
        assert_eq!(rec.owner, owner);
        assert_eq!(rec.token_address, TOKEN);
        assert_eq!(rec.bonding_curve, CURVE);
        assert!(rec.active);
        assert_eq!(rec.curve_type, 2);

        let calls = rpc.calls.lock().unwrap();
        assert_eq!(calls[0].to, FACTORY);
        let decoded = ICircleFactory::circlesCall::abi_decode(&calls[0].data).unwrap();
        assert_eq!(decoded.circleId, U256::from(7));
    }

    #[tokio::test]
    async fn decodes_quotes_and_price() {
        let rpc = Arc::new(FakeRpc::new());
        rpc.respond(
            IBondingCurve::calculateBuyCostCall::SELECTOR,
            (U256::from(1_000), U256::from(10)).abi_encode_params(),
        );
        rpc.respond(
            IBondingCurve::getCurrentPriceCall::SELECTOR,
            U256::from(42).abi_encode(),
        );
        let gw = gateway(rpc);
        let q = gw.buy_quote(TOKEN, U256::from(3)).await.unwrap();
        assert_eq!(q.amount, U256::from(1_000));
        assert_eq!(q.fee, U256::from(10));
        assert_eq!(gw.current_price(TOKEN).await.unwrap(), U256::from(42));
    }

    #[tokio::test]
    async fn short_return_data_fails_loudly() {
        let rpc = Arc::new(FakeRpc::new());
        rpc.respond(ICircleToken::balanceOfCall::SELECTOR, vec![0u8; 5]);
        let err = gateway(rpc)
            .balance_of(TOKEN, Address::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadGateway(ref m) if m.contains("balanceOf")));
    }

    #[tokio::test]
    async fn reverted_read_surfaces_as_gateway_error() {
        let rpc = Arc::new(FakeRpc::new());
        let err = gateway(rpc).total_supply(TOKEN).await.unwrap_err();
        assert_eq!(err.retry(), RetryClass::FreshAttempt);
    }
}
