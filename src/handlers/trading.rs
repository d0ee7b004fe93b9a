use crate::error::{ApiResult, AppError};
use crate::state::AppState;
use crate::types::{
    BalanceResponse, BuyRequest, PriceResponse, QuoteQuery, QuoteResponse, SellRequest,
    TradeResponse,
};
use crate::utils::parse_address;
use axum::extract::{Path, Query, State};
use axum::Json;
use std::time::Instant;

pub async fn buy(State(st): State<AppState>, Json(req): Json<BuyRequest>) -> ApiResult<TradeResponse> {
    let t0 = Instant::now();
    let res = st.trading.buy(req).await;
    super::finish("buy", t0, res)
}

pub async fn sell(
    State(st): State<AppState>,
    Json(req): Json<SellRequest>,
) -> ApiResult<TradeResponse> {
    let t0 = Instant::now();
    let res = st.trading.sell(req).await;
    super::finish("sell", t0, res)
}

pub async fn balance(
    State(st): State<AppState>,
    Path((circle_id, address)): Path<(u64, String)>,
) -> ApiResult<BalanceResponse> {
    let t0 = Instant::now();
    let res = async {
        let account = parse_address("address", &address)?;
        let (c, balance) = st.trading.balance(circle_id, account).await?;
        Ok::<_, AppError>(BalanceResponse {
            circle_id,
            address: account.to_string(),
            token_address: c.token_address,
            balance: balance.to_string(),
        })
    }
    .await;
    super::finish("balance", t0, res)
}

pub async fn price(
    State(st): State<AppState>,
    Path(circle_id): Path<u64>,
) -> ApiResult<PriceResponse> {
    let t0 = Instant::now();
    let res = st
        .trading
        .current_price(circle_id)
        .await
        .map(|(c, price)| PriceResponse {
            circle_id,
            token_address: c.token_address,
            price: price.to_string(),
        });
    super::finish("price", t0, res)
}

pub async fn quote(
    State(st): State<AppState>,
    Path(circle_id): Path<u64>,
    Query(q): Query<QuoteQuery>,
) -> ApiResult<QuoteResponse> {
    let t0 = Instant::now();
    let res = st
        .trading
        .quote(circle_id, q.side, &q.amount)
        .await
        .map(|quote| QuoteResponse {
            circle_id,
            side: q.side,
            amount: q.amount.trim().to_string(),
            total: quote.amount.to_string(),
            fee: quote.fee.to_string(),
        });
    super::finish("quote", t0, res)
}
