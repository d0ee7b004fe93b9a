use crate::error::{ApiResult, ErrorBody};
use crate::models::{Circle, CircleDetail, CircleStats, LedgerEntry};
use crate::state::AppState;
use crate::types::{
    CircleListResponse, CreateCircleRequest, CreateCircleResponse, DetailQuery,
    LinkChainIdRequest, PageQuery, SearchQuery, TrendingQuery,
};
use crate::utils::parse_address;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use std::time::Instant;

pub async fn create_circle(
    State(st): State<AppState>,
    Json(req): Json<CreateCircleRequest>,
) -> Result<(StatusCode, Json<CreateCircleResponse>), (StatusCode, Json<ErrorBody>)> {
    let t0 = Instant::now();
    let res = st.lifecycle.create(req).await;
    super::finish("create_circle", t0, res).map(|body| (StatusCode::CREATED, body))
}

pub async fn list_circles(
    State(st): State<AppState>,
    Query(q): Query<PageQuery>,
) -> ApiResult<CircleListResponse> {
    let t0 = Instant::now();
    let (limit, offset) = q.page();
    let res = st
        .lifecycle
        .list(limit, offset)
        .await
        .map(|(circles, total)| CircleListResponse {
            circles,
            total,
            limit,
            offset,
        });
    super::finish("list_circles", t0, res)
}

pub async fn search_circles(
    State(st): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> ApiResult<Vec<Circle>> {
    let t0 = Instant::now();
    let (limit, offset) = q.page();
    let res = st.lifecycle.search(&q.q, limit, offset).await;
    super::finish("search_circles", t0, res)
}

pub async fn trending_circles(
    State(st): State<AppState>,
    Query(q): Query<TrendingQuery>,
) -> ApiResult<Vec<Circle>> {
    let t0 = Instant::now();
    let res = st.lifecycle.trending(q.limit()).await;
    super::finish("trending_circles", t0, res)
}

pub async fn get_circle(
    State(st): State<AppState>,
    Path(id): Path<u64>,
    Query(q): Query<DetailQuery>,
) -> ApiResult<CircleDetail> {
    let t0 = Instant::now();
    let res = async {
        let viewer = q
            .viewer
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .map(|v| parse_address("viewer", v))
            .transpose()?;
        st.lifecycle.get(id, viewer).await
    }
    .await;
    super::finish("get_circle", t0, res)
}

pub async fn circle_transactions(
    State(st): State<AppState>,
    Path(id): Path<u64>,
    Query(q): Query<PageQuery>,
) -> ApiResult<Vec<LedgerEntry>> {
    let t0 = Instant::now();
    let (limit, offset) = q.page();
    let res = st.lifecycle.transactions(id, limit, offset).await;
    super::finish("circle_transactions", t0, res)
}

pub async fn link_chain_id(
    State(st): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<LinkChainIdRequest>,
) -> ApiResult<Circle> {
    let t0 = Instant::now();
    let res = st.lifecycle.link_chain_id(id, req.chain_circle_id).await;
    super::finish("link_chain_id", t0, res)
}

pub async fn sync_circle(State(st): State<AppState>, Path(id): Path<u64>) -> ApiResult<Circle> {
    let t0 = Instant::now();
    let res = st.lifecycle.sync(id).await;
    super::finish("sync_circle", t0, res)
}

pub async fn refresh_stats(
    State(st): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<CircleStats> {
    let t0 = Instant::now();
    let res = st.lifecycle.refresh_stats(id).await;
    super::finish("refresh_stats", t0, res)
}
