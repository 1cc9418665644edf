use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::{
    models::{ChampionEntry, ClubSummary, LeaderboardEntry},
    types::{
        FeedQuery, FeedResponse, HistoryQuery, HistoryResponse, LeaderboardQuery, SummaryQuery,
    },
};
use crate::results::models::{ClubId, GameId, MemberId};
use crate::shared::{AppError, AppState, IdPath, LenientQuery};

/// GET /clubs/:club_id/feed
///
/// One entry per play, newest first unless `sort`/`dir` say otherwise.
#[instrument(name = "club_feed", skip(state))]
pub async fn club_feed(
    State(state): State<AppState>,
    IdPath(club_id): IdPath<ClubId>,
    LenientQuery(query): LenientQuery<FeedQuery>,
) -> Result<Json<FeedResponse>, AppError> {
    let page = state
        .stats_service
        .get_club_feed(club_id, query.sort_spec(), query.page())
        .await?;

    info!(club_id, total_count = page.total_count, "Club feed served");
    Ok(Json(page.into()))
}

/// GET /games/:game_id/feed
#[instrument(name = "game_feed", skip(state))]
pub async fn game_feed(
    State(state): State<AppState>,
    IdPath(game_id): IdPath<GameId>,
    LenientQuery(query): LenientQuery<FeedQuery>,
) -> Result<Json<FeedResponse>, AppError> {
    let page = state
        .stats_service
        .get_game_feed(game_id, query.sort_spec(), query.page())
        .await?;

    info!(game_id, total_count = page.total_count, "Game feed served");
    Ok(Json(page.into()))
}

/// GET /members/:member_id/history
#[instrument(name = "member_history", skip(state))]
pub async fn member_history(
    State(state): State<AppState>,
    IdPath(member_id): IdPath<MemberId>,
    LenientQuery(query): LenientQuery<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let history = state
        .stats_service
        .get_member_history_between(member_id, query.sort_spec(), query.range())
        .await?;

    Ok(Json(history.into()))
}

/// GET /clubs/:club_id/summary
#[instrument(name = "club_summary", skip(state))]
pub async fn club_summary(
    State(state): State<AppState>,
    IdPath(club_id): IdPath<ClubId>,
    LenientQuery(query): LenientQuery<SummaryQuery>,
) -> Result<Json<ClubSummary>, AppError> {
    let summary = state
        .stats_service
        .get_club_summary(club_id, query.options())
        .await?;

    Ok(Json(summary))
}

/// GET /clubs/:club_id/leaderboard
#[instrument(name = "leaderboard", skip(state))]
pub async fn leaderboard(
    State(state): State<AppState>,
    IdPath(club_id): IdPath<ClubId>,
    LenientQuery(query): LenientQuery<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let limit = query.limit(state.settings.leaderboard_limit);
    let entries = state.stats_service.get_leaderboard(club_id, limit).await?;

    Ok(Json(entries))
}

/// GET /clubs/:club_id/champions
#[instrument(name = "champions", skip(state))]
pub async fn champions(
    State(state): State<AppState>,
    IdPath(club_id): IdPath<ClubId>,
) -> Result<Json<Vec<ChampionEntry>>, AppError> {
    let champions = state.stats_service.get_current_champions(club_id).await?;
    Ok(Json(champions))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
