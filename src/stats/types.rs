use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

use super::{
    feed::SortSpec,
    models::{FeedPage, MatchOutcome, MemberHistory, Outcome, SummaryOptions},
};
use crate::results::{models::ActorRef, DateRange, ResultKind};

// Query values arrive as raw strings so a malformed one degrades to its
// default instead of failing the request.

/// Query string of the feed endpoints
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub sort: Option<String>,
    pub dir: Option<String>,
    pub page: Option<String>,
}

impl FeedQuery {
    pub fn sort_spec(&self) -> SortSpec {
        SortSpec::parse(self.sort.as_deref(), self.dir.as_deref())
    }

    /// 1-based page; anything below one or unreadable means the first page.
    pub fn page(&self) -> u32 {
        lenient::<i64>(self.page.as_deref(), "page")
            .unwrap_or(1)
            .clamp(1, i64::from(u32::MAX)) as u32
    }
}

/// Query string of the member history endpoint
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub sort: Option<String>,
    pub dir: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl HistoryQuery {
    pub fn sort_spec(&self) -> SortSpec {
        SortSpec::parse(self.sort.as_deref(), self.dir.as_deref())
    }

    /// Unreadable bounds are dropped.
    pub fn range(&self) -> Option<DateRange> {
        let from = lenient::<DateTime<Utc>>(self.from.as_deref(), "from");
        let to = lenient::<DateTime<Utc>>(self.to.as_deref(), "to");
        if from.is_none() && to.is_none() {
            return None;
        }
        Some(DateRange { from, to })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub include_cooperative: Option<String>,
}

impl SummaryQuery {
    pub fn options(&self) -> SummaryOptions {
        SummaryOptions {
            include_cooperative: lenient(self.include_cooperative.as_deref(), "include_cooperative")
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<String>,
}

impl LeaderboardQuery {
    pub fn limit(&self, default: u32) -> u32 {
        lenient(self.limit.as_deref(), "limit").unwrap_or(default)
    }
}

fn lenient<T: FromStr>(raw: Option<&str>, what: &str) -> Option<T> {
    let value = raw.map(str::trim).filter(|value| !value.is_empty())?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(value, what, "Unreadable query parameter, ignoring");
            None
        }
    }
}

/// One outcome as rendered to JSON callers
#[derive(Debug, Serialize, Deserialize)]
pub struct OutcomeResponse {
    pub result_id: i64,
    pub participant_type: ResultKind,
    pub played_at: DateTime<Utc>,
    pub game_id: i64,
    pub game_name: String,
    pub participant_count: i32,
    pub actor: ActorRef,
    pub actor_name: Option<String>,
    pub outcome: Outcome,
    /// Rank for competitive outcomes, `0` cooperative win, `-1` loss.
    pub position: i32,
}

impl From<MatchOutcome> for OutcomeResponse {
    fn from(outcome: MatchOutcome) -> Self {
        Self {
            result_id: outcome.record.id,
            participant_type: outcome.participant_type(),
            played_at: outcome.played_at,
            game_id: outcome.game_id,
            game_name: outcome.game_name,
            participant_count: outcome.participant_count,
            actor: outcome.actor,
            actor_name: outcome.actor_name,
            position: outcome.outcome.legacy_code(),
            outcome: outcome.outcome,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedResponse {
    pub outcomes: Vec<OutcomeResponse>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}

impl From<FeedPage> for FeedResponse {
    fn from(page: FeedPage) -> Self {
        Self {
            outcomes: page.outcomes.into_iter().map(Into::into).collect(),
            total_count: page.total_count,
            page: page.page,
            page_size: page.page_size,
            has_more: page.has_more,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub member_id: i64,
    pub nickname: String,
    pub average_finish: Option<f64>,
    pub coop_win_rate: Option<u32>,
    pub competitive_games: u32,
    pub wins: u32,
    pub coop_games: u32,
    pub coop_wins: u32,
    pub outcomes: Vec<OutcomeResponse>,
}

impl From<MemberHistory> for HistoryResponse {
    fn from(history: MemberHistory) -> Self {
        Self {
            member_id: history.member_id,
            nickname: history.nickname,
            // Two decimals is all any caller renders.
            average_finish: history.average_finish.map(|avg| (avg * 100.0).round() / 100.0),
            coop_win_rate: history.coop_win_rate,
            competitive_games: history.competitive_games,
            wins: history.wins,
            coop_games: history.coop_games,
            coop_wins: history.coop_wins,
            outcomes: history.outcomes.into_iter().map(Into::into).collect(),
        }
    }
}
