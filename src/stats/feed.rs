use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use tracing::warn;

use super::models::MatchOutcome;
use crate::results::models::RecordRef;

/// Columns a feed may be ordered by. Anything else falls back to the default.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SortKey {
    #[default]
    #[strum(to_string = "timestamp", serialize = "date", serialize = "played_at")]
    Timestamp,
    #[strum(to_string = "game", serialize = "game_name")]
    Game,
    #[strum(to_string = "actor", serialize = "winner", serialize = "player")]
    Actor,
    #[strum(
        to_string = "participants",
        serialize = "participant_count",
        serialize = "players"
    )]
    Participants,
    #[strum(to_string = "type", serialize = "game_type")]
    GameType,
    #[strum(to_string = "position", serialize = "finish")]
    Position,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum SortDirection {
    #[strum(serialize = "asc")]
    Asc,
    #[default]
    #[strum(serialize = "desc")]
    Desc,
}

impl SortDirection {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Requested ordering of a feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Parses caller input, recovering from anything unrecognised with the
    /// default (newest first).
    pub fn parse(key: Option<&str>, direction: Option<&str>) -> Self {
        Self {
            key: parse_or_default(key, "sort key"),
            direction: parse_or_default(direction, "sort direction"),
        }
    }

    /// Total order: sort key, then record id, then source, all in the
    /// requested direction. Missing values sort last either way.
    pub fn compare<T: FeedSortable>(&self, a: &T, b: &T) -> Ordering {
        let primary = match self.key {
            SortKey::Timestamp => self.direction.apply(a.played_at().cmp(&b.played_at())),
            SortKey::Game => self.direction.apply(a.game_name().cmp(b.game_name())),
            SortKey::Actor => match (a.actor_name(), b.actor_name()) {
                (Some(x), Some(y)) => self.direction.apply(x.cmp(y)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            SortKey::Participants => self
                .direction
                .apply(a.participant_count().cmp(&b.participant_count())),
            SortKey::GameType => self.direction.apply(a.record().kind.cmp(&b.record().kind)),
            SortKey::Position => self.direction.apply(a.outcome_rank().cmp(&b.outcome_rank())),
        };

        primary
            .then_with(|| self.direction.apply(a.record().id.cmp(&b.record().id)))
            .then_with(|| self.direction.apply(a.record().kind.cmp(&b.record().kind)))
    }

    pub fn sort<T: FeedSortable>(&self, items: &mut [T]) {
        items.sort_by(|a, b| self.compare(a, b));
    }
}

fn parse_or_default<T: FromStr + Default>(raw: Option<&str>, what: &str) -> T {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => T::default(),
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!(value, what, "Unrecognised feed parameter, using default");
            T::default()
        }),
    }
}

/// Values a feed row can be ordered on.
pub trait FeedSortable {
    fn record(&self) -> RecordRef;
    fn played_at(&self) -> DateTime<Utc>;
    fn game_name(&self) -> &str;
    fn actor_name(&self) -> Option<&str>;
    fn participant_count(&self) -> i32;
    fn outcome_rank(&self) -> (u8, i32);
}

impl FeedSortable for MatchOutcome {
    fn record(&self) -> RecordRef {
        self.record
    }

    fn played_at(&self) -> DateTime<Utc> {
        self.played_at
    }

    fn game_name(&self) -> &str {
        &self.game_name
    }

    fn actor_name(&self) -> Option<&str> {
        self.actor_name.as_deref()
    }

    fn participant_count(&self) -> i32 {
        self.participant_count
    }

    fn outcome_rank(&self) -> (u8, i32) {
        self.outcome.sort_rank()
    }
}

/// Sort projection of one stored play, computed without interpreting the row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedKey {
    pub record: RecordRef,
    pub played_at: DateTime<Utc>,
    pub game_name: String,
    pub headline_name: Option<String>,
    pub participant_count: i32,
    pub outcome_rank: (u8, i32),
}

impl FeedSortable for FeedKey {
    fn record(&self) -> RecordRef {
        self.record
    }

    fn played_at(&self) -> DateTime<Utc> {
        self.played_at
    }

    fn game_name(&self) -> &str {
        &self.game_name
    }

    fn actor_name(&self) -> Option<&str> {
        self.headline_name.as_deref()
    }

    fn participant_count(&self) -> i32 {
        self.participant_count
    }

    fn outcome_rank(&self) -> (u8, i32) {
        self.outcome_rank
    }
}

/// A window over an ordered feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedWindow {
    pub sort: SortSpec,
    pub offset: u64,
    pub limit: u32,
}

/// 1-based page request with a fixed page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn window(&self, sort: SortSpec) -> FeedWindow {
        FeedWindow {
            sort,
            offset: self.offset(),
            limit: self.page_size,
        }
    }

    pub fn has_more(&self, fetched: usize, total: u64) -> bool {
        self.offset() + (fetched as u64) < total
    }
}
