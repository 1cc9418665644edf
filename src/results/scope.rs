use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{ActorRef, ClubId, GameId, MemberId, ResultKind};
use crate::stats::StatsError;

/// The identity that bounds a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum Scope {
    Club(ClubId),
    Member(MemberId),
    Game(GameId),
}

impl Scope {
    pub fn id(&self) -> i64 {
        match self {
            Scope::Club(id) | Scope::Member(id) | Scope::Game(id) => *id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Scope::Club(_) => "club",
            Scope::Member(_) => "member",
            Scope::Game(_) => "game",
        }
    }

    /// Rejects ids that can never name a stored row.
    pub fn validate(&self) -> Result<(), StatsError> {
        if self.id() <= 0 {
            return Err(StatsError::InvalidParameter(format!(
                "{} id must be positive",
                self.label()
            )));
        }
        Ok(())
    }
}

/// A scope checked against storage, with its owning club.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    pub scope: Scope,
    pub club_id: ClubId,
    /// For member scopes: the member and every team rostering them.
    pub actors: Vec<ActorRef>,
}

impl ResolvedScope {
    pub fn club(club_id: ClubId) -> Self {
        Self {
            scope: Scope::Club(club_id),
            club_id,
            actors: Vec::new(),
        }
    }

    pub fn game_id(&self) -> Option<GameId> {
        match self.scope {
            Scope::Game(id) => Some(id),
            _ => None,
        }
    }

    pub fn member_id(&self) -> Option<MemberId> {
        match self.scope {
            Scope::Member(id) => Some(id),
            _ => None,
        }
    }

    pub fn team_ids(&self) -> Vec<i64> {
        self.actors
            .iter()
            .filter_map(|actor| match actor {
                ActorRef::Team(id) => Some(*id),
                ActorRef::Member(_) => None,
            })
            .collect()
    }
}

/// Half-open `[from, to)` interval on `played_at`. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at < to)
    }
}

/// Everything a repository needs to select raw rows.
#[derive(Debug, Clone)]
pub struct ResultFilter {
    pub scope: ResolvedScope,
    pub range: Option<DateRange>,
    pub kinds: Vec<ResultKind>,
}

impl ResultFilter {
    pub fn new(scope: ResolvedScope) -> Self {
        Self {
            scope,
            range: None,
            kinds: ResultKind::ALL.to_vec(),
        }
    }

    pub fn with_range(mut self, range: Option<DateRange>) -> Self {
        self.range = range;
        self
    }

    pub fn with_kinds(mut self, kinds: &[ResultKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    pub fn reads(&self, kind: ResultKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn from(&self) -> Option<DateTime<Utc>> {
        self.range.and_then(|range| range.from)
    }

    pub fn to(&self) -> Option<DateTime<Utc>> {
        self.range.and_then(|range| range.to)
    }
}
