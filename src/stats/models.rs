use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::results::models::{ActorRef, GameId, MemberId, RecordRef, ResultKind};

/// One actor's result in one play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// 1-based finishing position in a competitive play.
    Ranked { position: u8 },
    /// Shared win or loss of a cooperative play.
    Binary { won: bool },
}

impl Outcome {
    pub fn position(&self) -> Option<u8> {
        match self {
            Outcome::Ranked { position } => Some(*position),
            Outcome::Binary { .. } => None,
        }
    }

    pub fn is_win(&self) -> bool {
        match self {
            Outcome::Ranked { position } => *position == 1,
            Outcome::Binary { won } => *won,
        }
    }

    /// Single-column encoding used by older consumers: the rank for
    /// competitive outcomes, `0` for a cooperative win and `-1` for a loss.
    pub fn legacy_code(&self) -> i32 {
        match self {
            Outcome::Ranked { position } => i32::from(*position),
            Outcome::Binary { won: true } => 0,
            Outcome::Binary { won: false } => -1,
        }
    }

    /// Ranked outcomes by position, then cooperative wins, then losses.
    pub fn sort_rank(&self) -> (u8, i32) {
        match self {
            Outcome::Ranked { position } => (0, i32::from(*position)),
            Outcome::Binary { won: true } => (1, 0),
            Outcome::Binary { won: false } => (1, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub actor: ActorRef,
    pub outcome: Outcome,
}

/// A play normalised from any of the three result sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub record: RecordRef,
    pub game_id: GameId,
    pub game_name: String,
    pub played_at: DateTime<Utc>,
    pub participant_count: i32,
    /// Best finish first for competitive plays, participant order otherwise.
    pub participants: Vec<Participant>,
}

impl Match {
    pub fn kind(&self) -> ResultKind {
        self.record.kind
    }

    pub fn is_competitive(&self) -> bool {
        self.record.kind.is_competitive()
    }

    pub fn played_on(&self) -> NaiveDate {
        self.played_at.date_naive()
    }

    pub fn outcome_for(&self, participant: &Participant) -> MatchOutcome {
        MatchOutcome {
            record: self.record,
            played_at: self.played_at,
            game_id: self.game_id,
            game_name: self.game_name.clone(),
            participant_count: self.participant_count,
            actor: participant.actor,
            actor_name: None,
            outcome: participant.outcome,
        }
    }

    pub fn outcomes(&self) -> impl Iterator<Item = MatchOutcome> + '_ {
        self.participants.iter().map(|p| self.outcome_for(p))
    }

    pub fn headline(&self) -> Option<MatchOutcome> {
        self.participants.first().map(|p| self.outcome_for(p))
    }
}

/// The unified, flat view of one actor's result in one play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub record: RecordRef,
    pub played_at: DateTime<Utc>,
    pub game_id: GameId,
    pub game_name: String,
    pub participant_count: i32,
    pub actor: ActorRef,
    pub actor_name: Option<String>,
    pub outcome: Outcome,
}

impl MatchOutcome {
    pub fn participant_type(&self) -> ResultKind {
        self.record.kind
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberHistory {
    pub member_id: MemberId,
    pub nickname: String,
    pub outcomes: Vec<MatchOutcome>,
    /// `None` when the member has no competitive outcome.
    pub average_finish: Option<f64>,
    /// Percentage, `None` when the member has no cooperative outcome.
    pub coop_win_rate: Option<u32>,
    pub competitive_games: u32,
    pub wins: u32,
    pub coop_games: u32,
    pub coop_wins: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPage {
    pub outcomes: Vec<MatchOutcome>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryOptions {
    /// Count cooperative plays (and their days) alongside competitive ones.
    pub include_cooperative: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClubSummary {
    pub member_count: u64,
    pub game_count: u64,
    pub play_count: u64,
    pub cooperative_play_count: u64,
    pub game_day_count: u64,
    pub champions_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub member_id: MemberId,
    pub nickname: String,
    pub wins: u32,
    pub competitive_plays: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChampionEntry {
    pub game_id: GameId,
    pub game_name: String,
    pub member_id: MemberId,
    pub nickname: String,
    pub since: NaiveDate,
}
