use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strum_macros::{AsRefStr, Display, EnumString};

pub type ClubId = i64;
pub type MemberId = i64;
pub type TeamId = i64;
pub type GameId = i64;
pub type ResultId = i64;

/// Number of placement columns on individual and team result rows.
pub const PLACEMENT_SLOTS: usize = 8;

/// Column names of the placement slots, best finish first.
pub const SLOT_COLUMNS: [&str; PLACEMENT_SLOTS] = [
    "winner", "place_2", "place_3", "place_4", "place_5", "place_6", "place_7", "place_8",
];

/// Which of the three result sources a row came from.
///
/// Declaration order is the "game type" sort order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResultKind {
    Individual,
    Team,
    Cooperative,
}

impl ResultKind {
    pub const ALL: [ResultKind; 3] = [
        ResultKind::Individual,
        ResultKind::Team,
        ResultKind::Cooperative,
    ];

    pub const COMPETITIVE: [ResultKind; 2] = [ResultKind::Individual, ResultKind::Team];

    pub fn is_competitive(self) -> bool {
        !matches!(self, ResultKind::Cooperative)
    }

    /// Discriminator used in SQL unions.
    pub fn code(self) -> i16 {
        match self {
            ResultKind::Individual => 0,
            ResultKind::Team => 1,
            ResultKind::Cooperative => 2,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(ResultKind::Individual),
            1 => Some(ResultKind::Team),
            2 => Some(ResultKind::Cooperative),
            _ => None,
        }
    }
}

/// Someone who can hold a placement or take part in a cooperative play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ActorRef {
    Member(MemberId),
    Team(TeamId),
}

/// Identity of a stored result row. Ids are only unique within one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordRef {
    pub kind: ResultKind,
    pub id: ResultId,
}

impl RecordRef {
    pub fn new(kind: ResultKind, id: ResultId) -> Self {
        Self { kind, id }
    }
}

/// Row of `individual_results` or `team_results`.
///
/// Slots hold member ids for individual rows and team ids for team rows.
/// Slots are expected to be filled from the winner down but gaps occur.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResultRow {
    pub id: ResultId,
    pub game_id: GameId,
    pub game_name: String,
    pub played_at: DateTime<Utc>,
    /// `player_count` or `team_count`.
    pub entrant_count: i32,
    pub placements: [Option<i64>; PLACEMENT_SLOTS],
}

impl RankedResultRow {
    /// Index and id of the best occupied slot.
    pub fn top_slot(&self) -> Option<(usize, i64)> {
        self.placements
            .iter()
            .enumerate()
            .find_map(|(index, slot)| slot.map(|id| (index, id)))
    }
}

/// Row of `cooperative_participants`. Exactly one of the ids should be set.
#[derive(Debug, Clone, PartialEq)]
pub struct CooperativeParticipantRow {
    pub id: i64,
    pub member_id: Option<MemberId>,
    pub team_id: Option<TeamId>,
}

/// Row of `cooperative_results` together with its participants, ordered by
/// participant id.
#[derive(Debug, Clone, PartialEq)]
pub struct CooperativeResultRow {
    pub id: ResultId,
    pub game_id: GameId,
    pub game_name: String,
    pub played_at: DateTime<Utc>,
    pub participant_count: i32,
    /// `win` or `loss` as stored.
    pub outcome: String,
    pub participants: Vec<CooperativeParticipantRow>,
}

impl CooperativeResultRow {
    pub fn is_win(&self) -> bool {
        self.outcome.eq_ignore_ascii_case("win")
    }
}

/// A row read from one of the three result sources, uninterpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    Individual(RankedResultRow),
    Team(RankedResultRow),
    Cooperative(CooperativeResultRow),
}

impl RawResult {
    pub fn kind(&self) -> ResultKind {
        match self {
            RawResult::Individual(_) => ResultKind::Individual,
            RawResult::Team(_) => ResultKind::Team,
            RawResult::Cooperative(_) => ResultKind::Cooperative,
        }
    }

    pub fn id(&self) -> ResultId {
        match self {
            RawResult::Individual(row) | RawResult::Team(row) => row.id,
            RawResult::Cooperative(row) => row.id,
        }
    }

    pub fn record(&self) -> RecordRef {
        RecordRef::new(self.kind(), self.id())
    }

    pub fn game_id(&self) -> GameId {
        match self {
            RawResult::Individual(row) | RawResult::Team(row) => row.game_id,
            RawResult::Cooperative(row) => row.game_id,
        }
    }

    pub fn game_name(&self) -> &str {
        match self {
            RawResult::Individual(row) | RawResult::Team(row) => &row.game_name,
            RawResult::Cooperative(row) => &row.game_name,
        }
    }

    pub fn played_at(&self) -> DateTime<Utc> {
        match self {
            RawResult::Individual(row) | RawResult::Team(row) => row.played_at,
            RawResult::Cooperative(row) => row.played_at,
        }
    }

    pub fn participant_count(&self) -> i32 {
        match self {
            RawResult::Individual(row) | RawResult::Team(row) => row.entrant_count,
            RawResult::Cooperative(row) => row.participant_count,
        }
    }

    /// The actor a one-line summary of this play leads with: the best occupied
    /// slot, or the first participant of a cooperative play.
    pub fn headline_actor(&self) -> Option<ActorRef> {
        match self {
            RawResult::Individual(row) => row.top_slot().map(|(_, id)| ActorRef::Member(id)),
            RawResult::Team(row) => row.top_slot().map(|(_, id)| ActorRef::Team(id)),
            RawResult::Cooperative(row) => row.participants.first().and_then(|p| {
                p.member_id
                    .map(ActorRef::Member)
                    .or(p.team_id.map(ActorRef::Team))
            }),
        }
    }

    /// Rows without a placed entrant or a participant are not plays.
    pub fn has_entrants(&self) -> bool {
        match self {
            RawResult::Individual(row) | RawResult::Team(row) => row.top_slot().is_some(),
            RawResult::Cooperative(row) => !row.participants.is_empty(),
        }
    }

    /// No actor is placed or participates twice, every participant names
    /// exactly one member or team, and the cooperative outcome is known.
    pub fn is_well_formed(&self) -> bool {
        match self {
            RawResult::Individual(row) | RawResult::Team(row) => {
                let mut seen = HashSet::new();
                row.placements.iter().flatten().all(|id| seen.insert(*id))
            }
            RawResult::Cooperative(row) => {
                let known_outcome = row.outcome.eq_ignore_ascii_case("win")
                    || row.outcome.eq_ignore_ascii_case("loss");
                let mut seen = HashSet::new();
                known_outcome
                    && row.participants.iter().all(|p| {
                        p.member_id.is_some() != p.team_id.is_some()
                            && seen.insert((p.member_id, p.team_id))
                    })
            }
        }
    }

    /// Rows that appear in feeds and their counts.
    pub fn is_play(&self) -> bool {
        self.has_entrants() && self.is_well_formed()
    }

    /// Whether any placement or participant matches one of `actors`.
    pub fn involves(&self, actors: &[ActorRef]) -> bool {
        match self {
            RawResult::Individual(row) => row
                .placements
                .iter()
                .flatten()
                .any(|id| actors.contains(&ActorRef::Member(*id))),
            RawResult::Team(row) => row
                .placements
                .iter()
                .flatten()
                .any(|id| actors.contains(&ActorRef::Team(*id))),
            RawResult::Cooperative(row) => row.participants.iter().any(|p| {
                p.member_id
                    .is_some_and(|id| actors.contains(&ActorRef::Member(id)))
                    || p.team_id.is_some_and(|id| actors.contains(&ActorRef::Team(id)))
            }),
        }
    }
}

/// Row of the `champions` ledger. An open title has no `end_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChampionRow {
    pub id: i64,
    pub club_id: ClubId,
    pub game_id: GameId,
    pub member_id: MemberId,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl ChampionRow {
    pub fn is_current(&self) -> bool {
        self.end_date.is_none()
    }
}
