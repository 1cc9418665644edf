use std::collections::HashSet;

use futures::stream::{BoxStream, StreamExt};
use tracing::warn;

use super::{
    models::{Match, MatchOutcome, Outcome, Participant},
    StatsError,
};
use crate::results::{
    models::{ActorRef, CooperativeResultRow, RankedResultRow, RawResult, RecordRef},
    scope::ResolvedScope,
    ResultStream,
};

/// Which participants of a row to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorFilter {
    All,
    Only(Vec<ActorRef>),
}

impl ActorFilter {
    pub fn for_scope(scope: &ResolvedScope) -> Self {
        if scope.actors.is_empty() {
            ActorFilter::All
        } else {
            ActorFilter::Only(scope.actors.clone())
        }
    }

    fn accepts(&self, actor: &ActorRef) -> bool {
        match self {
            ActorFilter::All => true,
            ActorFilter::Only(actors) => actors.contains(actor),
        }
    }

    fn is_selective(&self) -> bool {
        matches!(self, ActorFilter::Only(_))
    }
}

/// Translates the three stored result shapes into [`Match`].
pub struct ResultUnifier;

impl ResultUnifier {
    /// Converts one raw row. Fails with [`StatsError::DataIntegrity`] when the
    /// row cannot be interpreted without guessing.
    pub fn unify(raw: RawResult, filter: &ActorFilter) -> Result<Match, StatsError> {
        let record = raw.record();
        match raw {
            RawResult::Individual(row) => Self::ranked(record, row, ActorRef::Member, filter),
            RawResult::Team(row) => Self::ranked(record, row, ActorRef::Team, filter),
            RawResult::Cooperative(row) => Self::cooperative(record, row, filter),
        }
    }

    /// Like [`ResultUnifier::unify`], but anomalies are logged and yield `None`.
    pub fn unify_or_skip(
        raw: RawResult,
        filter: &ActorFilter,
    ) -> Result<Option<Match>, StatsError> {
        let record = raw.record();
        match Self::unify(raw, filter) {
            Ok(unified) => Ok(Some(unified)),
            Err(StatsError::DataIntegrity(reason)) => {
                warn!(
                    kind = %record.kind,
                    result_id = record.id,
                    %reason,
                    "Skipping anomalous result row"
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// The outcome a one-line summary of the play leads with.
    pub fn headline(raw: RawResult) -> Result<Option<MatchOutcome>, StatsError> {
        Ok(Self::unify_or_skip(raw, &ActorFilter::All)?.and_then(|m| m.headline()))
    }

    pub fn unify_stream<'a>(
        stream: ResultStream<'a>,
        filter: ActorFilter,
    ) -> BoxStream<'a, Result<Match, StatsError>> {
        stream
            .filter_map(move |item| {
                let unified = match item {
                    Ok(raw) => Self::unify_or_skip(raw, &filter).transpose(),
                    Err(err) => Some(Err(err)),
                };
                futures::future::ready(unified)
            })
            .boxed()
    }

    fn ranked(
        record: RecordRef,
        row: RankedResultRow,
        to_actor: fn(i64) -> ActorRef,
        filter: &ActorFilter,
    ) -> Result<Match, StatsError> {
        let mut seen = HashSet::new();
        let mut participants = Vec::new();

        for (index, slot) in row.placements.iter().enumerate() {
            let Some(id) = slot else { continue };
            let actor = to_actor(*id);
            if !seen.insert(actor) {
                return Err(anomaly(record, format!("{actor:?} holds more than one placement")));
            }
            if filter.accepts(&actor) {
                participants.push(Participant {
                    actor,
                    outcome: Outcome::Ranked {
                        position: (index + 1) as u8,
                    },
                });
            }
        }

        if filter.is_selective() && participants.len() > 1 {
            return Err(anomaly(
                record,
                format!("scope occupies {} placements", participants.len()),
            ));
        }

        Ok(Match {
            record,
            game_id: row.game_id,
            game_name: row.game_name,
            played_at: row.played_at,
            participant_count: row.entrant_count,
            participants,
        })
    }

    fn cooperative(
        record: RecordRef,
        row: CooperativeResultRow,
        filter: &ActorFilter,
    ) -> Result<Match, StatsError> {
        let won = match row.outcome.to_ascii_lowercase().as_str() {
            "win" => true,
            "loss" => false,
            other => return Err(anomaly(record, format!("unknown outcome {other:?}"))),
        };

        let mut seen = HashSet::new();
        let mut participants = Vec::new();

        for participant in &row.participants {
            let actor = match (participant.member_id, participant.team_id) {
                (Some(member_id), None) => ActorRef::Member(member_id),
                (None, Some(team_id)) => ActorRef::Team(team_id),
                _ => {
                    return Err(anomaly(
                        record,
                        format!(
                            "participant {} must reference exactly one member or team",
                            participant.id
                        ),
                    ))
                }
            };
            if !seen.insert(actor) {
                return Err(anomaly(record, format!("{actor:?} participates twice")));
            }
            if filter.accepts(&actor) {
                participants.push(Participant {
                    actor,
                    outcome: Outcome::Binary { won },
                });
            }
        }

        if filter.is_selective() && participants.len() > 1 {
            return Err(anomaly(
                record,
                format!("scope participates {} times", participants.len()),
            ));
        }

        Ok(Match {
            record,
            game_id: row.game_id,
            game_name: row.game_name,
            played_at: row.played_at,
            participant_count: row.participant_count,
            participants,
        })
    }
}

fn anomaly(record: RecordRef, reason: String) -> StatsError {
    StatsError::DataIntegrity(format!("{} result {}: {}", record.kind, record.id, reason))
}
