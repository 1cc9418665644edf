use std::collections::HashSet;

use chrono::NaiveDate;

use super::models::{Match, Outcome, SummaryOptions};
use crate::results::models::RecordRef;

/// Per-member running totals, fed one outcome at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberMetrics {
    pub competitive_games: u32,
    pub position_sum: u64,
    pub wins: u32,
    pub coop_games: u32,
    pub coop_wins: u32,
}

impl MemberMetrics {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Ranked { position } => {
                self.competitive_games += 1;
                self.position_sum += u64::from(*position);
                if *position == 1 {
                    self.wins += 1;
                }
            }
            Outcome::Binary { won } => {
                self.coop_games += 1;
                if *won {
                    self.coop_wins += 1;
                }
            }
        }
    }

    /// Mean finishing position over competitive outcomes; lower is better.
    pub fn average_finish(&self) -> Option<f64> {
        if self.competitive_games == 0 {
            return None;
        }
        Some(self.position_sum as f64 / f64::from(self.competitive_games))
    }

    /// Cooperative win percentage rounded to the nearest integer.
    pub fn coop_win_rate(&self) -> Option<u32> {
        if self.coop_games == 0 {
            return None;
        }
        let rate = f64::from(self.coop_wins) / f64::from(self.coop_games) * 100.0;
        Some(rate.round() as u32)
    }
}

/// Club-wide play and game-day counts gathered in one pass over matches.
#[derive(Debug, Clone, Default)]
pub struct ClubTally {
    options: SummaryOptions,
    plays: HashSet<RecordRef>,
    cooperative_plays: HashSet<RecordRef>,
    days: HashSet<NaiveDate>,
}

impl ClubTally {
    pub fn new(options: SummaryOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn record(&mut self, unified: &Match) {
        // A row with nobody in it is not a play.
        if unified.participants.is_empty() {
            return;
        }
        if unified.is_competitive() {
            self.plays.insert(unified.record);
        } else {
            self.cooperative_plays.insert(unified.record);
            if !self.options.include_cooperative {
                return;
            }
            self.plays.insert(unified.record);
        }
        self.days.insert(unified.played_on());
    }

    pub fn play_count(&self) -> u64 {
        self.plays.len() as u64
    }

    pub fn cooperative_play_count(&self) -> u64 {
        self.cooperative_plays.len() as u64
    }

    pub fn game_day_count(&self) -> u64 {
        self.days.len() as u64
    }
}

/// Folds unified matches into member metrics or club tallies.
pub struct MetricsAggregator;

impl MetricsAggregator {
    pub fn member<'a>(matches: impl IntoIterator<Item = &'a Match>) -> MemberMetrics {
        let mut metrics = MemberMetrics::default();
        for unified in matches {
            for participant in &unified.participants {
                metrics.record(&participant.outcome);
            }
        }
        metrics
    }

    pub fn club<'a>(
        matches: impl IntoIterator<Item = &'a Match>,
        options: SummaryOptions,
    ) -> ClubTally {
        let mut tally = ClubTally::new(options);
        for unified in matches {
            tally.record(unified);
        }
        tally
    }
}
