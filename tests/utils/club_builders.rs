use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use clubstats::{
    directory::{Club, Game, InMemoryClubDirectory, Member, MemberStatus, Team},
    results::{
        models::{
            CooperativeParticipantRow, CooperativeResultRow, RankedResultRow, RawResult,
            PLACEMENT_SLOTS,
        },
        InMemoryResultRepository,
    },
};

use super::setup::TestSetup;

// ============================================================================
// Club Setup Utilities
// ============================================================================

/// `(day, hour)` of March 2024.
pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

fn ranked(id: i64, game_id: i64, played_at: DateTime<Utc>, slots: &[Option<i64>]) -> RankedResultRow {
    let mut placements = [None; PLACEMENT_SLOTS];
    placements[..slots.len()].copy_from_slice(slots);
    RankedResultRow {
        id,
        game_id,
        game_name: String::new(),
        played_at,
        entrant_count: slots.iter().flatten().count() as i32,
        placements,
    }
}

pub struct ClubBuilder {
    club_id: i64,
    members: Vec<Member>,
    teams: Vec<Team>,
    games: Vec<Game>,
    results: Vec<RawResult>,
}

impl ClubBuilder {
    pub fn new(club_id: i64) -> Self {
        Self {
            club_id,
            members: vec![],
            teams: vec![],
            games: vec![],
            results: vec![],
        }
    }

    /// ann, bob, cyd, dee (dee inactive); teams Red {ann, bob} and
    /// Blue {cyd, dee}; games Azul, Brass, Pandemic.
    pub fn with_regulars(self) -> Self {
        self.with_member(1, "ann", MemberStatus::Active)
            .with_member(2, "bob", MemberStatus::Active)
            .with_member(3, "cyd", MemberStatus::Active)
            .with_member(4, "dee", MemberStatus::Inactive)
            .with_team(10, "Red", &[1, 2])
            .with_team(11, "Blue", &[3, 4])
            .with_game(1, "Azul")
            .with_game(2, "Brass")
            .with_game(3, "Pandemic")
    }

    pub fn with_member(mut self, id: i64, nickname: &str, status: MemberStatus) -> Self {
        self.members.push(Member {
            id,
            club_id: self.club_id,
            nickname: nickname.to_string(),
            status,
        });
        self
    }

    pub fn with_team(mut self, id: i64, name: &str, roster: &[i64]) -> Self {
        let mut slots = [None; 4];
        for (slot, member_id) in slots.iter_mut().zip(roster) {
            *slot = Some(*member_id);
        }
        self.teams.push(Team {
            id,
            club_id: self.club_id,
            name: name.to_string(),
            roster: slots,
        });
        self
    }

    pub fn with_game(mut self, id: i64, name: &str) -> Self {
        self.games.push(Game {
            id,
            club_id: self.club_id,
            name: name.to_string(),
            image: None,
        });
        self
    }

    pub fn with_individual(
        mut self,
        id: i64,
        game_id: i64,
        played_at: DateTime<Utc>,
        slots: &[Option<i64>],
    ) -> Self {
        self.results
            .push(RawResult::Individual(ranked(id, game_id, played_at, slots)));
        self
    }

    pub fn with_team_result(
        mut self,
        id: i64,
        game_id: i64,
        played_at: DateTime<Utc>,
        slots: &[Option<i64>],
    ) -> Self {
        self.results
            .push(RawResult::Team(ranked(id, game_id, played_at, slots)));
        self
    }

    pub fn with_coop(
        mut self,
        id: i64,
        game_id: i64,
        played_at: DateTime<Utc>,
        outcome: &str,
        member_ids: &[i64],
    ) -> Self {
        self.results.push(RawResult::Cooperative(CooperativeResultRow {
            id,
            game_id,
            game_name: String::new(),
            played_at,
            participant_count: member_ids.len() as i32,
            outcome: outcome.to_string(),
            participants: member_ids
                .iter()
                .enumerate()
                .map(|(index, member_id)| CooperativeParticipantRow {
                    id: id * 100 + index as i64,
                    member_id: Some(*member_id),
                    team_id: None,
                })
                .collect(),
        }));
        self
    }

    /// A busy season: many plays sharing timestamps, games and sizes so
    /// that every sort key produces long runs of ties.
    pub fn with_busy_season(mut self) -> Self {
        let line_ups: [&[Option<i64>]; 3] = [
            &[Some(1), Some(2), Some(3)],
            &[Some(3), None, Some(1)],
            &[Some(2), Some(1)],
        ];
        for id in 1..=14 {
            let played_at = at(1 + (id as u32 % 3), 19);
            let game_id = 1 + id % 2;
            self = self.with_individual(id, game_id, played_at, line_ups[id as usize % 3]);
        }
        for id in 1..=6 {
            let slots: &[Option<i64>] = if id % 2 == 0 {
                &[Some(10), Some(11)]
            } else {
                &[Some(11), Some(10)]
            };
            self = self.with_team_result(id, 2, at(2, 19), slots);
        }
        for id in 1..=5 {
            let outcome = if id % 2 == 0 { "loss" } else { "win" };
            self = self.with_coop(id, 3, at(1 + id as u32 % 2, 19), outcome, &[2, 3]);
        }
        self
    }

    pub async fn build(self, page_size: u32) -> TestSetup {
        let directory = Arc::new(InMemoryClubDirectory::new());
        directory
            .add_club(Club {
                id: self.club_id,
                name: format!("Club {}", self.club_id),
            })
            .await;
        for member in self.members {
            directory.add_member(member).await;
        }
        for team in self.teams {
            directory.add_team(team).await;
        }
        for game in self.games {
            directory.add_game(game).await;
        }

        let results = Arc::new(InMemoryResultRepository::new(Arc::clone(&directory)));
        for raw in self.results {
            results.insert(raw).await.expect("result should be stored");
        }

        TestSetup::new(directory, results, page_size)
    }
}
