use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::warn;

use super::models::{LeaderboardEntry, Match};
use crate::directory::{Member, Team};
use crate::results::models::{ActorRef, MemberId, TeamId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Standing {
    wins: u32,
    competitive_plays: u32,
}

/// Win table for one club, filled one match at a time.
#[derive(Debug, Default)]
pub struct Leaderboard {
    rosters: HashMap<TeamId, Vec<MemberId>>,
    standings: HashMap<MemberId, Standing>,
}

impl Leaderboard {
    pub fn new(teams: &[Team]) -> Self {
        Self {
            rosters: teams
                .iter()
                .map(|team| (team.id, team.members().collect()))
                .collect(),
            standings: HashMap::new(),
        }
    }

    fn credited_members(&self, actor: &ActorRef) -> Vec<MemberId> {
        match actor {
            ActorRef::Member(id) => vec![*id],
            ActorRef::Team(id) => self.rosters.get(id).cloned().unwrap_or_default(),
        }
    }

    /// Credits every member behind a competitive match's participants.
    /// Cooperative matches are ignored.
    pub fn record(&mut self, unified: &Match) {
        if !unified.is_competitive() {
            return;
        }

        let mut credited = HashSet::new();
        for participant in &unified.participants {
            for member_id in self.credited_members(&participant.actor) {
                if !credited.insert(member_id) {
                    warn!(
                        kind = %unified.record.kind,
                        result_id = unified.record.id,
                        member_id,
                        "Member credited twice in one result, ignoring repeat"
                    );
                    continue;
                }

                let standing = self.standings.entry(member_id).or_default();
                standing.competitive_plays += 1;
                if participant.outcome.is_win() {
                    standing.wins += 1;
                }
            }
        }
    }

    /// Ranks active members with at least one win, best first, keeping `limit`.
    pub fn finish(self, members: &[Member], limit: usize) -> Vec<LeaderboardEntry> {
        let mut ranked: Vec<(&Member, Standing)> = members
            .iter()
            .filter(|member| member.is_active())
            .filter_map(|member| {
                self.standings
                    .get(&member.id)
                    .filter(|standing| standing.wins > 0)
                    .map(|standing| (member, *standing))
            })
            .collect();

        ranked.sort_by(|(a, a_standing), (b, b_standing)| compare(a, a_standing, b, b_standing));

        ranked
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(index, (member, standing))| LeaderboardEntry {
                rank: index as u32 + 1,
                member_id: member.id,
                nickname: member.nickname.clone(),
                wins: standing.wins,
                competitive_plays: standing.competitive_plays,
            })
            .collect()
    }
}

fn compare(a: &Member, a_standing: &Standing, b: &Member, b_standing: &Standing) -> Ordering {
    b_standing
        .wins
        .cmp(&a_standing.wins)
        .then_with(|| b_standing.competitive_plays.cmp(&a_standing.competitive_plays))
        .then_with(|| a.nickname.cmp(&b.nickname))
        .then_with(|| a.id.cmp(&b.id))
}
