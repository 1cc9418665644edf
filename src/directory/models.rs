use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::results::models::{ActorRef, ClubId, GameId, MemberId, TeamId};

/// Maximum number of members on a team roster.
pub const ROSTER_SLOTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Club {
    pub id: ClubId,
    pub name: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MemberStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub club_id: ClubId,
    pub nickname: String,
    pub status: MemberStatus,
}

impl Member {
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub club_id: ClubId,
    pub name: String,
    /// Fixed-size roster; empty slots allowed.
    pub roster: [Option<MemberId>; ROSTER_SLOTS],
}

impl Team {
    pub fn members(&self) -> impl Iterator<Item = MemberId> + '_ {
        self.roster.iter().flatten().copied()
    }

    pub fn has_member(&self, member_id: MemberId) -> bool {
        self.members().any(|id| id == member_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub club_id: ClubId,
    pub name: String,
    pub image: Option<String>,
}

/// Display names of every member and team of one club.
#[derive(Debug, Clone, Default)]
pub struct NameBook {
    names: std::collections::HashMap<ActorRef, String>,
}

impl NameBook {
    pub fn new(members: &[Member], teams: &[Team]) -> Self {
        let names = members
            .iter()
            .map(|m| (ActorRef::Member(m.id), m.nickname.clone()))
            .chain(teams.iter().map(|t| (ActorRef::Team(t.id), t.name.clone())))
            .collect();
        Self { names }
    }

    pub fn name_of(&self, actor: &ActorRef) -> Option<&str> {
        self.names.get(actor).map(String::as_str)
    }
}
