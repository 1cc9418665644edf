use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::{Club, Game, Member, MemberStatus, Team, ROSTER_SLOTS};
use crate::results::models::{ClubId, GameId, MemberId};
use crate::stats::StatsError;

/// Read-only lookups into the club/member/team/game directory.
#[async_trait]
pub trait ClubDirectory: Send + Sync {
    async fn get_club(&self, club_id: ClubId) -> Result<Option<Club>, StatsError>;
    async fn get_member(&self, member_id: MemberId) -> Result<Option<Member>, StatsError>;
    async fn get_game(&self, game_id: GameId) -> Result<Option<Game>, StatsError>;
    /// All members of a club, active or not, ordered by id.
    async fn list_members(&self, club_id: ClubId) -> Result<Vec<Member>, StatsError>;
    async fn list_teams(&self, club_id: ClubId) -> Result<Vec<Team>, StatsError>;
    async fn list_games(&self, club_id: ClubId) -> Result<Vec<Game>, StatsError>;
}

/// In-memory directory for development and testing
#[derive(Debug, Default)]
pub struct InMemoryClubDirectory {
    clubs: RwLock<HashMap<ClubId, Club>>,
    members: RwLock<HashMap<MemberId, Member>>,
    teams: RwLock<HashMap<i64, Team>>,
    games: RwLock<HashMap<GameId, Game>>,
}

impl InMemoryClubDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_club(&self, club: Club) {
        self.clubs.write().await.insert(club.id, club);
    }

    pub async fn add_member(&self, member: Member) {
        self.members.write().await.insert(member.id, member);
    }

    pub async fn add_team(&self, team: Team) {
        self.teams.write().await.insert(team.id, team);
    }

    pub async fn add_game(&self, game: Game) {
        self.games.write().await.insert(game.id, game);
    }

    pub async fn has_club(&self, club_id: ClubId) -> bool {
        self.clubs.read().await.contains_key(&club_id)
    }

    /// Teams of the member's club whose roster contains the member.
    pub async fn teams_with_member(&self, member_id: MemberId) -> Vec<Team> {
        let mut teams: Vec<Team> = self
            .teams
            .read()
            .await
            .values()
            .filter(|team| team.has_member(member_id))
            .cloned()
            .collect();
        teams.sort_by_key(|team| team.id);
        teams
    }
}

#[async_trait]
impl ClubDirectory for InMemoryClubDirectory {
    async fn get_club(&self, club_id: ClubId) -> Result<Option<Club>, StatsError> {
        Ok(self.clubs.read().await.get(&club_id).cloned())
    }

    async fn get_member(&self, member_id: MemberId) -> Result<Option<Member>, StatsError> {
        Ok(self.members.read().await.get(&member_id).cloned())
    }

    async fn get_game(&self, game_id: GameId) -> Result<Option<Game>, StatsError> {
        Ok(self.games.read().await.get(&game_id).cloned())
    }

    async fn list_members(&self, club_id: ClubId) -> Result<Vec<Member>, StatsError> {
        let mut members: Vec<Member> = self
            .members
            .read()
            .await
            .values()
            .filter(|m| m.club_id == club_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.id);
        Ok(members)
    }

    async fn list_teams(&self, club_id: ClubId) -> Result<Vec<Team>, StatsError> {
        let mut teams: Vec<Team> = self
            .teams
            .read()
            .await
            .values()
            .filter(|t| t.club_id == club_id)
            .cloned()
            .collect();
        teams.sort_by_key(|t| t.id);
        Ok(teams)
    }

    async fn list_games(&self, club_id: ClubId) -> Result<Vec<Game>, StatsError> {
        let mut games: Vec<Game> = self
            .games
            .read()
            .await
            .values()
            .filter(|g| g.club_id == club_id)
            .cloned()
            .collect();
        games.sort_by_key(|g| g.id);
        Ok(games)
    }
}

/// PostgreSQL implementation of the club directory
pub struct PostgresClubDirectory {
    pool: PgPool,
}

impl PostgresClubDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const MEMBER_COLUMNS: &str = "id, club_id, nickname, status";
const TEAM_COLUMNS: &str = "id, club_id, name, member_1, member_2, member_3, member_4";
const GAME_COLUMNS: &str = "id, club_id, name, image";

fn club_from_row(row: &PgRow) -> Result<Club, sqlx::Error> {
    Ok(Club {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
    })
}

fn member_from_row(row: &PgRow) -> Result<Member, sqlx::Error> {
    let id: i64 = row.try_get("id")?;
    let raw_status: String = row.try_get("status")?;
    let status = raw_status.parse().unwrap_or_else(|_| {
        warn!(member_id = id, status = %raw_status, "Unknown member status, treating as inactive");
        MemberStatus::Inactive
    });

    Ok(Member {
        id,
        club_id: row.try_get("club_id")?,
        nickname: row.try_get("nickname")?,
        status,
    })
}

fn team_from_row(row: &PgRow) -> Result<Team, sqlx::Error> {
    let mut roster: [Option<MemberId>; ROSTER_SLOTS] = [None; ROSTER_SLOTS];
    for (index, slot) in roster.iter_mut().enumerate() {
        *slot = row.try_get(format!("member_{}", index + 1).as_str())?;
    }

    Ok(Team {
        id: row.try_get("id")?,
        club_id: row.try_get("club_id")?,
        name: row.try_get("name")?,
        roster,
    })
}

fn game_from_row(row: &PgRow) -> Result<Game, sqlx::Error> {
    Ok(Game {
        id: row.try_get("id")?,
        club_id: row.try_get("club_id")?,
        name: row.try_get("name")?,
        image: row.try_get("image")?,
    })
}

#[async_trait]
impl ClubDirectory for PostgresClubDirectory {
    #[instrument(skip(self))]
    async fn get_club(&self, club_id: ClubId) -> Result<Option<Club>, StatsError> {
        let row = sqlx::query("SELECT id, name FROM clubs WHERE id = $1")
            .bind(club_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, club_id, "Failed to fetch club from database");
                StatsError::from(e)
            })?;

        Ok(row.as_ref().map(club_from_row).transpose()?)
    }

    #[instrument(skip(self))]
    async fn get_member(&self, member_id: MemberId) -> Result<Option<Member>, StatsError> {
        let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(member_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(member_from_row).transpose()?)
    }

    #[instrument(skip(self))]
    async fn get_game(&self, game_id: GameId) -> Result<Option<Game>, StatsError> {
        let sql = format!("SELECT {GAME_COLUMNS} FROM games WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(game_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(game_from_row).transpose()?)
    }

    #[instrument(skip(self))]
    async fn list_members(&self, club_id: ClubId) -> Result<Vec<Member>, StatsError> {
        let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE club_id = $1 ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(club_id)
            .fetch_all(&self.pool)
            .await?;

        debug!(club_id, member_count = rows.len(), "Members listed from database");
        Ok(rows.iter().map(member_from_row).collect::<Result<_, _>>()?)
    }

    #[instrument(skip(self))]
    async fn list_teams(&self, club_id: ClubId) -> Result<Vec<Team>, StatsError> {
        let sql = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE club_id = $1 ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(club_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(team_from_row).collect::<Result<_, _>>()?)
    }

    #[instrument(skip(self))]
    async fn list_games(&self, club_id: ClubId) -> Result<Vec<Game>, StatsError> {
        let sql = format!("SELECT {GAME_COLUMNS} FROM games WHERE club_id = $1 ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(club_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(game_from_row).collect::<Result<_, _>>()?)
    }
}
