use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::{
    models::{ActorRef, ChampionRow, ClubId, RawResult, RecordRef},
    scope::{ResolvedScope, ResultFilter, Scope},
};
use crate::directory::{ClubDirectory, InMemoryClubDirectory, NameBook};
use crate::stats::{
    feed::{FeedKey, FeedWindow},
    StatsError,
};

pub type ResultStream<'a> = BoxStream<'a, Result<RawResult, StatsError>>;

/// Typed read access to the three result sources and the champion ledger.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Checks the scope against storage. Unknown ids are `NotFound`.
    async fn resolve_scope(&self, scope: Scope) -> Result<ResolvedScope, StatsError>;

    /// Streams every row selected by the filter, uninterpreted.
    fn stream_results(&self, filter: ResultFilter) -> ResultStream<'_>;

    /// One window of plays in scope, ordered by the window's sort.
    async fn feed_keys(
        &self,
        scope: &ResolvedScope,
        window: &FeedWindow,
    ) -> Result<Vec<RecordRef>, StatsError>;

    /// Number of plays `feed_keys` can reach for the scope.
    async fn count_plays(&self, scope: &ResolvedScope) -> Result<u64, StatsError>;

    /// Loads the given rows in the given order. Rows that vanished are skipped.
    async fn fetch_records(&self, records: &[RecordRef]) -> Result<Vec<RawResult>, StatsError>;

    async fn list_champions(
        &self,
        club_id: ClubId,
        current_only: bool,
    ) -> Result<Vec<ChampionRow>, StatsError>;

    async fn count_champions(&self, club_id: ClubId) -> Result<u64, StatsError>;
}

#[derive(Debug, Clone)]
struct StoredResult {
    club_id: ClubId,
    raw: RawResult,
}

impl StoredResult {
    fn in_scope(&self, scope: &ResolvedScope) -> bool {
        self.club_id == scope.club_id
            && scope.game_id().map_or(true, |id| self.raw.game_id() == id)
            && (scope.actors.is_empty() || self.raw.involves(&scope.actors))
    }

    fn matches(&self, filter: &ResultFilter) -> bool {
        self.in_scope(&filter.scope)
            && filter.reads(self.raw.kind())
            && filter
                .range
                .map_or(true, |range| range.contains(self.raw.played_at()))
    }
}

/// Sort projection of a raw row, mirroring the columns the SQL feed orders on.
fn feed_key(raw: &RawResult, names: &NameBook) -> FeedKey {
    let outcome_rank = match raw {
        RawResult::Individual(row) | RawResult::Team(row) => {
            (0, row.top_slot().map_or(0, |(index, _)| index as i32 + 1))
        }
        RawResult::Cooperative(row) if row.is_win() => (1, 0),
        RawResult::Cooperative(_) => (1, 1),
    };

    FeedKey {
        record: raw.record(),
        played_at: raw.played_at(),
        game_name: raw.game_name().to_string(),
        headline_name: raw
            .headline_actor()
            .and_then(|actor| names.name_of(&actor))
            .map(str::to_string),
        participant_count: raw.participant_count(),
        outcome_rank,
    }
}

/// In-memory implementation of ResultRepository for development and testing
pub struct InMemoryResultRepository {
    directory: Arc<InMemoryClubDirectory>,
    results: RwLock<Vec<StoredResult>>,
    champions: RwLock<Vec<ChampionRow>>,
}

impl InMemoryResultRepository {
    pub fn new(directory: Arc<InMemoryClubDirectory>) -> Self {
        Self {
            directory,
            results: RwLock::new(Vec::new()),
            champions: RwLock::new(Vec::new()),
        }
    }

    /// Stores a row. The game must exist; its name and club are taken from
    /// the directory.
    #[instrument(skip(self, raw), fields(kind = %raw.kind(), result_id = raw.id()))]
    pub async fn insert(&self, mut raw: RawResult) -> Result<(), StatsError> {
        let game = self
            .directory
            .get_game(raw.game_id())
            .await?
            .ok_or_else(|| StatsError::NotFound(format!("game {}", raw.game_id())))?;

        match &mut raw {
            RawResult::Individual(row) | RawResult::Team(row) => row.game_name = game.name,
            RawResult::Cooperative(row) => {
                row.game_name = game.name;
                row.participants.sort_by_key(|p| p.id);
            }
        }

        let mut results = self.results.write().await;
        if results.iter().any(|stored| stored.raw.record() == raw.record()) {
            warn!("Result already exists in memory");
            return Err(StatsError::InvalidParameter(format!(
                "{} result {} already exists",
                raw.kind(),
                raw.id()
            )));
        }
        results.push(StoredResult {
            club_id: game.club_id,
            raw,
        });

        debug!("Result stored in memory");
        Ok(())
    }

    pub async fn insert_champion(&self, champion: ChampionRow) {
        self.champions.write().await.push(champion);
    }

    async fn names_for(&self, club_id: ClubId) -> Result<NameBook, StatsError> {
        let members = self.directory.list_members(club_id).await?;
        let teams = self.directory.list_teams(club_id).await?;
        Ok(NameBook::new(&members, &teams))
    }
}

#[async_trait]
impl ResultRepository for InMemoryResultRepository {
    #[instrument(skip(self))]
    async fn resolve_scope(&self, scope: Scope) -> Result<ResolvedScope, StatsError> {
        scope.validate()?;

        let resolved = match scope {
            Scope::Club(club_id) => {
                if !self.directory.has_club(club_id).await {
                    return Err(StatsError::NotFound(format!("club {club_id}")));
                }
                ResolvedScope::club(club_id)
            }
            Scope::Member(member_id) => {
                let member = self
                    .directory
                    .get_member(member_id)
                    .await?
                    .ok_or_else(|| StatsError::NotFound(format!("member {member_id}")))?;
                let mut actors = vec![ActorRef::Member(member_id)];
                actors.extend(
                    self.directory
                        .teams_with_member(member_id)
                        .await
                        .into_iter()
                        .filter(|team| team.club_id == member.club_id)
                        .map(|team| ActorRef::Team(team.id)),
                );
                ResolvedScope {
                    scope,
                    club_id: member.club_id,
                    actors,
                }
            }
            Scope::Game(game_id) => {
                let game = self
                    .directory
                    .get_game(game_id)
                    .await?
                    .ok_or_else(|| StatsError::NotFound(format!("game {game_id}")))?;
                ResolvedScope {
                    scope,
                    club_id: game.club_id,
                    actors: Vec::new(),
                }
            }
        };

        debug!(club_id = resolved.club_id, "Scope resolved in memory");
        Ok(resolved)
    }

    fn stream_results(&self, filter: ResultFilter) -> ResultStream<'_> {
        let snapshot = async move {
            let results = self.results.read().await;
            let matching: Vec<Result<RawResult, StatsError>> = results
                .iter()
                .filter(|stored| stored.matches(&filter))
                .map(|stored| Ok(stored.raw.clone()))
                .collect();
            stream::iter(matching)
        };
        stream::once(snapshot).flatten().boxed()
    }

    #[instrument(skip(self))]
    async fn feed_keys(
        &self,
        scope: &ResolvedScope,
        window: &FeedWindow,
    ) -> Result<Vec<RecordRef>, StatsError> {
        let names = self.names_for(scope.club_id).await?;

        let mut keys: Vec<FeedKey> = self
            .results
            .read()
            .await
            .iter()
            .filter(|stored| stored.in_scope(scope) && stored.raw.is_play())
            .map(|stored| feed_key(&stored.raw, &names))
            .collect();
        window.sort.sort(&mut keys);

        Ok(keys
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .map(|key| key.record)
            .collect())
    }

    #[instrument(skip(self))]
    async fn count_plays(&self, scope: &ResolvedScope) -> Result<u64, StatsError> {
        let count = self
            .results
            .read()
            .await
            .iter()
            .filter(|stored| stored.in_scope(scope) && stored.raw.is_play())
            .count();
        Ok(count as u64)
    }

    #[instrument(skip(self, records), fields(record_count = records.len()))]
    async fn fetch_records(&self, records: &[RecordRef]) -> Result<Vec<RawResult>, StatsError> {
        let results = self.results.read().await;
        let by_record: HashMap<RecordRef, &RawResult> = results
            .iter()
            .map(|stored| (stored.raw.record(), &stored.raw))
            .collect();

        Ok(records
            .iter()
            .filter_map(|record| by_record.get(record).map(|raw| (*raw).clone()))
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_champions(
        &self,
        club_id: ClubId,
        current_only: bool,
    ) -> Result<Vec<ChampionRow>, StatsError> {
        let mut champions: Vec<ChampionRow> = self
            .champions
            .read()
            .await
            .iter()
            .filter(|c| c.club_id == club_id && (!current_only || c.is_current()))
            .cloned()
            .collect();
        champions.sort_by_key(|c| (c.game_id, c.start_date, c.id));
        Ok(champions)
    }

    #[instrument(skip(self))]
    async fn count_champions(&self, club_id: ClubId) -> Result<u64, StatsError> {
        let count = self
            .champions
            .read()
            .await
            .iter()
            .filter(|c| c.club_id == club_id)
            .count();
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{Club, Game, Member, MemberStatus, Team};
    use crate::results::models::{
        CooperativeParticipantRow, CooperativeResultRow, RankedResultRow, ResultKind,
        PLACEMENT_SLOTS,
    };
    use crate::results::scope::DateRange;
    use crate::stats::feed::{SortDirection, SortKey, SortSpec};
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    mod helpers {
        use super::*;

        pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 9, day, hour, 0, 0).unwrap()
        }

        pub fn slots(ids: &[Option<i64>]) -> [Option<i64>; PLACEMENT_SLOTS] {
            let mut placements = [None; PLACEMENT_SLOTS];
            placements[..ids.len()].copy_from_slice(ids);
            placements
        }

        pub fn individual(id: i64, game_id: i64, played_at: DateTime<Utc>, ids: &[Option<i64>]) -> RawResult {
            RawResult::Individual(RankedResultRow {
                id,
                game_id,
                game_name: String::new(),
                played_at,
                entrant_count: ids.len() as i32,
                placements: slots(ids),
            })
        }

        pub fn team(id: i64, game_id: i64, played_at: DateTime<Utc>, ids: &[Option<i64>]) -> RawResult {
            RawResult::Team(RankedResultRow {
                id,
                game_id,
                game_name: String::new(),
                played_at,
                entrant_count: ids.len() as i32,
                placements: slots(ids),
            })
        }

        pub fn coop(id: i64, game_id: i64, played_at: DateTime<Utc>, member_ids: &[i64]) -> RawResult {
            RawResult::Cooperative(CooperativeResultRow {
                id,
                game_id,
                game_name: String::new(),
                played_at,
                participant_count: member_ids.len() as i32,
                outcome: "win".to_string(),
                participants: member_ids
                    .iter()
                    .rev()
                    .enumerate()
                    .map(|(i, member_id)| CooperativeParticipantRow {
                        id: 100 - i as i64,
                        member_id: Some(*member_id),
                        team_id: None,
                    })
                    .collect(),
            })
        }

        /// Club 1 with members 1..=3 (3 inactive), team 10 = {1, 2},
        /// games 1 "Azul" and 2 "Brass"; club 2 with member 9 and game 3.
        pub async fn seeded() -> InMemoryResultRepository {
            let directory = Arc::new(InMemoryClubDirectory::new());
            for (id, name) in [(1, "Thursday Meeples"), (2, "Other Club")] {
                directory
                    .add_club(Club {
                        id,
                        name: name.to_string(),
                    })
                    .await;
            }
            for (id, club_id, nickname, status) in [
                (1, 1, "ann", MemberStatus::Active),
                (2, 1, "bob", MemberStatus::Active),
                (3, 1, "cyd", MemberStatus::Inactive),
                (9, 2, "zed", MemberStatus::Active),
            ] {
                directory
                    .add_member(Member {
                        id,
                        club_id,
                        nickname: nickname.to_string(),
                        status,
                    })
                    .await;
            }
            directory
                .add_team(Team {
                    id: 10,
                    club_id: 1,
                    name: "Red".to_string(),
                    roster: [Some(1), Some(2), None, None],
                })
                .await;
            for (id, club_id, name) in [(1, 1, "Azul"), (2, 1, "Brass"), (3, 2, "Catan")] {
                directory
                    .add_game(Game {
                        id,
                        club_id,
                        name: name.to_string(),
                        image: None,
                    })
                    .await;
            }
            InMemoryResultRepository::new(directory)
        }
    }

    use helpers::*;

    #[tokio::test]
    async fn unknown_scopes_are_not_found() {
        let repo = seeded().await;

        for scope in [Scope::Club(77), Scope::Member(77), Scope::Game(77)] {
            let result = repo.resolve_scope(scope).await;
            assert!(matches!(result, Err(StatsError::NotFound(_))), "{scope:?}");
        }
        assert!(matches!(
            repo.resolve_scope(Scope::Club(-1)).await,
            Err(StatsError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn member_scope_includes_rostering_teams() {
        let repo = seeded().await;
        let resolved = repo.resolve_scope(Scope::Member(2)).await.unwrap();

        assert_eq!(resolved.club_id, 1);
        assert_eq!(resolved.actors, vec![ActorRef::Member(2), ActorRef::Team(10)]);
    }

    #[tokio::test]
    async fn insert_rejects_unknown_game_and_duplicates() {
        let repo = seeded().await;
        assert!(matches!(
            repo.insert(individual(1, 99, at(1, 18), &[Some(1)])).await,
            Err(StatsError::NotFound(_))
        ));

        repo.insert(individual(1, 1, at(1, 18), &[Some(1)])).await.unwrap();
        assert!(repo.insert(individual(1, 1, at(1, 19), &[Some(2)])).await.is_err());
        // Same id in another source is a different record.
        repo.insert(team(1, 1, at(1, 19), &[Some(10)])).await.unwrap();
    }

    #[tokio::test]
    async fn stream_filters_by_member_range_and_kind() {
        let repo = seeded().await;
        repo.insert(individual(1, 1, at(1, 18), &[Some(1), Some(2)])).await.unwrap();
        repo.insert(individual(2, 2, at(2, 18), &[Some(3), Some(2)])).await.unwrap();
        repo.insert(team(3, 1, at(3, 18), &[Some(10)])).await.unwrap();
        repo.insert(coop(4, 1, at(4, 18), &[1, 3])).await.unwrap();

        let scope = repo.resolve_scope(Scope::Member(1)).await.unwrap();
        let all: Vec<_> = repo
            .stream_results(ResultFilter::new(scope.clone()))
            .map(|r| r.unwrap().record())
            .collect()
            .await;
        assert_eq!(
            all,
            vec![
                RecordRef::new(ResultKind::Individual, 1),
                RecordRef::new(ResultKind::Team, 3),
                RecordRef::new(ResultKind::Cooperative, 4),
            ]
        );

        let ranged = ResultFilter::new(scope)
            .with_range(Some(DateRange {
                from: Some(at(2, 0)),
                to: Some(at(4, 0)),
            }))
            .with_kinds(&ResultKind::COMPETITIVE);
        let ranged: Vec<_> = repo
            .stream_results(ranged)
            .map(|r| r.unwrap().record())
            .collect()
            .await;
        assert_eq!(ranged, vec![RecordRef::new(ResultKind::Team, 3)]);
    }

    #[tokio::test]
    async fn cooperative_participants_are_ordered_by_id() {
        let repo = seeded().await;
        repo.insert(coop(1, 1, at(1, 18), &[1, 2])).await.unwrap();

        let rows = repo
            .fetch_records(&[RecordRef::new(ResultKind::Cooperative, 1)])
            .await
            .unwrap();
        let RawResult::Cooperative(row) = &rows[0] else {
            panic!("expected cooperative row");
        };
        assert!(row.participants.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(row.game_name, "Azul");
    }

    #[tokio::test]
    async fn feed_keys_page_through_sorted_plays() {
        let repo = seeded().await;
        repo.insert(individual(1, 1, at(1, 18), &[Some(2)])).await.unwrap();
        repo.insert(individual(2, 2, at(3, 18), &[Some(1)])).await.unwrap();
        repo.insert(individual(3, 1, at(2, 18), &[None; 3])).await.unwrap();
        repo.insert(team(4, 2, at(2, 18), &[Some(10)])).await.unwrap();

        let scope = repo.resolve_scope(Scope::Club(1)).await.unwrap();
        assert_eq!(repo.count_plays(&scope).await.unwrap(), 3);

        let window = FeedWindow {
            sort: SortSpec::default(),
            offset: 1,
            limit: 5,
        };
        let page = repo.feed_keys(&scope, &window).await.unwrap();
        assert_eq!(
            page,
            vec![
                RecordRef::new(ResultKind::Team, 4),
                RecordRef::new(ResultKind::Individual, 1),
            ]
        );

        let by_winner = FeedWindow {
            sort: SortSpec::new(SortKey::Actor, SortDirection::Asc),
            offset: 0,
            limit: 5,
        };
        let page = repo.feed_keys(&scope, &by_winner).await.unwrap();
        assert_eq!(
            page,
            vec![
                RecordRef::new(ResultKind::Team, 4),
                RecordRef::new(ResultKind::Individual, 2),
                RecordRef::new(ResultKind::Individual, 1),
            ]
        );
    }

    #[tokio::test]
    async fn champions_filter_current_titles() {
        let repo = seeded().await;
        let date = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        repo.insert_champion(ChampionRow {
            id: 1,
            club_id: 1,
            game_id: 1,
            member_id: 1,
            start_date: date(1),
            end_date: Some(date(10)),
        })
        .await;
        repo.insert_champion(ChampionRow {
            id: 2,
            club_id: 1,
            game_id: 1,
            member_id: 2,
            start_date: date(10),
            end_date: None,
        })
        .await;

        assert_eq!(repo.count_champions(1).await.unwrap(), 2);
        let current = repo.list_champions(1, true).await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].member_id, 2);
        assert!(repo.list_champions(2, false).await.unwrap().is_empty());
    }
}
