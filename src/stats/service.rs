use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use tracing::{debug, info, instrument, warn};

use super::{
    feed::{PageRequest, SortSpec},
    leaderboard::Leaderboard,
    metrics::{ClubTally, MetricsAggregator},
    models::{
        ChampionEntry, ClubSummary, FeedPage, LeaderboardEntry, Match, MemberHistory,
        SummaryOptions,
    },
    unifier::{ActorFilter, ResultUnifier},
    StatsError,
};
use crate::directory::{ClubDirectory, NameBook};
use crate::results::{
    models::{ClubId, GameId, MemberId, ResultKind},
    DateRange, ResolvedScope, ResultFilter, ResultRepository, Scope,
};

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_LEADERBOARD_MAX: u32 = 100;

/// Read-only statistics over a club's recorded plays.
pub struct StatsService {
    directory: Arc<dyn ClubDirectory>,
    results: Arc<dyn ResultRepository>,
    page_size: u32,
    query_timeout: Duration,
    leaderboard_max: u32,
}

impl StatsService {
    pub fn builder(
        directory: Arc<dyn ClubDirectory>,
        results: Arc<dyn ResultRepository>,
    ) -> StatsServiceBuilder {
        StatsServiceBuilder::new(directory, results)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Runs one storage interaction under the query timeout. Expiry drops
    /// the future, which abandons the query.
    async fn bounded<T, F>(&self, operation: &'static str, work: F) -> Result<T, StatsError>
    where
        F: Future<Output = Result<T, StatsError>>,
    {
        match tokio::time::timeout(self.query_timeout, work).await {
            Ok(result) => result,
            Err(elapsed) => {
                warn!(
                    operation,
                    timeout_ms = self.query_timeout.as_millis() as u64,
                    "Storage query timed out"
                );
                Err(elapsed.into())
            }
        }
    }

    async fn resolve(&self, scope: Scope) -> Result<ResolvedScope, StatsError> {
        self.bounded("resolve scope", self.results.resolve_scope(scope))
            .await
    }

    async fn names_for(&self, club_id: ClubId) -> Result<NameBook, StatsError> {
        let (members, teams) = tokio::try_join!(
            self.bounded("list members", self.directory.list_members(club_id)),
            self.bounded("list teams", self.directory.list_teams(club_id)),
        )?;
        Ok(NameBook::new(&members, &teams))
    }

    /// Every unified match selected by the filter, read in one pass.
    async fn collect_matches(
        &self,
        filter: ResultFilter,
        actors: ActorFilter,
    ) -> Result<Vec<Match>, StatsError> {
        self.bounded("stream results", async {
            ResultUnifier::unify_stream(self.results.stream_results(filter), actors)
                .try_collect()
                .await
        })
        .await
    }

    pub async fn get_member_history(
        &self,
        member_id: MemberId,
        sort: SortSpec,
    ) -> Result<MemberHistory, StatsError> {
        self.get_member_history_between(member_id, sort, None).await
    }

    /// Member history restricted to plays inside `range`.
    #[instrument(skip(self))]
    pub async fn get_member_history_between(
        &self,
        member_id: MemberId,
        sort: SortSpec,
        range: Option<DateRange>,
    ) -> Result<MemberHistory, StatsError> {
        let scope = self.resolve(Scope::Member(member_id)).await?;
        let member = self
            .bounded("get member", self.directory.get_member(member_id))
            .await?
            .ok_or_else(|| StatsError::NotFound(format!("member {member_id}")))?;
        let names = self.names_for(scope.club_id).await?;

        let actors = ActorFilter::for_scope(&scope);
        let matches = self
            .collect_matches(ResultFilter::new(scope).with_range(range), actors)
            .await?;
        debug!(match_count = matches.len(), "Member matches unified");

        let metrics = MetricsAggregator::member(&matches);
        let mut outcomes: Vec<_> = matches
            .iter()
            .flat_map(Match::outcomes)
            .map(|mut outcome| {
                outcome.actor_name = names.name_of(&outcome.actor).map(str::to_string);
                outcome
            })
            .collect();
        sort.sort(&mut outcomes);

        info!(
            outcome_count = outcomes.len(),
            competitive_games = metrics.competitive_games,
            coop_games = metrics.coop_games,
            "Member history built"
        );

        Ok(MemberHistory {
            member_id,
            nickname: member.nickname,
            outcomes,
            average_finish: metrics.average_finish(),
            coop_win_rate: metrics.coop_win_rate(),
            competitive_games: metrics.competitive_games,
            wins: metrics.wins,
            coop_games: metrics.coop_games,
            coop_wins: metrics.coop_wins,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_club_feed(
        &self,
        club_id: ClubId,
        sort: SortSpec,
        page: u32,
    ) -> Result<FeedPage, StatsError> {
        self.feed(Scope::Club(club_id), sort, page).await
    }

    #[instrument(skip(self))]
    pub async fn get_game_feed(
        &self,
        game_id: GameId,
        sort: SortSpec,
        page: u32,
    ) -> Result<FeedPage, StatsError> {
        self.feed(Scope::Game(game_id), sort, page).await
    }

    async fn feed(&self, scope: Scope, sort: SortSpec, page: u32) -> Result<FeedPage, StatsError> {
        let scope = self.resolve(scope).await?;
        let request = PageRequest::new(page, self.page_size);
        let window = request.window(sort);

        let (records, total_count) = tokio::try_join!(
            self.bounded("feed page", self.results.feed_keys(&scope, &window)),
            self.bounded("feed count", self.results.count_plays(&scope)),
        )?;
        debug!(
            record_count = records.len(),
            total_count,
            offset = window.offset,
            "Feed window selected"
        );

        let (rows, names) = tokio::try_join!(
            self.bounded("hydrate feed", self.results.fetch_records(&records)),
            self.names_for(scope.club_id),
        )?;

        let mut outcomes = Vec::with_capacity(rows.len());
        for raw in rows {
            if let Some(mut outcome) = ResultUnifier::headline(raw)? {
                outcome.actor_name = names.name_of(&outcome.actor).map(str::to_string);
                outcomes.push(outcome);
            }
        }

        let has_more = request.has_more(records.len(), total_count);
        info!(
            page = request.page,
            outcome_count = outcomes.len(),
            total_count,
            has_more,
            "Feed page built"
        );

        Ok(FeedPage {
            outcomes,
            total_count,
            page: request.page,
            page_size: request.page_size,
            has_more,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_club_summary(
        &self,
        club_id: ClubId,
        options: SummaryOptions,
    ) -> Result<ClubSummary, StatsError> {
        let scope = self.resolve(Scope::Club(club_id)).await?;

        let tally = self.bounded("tally plays", async {
            ResultUnifier::unify_stream(
                self.results.stream_results(ResultFilter::new(scope)),
                ActorFilter::All,
            )
            .try_fold(ClubTally::new(options), |mut tally, unified| async move {
                tally.record(&unified);
                Ok(tally)
            })
            .await
        });

        let (members, games, champions_count, tally) = tokio::try_join!(
            self.bounded("list members", self.directory.list_members(club_id)),
            self.bounded("list games", self.directory.list_games(club_id)),
            self.bounded("count champions", self.results.count_champions(club_id)),
            tally,
        )?;

        let summary = ClubSummary {
            member_count: members.iter().filter(|m| m.is_active()).count() as u64,
            game_count: games.len() as u64,
            play_count: tally.play_count(),
            cooperative_play_count: tally.cooperative_play_count(),
            game_day_count: tally.game_day_count(),
            champions_count,
        };
        info!(?summary, "Club summary built");
        Ok(summary)
    }

    #[instrument(skip(self))]
    pub async fn get_leaderboard(
        &self,
        club_id: ClubId,
        limit: u32,
    ) -> Result<Vec<LeaderboardEntry>, StatsError> {
        let scope = self.resolve(Scope::Club(club_id)).await?;
        let limit = limit.clamp(1, self.leaderboard_max);

        let (members, teams) = tokio::try_join!(
            self.bounded("list members", self.directory.list_members(club_id)),
            self.bounded("list teams", self.directory.list_teams(club_id)),
        )?;

        let filter = ResultFilter::new(scope).with_kinds(&ResultKind::COMPETITIVE);
        let board = self
            .bounded("rank members", async {
                ResultUnifier::unify_stream(self.results.stream_results(filter), ActorFilter::All)
                    .try_fold(Leaderboard::new(&teams), |mut board, unified| async move {
                        board.record(&unified);
                        Ok(board)
                    })
                    .await
            })
            .await?;

        let entries = board.finish(&members, limit as usize);
        info!(entry_count = entries.len(), limit, "Leaderboard built");
        Ok(entries)
    }

    /// Open-ended champion titles of the club, one per game.
    #[instrument(skip(self))]
    pub async fn get_current_champions(
        &self,
        club_id: ClubId,
    ) -> Result<Vec<ChampionEntry>, StatsError> {
        self.resolve(Scope::Club(club_id)).await?;

        let (champions, members, games) = tokio::try_join!(
            self.bounded("list champions", self.results.list_champions(club_id, true)),
            self.bounded("list members", self.directory.list_members(club_id)),
            self.bounded("list games", self.directory.list_games(club_id)),
        )?;

        let mut entries = Vec::with_capacity(champions.len());
        for champion in champions {
            let member = members.iter().find(|m| m.id == champion.member_id);
            let game = games.iter().find(|g| g.id == champion.game_id);
            let (Some(member), Some(game)) = (member, game) else {
                warn!(
                    champion_id = champion.id,
                    member_id = champion.member_id,
                    game_id = champion.game_id,
                    "Champion refers to a member or game outside the club, skipping"
                );
                continue;
            };

            entries.push(ChampionEntry {
                game_id: game.id,
                game_name: game.name.clone(),
                member_id: member.id,
                nickname: member.nickname.clone(),
                since: champion.start_date,
            });
        }

        info!(champion_count = entries.len(), "Current champions listed");
        Ok(entries)
    }
}

pub struct StatsServiceBuilder {
    directory: Arc<dyn ClubDirectory>,
    results: Arc<dyn ResultRepository>,
    page_size: u32,
    query_timeout: Duration,
    leaderboard_max: u32,
}

impl StatsServiceBuilder {
    fn new(directory: Arc<dyn ClubDirectory>, results: Arc<dyn ResultRepository>) -> Self {
        Self {
            directory,
            results,
            page_size: DEFAULT_PAGE_SIZE,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            leaderboard_max: DEFAULT_LEADERBOARD_MAX,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    pub fn with_leaderboard_max(mut self, leaderboard_max: u32) -> Self {
        self.leaderboard_max = leaderboard_max.max(1);
        self
    }

    pub fn build(self) -> StatsService {
        StatsService {
            directory: self.directory,
            results: self.results,
            page_size: self.page_size,
            query_timeout: self.query_timeout,
            leaderboard_max: self.leaderboard_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::models::{ChampionRow, RawResult, RecordRef};
    use crate::results::ResultStream;
    use crate::shared::test_utils::ClubFixture;
    use crate::stats::feed::{FeedWindow, SortDirection, SortKey};
    use crate::stats::models::Outcome;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};

    /// Azul club: ann(1), bob(2), cyd(3, inactive); team Red(10) = {ann, bob}.
    fn fixture() -> ClubFixture {
        ClubFixture::new(1, "Thursday Meeples")
            .member(1, "ann")
            .member(2, "bob")
            .inactive_member(3, "cyd")
            .team(10, "Red", &[1, 2])
            .team(11, "Blue", &[3])
            .game(1, "Azul")
            .game(2, "Pandemic")
    }

    #[tokio::test]
    async fn member_history_mixes_competitive_and_cooperative() {
        let service = fixture()
            .individual(1, 1, (1, 19), &[Some(1), Some(2)])
            .individual(2, 1, (2, 19), &[Some(2), Some(3), Some(1)])
            .individual(3, 1, (3, 19), &[Some(2), Some(1)])
            .coop_result(4, 2, (4, 19), "win", &[1, 2])
            .build()
            .await;

        let history = service
            .get_member_history(1, SortSpec::default())
            .await
            .unwrap();

        assert_eq!(history.nickname, "ann");
        assert_eq!(history.average_finish, Some(2.0));
        assert_eq!(history.coop_win_rate, Some(100));
        assert_eq!(history.wins, 1);
        assert_eq!(history.outcomes.len(), 4);
        // Newest first by default.
        assert_eq!(history.outcomes[0].record, RecordRef::new(ResultKind::Cooperative, 4));
        assert_eq!(history.outcomes[0].outcome.legacy_code(), 0);
        assert!(history
            .outcomes
            .iter()
            .all(|o| o.actor_name.as_deref() == Some("ann")));
    }

    #[tokio::test]
    async fn member_history_includes_team_results() {
        let service = fixture()
            .team_result(1, 1, (1, 19), &[Some(11), Some(10)])
            .build()
            .await;

        let history = service
            .get_member_history(2, SortSpec::default())
            .await
            .unwrap();

        assert_eq!(history.outcomes.len(), 1);
        assert_eq!(history.outcomes[0].outcome, Outcome::Ranked { position: 2 });
        assert_eq!(history.outcomes[0].actor_name.as_deref(), Some("Red"));
        assert_eq!(history.average_finish, Some(2.0));
    }

    #[tokio::test]
    async fn member_without_plays_has_no_data() {
        let service = fixture().build().await;

        let history = service
            .get_member_history(2, SortSpec::default())
            .await
            .unwrap();

        assert!(history.outcomes.is_empty());
        assert_eq!(history.average_finish, None);
        assert_eq!(history.coop_win_rate, None);
    }

    #[tokio::test]
    async fn cooperative_only_member_has_rate_but_no_average() {
        let service = fixture()
            .coop_result(1, 2, (1, 19), "win", &[2])
            .coop_result(2, 2, (2, 19), "loss", &[2])
            .coop_result(3, 2, (3, 19), "LOSS", &[2])
            .build()
            .await;

        let history = service
            .get_member_history(2, SortSpec::default())
            .await
            .unwrap();

        assert_eq!(history.average_finish, None);
        assert_eq!(history.coop_win_rate, Some(33));
    }

    #[tokio::test]
    async fn history_range_is_half_open() {
        let service = fixture()
            .individual(1, 1, (1, 19), &[Some(1)])
            .individual(2, 1, (2, 19), &[Some(1)])
            .individual(3, 1, (3, 19), &[Some(1)])
            .build()
            .await;

        let range = DateRange {
            from: Some(Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()),
            to: Some(Utc.with_ymd_and_hms(2024, 5, 3, 19, 0, 0).unwrap()),
        };
        let history = service
            .get_member_history_between(1, SortSpec::default(), Some(range))
            .await
            .unwrap();

        let ids: Vec<_> = history.outcomes.iter().map(|o| o.record.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn unknown_and_invalid_ids() {
        let service = fixture().build().await;

        assert!(matches!(
            service.get_member_history(99, SortSpec::default()).await,
            Err(StatsError::NotFound(_))
        ));
        assert!(matches!(
            service.get_club_feed(0, SortSpec::default(), 1).await,
            Err(StatsError::InvalidParameter(_))
        ));
        assert!(matches!(
            service.get_leaderboard(-4, 10).await,
            Err(StatsError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn club_summary_counts_competitive_plays_per_day() {
        let mut fixture = fixture();
        for id in 1..=10 {
            fixture = fixture.individual(id, 1, (6, 10 + id as u32), &[Some(1), Some(2)]);
        }
        for id in 1..=5 {
            fixture = fixture.team_result(id, 1, (6, 9), &[Some(10), Some(11)]);
        }
        let service = fixture.build().await;

        let summary = service
            .get_club_summary(1, SummaryOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.play_count, 15);
        assert_eq!(summary.game_day_count, 1);
        assert_eq!(summary.cooperative_play_count, 0);
        assert_eq!(summary.member_count, 2);
        assert_eq!(summary.game_count, 2);
    }

    #[tokio::test]
    async fn club_summary_merges_cooperative_only_on_request() {
        let service = fixture()
            .individual(1, 1, (1, 19), &[Some(1)])
            .coop_result(1, 2, (2, 19), "win", &[1, 2])
            .champion(1, 1, 1, (1, 1), None)
            .champion(2, 1, 2, (1, 10), Some((2, 1)))
            .build()
            .await;

        let separate = service
            .get_club_summary(1, SummaryOptions::default())
            .await
            .unwrap();
        assert_eq!(separate.play_count, 1);
        assert_eq!(separate.cooperative_play_count, 1);
        assert_eq!(separate.game_day_count, 1);
        assert_eq!(separate.champions_count, 2);

        let merged = service
            .get_club_summary(
                1,
                SummaryOptions {
                    include_cooperative: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(merged.play_count, 2);
        assert_eq!(merged.game_day_count, 2);
    }

    #[tokio::test]
    async fn feed_page_beyond_end_is_empty() {
        let mut fixture = fixture();
        for id in 1..=4 {
            fixture = fixture.individual(id, 1, (id as u32, 19), &[Some(1), Some(2)]);
        }
        let service = fixture.page_size(2).build().await;

        let first = service.get_club_feed(1, SortSpec::default(), 1).await.unwrap();
        assert_eq!(first.total_count, 4);
        assert!(first.has_more);
        let ids: Vec<_> = first.outcomes.iter().map(|o| o.record.id).collect();
        assert_eq!(ids, vec![4, 3]);
        assert_eq!(first.outcomes[0].actor_name.as_deref(), Some("ann"));

        let third = service.get_club_feed(1, SortSpec::default(), 3).await.unwrap();
        assert!(third.outcomes.is_empty());
        assert!(!third.has_more);
        assert_eq!(third.total_count, 4);
    }

    #[tokio::test]
    async fn anomalous_rows_are_skipped_not_fatal() {
        let service = fixture()
            .individual(1, 1, (1, 19), &[Some(1), Some(1)])
            .individual(2, 1, (2, 19), &[Some(2), Some(1)])
            .build()
            .await;

        let feed = service.get_club_feed(1, SortSpec::default(), 1).await.unwrap();
        let ids: Vec<_> = feed.outcomes.iter().map(|o| o.record.id).collect();
        assert_eq!(ids, vec![2]);
        assert_eq!(feed.total_count, 1);

        let history = service
            .get_member_history(1, SortSpec::default())
            .await
            .unwrap();
        assert_eq!(history.outcomes.len(), 1);
    }

    #[tokio::test]
    async fn game_feed_is_scoped_to_game() {
        let service = fixture()
            .individual(1, 1, (1, 19), &[Some(1)])
            .coop_result(1, 2, (2, 19), "loss", &[2])
            .build()
            .await;

        let feed = service
            .get_game_feed(2, SortSpec::new(SortKey::Game, SortDirection::Asc), 1)
            .await
            .unwrap();
        assert_eq!(feed.total_count, 1);
        assert_eq!(feed.outcomes[0].participant_type(), ResultKind::Cooperative);
        assert_eq!(feed.outcomes[0].outcome.legacy_code(), -1);
    }

    #[tokio::test]
    async fn leaderboard_credits_teams_and_clamps_limit() {
        let service = fixture()
            .individual(1, 1, (1, 19), &[Some(1), Some(2)])
            .individual(2, 1, (2, 19), &[Some(3), Some(2)])
            .team_result(1, 1, (3, 19), &[Some(10), Some(11)])
            .build()
            .await;

        let board = service.get_leaderboard(1, 10).await.unwrap();
        let rows: Vec<_> = board
            .iter()
            .map(|e| (e.rank, e.nickname.as_str(), e.wins, e.competitive_plays))
            .collect();
        assert_eq!(rows, vec![(1, "ann", 2, 2), (2, "bob", 1, 3)]);

        let top = service.get_leaderboard(1, 0).await.unwrap();
        assert_eq!(top.len(), 1);
    }

    #[tokio::test]
    async fn current_champions_skip_closed_titles() {
        let service = fixture()
            .champion(1, 1, 1, (1, 1), Some((2, 1)))
            .champion(2, 1, 2, (2, 1), None)
            .champion(3, 2, 1, (3, 1), None)
            .build()
            .await;

        let champions = service.get_current_champions(1).await.unwrap();
        assert_eq!(champions.len(), 2);
        assert_eq!(champions[0].game_name, "Azul");
        assert_eq!(champions[0].nickname, "bob");
        assert_eq!(champions[0].since, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(champions[1].game_name, "Pandemic");
    }

    /// Repository whose every call outlives any sensible timeout.
    struct StalledRepository;

    #[async_trait]
    impl ResultRepository for StalledRepository {
        async fn resolve_scope(&self, _scope: Scope) -> Result<ResolvedScope, StatsError> {
            futures::future::pending().await
        }

        fn stream_results(&self, _filter: ResultFilter) -> ResultStream<'_> {
            Box::pin(futures::stream::pending::<Result<RawResult, StatsError>>())
        }

        async fn feed_keys(
            &self,
            _scope: &ResolvedScope,
            _window: &FeedWindow,
        ) -> Result<Vec<RecordRef>, StatsError> {
            futures::future::pending().await
        }

        async fn count_plays(&self, _scope: &ResolvedScope) -> Result<u64, StatsError> {
            futures::future::pending().await
        }

        async fn fetch_records(&self, _records: &[RecordRef]) -> Result<Vec<RawResult>, StatsError> {
            futures::future::pending().await
        }

        async fn list_champions(
            &self,
            _club_id: ClubId,
            _current_only: bool,
        ) -> Result<Vec<ChampionRow>, StatsError> {
            futures::future::pending().await
        }

        async fn count_champions(&self, _club_id: ClubId) -> Result<u64, StatsError> {
            futures::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_storage_times_out() {
        let directory = Arc::new(crate::directory::InMemoryClubDirectory::new());
        let service = StatsService::builder(directory, Arc::new(StalledRepository))
            .with_query_timeout(Duration::from_millis(50))
            .build();

        let result = service.get_club_feed(1, SortSpec::default(), 1).await;
        assert!(matches!(result, Err(StatsError::Timeout)));
    }
}
