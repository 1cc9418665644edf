use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

use super::{
    models::{
        ActorRef, ChampionRow, ClubId, CooperativeParticipantRow, CooperativeResultRow,
        RankedResultRow, RawResult, RecordRef, ResultKind, PLACEMENT_SLOTS, SLOT_COLUMNS,
    },
    repository::{ResultRepository, ResultStream},
    scope::{ResolvedScope, ResultFilter, Scope},
};
use crate::stats::{
    feed::{FeedWindow, SortKey},
    StatsError,
};

// Parameter layout shared by every scoped query:
// $1 club, $2 game, $3 member, $4 from, $5 to, $6 member's team ids.

macro_rules! placement_columns {
    () => {
        "r.winner, r.place_2, r.place_3, r.place_4, r.place_5, r.place_6, r.place_7, r.place_8"
    };
}

macro_rules! top_slot_position {
    () => {
        "CASE WHEN r.winner IS NOT NULL THEN 1 \
              WHEN r.place_2 IS NOT NULL THEN 2 \
              WHEN r.place_3 IS NOT NULL THEN 3 \
              WHEN r.place_4 IS NOT NULL THEN 4 \
              WHEN r.place_5 IS NOT NULL THEN 5 \
              WHEN r.place_6 IS NOT NULL THEN 6 \
              WHEN r.place_7 IS NOT NULL THEN 7 \
              ELSE 8 END"
    };
}

// Malformed rows are not plays; these mirror `RawResult::is_well_formed`.
macro_rules! distinct_placements {
    () => {
        concat!(
            " AND (SELECT COUNT(s) = COUNT(DISTINCT s) FROM unnest(ARRAY[",
            placement_columns!(),
            "]) AS s)"
        )
    };
}

macro_rules! cooperative_well_formed {
    () => {
        " AND lower(r.outcome) IN ('win', 'loss') \
          AND NOT EXISTS ( \
              SELECT 1 FROM cooperative_participants p \
               WHERE p.result_id = r.id \
                 AND (p.member_id IS NULL) = (p.team_id IS NULL)) \
          AND NOT EXISTS ( \
              SELECT 1 FROM cooperative_participants p \
               WHERE p.result_id = r.id \
               GROUP BY p.member_id, p.team_id \
              HAVING COUNT(*) > 1)"
    };
}

macro_rules! common_predicate {
    () => {
        "g.club_id = $1 \
         AND ($2::BIGINT IS NULL OR r.game_id = $2) \
         AND ($4::TIMESTAMPTZ IS NULL OR r.played_at >= $4) \
         AND ($5::TIMESTAMPTZ IS NULL OR r.played_at < $5)"
    };
}

macro_rules! individual_predicate {
    () => {
        concat!(
            common_predicate!(),
            " AND ($3::BIGINT IS NULL OR $3 = ANY(ARRAY[",
            placement_columns!(),
            "]))"
        )
    };
}

macro_rules! team_predicate {
    () => {
        concat!(
            common_predicate!(),
            " AND ($3::BIGINT IS NULL OR ARRAY[",
            placement_columns!(),
            "] && $6::BIGINT[])"
        )
    };
}

macro_rules! cooperative_predicate {
    () => {
        concat!(
            common_predicate!(),
            " AND ($3::BIGINT IS NULL OR EXISTS ( \
                SELECT 1 FROM cooperative_participants p \
                 WHERE p.result_id = r.id \
                   AND (p.member_id = $3 OR p.team_id = ANY($6::BIGINT[]))))"
        )
    };
}

macro_rules! individual_head {
    () => {
        concat!(
            "SELECT r.id, r.game_id, g.name AS game_name, r.played_at, \
                    r.player_count AS entrant_count, ",
            placement_columns!(),
            " FROM individual_results r JOIN games g ON g.id = r.game_id"
        )
    };
}

macro_rules! team_head {
    () => {
        concat!(
            "SELECT r.id, r.game_id, g.name AS game_name, r.played_at, \
                    r.team_count AS entrant_count, ",
            placement_columns!(),
            " FROM team_results r JOIN games g ON g.id = r.game_id"
        )
    };
}

macro_rules! cooperative_head {
    () => {
        "SELECT r.id, r.game_id, g.name AS game_name, r.played_at, r.participant_count, r.outcome, \
                ARRAY(SELECT p.id FROM cooperative_participants p \
                       WHERE p.result_id = r.id ORDER BY p.id) AS participant_ids, \
                ARRAY(SELECT p.member_id FROM cooperative_participants p \
                       WHERE p.result_id = r.id ORDER BY p.id) AS participant_members, \
                ARRAY(SELECT p.team_id FROM cooperative_participants p \
                       WHERE p.result_id = r.id ORDER BY p.id) AS participant_teams \
           FROM cooperative_results r JOIN games g ON g.id = r.game_id"
    };
}

macro_rules! plays_cte {
    () => {
        concat!(
            "WITH plays AS ( \
               SELECT 0::SMALLINT AS kind, r.id, r.played_at, g.name AS game_name, \
                      r.player_count AS participant_count, m.nickname AS headline_name, \
                      0::SMALLINT AS outcome_group, ",
            top_slot_position!(),
            " AS outcome_value \
                 FROM individual_results r \
                 JOIN games g ON g.id = r.game_id \
                 LEFT JOIN members m ON m.id = COALESCE(",
            placement_columns!(),
            ") WHERE ",
            individual_predicate!(),
            " AND COALESCE(",
            placement_columns!(),
            ") IS NOT NULL",
            distinct_placements!(),
            " UNION ALL \
               SELECT 1::SMALLINT, r.id, r.played_at, g.name, r.team_count, t.name, 0::SMALLINT, ",
            top_slot_position!(),
            " FROM team_results r \
                 JOIN games g ON g.id = r.game_id \
                 LEFT JOIN teams t ON t.id = COALESCE(",
            placement_columns!(),
            ") WHERE ",
            team_predicate!(),
            " AND COALESCE(",
            placement_columns!(),
            ") IS NOT NULL",
            distinct_placements!(),
            " UNION ALL \
               SELECT 2::SMALLINT, r.id, r.played_at, g.name, r.participant_count, h.name, \
                      1::SMALLINT, CASE WHEN lower(r.outcome) = 'win' THEN 0 ELSE 1 END \
                 FROM cooperative_results r \
                 JOIN games g ON g.id = r.game_id \
                 JOIN LATERAL ( \
                      SELECT COALESCE(m.nickname, t.name) AS name \
                        FROM cooperative_participants p \
                        LEFT JOIN members m ON m.id = p.member_id \
                        LEFT JOIN teams t ON t.id = p.team_id \
                       WHERE p.result_id = r.id \
                       ORDER BY p.id \
                       LIMIT 1) h ON TRUE \
                WHERE ",
            cooperative_predicate!(),
            cooperative_well_formed!(),
            ")"
        )
    };
}

const INDIVIDUAL_ROWS: &str = concat!(
    individual_head!(),
    " WHERE ",
    individual_predicate!(),
    " ORDER BY r.played_at, r.id"
);

const TEAM_ROWS: &str = concat!(
    team_head!(),
    " WHERE ",
    team_predicate!(),
    " ORDER BY r.played_at, r.id"
);

const COOPERATIVE_ROWS: &str = concat!(
    cooperative_head!(),
    " WHERE ",
    cooperative_predicate!(),
    " ORDER BY r.played_at, r.id"
);

const INDIVIDUAL_BY_ID: &str = concat!(individual_head!(), " WHERE r.id = ANY($1)");
const TEAM_BY_ID: &str = concat!(team_head!(), " WHERE r.id = ANY($1)");
const COOPERATIVE_BY_ID: &str = concat!(cooperative_head!(), " WHERE r.id = ANY($1)");

const COUNT_PLAYS: &str = concat!(plays_cte!(), " SELECT COUNT(*) FROM plays");

const CHAMPIONS: &str = "SELECT id, club_id, game_id, member_id, start_date, end_date \
                           FROM champions \
                          WHERE club_id = $1 AND (NOT $2 OR end_date IS NULL) \
                          ORDER BY game_id, start_date, id";

fn order_by(window: &FeedWindow) -> String {
    let dir = window.sort.direction.sql();
    let primary = match window.sort.key {
        SortKey::Timestamp => format!("played_at {dir}"),
        // Byte order, matching the in-memory comparison.
        SortKey::Game => format!("game_name COLLATE \"C\" {dir}"),
        SortKey::Actor => format!("headline_name COLLATE \"C\" {dir} NULLS LAST"),
        SortKey::Participants => format!("participant_count {dir}"),
        SortKey::GameType => format!("kind {dir}"),
        SortKey::Position => format!("outcome_group {dir}, outcome_value {dir}"),
    };
    format!("{primary}, id {dir}, kind {dir}")
}

fn ranked_from_row(row: &PgRow) -> Result<RankedResultRow, sqlx::Error> {
    let mut placements: [Option<i64>; PLACEMENT_SLOTS] = [None; PLACEMENT_SLOTS];
    for (slot, column) in placements.iter_mut().zip(SLOT_COLUMNS) {
        *slot = row.try_get(column)?;
    }

    Ok(RankedResultRow {
        id: row.try_get("id")?,
        game_id: row.try_get("game_id")?,
        game_name: row.try_get("game_name")?,
        played_at: row.try_get("played_at")?,
        entrant_count: row.try_get("entrant_count")?,
        placements,
    })
}

fn cooperative_from_row(row: &PgRow) -> Result<CooperativeResultRow, sqlx::Error> {
    let ids: Vec<i64> = row.try_get("participant_ids")?;
    let members: Vec<Option<i64>> = row.try_get("participant_members")?;
    let teams: Vec<Option<i64>> = row.try_get("participant_teams")?;

    let participants = ids
        .into_iter()
        .zip(members)
        .zip(teams)
        .map(|((id, member_id), team_id)| CooperativeParticipantRow {
            id,
            member_id,
            team_id,
        })
        .collect();

    Ok(CooperativeResultRow {
        id: row.try_get("id")?,
        game_id: row.try_get("game_id")?,
        game_name: row.try_get("game_name")?,
        played_at: row.try_get("played_at")?,
        participant_count: row.try_get("participant_count")?,
        outcome: row.try_get("outcome")?,
        participants,
    })
}

fn raw_from_row(kind: ResultKind, row: &PgRow) -> Result<RawResult, sqlx::Error> {
    Ok(match kind {
        ResultKind::Individual => RawResult::Individual(ranked_from_row(row)?),
        ResultKind::Team => RawResult::Team(ranked_from_row(row)?),
        ResultKind::Cooperative => RawResult::Cooperative(cooperative_from_row(row)?),
    })
}

fn storage_error(context: &'static str) -> impl Fn(sqlx::Error) -> StatsError {
    move |e| {
        warn!(error = %e, context, "Result query failed");
        StatsError::from(e)
    }
}

/// Bind values for the shared scoped-query parameter layout.
struct ScopeBinds {
    club_id: ClubId,
    game_id: Option<i64>,
    member_id: Option<i64>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    team_ids: Vec<i64>,
}

impl ScopeBinds {
    fn new(scope: &ResolvedScope) -> Self {
        Self {
            club_id: scope.club_id,
            game_id: scope.game_id(),
            member_id: scope.member_id(),
            from: None,
            to: None,
            team_ids: scope.team_ids(),
        }
    }

    fn for_filter(filter: &ResultFilter) -> Self {
        Self {
            from: filter.from(),
            to: filter.to(),
            ..Self::new(&filter.scope)
        }
    }
}

/// PostgreSQL implementation of ResultRepository
pub struct PostgresResultRepository {
    pool: PgPool,
}

impl PostgresResultRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn stream_kind(&self, kind: ResultKind, binds: &ScopeBinds) -> ResultStream<'_> {
        let query = match kind {
            ResultKind::Individual => sqlx::query(INDIVIDUAL_ROWS)
                .bind(binds.club_id)
                .bind(binds.game_id)
                .bind(binds.member_id)
                .bind(binds.from)
                .bind(binds.to),
            ResultKind::Team => sqlx::query(TEAM_ROWS)
                .bind(binds.club_id)
                .bind(binds.game_id)
                .bind(binds.member_id)
                .bind(binds.from)
                .bind(binds.to)
                .bind(binds.team_ids.clone()),
            ResultKind::Cooperative => sqlx::query(COOPERATIVE_ROWS)
                .bind(binds.club_id)
                .bind(binds.game_id)
                .bind(binds.member_id)
                .bind(binds.from)
                .bind(binds.to)
                .bind(binds.team_ids.clone()),
        };

        query
            .fetch(&self.pool)
            .map(move |row| {
                row.and_then(|row| raw_from_row(kind, &row))
                    .map_err(storage_error("stream results"))
            })
            .boxed()
    }
}

#[async_trait]
impl ResultRepository for PostgresResultRepository {
    #[instrument(skip(self))]
    async fn resolve_scope(&self, scope: Scope) -> Result<ResolvedScope, StatsError> {
        scope.validate()?;

        let resolved = match scope {
            Scope::Club(club_id) => {
                sqlx::query_scalar::<_, i64>("SELECT id FROM clubs WHERE id = $1")
                    .bind(club_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(storage_error("resolve club"))?
                    .ok_or_else(|| StatsError::NotFound(format!("club {club_id}")))?;
                ResolvedScope::club(club_id)
            }
            Scope::Member(member_id) => {
                let club_id = sqlx::query_scalar::<_, i64>("SELECT club_id FROM members WHERE id = $1")
                    .bind(member_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(storage_error("resolve member"))?
                    .ok_or_else(|| StatsError::NotFound(format!("member {member_id}")))?;

                let team_ids = sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM teams \
                      WHERE club_id = $1 AND $2 IN (member_1, member_2, member_3, member_4) \
                      ORDER BY id",
                )
                .bind(club_id)
                .bind(member_id)
                .fetch_all(&self.pool)
                .await
                .map_err(storage_error("resolve member teams"))?;

                let mut actors = vec![ActorRef::Member(member_id)];
                actors.extend(team_ids.into_iter().map(ActorRef::Team));
                ResolvedScope {
                    scope,
                    club_id,
                    actors,
                }
            }
            Scope::Game(game_id) => {
                let club_id = sqlx::query_scalar::<_, i64>("SELECT club_id FROM games WHERE id = $1")
                    .bind(game_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(storage_error("resolve game"))?
                    .ok_or_else(|| StatsError::NotFound(format!("game {game_id}")))?;
                ResolvedScope {
                    scope,
                    club_id,
                    actors: Vec::new(),
                }
            }
        };

        debug!(club_id = resolved.club_id, "Scope resolved in database");
        Ok(resolved)
    }

    fn stream_results(&self, filter: ResultFilter) -> ResultStream<'_> {
        let binds = ScopeBinds::for_filter(&filter);
        let streams: Vec<ResultStream<'_>> = ResultKind::ALL
            .into_iter()
            .filter(|kind| filter.reads(*kind))
            .map(|kind| self.stream_kind(kind, &binds))
            .collect();
        stream::iter(streams).flatten().boxed()
    }

    #[instrument(skip(self))]
    async fn feed_keys(
        &self,
        scope: &ResolvedScope,
        window: &FeedWindow,
    ) -> Result<Vec<RecordRef>, StatsError> {
        let binds = ScopeBinds::new(scope);
        let sql = format!(
            "{} SELECT kind, id FROM plays ORDER BY {} LIMIT $7 OFFSET $8",
            plays_cte!(),
            order_by(window)
        );

        let rows = sqlx::query(&sql)
            .bind(binds.club_id)
            .bind(binds.game_id)
            .bind(binds.member_id)
            .bind(binds.from)
            .bind(binds.to)
            .bind(binds.team_ids)
            .bind(i64::from(window.limit))
            .bind(window.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error("feed page"))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let code: i16 = row.try_get("kind").map_err(storage_error("feed page"))?;
            let kind = ResultKind::from_code(code).ok_or_else(|| {
                StatsError::StorageUnavailable(format!("unknown result kind {code}"))
            })?;
            let id: i64 = row.try_get("id").map_err(storage_error("feed page"))?;
            records.push(RecordRef::new(kind, id));
        }

        debug!(record_count = records.len(), "Feed page keys fetched from database");
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn count_plays(&self, scope: &ResolvedScope) -> Result<u64, StatsError> {
        let binds = ScopeBinds::new(scope);
        let count = sqlx::query_scalar::<_, i64>(COUNT_PLAYS)
            .bind(binds.club_id)
            .bind(binds.game_id)
            .bind(binds.member_id)
            .bind(binds.from)
            .bind(binds.to)
            .bind(binds.team_ids)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error("count plays"))?;

        Ok(count.max(0) as u64)
    }

    #[instrument(skip(self, records), fields(record_count = records.len()))]
    async fn fetch_records(&self, records: &[RecordRef]) -> Result<Vec<RawResult>, StatsError> {
        let mut loaded: HashMap<RecordRef, RawResult> = HashMap::with_capacity(records.len());

        for kind in ResultKind::ALL {
            let ids: Vec<i64> = records
                .iter()
                .filter(|record| record.kind == kind)
                .map(|record| record.id)
                .collect();
            if ids.is_empty() {
                continue;
            }

            let sql = match kind {
                ResultKind::Individual => INDIVIDUAL_BY_ID,
                ResultKind::Team => TEAM_BY_ID,
                ResultKind::Cooperative => COOPERATIVE_BY_ID,
            };
            let rows = sqlx::query(sql)
                .bind(ids)
                .fetch_all(&self.pool)
                .await
                .map_err(storage_error("fetch records"))?;

            for row in &rows {
                let raw = raw_from_row(kind, row).map_err(storage_error("fetch records"))?;
                loaded.insert(raw.record(), raw);
            }
        }

        Ok(records
            .iter()
            .filter_map(|record| loaded.remove(record))
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_champions(
        &self,
        club_id: ClubId,
        current_only: bool,
    ) -> Result<Vec<ChampionRow>, StatsError> {
        let champions = sqlx::query_as::<_, ChampionRow>(CHAMPIONS)
            .bind(club_id)
            .bind(current_only)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error("list champions"))?;

        Ok(champions)
    }

    #[instrument(skip(self))]
    async fn count_champions(&self, club_id: ClubId) -> Result<u64, StatsError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM champions WHERE club_id = $1")
                .bind(club_id)
                .fetch_one(&self.pool)
                .await
                .map_err(storage_error("count champions"))?;

        Ok(count.max(0) as u64)
    }
}
