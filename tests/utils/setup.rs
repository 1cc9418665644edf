use std::sync::Arc;

use clubstats::{
    build_router,
    directory::InMemoryClubDirectory,
    results::InMemoryResultRepository,
    stats::{MatchOutcome, SortSpec},
    AppState, Settings, StatsService,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub directory: Arc<InMemoryClubDirectory>,
    pub results: Arc<InMemoryResultRepository>,
    pub stats_service: Arc<StatsService>,
    pub page_size: u32,
}

impl TestSetup {
    pub fn new(
        directory: Arc<InMemoryClubDirectory>,
        results: Arc<InMemoryResultRepository>,
        page_size: u32,
    ) -> Self {
        let stats_service = StatsService::builder(directory.clone(), results.clone())
            .with_page_size(page_size)
            .build();
        Self {
            directory,
            results,
            stats_service: Arc::new(stats_service),
            page_size,
        }
    }

    /// Same storage, different page size.
    pub fn with_page_size(&self, page_size: u32) -> Self {
        Self::new(self.directory.clone(), self.results.clone(), page_size)
    }

    #[allow(dead_code)]
    pub fn router(&self) -> axum::Router {
        let settings = Settings {
            feed_page_size: self.page_size,
            ..Settings::default()
        };
        build_router(AppState::new(self.stats_service.clone(), Arc::new(settings)))
    }
}

/// Collects every page of a club feed, returning the outcomes and the
/// `total_count` each page reported.
#[allow(dead_code)]
pub async fn walk_feed(setup: &TestSetup, club_id: i64, sort: SortSpec) -> (Vec<MatchOutcome>, Vec<u64>) {
    let mut outcomes = Vec::new();
    let mut totals = Vec::new();
    let mut page = 1;
    loop {
        let feed = setup
            .stats_service
            .get_club_feed(club_id, sort, page)
            .await
            .expect("feed page should load");
        totals.push(feed.total_count);
        outcomes.extend(feed.outcomes);
        if !feed.has_more {
            break;
        }
        page += 1;
    }
    (outcomes, totals)
}
