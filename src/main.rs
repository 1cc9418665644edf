use clubstats::{
    build_router,
    directory::{ClubDirectory, InMemoryClubDirectory, PostgresClubDirectory},
    results::{InMemoryResultRepository, PostgresResultRepository, ResultRepository},
    AppState, Settings, StatsService,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clubstats=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env();
    info!(bind_addr = %settings.bind_addr, "Starting club statistics server");

    let (directory, results): (Arc<dyn ClubDirectory>, Arc<dyn ResultRepository>) =
        match &settings.database_url {
            Some(database_url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(settings.database_max_connections)
                    .acquire_timeout(settings.query_timeout)
                    .connect(database_url)
                    .await
                    .expect("Failed to connect to database");
                info!(
                    max_connections = settings.database_max_connections,
                    "Connected to PostgreSQL"
                );
                let directory: Arc<dyn ClubDirectory> =
                    Arc::new(PostgresClubDirectory::new(pool.clone()));
                let results: Arc<dyn ResultRepository> =
                    Arc::new(PostgresResultRepository::new(pool));
                (directory, results)
            }
            None => {
                warn!("DATABASE_URL not set, serving from empty in-memory storage");
                let memory = Arc::new(InMemoryClubDirectory::new());
                let results: Arc<dyn ResultRepository> =
                    Arc::new(InMemoryResultRepository::new(Arc::clone(&memory)));
                let directory: Arc<dyn ClubDirectory> = memory;
                (directory, results)
            }
        };

    let stats_service = StatsService::builder(directory, results)
        .with_page_size(settings.feed_page_size)
        .with_query_timeout(settings.query_timeout)
        .with_leaderboard_max(settings.leaderboard_max)
        .build();

    let bind_addr = settings.bind_addr.clone();
    let app = build_router(AppState::new(Arc::new(stats_service), Arc::new(settings)));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind listener");
    info!("Server running on http://{}", bind_addr);
    axum::serve(listener, app).await.expect("Server error");
}
