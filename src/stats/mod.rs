pub mod feed;
pub mod handlers;
pub mod leaderboard;
pub mod metrics;
pub mod models;
pub mod service;
pub mod types;
pub mod unifier;

mod errors;

pub use errors::StatsError;
pub use feed::{PageRequest, SortDirection, SortKey, SortSpec};
pub use models::*;
pub use service::{StatsService, StatsServiceBuilder};
pub use unifier::{ActorFilter, ResultUnifier};
