pub mod models;
pub mod postgres;
pub mod repository;
pub mod scope;

pub use models::{ActorRef, RawResult, RecordRef, ResultKind};
pub use postgres::PostgresResultRepository;
pub use repository::{InMemoryResultRepository, ResultRepository, ResultStream};
pub use scope::{DateRange, ResolvedScope, ResultFilter, Scope};
