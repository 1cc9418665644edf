pub mod models;
pub mod repository;

pub use models::{Club, Game, Member, MemberStatus, NameBook, Team};
pub use repository::{ClubDirectory, InMemoryClubDirectory, PostgresClubDirectory};
