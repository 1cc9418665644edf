pub mod club_builders;
pub mod setup;

// Re-export main utilities for use by test files
pub use club_builders::{at, ClubBuilder};
#[allow(unused_imports)]
pub use setup::{walk_feed, TestSetup};
