pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, DbPool};
pub use fixtures::{DirectorySeedDataset, SeedResult, SeedUserInfo, VerificationResult};
pub use repositories::{InMemoryStore, RepositoryError, SqlSession, SqlStore};
