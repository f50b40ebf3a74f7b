//! Kernel module - server infrastructure and dependencies.

pub mod cache;
pub mod clock;
pub mod database;
pub mod deps;
pub mod identity;
pub mod jobs;
pub mod password;
pub mod query_log;
pub mod test_dependencies;
pub mod traits;
pub mod transactor;

pub use cache::RedisCache;
pub use clock::SystemClock;
pub use database::PgDatabase;
pub use deps::ServerDeps;
pub use identity::JwksIdentityVerifier;
pub use password::Argon2PasswordHasher;
pub use query_log::QueryLogger;
pub use traits::*;
pub use transactor::{Atomic, Database, Transactor, UnitOfWork};
