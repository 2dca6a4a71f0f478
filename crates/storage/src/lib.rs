#![forbid(unsafe_code)]

pub mod credentials;
pub mod repository;
pub mod schedule_cache;
pub mod sqlite;

pub use credentials::CredentialStore;
pub use repository::{InMemoryKeyValueStore, KeyValueStore, Storage, StorageError};
pub use schedule_cache::{DEFAULT_CACHE_TTL_DAYS, ScheduleCache};

/// Storage key holding the bearer credential.
pub const TOKEN_KEY: &str = "token";

/// Storage key holding the JSON map of per-mentee cached schedules.
pub const MENTEE_SCHEDULES_KEY: &str = "menteeSchedules";
