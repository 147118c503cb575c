pub mod error;
pub mod job;
pub mod keys;
pub mod local;
pub mod record;
pub mod validate;

pub use error::ConfigError;
pub use job::{JobParameters, JobSettings};
pub use local::{resolve_local, resolve_local_from_env, LocalOptions};
pub use record::{AccountLogin, LoadConfig, LoadTargets, SessionScope, WarehouseCredentials};
pub use validate::ValidationMode;
