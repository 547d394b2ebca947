pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod providers;
pub mod storage;
pub mod types;

pub use config::{Config, PoolConfig};
pub use engine::AgreementsPool;
pub use error::PoolError;
pub use types::*;
