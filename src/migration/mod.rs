mod disruptor;
mod error;
mod trigger;

pub use disruptor::{ConnectionKill, Disruptor, PathMigration};
pub use error::{MigrationError, MigrationResult};
pub use trigger::{MigrationTrigger, TriggerState, DEFAULT_MIGRATION_THRESHOLD};
