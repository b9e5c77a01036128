use crate::migration::error::MigrationResult;
use crate::transport::MultiplexedConnection;
use std::sync::atomic::{AtomicBool, Ordering};

/// A one-shot mid-transfer disruption.
pub trait Disruptor {
    fn disrupt(&self) -> MigrationResult<()>;
}

/// Changes the path identifier of a multiplexed connection. The logical
/// connection and its streams survive.
pub struct PathMigration<'a, C: ?Sized>(pub &'a C);

impl<C> Disruptor for PathMigration<'_, C>
where
    C: MultiplexedConnection + ?Sized,
{
    fn disrupt(&self) -> MigrationResult<()> {
        self.0.change_path_identifier()?;
        Ok(())
    }
}

/// Requests that the active single-stream connection be torn down. The
/// download loop owning the connection polls `take()` after each chunk.
#[derive(Debug, Default)]
pub struct ConnectionKill {
    requested: AtomicBool,
}

impl ConnectionKill {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once per request.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }
}

impl Disruptor for ConnectionKill {
    fn disrupt(&self) -> MigrationResult<()> {
        self.requested.store(true, Ordering::Release);
        Ok(())
    }
}
