use async_trait::async_trait;

use crate::error::WardenError;
use crate::record::ModerationRecord;

/// Durable persistence collaborator for committed records.
///
/// Invoked exactly once per committed outcome, after any event-driven
/// modification and before the commit operation returns. Failures propagate
/// to the commit caller — a record that could not be stored must not be
/// silently treated as committed.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a committed record.
    async fn persist(&self, record: &ModerationRecord) -> Result<(), WardenError>;
}
