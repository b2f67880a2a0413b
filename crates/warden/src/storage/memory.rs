use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::WardenError;
use crate::record::ModerationRecord;
use crate::store::RecordStore;

/// In-memory record store for testing and standalone deployments.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<ModerationRecord>>,
    fail_next: Mutex<bool>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything persisted so far.
    pub fn records(&self) -> Vec<ModerationRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Make the next `persist` call fail, to exercise error propagation.
    pub fn fail_next(&self) {
        *self.fail_next.lock() = true;
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn persist(&self, record: &ModerationRecord) -> Result<(), WardenError> {
        let mut fail = self.fail_next.lock();
        if *fail {
            *fail = false;
            return Err(WardenError::PersistenceFailed {
                record_id: record.id().clone(),
                reason: "injected failure".into(),
                source: None,
            });
        }
        drop(fail);

        self.records.lock().push(record.clone());
        Ok(())
    }
}
