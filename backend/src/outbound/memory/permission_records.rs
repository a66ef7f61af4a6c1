//! In-memory permission record repository.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::ports::{PermissionRecordError, PermissionRecordRepository};
use crate::domain::{PermissionRecord, UserId};

/// Records keyed by user; one record per user.
#[derive(Debug, Default)]
pub struct InMemoryPermissionRecordRepository {
    records: Mutex<HashMap<UserId, PermissionRecord>>,
}

impl InMemoryPermissionRecordRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, PermissionRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PermissionRecordRepository for InMemoryPermissionRecordRepository {
    async fn insert(&self, record: &PermissionRecord) -> Result<(), PermissionRecordError> {
        let mut records = self.lock();
        if records.contains_key(&record.user_id) {
            return Err(PermissionRecordError::duplicate(record.user_id.to_string()));
        }
        records.insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &PermissionRecord) -> Result<(), PermissionRecordError> {
        match self.lock().get_mut(&record.user_id) {
            Some(stored) => {
                *stored = record.clone();
                Ok(())
            }
            None => Err(PermissionRecordError::missing(record.user_id.to_string())),
        }
    }

    async fn find(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PermissionRecord>, PermissionRecordError> {
        Ok(self.lock().get(user_id).cloned())
    }
}
