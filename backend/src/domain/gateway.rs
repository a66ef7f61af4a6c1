//! Facade application code uses to reach the store.
//!
//! Every operation resolves to `Result<_, ErrorInfo>`: failures are already
//! classified, localised, and carry the retry affordances the UI needs.

use std::sync::Arc;

use serde_json::Value;

use super::ports::{
    MutationKind, RawError, RecordStore, Row, RowFilter, StoreMutation, StoreQuery,
};
use super::{Action, ErrorInfo, RetryOrchestrator, Table, UserId};

/// Insert or update request for [`ResourceGateway::write`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    /// Insert `payload` as a new row.
    Insert {
        /// Column values.
        payload: Value,
    },
    /// Merge `changes` into every row matching `filter`.
    Update {
        /// Rows to change.
        filter: RowFilter,
        /// Column values to set.
        changes: Value,
    },
}

impl WriteRequest {
    fn into_mutation(self, table: Table) -> StoreMutation {
        match self {
            Self::Insert { payload } => StoreMutation {
                table,
                kind: MutationKind::Insert,
                filter: RowFilter::all(),
                payload: Some(payload),
            },
            Self::Update { filter, changes } => StoreMutation {
                table,
                kind: MutationKind::Update,
                filter,
                payload: Some(changes),
            },
        }
    }
}

/// Permission-gated access to the store on behalf of one user.
pub struct ResourceGateway {
    user: UserId,
    store: Arc<dyn RecordStore>,
    orchestrator: Arc<RetryOrchestrator>,
}

impl ResourceGateway {
    /// Gateway acting as `user`.
    pub fn new(
        user: UserId,
        store: Arc<dyn RecordStore>,
        orchestrator: Arc<RetryOrchestrator>,
    ) -> Self {
        Self {
            user,
            store,
            orchestrator,
        }
    }

    /// User the gateway acts for.
    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Read rows of `table` matching `filter`.
    pub async fn read(&self, table: Table, filter: RowFilter) -> Result<Vec<Row>, ErrorInfo> {
        let query = StoreQuery { table, filter };
        let store = &self.store;
        let query = &query;
        self.orchestrator
            .execute(&self.user, table.category(), Action::Read, move || async move {
                store.query(query).await.map_err(RawError::from)
            })
            .await
    }

    /// Insert or update rows of `table`; returns the affected rows.
    pub async fn write(&self, table: Table, request: WriteRequest) -> Result<Vec<Row>, ErrorInfo> {
        self.mutate(table, Action::Write, request.into_mutation(table))
            .await
    }

    /// Delete rows of `table` matching `filter`; returns the removed rows.
    pub async fn delete(&self, table: Table, filter: RowFilter) -> Result<Vec<Row>, ErrorInfo> {
        let mutation = StoreMutation {
            table,
            kind: MutationKind::Delete,
            filter,
            payload: None,
        };
        self.mutate(table, Action::Delete, mutation).await
    }

    async fn mutate(
        &self,
        table: Table,
        action: Action,
        mutation: StoreMutation,
    ) -> Result<Vec<Row>, ErrorInfo> {
        let store = &self.store;
        let mutation = &mutation;
        self.orchestrator
            .execute(&self.user, table.category(), action, move || async move {
                store.mutate(mutation).await.map_err(RawError::from)
            })
            .await
    }

    /// Events matching `filter`.
    pub async fn read_events(&self, filter: RowFilter) -> Result<Vec<Row>, ErrorInfo> {
        self.read(Table::Events, filter).await
    }

    /// Apply `changes` to the event with `id`.
    pub async fn update_event(
        &self,
        id: impl Into<Value>,
        changes: Value,
    ) -> Result<Vec<Row>, ErrorInfo> {
        self.write(
            Table::Events,
            WriteRequest::Update {
                filter: RowFilter::eq("id", id),
                changes,
            },
        )
        .await
    }

    /// Delete the event with `id`.
    pub async fn delete_event(&self, id: impl Into<Value>) -> Result<Vec<Row>, ErrorInfo> {
        self.delete(Table::Events, RowFilter::eq("id", id)).await
    }

    /// Musicians matching `filter`.
    pub async fn read_musicians(&self, filter: RowFilter) -> Result<Vec<Row>, ErrorInfo> {
        self.read(Table::Musicians, filter).await
    }

    /// Delete the musician with `id`.
    pub async fn delete_musician(&self, id: impl Into<Value>) -> Result<Vec<Row>, ErrorInfo> {
        self.delete(Table::Musicians, RowFilter::eq("id", id)).await
    }

    /// Bookings matching `filter`.
    pub async fn read_bookings(&self, filter: RowFilter) -> Result<Vec<Row>, ErrorInfo> {
        self.read(Table::Bookings, filter).await
    }

    /// Insert a booking.
    pub async fn create_booking(&self, booking: Value) -> Result<Vec<Row>, ErrorInfo> {
        self.write(Table::Bookings, WriteRequest::Insert { payload: booking })
            .await
    }

    /// Payments matching `filter`.
    pub async fn read_payments(&self, filter: RowFilter) -> Result<Vec<Row>, ErrorInfo> {
        self.read(Table::Payments, filter).await
    }
}
