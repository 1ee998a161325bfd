//! persistence
//!
//! Write-behind channel between the in-memory store and the durable record
//! store.
//!
//! 1.  **RecordStore**: the four record operations the service needs from a
//!     durable backend. Implemented by `PgRecordStore` (PostgreSQL) and
//!     `MemoryRecordStore` (no database configured, tests).
//! 2.  **WriteBehind**: cheap cloneable handle. `enqueue` never blocks and
//!     never fails from the caller's point of view; a full or closed queue
//!     drops the command and counts it.
//! 3.  **Worker**: a single task draining the queue in FIFO order, so writes
//!     reach the backend in the order they were committed in memory. Errors
//!     are logged and counted, nothing is retried.

pub mod memory;
pub mod postgres;

pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::models::{Ticket, User};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Durable backend for user and ticket records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_user_record(&self, user: &User) -> Result<(), PersistenceError>;
    async fn create_ticket_record(&self, ticket: &Ticket) -> Result<(), PersistenceError>;
    async fn update_seat_record(&self, user_id: &str, seat: &str) -> Result<(), PersistenceError>;
    async fn delete_ticket_record(&self, user_id: &str) -> Result<(), PersistenceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceCommand {
    CreateUser(User),
    CreateTicket(Ticket),
    UpdateSeat { user_id: String, seat: String },
    DeleteTicket { user_id: String },
}

impl PersistenceCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            PersistenceCommand::CreateUser(_) => "create_user",
            PersistenceCommand::CreateTicket(_) => "create_ticket",
            PersistenceCommand::UpdateSeat { .. } => "update_seat",
            PersistenceCommand::DeleteTicket { .. } => "delete_ticket",
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            PersistenceCommand::CreateUser(user) => &user.user_id,
            PersistenceCommand::CreateTicket(ticket) => &ticket.user_id,
            PersistenceCommand::UpdateSeat { user_id, .. } => user_id,
            PersistenceCommand::DeleteTicket { user_id } => user_id,
        }
    }

    async fn apply(&self, store: &dyn RecordStore) -> Result<(), PersistenceError> {
        match self {
            PersistenceCommand::CreateUser(user) => store.create_user_record(user).await,
            PersistenceCommand::CreateTicket(ticket) => store.create_ticket_record(ticket).await,
            PersistenceCommand::UpdateSeat { user_id, seat } => {
                store.update_seat_record(user_id, seat).await
            }
            PersistenceCommand::DeleteTicket { user_id } => store.delete_ticket_record(user_id).await,
        }
    }
}

/// Receives record writes from `ReservationStore` while its lock is held, so
/// the append order is the commit order. Implementations must not block.
pub trait Journal {
    fn append(&self, command: PersistenceCommand);
}

enum QueueItem {
    Command(PersistenceCommand),
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct PersistenceStats {
    applied: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Counters reported by `/health`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistenceSnapshot {
    pub applied: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Clone)]
pub struct WriteBehind {
    tx: mpsc::Sender<QueueItem>,
    stats: Arc<PersistenceStats>,
}

impl WriteBehind {
    /// Starts the worker. It stops once every `WriteBehind` clone is dropped
    /// and the queue is drained.
    pub fn spawn(store: Arc<dyn RecordStore>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(PersistenceStats::default());
        let handle = tokio::spawn(run_worker(store, rx, stats.clone()));
        (Self { tx, stats }, handle)
    }

    pub fn enqueue(&self, command: PersistenceCommand) {
        let rejected = match self.tx.try_send(QueueItem::Command(command)) {
            Ok(()) => return,
            Err(mpsc::error::TrySendError::Full(item)) => ("full", item),
            Err(mpsc::error::TrySendError::Closed(item)) => ("closed", item),
        };

        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        if let (reason, QueueItem::Command(command)) = rejected {
            warn!(
                "Persistence queue {}, dropping {} for {}",
                reason,
                command.kind(),
                command.user_id()
            );
        }
    }

    /// Waits until every command enqueued before this call has been applied.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(QueueItem::Flush(ack_tx)).await.is_err() {
            return;
        }
        let _ = ack_rx.await;
    }

    pub fn stats(&self) -> PersistenceSnapshot {
        PersistenceSnapshot {
            applied: self.stats.applied.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Journal for WriteBehind {
    fn append(&self, command: PersistenceCommand) {
        self.enqueue(command);
    }
}

async fn run_worker(
    store: Arc<dyn RecordStore>,
    mut rx: mpsc::Receiver<QueueItem>,
    stats: Arc<PersistenceStats>,
) {
    info!("Persistence worker started");

    while let Some(item) = rx.recv().await {
        match item {
            QueueItem::Command(command) => match command.apply(store.as_ref()).await {
                Ok(()) => {
                    stats.applied.fetch_add(1, Ordering::Relaxed);
                    debug!("Persisted {} for {}", command.kind(), command.user_id());
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        "Failed to persist {} for {}: {}",
                        command.kind(),
                        command.user_id(),
                        e
                    );
                }
            },
            QueueItem::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    info!("Persistence worker stopped");
}
