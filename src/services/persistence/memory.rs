use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{PersistenceCommand, PersistenceError, RecordStore};
use crate::models::{Ticket, User};

#[derive(Debug, Default)]
struct Records {
    users: HashMap<String, User>,
    tickets: HashMap<String, Ticket>,
    history: Vec<PersistenceCommand>,
}

/// In-process record store. Used when no `DATABASE_URL` is configured and
/// in tests, where `set_failing` simulates an unreachable backend.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<Records>,
    failing: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn user(&self, user_id: &str) -> Option<User> {
        self.lock().users.get(user_id).cloned()
    }

    pub fn ticket(&self, user_id: &str) -> Option<Ticket> {
        self.lock().tickets.get(user_id).cloned()
    }

    /// Successfully applied commands, oldest first.
    pub fn history(&self) -> Vec<PersistenceCommand> {
        self.lock().history.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(PersistenceError::Unavailable(
                "memory record store is set to fail".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_user_record(&self, user: &User) -> Result<(), PersistenceError> {
        self.check_available()?;
        let mut records = self.lock();
        records.users.insert(user.user_id.clone(), user.clone());
        records.history.push(PersistenceCommand::CreateUser(user.clone()));
        Ok(())
    }

    async fn create_ticket_record(&self, ticket: &Ticket) -> Result<(), PersistenceError> {
        self.check_available()?;
        let mut records = self.lock();
        records.tickets.insert(ticket.user_id.clone(), ticket.clone());
        records.history.push(PersistenceCommand::CreateTicket(ticket.clone()));
        Ok(())
    }

    async fn update_seat_record(&self, user_id: &str, seat: &str) -> Result<(), PersistenceError> {
        self.check_available()?;
        let mut records = self.lock();
        // Как и UPDATE в SQL: нет строки - нечего менять
        if let Some(ticket) = records.tickets.get_mut(user_id) {
            ticket.seat = seat.to_string();
        }
        records.history.push(PersistenceCommand::UpdateSeat {
            user_id: user_id.to_string(),
            seat: seat.to_string(),
        });
        Ok(())
    }

    async fn delete_ticket_record(&self, user_id: &str) -> Result<(), PersistenceError> {
        self.check_available()?;
        let mut records = self.lock();
        records.tickets.remove(user_id);
        records.history.push(PersistenceCommand::DeleteTicket {
            user_id: user_id.to_string(),
        });
        Ok(())
    }
}
