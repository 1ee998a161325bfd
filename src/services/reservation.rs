//! reservation.rs
//!
//! Façade between the transport and `ReservationStore`.
//!
//! Each call checks the request shape, runs the store operation and turns the
//! outcome into a protocol payload. The write-behind queue is passed to the
//! store as its journal, so record writes are queued under the store lock in
//! commit order. A failed record write never changes a response that has
//! already been computed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::models::{Ticket, User};
use crate::services::persistence::{PersistenceSnapshot, WriteBehind};
use crate::store::{ModifyOutcome, ReservationStore};

// --- Запросы ---

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    pub ticket: Option<TicketOrder>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketOrder {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub price_paid: f64,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModifySeatRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub new_seat: String,
}

// --- Ответы ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub success: bool,
    pub message: String,
}

impl Acknowledgement {
    fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }

    fn failed(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptResponse {
    pub ticket: Ticket,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionResponse {
    pub users: Vec<User>,
    pub seat_map: HashMap<String, String>,
}

#[derive(Clone)]
pub struct ReservationService {
    store: Arc<ReservationStore>,
    persistence: WriteBehind,
}

impl ReservationService {
    pub fn new(store: Arc<ReservationStore>, persistence: WriteBehind) -> Self {
        Self { store, persistence }
    }

    pub fn add_user(&self, user: User) -> Acknowledgement {
        let user_id = user.user_id.clone();
        self.store.register_user(user, &self.persistence);
        info!("User {} registered", user_id);
        Acknowledgement::ok("User added successfully")
    }

    pub fn purchase(&self, request: PurchaseRequest) -> Result<ReceiptResponse, ApiError> {
        let mut order = request.ticket.ok_or_else(missing_ticket_or_user)?;
        let passenger = order.user.take().ok_or_else(missing_ticket_or_user)?;

        let ticket = self.store.purchase_ticket(
            passenger,
            &order.from,
            &order.to,
            order.price_paid,
            &self.persistence,
        )?;

        info!(
            "Ticket {} -> {} purchased by {}, seat {}",
            ticket.from, ticket.to, ticket.user_id, ticket.seat
        );
        Ok(ReceiptResponse { ticket })
    }

    /// An absent or empty `section` lists every ticket.
    pub fn view_users_by_section(&self, section: Option<&str>) -> SectionResponse {
        let view = self.store.view_by_section(section.unwrap_or_default());
        SectionResponse {
            users: view.entries.into_iter().map(|entry| entry.user).collect(),
            seat_map: view.seat_map,
        }
    }

    pub fn remove_user(&self, user_id: &str) -> Acknowledgement {
        let had_ticket = self.store.remove_user(user_id, &self.persistence);
        info!("User {} removed (had ticket: {})", user_id, had_ticket);
        Acknowledgement::ok("User removed successfully")
    }

    pub fn modify_seat(&self, request: ModifySeatRequest) -> Result<Acknowledgement, ApiError> {
        let outcome =
            self.store
                .modify_seat(&request.user_id, &request.new_seat, &self.persistence)?;
        match outcome {
            ModifyOutcome::Updated { previous_seat } => {
                info!(
                    "Seat of {} changed {} -> {}",
                    request.user_id, previous_seat, request.new_seat
                );
                Ok(Acknowledgement::ok("Seat modified successfully"))
            }
            ModifyOutcome::NotFound { fallback_seat } => {
                warn!(
                    "No ticket for {}, writing legacy fallback seat {} to the record store",
                    request.user_id, fallback_seat
                );
                Ok(Acknowledgement::failed("User not found"))
            }
        }
    }

    pub fn get_receipt(&self, user_id: &str) -> Result<ReceiptResponse, ApiError> {
        let ticket = self.store.get_ticket(user_id)?;
        Ok(ReceiptResponse { ticket })
    }

    /// `(registered users, active tickets)`
    pub fn counts(&self) -> (usize, usize) {
        self.store.counts()
    }

    pub fn persistence_stats(&self) -> PersistenceSnapshot {
        self.persistence.stats()
    }

    pub async fn flush_persistence(&self) {
        self.persistence.flush().await;
    }
}

fn missing_ticket_or_user() -> ApiError {
    ApiError::InvalidInput("Ticket or User cannot be nil".to_string())
}
