//! store.rs
//!
//! In-memory authoritative state of the reservation service.
//!
//! All users, tickets and the purchase counter live behind one mutex. Every
//! operation takes the lock for its whole duration, so requests are fully
//! serialized and no update can be lost. Nothing here awaits or performs I/O.
//! Each mutation appends its record write to a `Journal` before the lock is
//! released, so the journal sees writes in commit order.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::debug;
use validator::Validate;

use crate::models::{section_token, Ticket, User, SEAT_A, SEAT_B};
use crate::services::persistence::{Journal, PersistenceCommand};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
}

/// A ticket together with the passenger it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct SeatedUser {
    pub user: User,
    pub ticket: Ticket,
}

/// Result of `view_by_section`: the matched tickets and a `user_id -> seat`
/// map covering exactly the same set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionView {
    pub entries: Vec<SeatedUser>,
    pub seat_map: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifyOutcome {
    Updated { previous_seat: String },
    /// No ticket for the user. `fallback_seat` is the legacy A/B toggle that
    /// is still written to the record store for compatibility.
    NotFound { fallback_seat: &'static str },
}

#[derive(Debug)]
struct Reservation {
    ticket: Ticket,
    // Профиль, присланный вместе с покупкой
    passenger: User,
}

#[derive(Debug)]
struct StoreState {
    users: HashMap<String, User>,
    tickets: HashMap<String, Reservation>,
    purchase_counter: u64,
}

#[derive(Debug)]
pub struct ReservationStore {
    state: Mutex<StoreState>,
}

impl Default for ReservationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReservationStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                users: HashMap::new(),
                tickets: HashMap::new(),
                purchase_counter: 1,
            }),
        }
    }

    // Every mutation is a single map operation, so a panic elsewhere cannot
    // leave the maps half-updated and a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores or overwrites the user keyed by `user_id`.
    pub fn register_user(&self, user: User, journal: &impl Journal) {
        let mut state = self.lock();
        state.users.insert(user.user_id.clone(), user.clone());
        journal.append(PersistenceCommand::CreateUser(user));
    }

    /// Assigns a seat and stores the ticket, replacing any earlier ticket of
    /// the same user.
    ///
    /// The seat comes from a counter shared by all purchases: it starts at 1
    /// and is incremented before every assignment, even values give `"A"`,
    /// odd values give `"B"`. Rejected purchases leave the counter untouched.
    pub fn purchase_ticket(
        &self,
        passenger: User,
        from: &str,
        to: &str,
        price_paid: f64,
        journal: &impl Journal,
    ) -> Result<Ticket, StoreError> {
        let mut ticket = Ticket::new(passenger.user_id.clone(), from, to, price_paid);
        ticket
            .validate()
            .map_err(|e| StoreError::InvalidInput(describe_validation(&e)))?;

        if let Some(token) = section_token(&ticket.user_id) {
            debug!("Derived section token {} for {}", token, ticket.user_id);
        }

        let mut state = self.lock();
        state.purchase_counter += 1;
        ticket.seat = if state.purchase_counter % 2 == 0 {
            SEAT_A.to_string()
        } else {
            SEAT_B.to_string()
        };

        state.tickets.insert(
            ticket.user_id.clone(),
            Reservation {
                ticket: ticket.clone(),
                passenger,
            },
        );
        journal.append(PersistenceCommand::CreateTicket(ticket.clone()));
        Ok(ticket)
    }

    /// Tickets whose seat equals `section`; every ticket when `section` is empty.
    pub fn view_by_section(&self, section: &str) -> SectionView {
        let state = self.lock();
        let mut view = SectionView::default();

        for (user_id, reservation) in &state.tickets {
            if !section.is_empty() && reservation.ticket.seat != section {
                continue;
            }
            let user = state
                .users
                .get(user_id)
                .cloned()
                .unwrap_or_else(|| reservation.passenger.clone());

            view.seat_map
                .insert(user_id.clone(), reservation.ticket.seat.clone());
            view.entries.push(SeatedUser {
                user,
                ticket: reservation.ticket.clone(),
            });
        }
        view
    }

    /// Deletes the user and their ticket. Returns whether a ticket existed;
    /// removal itself always succeeds.
    pub fn remove_user(&self, user_id: &str, journal: &impl Journal) -> bool {
        let mut state = self.lock();
        state.users.remove(user_id);
        let had_ticket = state.tickets.remove(user_id).is_some();
        journal.append(PersistenceCommand::DeleteTicket {
            user_id: user_id.to_string(),
        });
        had_ticket
    }

    /// Overwrites the seat of an existing ticket. Without a ticket the state
    /// is left alone, but the legacy fallback seat is still journaled.
    pub fn modify_seat(
        &self,
        user_id: &str,
        new_seat: &str,
        journal: &impl Journal,
    ) -> Result<ModifyOutcome, StoreError> {
        if new_seat.is_empty() {
            return Err(StoreError::InvalidInput("New seat cannot be empty".to_string()));
        }

        let mut state = self.lock();
        let (outcome, seat) = match state.tickets.get_mut(user_id) {
            Some(reservation) => {
                let previous_seat =
                    std::mem::replace(&mut reservation.ticket.seat, new_seat.to_string());
                (ModifyOutcome::Updated { previous_seat }, new_seat)
            }
            None => {
                let fallback_seat = legacy_fallback_seat(new_seat);
                (ModifyOutcome::NotFound { fallback_seat }, fallback_seat)
            }
        };
        journal.append(PersistenceCommand::UpdateSeat {
            user_id: user_id.to_string(),
            seat: seat.to_string(),
        });
        Ok(outcome)
    }

    pub fn get_ticket(&self, user_id: &str) -> Result<Ticket, StoreError> {
        let state = self.lock();
        state
            .tickets
            .get(user_id)
            .map(|r| r.ticket.clone())
            .ok_or_else(|| StoreError::NotFound("User has not purchased a ticket".to_string()))
    }

    /// `(registered users, active tickets)`
    pub fn counts(&self) -> (usize, usize) {
        let state = self.lock();
        (state.users.len(), state.tickets.len())
    }
}

// TODO: confirm with product whether the A/B toggle on a missing ticket should
// be dropped altogether; it ignores the requested seat.
fn legacy_fallback_seat(requested: &str) -> &'static str {
    if requested == SEAT_A {
        SEAT_B
    } else {
        SEAT_A
    }
}

fn describe_validation(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("{} is invalid", field),
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordedJournal(Mutex<Vec<PersistenceCommand>>);

    impl Journal for RecordedJournal {
        fn append(&self, command: PersistenceCommand) {
            self.0.lock().unwrap().push(command);
        }
    }

    impl RecordedJournal {
        fn commands(&self) -> Vec<PersistenceCommand> {
            self.0.lock().unwrap().clone()
        }
    }

    fn buy(store: &ReservationStore, user_id: &str) -> Result<Ticket, StoreError> {
        store.purchase_ticket(
            User::with_id(user_id),
            "London",
            "Paris",
            20.0,
            &RecordedJournal::default(),
        )
    }

    // Applies journaled writes the way a record store would
    fn replay(commands: &[PersistenceCommand]) -> HashMap<String, Ticket> {
        let mut tickets = HashMap::new();
        for command in commands {
            match command {
                PersistenceCommand::CreateUser(_) => {}
                PersistenceCommand::CreateTicket(ticket) => {
                    tickets.insert(ticket.user_id.clone(), ticket.clone());
                }
                PersistenceCommand::UpdateSeat { user_id, seat } => {
                    if let Some(ticket) = tickets.get_mut(user_id) {
                        ticket.seat = seat.clone();
                    }
                }
                PersistenceCommand::DeleteTicket { user_id } => {
                    tickets.remove(user_id);
                }
            }
        }
        tickets
    }

    #[test]
    fn register_user_overwrites_by_id() {
        let store = ReservationStore::new();
        let journal = RecordedJournal::default();
        store.register_user(
            User {
                user_id: "password1".into(),
                first_name: "Ann".into(),
                last_name: "Lee".into(),
                email: "ann@example.com".into(),
            },
            &journal,
        );
        store.register_user(
            User {
                user_id: "password1".into(),
                first_name: "Bob".into(),
                last_name: "Ray".into(),
                email: "bob@example.com".into(),
            },
            &journal,
        );

        assert_eq!(store.counts(), (1, 0));
        assert_eq!(journal.commands().len(), 2);
        buy(&store, "password1").unwrap();
        let view = store.view_by_section("");
        assert_eq!(view.entries[0].user.first_name, "Bob");
    }

    #[test]
    fn seats_alternate_across_users() {
        let store = ReservationStore::new();
        let seats: Vec<String> = ["user-one", "user-two", "user-three", "user-four"]
            .iter()
            .map(|id| buy(&store, id).unwrap().seat)
            .collect();
        assert_eq!(seats, vec!["A", "B", "A", "B"]);
    }

    #[test]
    fn rejected_purchase_does_not_advance_sequence() {
        let store = ReservationStore::new();
        assert_eq!(buy(&store, "first-user").unwrap().seat, "A");
        assert!(buy(&store, "short").is_err());
        assert_eq!(buy(&store, "second-user").unwrap().seat, "B");
    }

    #[test]
    fn purchase_journals_issued_ticket() {
        let store = ReservationStore::new();
        let journal = RecordedJournal::default();
        let ticket = store
            .purchase_ticket(User::with_id("traveller"), "Berlin", "Prague", 35.5, &journal)
            .unwrap();

        assert_eq!(ticket.user_id, "traveller");
        assert_eq!(journal.commands(), vec![PersistenceCommand::CreateTicket(ticket)]);
    }

    #[test]
    fn repurchase_replaces_ticket() {
        let store = ReservationStore::new();
        buy(&store, "traveller").unwrap();
        let second = store
            .purchase_ticket(
                User::with_id("traveller"),
                "Berlin",
                "Prague",
                35.5,
                &RecordedJournal::default(),
            )
            .unwrap();

        assert_eq!(store.counts().1, 1);
        let stored = store.get_ticket("traveller").unwrap();
        assert_eq!(stored, second);
        assert_eq!(stored.from, "Berlin");
        assert_eq!(stored.seat, "B");
    }

    #[test]
    fn negative_price_is_invalid_input() {
        let store = ReservationStore::new();
        let journal = RecordedJournal::default();
        let err = store
            .purchase_ticket(User::with_id("traveller"), "A", "B", -5.0, &journal)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
        assert!(journal.commands().is_empty());
    }

    #[test]
    fn view_by_section_filters_on_seat() {
        let store = ReservationStore::new();
        for id in ["user-one", "user-two", "user-three"] {
            buy(&store, id).unwrap();
        }

        let all = store.view_by_section("");
        assert_eq!(all.entries.len(), 3);
        assert_eq!(all.seat_map.len(), 3);

        let a = store.view_by_section("A");
        assert_eq!(a.entries.len(), 2);
        assert!(a.entries.iter().all(|e| e.ticket.seat == "A"));
        for entry in &a.entries {
            assert_eq!(a.seat_map.get(&entry.user.user_id), Some(&entry.ticket.seat));
        }
        assert_eq!(a.seat_map.len(), a.entries.len());

        assert!(store.view_by_section("C").entries.is_empty());
    }

    #[test]
    fn view_prefers_registered_profile() {
        let store = ReservationStore::new();
        store.register_user(
            User {
                user_id: "registered".into(),
                first_name: "Jane".into(),
                last_name: "Doe".into(),
                email: "jane@example.com".into(),
            },
            &RecordedJournal::default(),
        );
        buy(&store, "registered").unwrap();
        buy(&store, "walk-in-user").unwrap();

        let view = store.view_by_section("");
        let by_id: HashMap<_, _> = view
            .entries
            .iter()
            .map(|e| (e.user.user_id.as_str(), e.user.clone()))
            .collect();
        assert_eq!(by_id["registered"].first_name, "Jane");
        assert_eq!(by_id["walk-in-user"], User::with_id("walk-in-user"));
    }

    #[test]
    fn remove_user_is_idempotent() {
        let store = ReservationStore::new();
        let journal = RecordedJournal::default();
        store.register_user(User::with_id("leaving-user"), &journal);
        buy(&store, "leaving-user").unwrap();

        assert!(store.remove_user("leaving-user", &journal));
        assert!(matches!(
            store.get_ticket("leaving-user"),
            Err(StoreError::NotFound(_))
        ));
        assert!(!store.remove_user("leaving-user", &journal));
        assert_eq!(store.counts(), (0, 0));
        assert_eq!(journal.commands().len(), 3);
    }

    #[test]
    fn modify_seat_changes_only_target() {
        let store = ReservationStore::new();
        let journal = RecordedJournal::default();
        buy(&store, "user-one").unwrap();
        buy(&store, "user-two").unwrap();

        let outcome = store.modify_seat("user-one", "X", &journal).unwrap();
        assert_eq!(
            outcome,
            ModifyOutcome::Updated {
                previous_seat: "A".to_string()
            }
        );
        assert_eq!(store.get_ticket("user-one").unwrap().seat, "X");
        assert_eq!(store.get_ticket("user-two").unwrap().seat, "B");
        assert_eq!(
            journal.commands(),
            vec![PersistenceCommand::UpdateSeat {
                user_id: "user-one".into(),
                seat: "X".into(),
            }]
        );
    }

    #[test]
    fn modify_seat_on_missing_user_leaves_state() {
        let store = ReservationStore::new();
        let journal = RecordedJournal::default();
        buy(&store, "user-one").unwrap();

        assert_eq!(
            store.modify_seat("nobody-here", "A", &journal).unwrap(),
            ModifyOutcome::NotFound { fallback_seat: "B" }
        );
        assert_eq!(
            store.modify_seat("nobody-here", "Z", &journal).unwrap(),
            ModifyOutcome::NotFound { fallback_seat: "A" }
        );
        assert_eq!(store.counts(), (0, 1));
        assert_eq!(store.get_ticket("user-one").unwrap().seat, "A");

        let seats: Vec<_> = journal
            .commands()
            .into_iter()
            .map(|c| match c {
                PersistenceCommand::UpdateSeat { seat, .. } => seat,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(seats, vec!["B", "A"]);
    }

    #[test]
    fn modify_seat_rejects_empty_seat() {
        let store = ReservationStore::new();
        let journal = RecordedJournal::default();
        buy(&store, "user-one").unwrap();
        assert!(matches!(
            store.modify_seat("user-one", "", &journal),
            Err(StoreError::InvalidInput(_))
        ));
        assert_eq!(store.get_ticket("user-one").unwrap().seat, "A");
        assert!(journal.commands().is_empty());
    }

    #[test]
    fn concurrent_purchases_are_not_lost() {
        let store = Arc::new(ReservationStore::new());
        let handles: Vec<_> = (0..64)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || buy(&store, &format!("passenger-{:03}", i)).unwrap())
            })
            .collect();

        let tickets: Vec<Ticket> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(store.counts().1, 64);

        // Serialized counter: exactly half the purchases land on each seat
        let a = tickets.iter().filter(|t| t.seat == "A").count();
        assert_eq!(a, 32);
    }

    #[test]
    fn journal_order_matches_commit_order_under_contention() {
        let store = Arc::new(ReservationStore::new());
        let journal = Arc::new(RecordedJournal::default());
        let user_id = "contested-user";

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = store.clone();
                let journal = journal.clone();
                std::thread::spawn(move || {
                    for round in 0..250 {
                        match (worker + round) % 3 {
                            0 => {
                                store
                                    .purchase_ticket(
                                        User::with_id(user_id),
                                        "Rome",
                                        "Milan",
                                        9.0,
                                        journal.as_ref(),
                                    )
                                    .unwrap();
                            }
                            1 => {
                                let seat = format!("W{}-{}", worker, round);
                                store.modify_seat(user_id, &seat, journal.as_ref()).unwrap();
                            }
                            _ => {
                                if round % 10 == 0 {
                                    store.remove_user(user_id, journal.as_ref());
                                } else {
                                    store.modify_seat(user_id, "A", journal.as_ref()).unwrap();
                                }
                            }
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let replayed = replay(&journal.commands());
        assert_eq!(replayed.get(user_id).cloned(), store.get_ticket(user_id).ok());
    }

    proptest! {
        #[test]
        fn short_user_ids_always_rejected(user_id in "\\PC{0,6}") {
            let store = ReservationStore::new();
            let result = buy(&store, &user_id);
            prop_assert!(matches!(result, Err(StoreError::InvalidInput(_))));
            prop_assert_eq!(store.counts().1, 0);
        }

        #[test]
        fn valid_purchase_keeps_one_ticket(user_id in "[a-z0-9]{7,20}", times in 1usize..5) {
            let store = ReservationStore::new();
            for _ in 0..times {
                let t = buy(&store, &user_id).unwrap();
                prop_assert_eq!(&t.user_id, &user_id);
            }
            prop_assert_eq!(store.counts().1, 1);
        }
    }
}
