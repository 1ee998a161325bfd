use async_trait::async_trait;
use tracing::debug;

use super::{PersistenceError, RecordStore};
use crate::database::Database;
use crate::models::{Ticket, User};

/// PostgreSQL record store. Rows are keyed by `user_id` and upserted, so the
/// tables track the same last-write-wins state as the in-memory store.
#[derive(Clone)]
pub struct PgRecordStore {
    db: Database,
}

impl PgRecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn create_user_record(&self, user: &User) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, first_name, last_name, email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                email = EXCLUDED.email,
                updated_at = NOW()
            "#
        )
        .bind(&user.user_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    async fn create_ticket_record(&self, ticket: &Ticket) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO tickets (user_id, from_station, to_station, seat, price_paid)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE
            SET from_station = EXCLUDED.from_station,
                to_station = EXCLUDED.to_station,
                seat = EXCLUDED.seat,
                price_paid = EXCLUDED.price_paid,
                updated_at = NOW()
            "#
        )
        .bind(&ticket.user_id)
        .bind(&ticket.from)
        .bind(&ticket.to)
        .bind(&ticket.seat)
        .bind(ticket.price_paid)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    async fn update_seat_record(&self, user_id: &str, seat: &str) -> Result<(), PersistenceError> {
        let result = sqlx::query(
            "UPDATE tickets SET seat = $2, updated_at = NOW() WHERE user_id = $1"
        )
        .bind(user_id)
        .bind(seat)
        .execute(&self.db.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!("Seat update for {} matched no ticket row", user_id);
        }
        Ok(())
    }

    async fn delete_ticket_record(&self, user_id: &str) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM tickets WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }
}
