use serde::{Deserialize, Serialize};
use validator::Validate;

pub const SEAT_A: &str = "A";
pub const SEAT_B: &str = "B";

/// Active reservation of a single user, also returned as the receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Ticket {
    #[validate(length(min = 7, message = "User ID is too short"))]
    pub user_id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub seat: String,
    #[validate(range(min = 0.0, message = "Price paid cannot be negative"))]
    #[serde(default)]
    pub price_paid: f64,
}

impl Ticket {
    pub fn new(
        user_id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        price_paid: f64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            from: from.into(),
            to: to.into(),
            seat: String::new(),
            price_paid,
        }
    }
}

/// Section token derived from the first and last characters of a user id,
/// e.g. `"alice-42"` -> `"Sectiona-2"`. Computed on purchase but never used
/// as the seat.
pub fn section_token(user_id: &str) -> Option<String> {
    let first = user_id.chars().next()?;
    let last = user_id.chars().next_back()?;
    Some(format!("Section{}-{}", first, last))
}
