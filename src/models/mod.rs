pub mod user;
pub mod ticket;

pub use user::User;
pub use ticket::{section_token, Ticket, SEAT_A, SEAT_B};
