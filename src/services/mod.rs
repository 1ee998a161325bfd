pub mod persistence;
pub mod reservation;

pub use reservation::ReservationService;
