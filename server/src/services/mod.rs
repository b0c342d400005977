pub mod pricing;
pub mod reservation;
pub mod settlement;
pub mod sweeper;
pub mod tickets;

pub use reservation::{ReservationReceipt, ReservationRequest, ReservationService, ReservationSettings};
pub use settlement::{SettlementHandler, SettlementOutcome};
pub use sweeper::ExpirySweeper;
pub use tickets::TicketIssuer;
