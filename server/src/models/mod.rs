pub mod event;
pub mod order;
pub mod ticket;
pub mod user;

pub use event::{Event, EventStatus, PlatformFeeType};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, PaymentStatus};
pub use ticket::{NewTicket, Ticket, TicketCategory, TicketStatus};
pub use user::Attendee;
