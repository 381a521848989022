//! Ticket-weighted wheel: segment layout and winner draws.

pub mod draw;
pub mod segments;

pub use draw::{select_winner, total_tickets};
pub use segments::compute_segments;
