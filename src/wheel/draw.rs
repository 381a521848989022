use rand::Rng;

use crate::error::WheelError;
use crate::types::Participant;

/// Sum of tickets over the whole roster. Widened so no realistic sheet can overflow it.
pub fn total_tickets(roster: &[Participant]) -> u128 {
    roster.iter().map(|p| u128::from(p.tickets)).sum()
}

/// Owner of the `k`-th ticket when every participant's tickets are laid out
/// back to back in roster order. Same answer as indexing an expanded
/// one-entry-per-ticket pool, without building it.
pub fn ticket_owner(roster: &[Participant], k: u128) -> Option<&Participant> {
    let mut upper = 0u128;
    for p in roster {
        upper += u128::from(p.tickets);
        if k < upper {
            return Some(p);
        }
    }
    None
}

/// Draw a winner with probability proportional to ticket count.
pub fn select_winner<'a, R: Rng + ?Sized>(
    roster: &'a [Participant],
    rng: &mut R,
) -> Result<&'a str, WheelError> {
    if roster.is_empty() {
        return Err(WheelError::NoRoster);
    }
    let total = total_tickets(roster);
    if total == 0 {
        return Err(WheelError::NoTickets);
    }

    let k = rng.random_range(0..total);
    // k < total, so some participant always owns it.
    ticket_owner(roster, k)
        .map(|p| p.name.as_str())
        .ok_or(WheelError::NoTickets)
}
