use crate::error::WheelError;
use crate::types::{Participant, Segment};
use crate::wheel::draw::total_tickets;

/// Lay participants out around the wheel in roster order.
///
/// Every participant gets a segment, zero-ticket rows included (with a zero
/// width). The running start angle is accumulated without rounding, so the
/// last `end_angle` can miss 360 by a few ulps. Clients render from these
/// exact values.
pub fn compute_segments(roster: &[Participant]) -> Result<Vec<Segment>, WheelError> {
    if roster.is_empty() {
        return Err(WheelError::NoRoster);
    }
    let total = total_tickets(roster);
    if total == 0 {
        return Err(WheelError::NoTickets);
    }
    let total = total as f64;

    let mut start_angle = 0.0_f64;
    let segments = roster
        .iter()
        .map(|p| {
            let proportion = p.tickets as f64 / total;
            let angle_degrees = proportion * 360.0;
            let segment = Segment {
                name: p.name.clone(),
                tickets: p.tickets,
                proportion,
                start_angle,
                end_angle: start_angle + angle_degrees,
                angle_degrees,
            };
            start_angle += angle_degrees;
            segment
        })
        .collect();

    Ok(segments)
}
