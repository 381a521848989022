//! Participant data source: the upstream sheet behind a one-call trait.

pub mod auth;
pub mod google;

use std::future::Future;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::{NAME_COLUMN, TICKETS_COLUMN};
use crate::error::FetchError;
use crate::types::{Participant, Roster};
use crate::wheel::total_tickets;

pub use google::GoogleSheetSource;

/// Anything that can produce the current roster. Called once per request;
/// implementations must not cache the roster between calls.
pub trait ParticipantSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<Roster, FetchError>> + Send;
}

/// Fetch once and log what came back, one line per participant.
pub async fn check_roster<S: ParticipantSource>(source: &S) -> Result<Roster, FetchError> {
    let roster = source.fetch().await?;
    for p in &roster {
        info!(name = %p.name, tickets = p.tickets, "Participant");
    }
    info!(
        participants = roster.len(),
        total_tickets = %total_tickets(&roster),
        "Roster check complete"
    );
    Ok(roster)
}

/// Turn raw worksheet rows into a roster. Row 0 is the header; extra columns
/// are ignored and short rows read as empty cells. Rows with a blank Name are
/// skipped.
pub fn roster_from_rows(rows: &[Vec<Value>]) -> Result<Roster, FetchError> {
    let Some((header, records)) = rows.split_first() else {
        return Ok(Vec::new());
    };

    let name_idx = column_index(header, NAME_COLUMN)?;
    let tickets_idx = column_index(header, TICKETS_COLUMN)?;

    let mut roster = Vec::with_capacity(records.len());
    for (i, row) in records.iter().enumerate() {
        let name = cell_to_string(row.get(name_idx));
        if name.is_empty() {
            // +2: one for the header, one for 1-based sheet rows
            warn!(row = i + 2, "Skipping row with blank {NAME_COLUMN}");
            continue;
        }
        roster.push(Participant::new(name, coerce_tickets(row.get(tickets_idx))));
    }
    Ok(roster)
}

fn column_index(header: &[Value], column: &'static str) -> Result<usize, FetchError> {
    header
        .iter()
        .position(|h| h.as_str().map(str::trim) == Some(column))
        .ok_or(FetchError::MissingColumn(column))
}

fn cell_to_string(cell: Option<&Value>) -> String {
    match cell {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Coerce a Tickets cell to a count. Whole numbers pass through, fractions
/// truncate toward zero, and anything non-numeric, negative or non-finite is 0.
pub fn coerce_tickets(cell: Option<&Value>) -> u64 {
    match cell {
        Some(Value::Number(n)) => n
            .as_u64()
            .unwrap_or_else(|| n.as_f64().map_or(0, float_to_tickets)),
        Some(Value::String(s)) => s.trim().parse::<f64>().map_or(0, float_to_tickets),
        _ => 0,
    }
}

fn float_to_tickets(f: f64) -> u64 {
    if !f.is_finite() || f <= 0.0 {
        return 0;
    }
    // `as` saturates at u64::MAX
    f.trunc() as u64
}

/// Pass 2xx responses through; turn anything else into `FetchError::Upstream`.
pub(crate) async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(FetchError::Upstream {
        status: status.as_u16(),
        body,
    })
}
