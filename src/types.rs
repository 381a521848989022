use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// One sheet row. `name` is never blank; duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub tickets: u64,
}

impl Participant {
    pub fn new(name: impl Into<String>, tickets: u64) -> Self {
        Self {
            name: name.into(),
            tickets,
        }
    }
}

/// Participants in sheet row order. Order decides where segments sit on the
/// wheel, never who wins.
pub type Roster = Vec<Participant>;

// ---------------------------------------------------------------------------
// Derived per request
// ---------------------------------------------------------------------------

/// A wheel arc sized by ticket share. Angles are in degrees and unrounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub tickets: u64,
    pub proportion: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    pub angle_degrees: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerResult {
    pub winner: String,
}
