use std::time::{Duration, Instant};

use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror the server's JSON shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentResponse {
    pub name: String,
    pub tickets: u64,
    pub proportion: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    pub angle_degrees: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WinnerResponse {
    pub winner: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Spin animation
// ---------------------------------------------------------------------------

pub const SPIN_DURATION: Duration = Duration::from_millis(4500);

const NO_ONE_LEFT: &str = "No more participants left!";

/// The pointer always travels at least this many full turns before landing.
const MIN_SPIN_TURNS: f64 = 2.0;

/// Pointer sweep from `from` to `to` degrees with a cubic ease-out.
#[derive(Debug, Clone)]
pub struct SpinAnimation {
    pub from: f64,
    pub to: f64,
    pub started: Instant,
    pub duration: Duration,
    pub winner: String,
}

impl SpinAnimation {
    pub fn progress(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        (elapsed / self.duration.as_secs_f64()).min(1.0)
    }

    pub fn pointer_at(&self, now: Instant) -> f64 {
        let t = self.progress(now);
        let eased = 1.0 - (1.0 - t).powi(3);
        self.from + (self.to - self.from) * eased
    }

    pub fn is_done(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }
}

/// Index of the segment under `angle` degrees. Zero-width segments are never
/// hit; float drift past the last end angle falls back to the last real segment.
pub fn segment_at_angle(segments: &[SegmentResponse], angle: f64) -> Option<usize> {
    let a = angle.rem_euclid(360.0);
    segments
        .iter()
        .position(|s| s.angle_degrees > 0.0 && a >= s.start_angle && a < s.end_angle)
        .or_else(|| segments.iter().rposition(|s| s.angle_degrees > 0.0))
}

/// Absolute pointer angle, at least MIN_SPIN_TURNS past `from`, that stops in
/// the middle of the first segment named `winner`.
pub fn landing_angle(segments: &[SegmentResponse], winner: &str, from: f64) -> Option<f64> {
    let seg = segments
        .iter()
        .find(|s| s.name == winner && s.angle_degrees > 0.0)?;
    let mid = seg.start_angle + seg.angle_degrees / 2.0;
    let base = from - from.rem_euclid(360.0);
    let mut to = base + MIN_SPIN_TURNS * 360.0 + mid;
    if to - from < MIN_SPIN_TURNS * 360.0 {
        to += 360.0;
    }
    Some(to)
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub segments: Vec<SegmentResponse>,
    /// Winners drawn this session, oldest first.
    pub winners: Vec<String>,
    /// Resting pointer angle in degrees, [0, 360).
    pub pointer: f64,
    pub spin: Option<SpinAnimation>,
    /// Last server-side error message (400/500 bodies).
    pub notice: Option<String>,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            segments: Vec::new(),
            winners: Vec::new(),
            pointer: 0.0,
            spin: None,
            notice: None,
            base_url,
        }
    }

    pub fn is_spinning(&self) -> bool {
        self.spin.is_some()
    }

    pub fn total_tickets(&self) -> u64 {
        self.segments.iter().map(|s| s.tickets).fold(0, u64::saturating_add)
    }

    pub fn pointer_now(&self, now: Instant) -> f64 {
        self.spin.as_ref().map_or(self.pointer, |s| s.pointer_at(now))
    }

    pub fn highlighted(&self, now: Instant) -> Option<usize> {
        segment_at_angle(&self.segments, self.pointer_now(now))
    }

    pub fn last_winner(&self) -> Option<&str> {
        self.winners.last().map(String::as_str)
    }

    pub fn clear_winners(&mut self) {
        self.winners.clear();
    }

    /// Past winners as repeated `exclude` parameters, so they drop off the wheel.
    pub fn exclude_query(&self) -> Vec<(&'static str, &str)> {
        self.winners.iter().map(|w| ("exclude", w.as_str())).collect()
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let url = format!("{}/api/fetch", self.base_url);
        let request = client.get(&url).query(&self.exclude_query());
        let resp = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        };
        self.status = ConnectionStatus::Connected;

        if resp.status().is_success() {
            match resp.json::<Vec<SegmentResponse>>().await {
                Ok(segments) => {
                    self.segments = segments;
                    self.notice = None;
                }
                Err(e) => self.status = ConnectionStatus::Error(format!("parse error: {e}")),
            }
        } else {
            self.segments.clear();
            self.notice = Some(error_message(resp).await);
        }
    }

    /// Ask the server for a winner, then animate the pointer onto it.
    pub async fn spin(&mut self, client: &reqwest::Client) {
        if self.is_spinning() {
            return;
        }
        if self.segments.is_empty() {
            self.notice = Some(if self.winners.is_empty() {
                "Nothing to spin: load the wheel with [r] first.".to_string()
            } else {
                NO_ONE_LEFT.to_string()
            });
            return;
        }

        let url = format!("{}/api/spin", self.base_url);
        let request = client.get(&url).query(&self.exclude_query());
        let resp = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        };
        if !resp.status().is_success() {
            self.notice = Some(error_message(resp).await);
            return;
        }
        let winner = match resp.json::<WinnerResponse>().await {
            Ok(w) => w.winner,
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("parse error: {e}"));
                return;
            }
        };

        // The sheet may have changed since the wheel was drawn.
        if landing_angle(&self.segments, &winner, self.pointer).is_none() {
            self.refresh(client).await;
        }
        self.start_spin(winner, Instant::now());
    }

    pub fn start_spin(&mut self, winner: String, now: Instant) {
        match landing_angle(&self.segments, &winner, self.pointer) {
            Some(to) => {
                self.notice = None;
                self.spin = Some(SpinAnimation {
                    from: self.pointer,
                    to,
                    started: now,
                    duration: SPIN_DURATION,
                    winner,
                });
            }
            None => self.winners.push(winner),
        }
    }

    /// Finish the spin once its animation has run out. Returns true when a
    /// winner was recorded, meaning the wheel should be reloaded without them.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(spin) = &self.spin else { return false };
        if !spin.is_done(now) {
            return false;
        }
        match self.spin.take() {
            Some(spin) => {
                self.pointer = spin.to.rem_euclid(360.0);
                self.winners.push(spin.winner);
                true
            }
            None => false,
        }
    }
}

async fn error_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.json::<ErrorResponse>().await {
        Ok(e) => e.error,
        Err(_) => format!("server returned {status}"),
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_share(proportion: f64) -> String {
    format!("{:.1}%", proportion * 100.0)
}

pub fn format_arc(s: &SegmentResponse) -> String {
    format!("{:>5.1}°–{:>5.1}°", s.start_angle, s.end_angle)
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
