mod app;

use std::io;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use app::{format_arc, format_share, truncate, AppState, ConnectionStatus};

/// Colours cycled across segments, like the slices of the web wheel.
const SEGMENT_COLORS: [Color; 6] = [
    Color::Red,
    Color::LightYellow,
    Color::Green,
    Color::Cyan,
    Color::Blue,
    Color::Magenta,
];

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:5000".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url);

    // Initial fetch before rendering
    app.refresh(&client).await;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, &client).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
) -> io::Result<()> {
    let mut table_state = TableState::default();

    loop {
        let now = Instant::now();
        if app.tick(now) {
            // Drop the new winner from the wheel.
            app.refresh(client).await;
        }
        table_state.select(app.highlighted(now));
        terminal.draw(|f| render(f, app, &mut table_state))?;

        // Redraw fast while the pointer is moving.
        let timeout = if app.is_spinning() {
            Duration::from_millis(30)
        } else {
            Duration::from_millis(250)
        };

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                    KeyCode::Char('s') | KeyCode::Char('S') | KeyCode::Char(' ') => {
                        app.spin(client).await;
                    }
                    KeyCode::Char('r') | KeyCode::Char('R') if !app.is_spinning() => {
                        app.refresh(client).await;
                    }
                    KeyCode::Char('c') | KeyCode::Char('C') if !app.is_spinning() => {
                        app.clear_winners();
                        app.refresh(client).await;
                    }
                    _ => {}
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, table_state: &mut TableState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);

    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(chunks[1]);
    render_wheel_table(f, app, table_state, halves[0]);
    render_winners(f, app, halves[1]);

    render_footer(f, app, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };

    let mut spans = vec![
        Span::styled(
            " Spin Wheel  ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(
            format!("{} participants", app.segments.len()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!("{} tickets", app.total_tickets()),
            Style::default().fg(Color::White),
        ),
    ];

    if app.is_spinning() {
        spans.push(Span::raw("  │  "));
        spans.push(Span::styled("spinning…", Style::default().fg(Color::Yellow)));
    } else if let Some(winner) = app.last_winner() {
        spans.push(Span::raw("  │  "));
        spans.push(Span::styled(
            format!("🎉 {}", truncate(winner, 30)),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

fn render_wheel_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let header_cells = ["", "Name", "Tickets", "Share", "Arc"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .segments
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let color = if s.tickets == 0 {
                Color::DarkGray
            } else {
                SEGMENT_COLORS[i % SEGMENT_COLORS.len()]
            };
            let won = app.winners.iter().any(|w| *w == s.name);

            Row::new(vec![
                Cell::from("■").style(Style::default().fg(color)),
                Cell::from(truncate(&s.name, 28)).style(if won {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                }),
                Cell::from(s.tickets.to_string()).style(Style::default().fg(Color::Cyan)),
                Cell::from(format_share(s.proportion)),
                Cell::from(format_arc(s)).style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(1),
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Length(15),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " WHEEL ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    )
    .highlight_symbol("▶ ")
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    f.render_stateful_widget(table, area, state);
}

fn render_winners(f: &mut Frame, app: &AppState, area: Rect) {
    let lines: Vec<Line> = app
        .winners
        .iter()
        .enumerate()
        .map(|(i, w)| {
            Line::from(vec![
                Span::styled(format!("{:>3}. ", i + 1), Style::default().fg(Color::DarkGray)),
                Span::raw(truncate(w, 30)),
            ])
        })
        .collect();

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " WINNERS ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    );
    f.render_widget(paragraph, area);
}

fn render_footer(f: &mut Frame, app: &AppState, area: Rect) {
    let mut spans = vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[s] ", Style::default().fg(Color::Yellow)),
        Span::raw("spin  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("reload wheel  "),
        Span::styled("[c] ", Style::default().fg(Color::Yellow)),
        Span::raw("clear winners  "),
    ];
    if let Some(notice) = &app.notice {
        spans.push(Span::styled(notice.clone(), Style::default().fg(Color::Red)));
    } else {
        spans.push(Span::styled(app.base_url.clone(), Style::default().fg(Color::DarkGray)));
    }
    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
