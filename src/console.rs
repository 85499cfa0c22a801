//! # Waveform console
//!
//! Shows the stimulus and probe traces of a finished run, either as a plain
//! text table ([`render_waveforms`]) or in an interactive full-screen viewer
//! ([`WaveformViewer`]).
//!
//! ## Viewer keys
//! - `←`/`→` scroll the time window, `Home`/`End` jump to either end
//! - `h` toggles the help screen
//! - `q` or `Esc` quits

use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;

use crate::circuit::{CircuitResults, Trace};
use crate::config::NodeKind;

/// Viewer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub refresh_rate_ms: u64,
    /// Ticks moved per arrow key press.
    pub scroll_step: usize,
    pub high_glyph: char,
    pub low_glyph: char,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            refresh_rate_ms: 100,
            scroll_step: 8,
            high_glyph: '▀',
            low_glyph: '▁',
        }
    }
}

/// Last digit of every tick number, starting at tick 1.
fn ruler(sim_length: u32) -> String {
    (1..=sim_length)
        .map(|tick| char::from(b'0' + (tick % 10) as u8))
        .collect()
}

/// Renders every trace as `name │ bits`, preceded by a tick ruler and
/// followed by one line per faulted node.
pub fn render_waveforms(results: &CircuitResults) -> String {
    let width = results
        .traces
        .iter()
        .map(|t| t.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("tick".len());

    let mut lines = vec![format!(
        "{:<width$} │ {}",
        "tick",
        ruler(results.sim_length),
        width = width
    )];
    for trace in &results.traces {
        lines.push(format!("{:<width$} │ {}", trace.name, trace.bits, width = width));
    }
    for node in results.report.faults() {
        if let Some(fault) = &node.fault {
            lines.push(format!("fault: {} after {} ticks: {}", node.name, node.ticks, fault));
        }
    }
    lines.join("\n")
}

/// The part of `bits` visible in a window starting at `offset`.
fn visible_window(bits: &str, offset: usize, width: usize) -> &str {
    let start = offset.min(bits.len());
    let end = start.saturating_add(width).min(bits.len());
    &bits[start..end]
}

/// Interactive viewer over the traces of one run.
pub struct WaveformViewer {
    results: CircuitResults,
    title: String,
    config: ConsoleConfig,
    offset: usize,
    running: bool,
    show_help: bool,
}

impl WaveformViewer {
    pub fn new(title: impl Into<String>, results: CircuitResults, config: ConsoleConfig) -> Self {
        Self {
            results,
            title: title.into(),
            config,
            offset: 0,
            running: false,
            show_help: false,
        }
    }

    /// First tick shown, 0-based.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn max_offset(&self) -> usize {
        (self.results.sim_length as usize).saturating_sub(1)
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        enable_raw_mode().map_err(|e| format!("Failed to enable raw mode: {}", e))?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(format!("Failed to enter alternate screen: {}", e).into());
        }

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = match Terminal::new(backend) {
            Ok(terminal) => terminal,
            Err(e) => {
                let _ = disable_raw_mode();
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                return Err(e.into());
            }
        };

        let outcome = self.event_loop(&mut terminal, next_key);

        // The terminal is restored whether or not the loop failed.
        let restored = restore_terminal(&mut terminal);
        outcome?;
        restored?;
        Ok(())
    }

    /// Draws and handles keys until the user quits. `next_key` waits up to the
    /// refresh interval for a key press.
    fn event_loop<B, F>(&mut self, terminal: &mut Terminal<B>, mut next_key: F) -> io::Result<()>
    where
        B: Backend,
        F: FnMut(Duration) -> io::Result<Option<KeyCode>>,
    {
        self.running = true;
        let refresh = Duration::from_millis(self.config.refresh_rate_ms);
        let outcome = loop {
            if !self.running {
                break Ok(());
            }
            if let Err(e) = terminal.draw(|f| self.draw_ui(f)) {
                break Err(e);
            }
            match next_key(refresh) {
                Ok(Some(key)) => self.handle_key_event(key),
                Ok(None) => {}
                Err(e) => break Err(e),
            }
        };
        self.running = false;
        outcome
    }

    fn handle_key_event(&mut self, key: KeyCode) {
        if self.show_help {
            self.show_help = false;
            return;
        }
        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('h') | KeyCode::Char('H') => self.show_help = true,
            KeyCode::Left => self.offset = self.offset.saturating_sub(self.config.scroll_step),
            KeyCode::Right => {
                self.offset = (self.offset + self.config.scroll_step).min(self.max_offset())
            }
            KeyCode::Home => self.offset = 0,
            KeyCode::End => self.offset = self.max_offset(),
            _ => {}
        }
    }

    fn draw_ui(&self, f: &mut Frame) {
        let size = f.size();

        if self.show_help {
            self.draw_help_screen(f);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4), // Title bar
                Constraint::Min(4),    // Traces
                Constraint::Length(3), // Run summary
            ])
            .split(size);

        let title_text = vec![
            Line::from(vec![Span::styled(
                self.title.clone(),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )]),
            Line::from(vec![
                Span::raw("Keys: "),
                Span::styled("←/→", Style::default().fg(Color::Yellow)),
                Span::raw("=scroll, "),
                Span::styled("Home/End", Style::default().fg(Color::Yellow)),
                Span::raw("=jump, "),
                Span::styled("h", Style::default().fg(Color::Yellow)),
                Span::raw("=help, "),
                Span::styled("q", Style::default().fg(Color::Yellow)),
                Span::raw("=quit"),
            ]),
        ];
        let title = Paragraph::new(title_text)
            .block(Block::default().borders(Borders::ALL).title("Waveforms"))
            .wrap(Wrap { trim: true });
        f.render_widget(title, chunks[0]);

        self.draw_traces(f, chunks[1]);

        let report = &self.results.report;
        let summary = Line::from(format!(
            "Ticks {}-{} of {} | nodes: {} | faults: {}",
            self.offset + 1,
            (self.offset + chunks[1].width as usize).min(self.results.sim_length as usize),
            self.results.sim_length,
            report.nodes.len(),
            report.faults().count()
        ));
        let summary = Paragraph::new(summary)
            .block(Block::default().borders(Borders::ALL).title("Run"));
        f.render_widget(summary, chunks[2]);
    }

    fn trace_line(&self, trace: &Trace, name_width: usize, width: usize) -> Line<'static> {
        let color = match trace.kind {
            NodeKind::Stimulus => Color::Yellow,
            _ => Color::Green,
        };
        let wave: String = visible_window(&trace.bits, self.offset, width)
            .chars()
            .map(|bit| {
                if bit == '1' {
                    self.config.high_glyph
                } else {
                    self.config.low_glyph
                }
            })
            .collect();
        Line::from(vec![
            Span::styled(
                format!("{:<width$} ", trace.name, width = name_width),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(wave, Style::default().fg(color)),
        ])
    }

    fn draw_traces(&self, f: &mut Frame, area: Rect) {
        let name_width = self
            .results
            .traces
            .iter()
            .map(|t| t.name.chars().count())
            .max()
            .unwrap_or(0);
        let width = (area.width as usize).saturating_sub(name_width + 3);
        let lines: Vec<Line> = self
            .results
            .traces
            .iter()
            .map(|trace| self.trace_line(trace, name_width, width))
            .collect();

        let traces = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Traces"));
        f.render_widget(traces, area);
    }

    fn draw_help_screen(&self, f: &mut Frame) {
        let size = f.size();
        let key = |k: &'static str, what: &'static str| {
            Line::from(vec![
                Span::styled(k, Style::default().fg(Color::Yellow)),
                Span::raw(what),
            ])
        };
        let help_text = vec![
            Line::from(vec![Span::styled(
                "Waveform Viewer Help",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            key("  ←, →", " - Scroll the time window"),
            key("  Home, End", " - Jump to the first or last tick"),
            key("  h", " - Show this help"),
            key("  q, Esc", " - Quit"),
            Line::from(""),
            Line::from(vec![Span::raw("Yellow traces are stimuli, green traces are probes.")]),
            Line::from(""),
            Line::from(vec![Span::raw("Press any key to return to the traces...")]),
        ];

        let help = Paragraph::new(help_text)
            .style(Style::default().fg(Color::White))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Help"));
        f.render_widget(help, size);
    }
}

fn next_key(timeout: Duration) -> io::Result<Option<KeyCode>> {
    if !event::poll(timeout)? {
        return Ok(None);
    }
    match event::read()? {
        Event::Key(key) => Ok(Some(key.code)),
        _ => Ok(None),
    }
}

fn restore_terminal<B: Backend + io::Write>(terminal: &mut Terminal<B>) -> Result<(), String> {
    let raw = disable_raw_mode().map_err(|e| format!("Failed to disable raw mode: {}", e));
    let screen = execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .map_err(|e| format!("Failed to leave alternate screen: {}", e));
    let cursor = terminal
        .show_cursor()
        .map_err(|e| format!("Failed to show cursor: {}", e));
    raw.and(screen).and(cursor)
}

/// Opens the viewer on the results of a run and blocks until the user quits.
pub fn run_viewer(
    title: &str,
    results: CircuitResults,
    config: ConsoleConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut viewer = WaveformViewer::new(title, results, config);
    viewer.run()
}
