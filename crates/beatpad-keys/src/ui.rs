//! TUI rendering for the pad grid and the piano
//!
//! The screen is one bordered block holding either the pad grid (four
//! columns) or the piano keys, a progress gauge for the demo sequence and
//! a status line. Layout is computed by [`screen_layout`] so mouse
//! hit-testing uses exactly the rectangles that were drawn.

use crate::app::Mode;
use crate::config::Theme;
use crate::midi::note_name;
use crate::piano::{is_black, PIANO_KEYS};
use beatpad_core::{PadConfig, PadSurface};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};

/// Pads per grid row
pub const COLUMNS: usize = 4;

/// Regions of the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenLayout {
    pub grid: Rect,
    pub gauge: Rect,
    pub status: Rect,
}

/// Split the terminal area into grid, gauge and status line
pub fn screen_layout(area: Rect) -> ScreenLayout {
    let inner = Block::default().borders(Borders::ALL).inner(area);
    let rows = Layout::vertical([
        Constraint::Min(3),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .split(inner);
    ScreenLayout {
        grid: rows[0],
        gauge: rows[1],
        status: rows[2],
    }
}

/// Cell rectangles for `count` pads laid out row by row
pub fn pad_cells(grid: Rect, count: usize) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    let rows = count.div_ceil(COLUMNS) as u16;
    let width = (grid.width / COLUMNS as u16).max(1);
    let height = (grid.height / rows).max(1);

    (0..count)
        .map(|i| Rect {
            x: grid.x + (i % COLUMNS) as u16 * width,
            y: grid.y + (i / COLUMNS) as u16 * height,
            width,
            height,
        })
        .collect()
}

/// Index of the pad cell under a terminal position
pub fn pad_at(grid: Rect, count: usize, column: u16, row: u16) -> Option<usize> {
    cell_at(&pad_cells(grid, count), column, row)
}

/// Key rectangles for [`PIANO_KEYS`], side by side across the grid
pub fn piano_cells(grid: Rect) -> Vec<Rect> {
    let width = (grid.width / PIANO_KEYS.len() as u16).max(1);
    (0..PIANO_KEYS.len() as u16)
        .map(|i| Rect {
            x: grid.x + i * width,
            y: grid.y,
            width,
            height: grid.height,
        })
        .collect()
}

/// Index into [`PIANO_KEYS`] of the key under a terminal position
pub fn piano_key_at(grid: Rect, column: u16, row: u16) -> Option<usize> {
    cell_at(&piano_cells(grid), column, row)
}

fn cell_at(cells: &[Rect], column: u16, row: u16) -> Option<usize> {
    cells.iter().position(|cell| {
        column >= cell.x
            && column < cell.x + cell.width
            && row >= cell.y
            && row < cell.y + cell.height
    })
}

/// Everything one frame shows
pub struct View<'a> {
    pub surface: &'a PadSurface,
    pub theme: &'a Theme,
    /// Input source label for the status line
    pub input_mode: &'a str,
    pub mode: Mode,
    /// Sounding piano note
    pub piano_note: Option<u8>,
}

/// Render the whole screen
pub fn render(frame: &mut Frame, view: &View) {
    let area = frame.area();
    let theme = view.theme;
    let block = Block::default()
        .title(format!(" beatpad [{}] ", view.mode.label()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border()));
    frame.render_widget(block, area);

    let layout = screen_layout(area);
    if layout.grid.width < PIANO_KEYS.len() as u16 * 4 || layout.grid.height < 3 {
        return;
    }

    match view.mode {
        Mode::Pads => {
            let surface = view.surface;
            let pads = surface.pads();
            for (pad, cell) in pads.iter().zip(pad_cells(layout.grid, pads.len())) {
                render_pad(frame, cell, pad, surface.is_active(&pad.id), theme);
            }

            let progress = surface.current_progress();
            if surface.is_playing() || progress > 0 {
                let gauge = Gauge::default()
                    .gauge_style(Style::default().fg(theme.progress()))
                    .percent(u16::from(progress))
                    .label(format!("Demo {}%", progress));
                frame.render_widget(gauge, layout.gauge);
            }
        }
        Mode::Piano => {
            for (&(key, note), cell) in PIANO_KEYS.iter().zip(piano_cells(layout.grid)) {
                render_piano_key(frame, cell, key, note, view.piano_note == Some(note), theme);
            }
        }
    }

    frame.render_widget(Paragraph::new(status_line(view)), layout.status);
}

fn render_pad(frame: &mut Frame, cell: Rect, pad: &PadConfig, active: bool, theme: &Theme) {
    let color = theme.pad(pad.color.as_deref());
    let style = if active {
        Style::default()
            .fg(theme.active_text())
            .bg(color)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(color)
    };

    let mut lines = vec![Line::from(pad.id.as_str())];
    if let Some(key) = pad.key {
        lines.push(Line::from(format!("[{}]", key.to_ascii_uppercase())));
    }

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
    frame.render_widget(paragraph, cell);
}

fn render_piano_key(frame: &mut Frame, cell: Rect, key: char, note: u8, active: bool, theme: &Theme) {
    let style = if active {
        Style::default()
            .fg(theme.active_text())
            .bg(theme.piano_active())
            .add_modifier(Modifier::BOLD)
    } else if is_black(note) {
        Style::default().fg(Color::White).bg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White)
    };

    let lines = vec![
        Line::from(note_name(note)),
        Line::from(format!("[{}]", key.to_ascii_uppercase())),
    ];
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(style)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, cell);
}

fn status_line(view: &View) -> Line<'static> {
    let surface = view.surface;
    let engine = surface.engine();
    let pads = surface.pads();
    let ready = pads
        .iter()
        .filter(|pad| engine.is_ready(pad.sound_id()))
        .count();
    let readiness = if ready == pads.len() {
        Span::styled("ready", Style::default().fg(Color::Green))
    } else {
        Span::styled(
            format!("{}/{} ready", ready, pads.len()),
            Style::default().fg(Color::Yellow),
        )
    };

    let mut spans = vec![
        Span::styled("engine: ", Style::default().fg(Color::DarkGray)),
        Span::raw(format!("{} ", engine.name())),
        readiness,
        Span::styled("  input: ", Style::default().fg(Color::DarkGray)),
        Span::raw(view.input_mode.to_string()),
    ];
    if view.theme.show_help {
        let help: &[(&str, &str)] = match view.mode {
            Mode::Pads => &[("Space", "demo"), ("Tab", "piano"), ("Esc", "quit")],
            Mode::Piano => &[("Tab", "pads"), ("Esc", "quit")],
        };
        for (key, action) in help {
            spans.push(Span::styled(format!("  {} ", key), Style::default().fg(Color::White)));
            spans.push(Span::styled(action.to_string(), Style::default().fg(Color::DarkGray)));
        }
    }
    Line::from(spans)
}
