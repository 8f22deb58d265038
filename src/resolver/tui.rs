//! Interactive front-end for the conflict resolver.
//!
//! One alternate-screen ratatui session per resolution pass. The screen shows
//! the current conflict as an editable buffer; all typed operations from the
//! resolver model are bound to keys:
//!
//! - `Ctrl+↑` / `Ctrl+↓` — previous / next conflict
//! - `Ctrl+←` / `Ctrl+→` — accept current / incoming
//! - `Ctrl+B` — accept both
//! - `Shift+↑` / `Shift+↓` — extend context up / down
//! - `Ctrl+Z` / `Ctrl+Y` — undo / redo
//! - `Esc` — save and exit the pass
//! - `Ctrl+C` — cancel the whole operation

use std::io;
use std::path::Path;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::layout::{Constraint, Layout};
use ratatui::prelude::CrosstermBackend;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use super::{Conflict, ConflictRecord, ResolverUi};
use crate::error::{Result, VaryError};

/// Ratatui-backed resolver front-end.
#[derive(Debug, Default)]
pub struct TuiResolver;

impl ResolverUi for TuiResolver {
    fn run(&mut self, records: &mut [ConflictRecord], path: &Path, title: &str) -> Result<()> {
        let file_lines: Vec<String> = std::fs::read_to_string(path)?
            .lines()
            .map(ToOwned::to_owned)
            .collect();

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).map_err(io::Error::from)?;

        let result = event_loop(&mut terminal, records, &file_lines, title);

        disable_raw_mode()?;
        crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        result
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

struct Session {
    index: usize,
    lines: Vec<String>,
    cursor_row: usize,
    cursor_col: usize,
    scroll: u16,
}

impl Session {
    fn load(record: &ConflictRecord) -> Self {
        let lines: Vec<String> = if record.current.content.is_empty() {
            vec![String::new()]
        } else {
            record.current.content.split('\n').map(ToOwned::to_owned).collect()
        };
        Self {
            index: 0,
            lines,
            cursor_row: 0,
            cursor_col: 0,
            scroll: 0,
        }
    }

    fn reload(&mut self, record: &ConflictRecord) {
        let index = self.index;
        *self = Self::load(record);
        self.index = index;
    }

    fn content(&self) -> String {
        self.lines.join("\n")
    }

    fn clamp_cursor(&mut self) {
        self.cursor_row = self.cursor_row.min(self.lines.len().saturating_sub(1));
        let width = self.lines.get(self.cursor_row).map_or(0, String::len);
        self.cursor_col = self.cursor_col.min(width);
    }

    fn insert_char(&mut self, c: char) {
        self.clamp_cursor();
        self.lines[self.cursor_row].insert(self.cursor_col, c);
        self.cursor_col += c.len_utf8();
    }

    fn insert_newline(&mut self) {
        self.clamp_cursor();
        let rest = self.lines[self.cursor_row].split_off(self.cursor_col);
        self.lines.insert(self.cursor_row + 1, rest);
        self.cursor_row += 1;
        self.cursor_col = 0;
    }

    fn backspace(&mut self) {
        self.clamp_cursor();
        if self.cursor_col > 0 {
            let line = &mut self.lines[self.cursor_row];
            let mut idx = self.cursor_col - 1;
            while !line.is_char_boundary(idx) {
                idx -= 1;
            }
            line.remove(idx);
            self.cursor_col = idx;
        } else if self.cursor_row > 0 {
            let removed = self.lines.remove(self.cursor_row);
            self.cursor_row -= 1;
            self.cursor_col = self.lines[self.cursor_row].len();
            self.lines[self.cursor_row].push_str(&removed);
        }
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    records: &mut [ConflictRecord],
    file_lines: &[String],
    title: &str,
) -> Result<()> {
    let mut session = Session::load(&records[0]);

    loop {
        let record = &records[session.index];
        let resolved = record.current.is_resolved();
        draw(terminal, &session, records.len(), resolved, title)?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        let record = &mut records[session.index];

        match (key.code, ctrl, shift) {
            (KeyCode::Char('c'), true, _) => return Err(VaryError::Cancelled),
            (KeyCode::Esc, ..) => {
                commit_buffer(record, &session);
                return Ok(());
            }
            (KeyCode::Down, true, _) => {
                commit_buffer(record, &session);
                if session.index + 1 < records.len() {
                    session.index += 1;
                    let index = session.index;
                    session.reload(&records[index]);
                }
            }
            (KeyCode::Up, true, _) => {
                commit_buffer(record, &session);
                if session.index > 0 {
                    session.index -= 1;
                    let index = session.index;
                    session.reload(&records[index]);
                }
            }
            (KeyCode::Left, true, _) => {
                if !record.current.is_resolved() && record.accept_current().is_ok() {
                    session.reload(record);
                }
            }
            (KeyCode::Right, true, _) => {
                if !record.current.is_resolved() && record.accept_incoming().is_ok() {
                    session.reload(record);
                }
            }
            (KeyCode::Char('b'), true, _) => {
                if !record.current.is_resolved() && record.accept_both().is_ok() {
                    session.reload(record);
                }
            }
            (KeyCode::Char('z'), true, _) => {
                record.undo();
                session.reload(record);
            }
            (KeyCode::Char('y'), true, _) => {
                record.redo();
                session.reload(record);
            }
            (KeyCode::Up, false, true) => {
                if !record.current.is_resolved() && record.extend_up(file_lines).is_ok() {
                    session.reload(record);
                }
            }
            (KeyCode::Down, false, true) => {
                if !record.current.is_resolved() && record.extend_down(file_lines).is_ok() {
                    session.reload(record);
                }
            }
            (KeyCode::Up, false, false) => {
                session.cursor_row = session.cursor_row.saturating_sub(1);
                session.clamp_cursor();
            }
            (KeyCode::Down, false, false) => {
                session.cursor_row += 1;
                session.clamp_cursor();
            }
            (KeyCode::Left, false, false) => {
                session.cursor_col = session.cursor_col.saturating_sub(1);
            }
            (KeyCode::Right, false, false) => {
                session.cursor_col += 1;
                session.clamp_cursor();
            }
            (KeyCode::Home, ..) => session.cursor_col = 0,
            (KeyCode::End, ..) => {
                session.cursor_col = usize::MAX;
                session.clamp_cursor();
            }
            (KeyCode::Enter, ..) => {
                session.insert_newline();
                commit_buffer(&mut records[session.index], &session);
            }
            (KeyCode::Backspace, ..) => {
                session.backspace();
                commit_buffer(&mut records[session.index], &session);
            }
            (KeyCode::Char(c), false, _) => {
                session.insert_char(c);
                commit_buffer(&mut records[session.index], &session);
            }
            _ => {}
        }
    }
}

/// Push the edit buffer into the record's history when it differs.
fn commit_buffer(record: &mut ConflictRecord, session: &Session) {
    let content = session.content();
    if content != record.current.content {
        let next = Conflict {
            content,
            ..record.current.clone()
        };
        record.record_change(next);
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn draw(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &Session,
    total: usize,
    resolved: bool,
    title: &str,
) -> Result<()> {
    terminal
        .draw(|frame| {
            let [header, body, help] = Layout::vertical([
                Constraint::Length(2),
                Constraint::Min(3),
                Constraint::Length(2),
            ])
            .areas(frame.area());

            let status = if resolved {
                Span::styled(" SOLVED ", Style::default().fg(Color::Black).bg(Color::Green))
            } else {
                Span::styled(" NOT SOLVED ", Style::default().fg(Color::White).bg(Color::Red))
            };
            let header_line = Line::from(vec![
                Span::styled(title.to_owned(), Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(format!("  conflict {}/{total} ", session.index + 1)),
                status,
            ]);
            frame.render_widget(Paragraph::new(header_line), header);

            let lines: Vec<Line> = session.lines.iter().map(|l| Line::raw(l.clone())).collect();
            let editor = Paragraph::new(lines)
                .scroll((session.scroll, 0))
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(editor, body);

            #[allow(clippy::cast_possible_truncation)]
            frame.set_cursor_position((
                body.x + 1 + session.cursor_col as u16,
                body.y + 1 + session.cursor_row as u16,
            ));

            let help_text = "ctrl+↑/↓ conflict  ctrl+← current  ctrl+→ incoming  ctrl+b both  \
                             shift+↑/↓ context  ctrl+z/y undo/redo  esc save+exit  ctrl+c quit";
            frame.render_widget(
                Paragraph::new(help_text).style(Style::default().fg(Color::DarkGray)),
                help,
            );
        })
        .map_err(io::Error::from)?;
    Ok(())
}
