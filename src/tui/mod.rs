//! Ratatui-based terminal UI.
//!
//! Three tabs over one [`Session`]:
//! - Dashboard: overview chart, metric cards, per-series miniatures
//! - Builder: the binding list and the chart it composes
//! - Data: the date-joined table with a date filter
//!
//! Charts are re-projected from the session on every draw. The surface
//! registry tracks which charts are on screen: a chart shows a placeholder on
//! the frame its handle is created, and is drawn once the next frame has
//! measured its area.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};

use crate::app::pipeline::Session;
use crate::builder::{BindingEdit, Dirty};
use crate::domain::{Dataset, MonitorConfig, RangeWindow, RenderType, Rgb, SeriesConfig};
use crate::error::AppError;
use crate::io::ExportFormat;
use crate::meta::PALETTE;
use crate::report::format::{format_change, format_data_table};
use crate::report::{self, ChangeBasis, DATA_TABLE_MAX_ROWS, MetricCard, Trend};
use crate::surface::registry::{HandleState, Size};
use crate::surface::{self, ChartSpec, SurfaceKind, tooltip_at};

mod plotters_chart;

use plotters_chart::LiquidityChart;

const MINI_COLUMNS: usize = 3;
const MINI_ROWS: usize = 2;

/// Start the TUI.
pub fn run(config: MonitorConfig) -> Result<(), AppError> {
    let session = Session::from_config(&config)?;
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::terminal(format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(session);
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::terminal(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::terminal(format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Dashboard,
    Builder,
    Data,
}

impl Tab {
    const ALL: [Tab; 3] = [Tab::Dashboard, Tab::Builder, Tab::Data];

    fn title(self) -> &'static str {
        match self {
            Tab::Dashboard => "Dashboard",
            Tab::Builder => "Builder",
            Tab::Data => "Data",
        }
    }

    fn index(self) -> usize {
        Tab::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    fn prev(self) -> Self {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Modal {
    /// Pick a catalog series to bind.
    AddSeries { filter: String, cursor: usize },
    /// Reorder / hide dashboard series.
    DashboardOrder { cursor: usize },
    /// One miniature expanded.
    Popup(String),
    /// `None`: the maximised builder chart; `Some(id)`: one series.
    Overlay(Option<String>),
}

struct App {
    session: Session,
    tab: Tab,
    modal: Option<Modal>,
    status: String,
    /// Visible failure state of the last load.
    error: Option<String>,
    /// `Some(force)` when a load should run before the next key.
    pending_load: Option<bool>,
    overview_type: RenderType,
    dash_cursor: usize,
    builder_cursor: usize,
    crosshair: Option<i64>,
    table_filter: String,
    editing_filter: bool,
    table_scroll: u16,
}

impl App {
    fn new(session: Session) -> Self {
        Self {
            session,
            tab: Tab::Dashboard,
            modal: None,
            status: "Loading...".to_string(),
            error: None,
            pending_load: Some(false),
            overview_type: RenderType::Line,
            dash_cursor: 0,
            builder_cursor: 0,
            crosshair: None,
            table_filter: String::new(),
            editing_filter: false,
            table_scroll: 0,
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                let mut drawn = Vec::new();
                terminal
                    .draw(|f| drawn = self.draw(f))
                    .map_err(|e| AppError::terminal(format!("Terminal draw error: {e}")))?;
                needs_redraw = self.sync_surfaces(&drawn);
            }

            if let Some(force) = self.pending_load.take() {
                self.reload(force);
                needs_redraw = true;
                continue;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::terminal(format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::terminal(format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        self.session.surfaces.destroy_all();
        Ok(())
    }

    fn reload(&mut self, force: bool) {
        let result = if force {
            self.session.refresh()
        } else {
            self.session.load()
        };
        match result {
            Ok(data) => {
                self.status = format!(
                    "Loaded {} series ({} points)",
                    data.catalog().len(),
                    data.catalog().total_points()
                );
                self.error = None;
            }
            Err(e) => {
                self.error = Some(e.to_string());
                self.status = "Load failed. R to retry.".to_string();
            }
        }
        self.crosshair = None;
        self.clamp_cursors();
    }

    /// Bring the registry in line with what the last frame drew.
    ///
    /// Returns true when a handle was created or settled, so the caller draws
    /// again with the measured size.
    fn sync_surfaces(&mut self, drawn: &[(SurfaceKind, Rect)]) -> bool {
        let registry = &mut self.session.surfaces;
        let stale: Vec<SurfaceKind> = registry
            .kinds()
            .filter(|k| !drawn.iter().any(|(d, _)| d == *k))
            .cloned()
            .collect();
        for kind in &stale {
            registry.destroy(kind);
        }

        let mut changed = false;
        for (kind, rect) in drawn {
            let size = Size::new(rect.width, rect.height);
            match registry.get(kind).map(|h| h.state) {
                None => {
                    registry.init(kind.clone());
                    changed = true;
                }
                Some(HandleState::Pending) => {
                    registry.settle(kind, size);
                    changed = true;
                }
                Some(HandleState::Ready(_)) => {
                    registry.resize(kind, size);
                }
            }
        }
        changed
    }

    fn note(&mut self, dirty: Option<Dirty>) {
        if dirty.is_some_and(|d| d.charts) {
            self.crosshair = None;
        }
        self.clamp_cursors();
    }

    fn clamp_cursors(&mut self) {
        let bindings = self.session.builder.len();
        self.builder_cursor = self.builder_cursor.min(bindings.saturating_sub(1));
        let visible = self.session.layout.visible_ids().count();
        self.dash_cursor = self.dash_cursor.min(visible.saturating_sub(1));
    }

    // ----- keys -------------------------------------------------------------

    /// Returns true to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        let captures_text = self.editing_filter || matches!(self.modal, Some(Modal::AddSeries { .. }));
        if !captures_text && matches!(code, KeyCode::Left | KeyCode::Right) {
            self.move_crosshair(if code == KeyCode::Left { -1 } else { 1 });
            return false;
        }

        if let Some(modal) = self.modal.take() {
            self.modal = self.handle_modal_key(modal, code);
            return false;
        }
        if self.editing_filter {
            self.handle_filter_edit(code);
            return false;
        }

        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Tab => self.switch_tab(self.tab.next()),
            KeyCode::BackTab => self.switch_tab(self.tab.prev()),
            KeyCode::Char(c @ '1'..='6') => {
                let idx = (c as u8 - b'1') as usize;
                self.set_range(RangeWindow::ALL[idx]);
            }
            KeyCode::Char('r') => self.pending_load = Some(false),
            KeyCode::Char('R') => self.pending_load = Some(true),
            KeyCode::Char('e') => self.export(ExportFormat::Csv),
            KeyCode::Char('E') => self.export(ExportFormat::Json),
            _ => match self.tab {
                Tab::Dashboard => self.handle_dashboard_key(code),
                Tab::Builder => self.handle_builder_key(code),
                Tab::Data => self.handle_data_key(code),
            },
        }
        false
    }

    fn handle_dashboard_key(&mut self, code: KeyCode) {
        let visible: Vec<String> = self.session.layout.visible_ids().map(str::to_string).collect();
        match code {
            KeyCode::Up => self.dash_cursor = self.dash_cursor.saturating_sub(1),
            KeyCode::Down => {
                self.dash_cursor = (self.dash_cursor + 1).min(visible.len().saturating_sub(1));
            }
            KeyCode::Enter => {
                if let Some(id) = visible.get(self.dash_cursor) {
                    self.modal = Some(Modal::Popup(id.clone()));
                    self.crosshair = None;
                }
            }
            KeyCode::Char('f') => {
                if let Some(id) = visible.get(self.dash_cursor) {
                    self.modal = Some(Modal::Overlay(Some(id.clone())));
                    self.crosshair = None;
                }
            }
            KeyCode::Char('o') => {
                self.overview_type = self.overview_type.next();
                self.status = format!("overview: {}", self.overview_type.display_name());
            }
            KeyCode::Char('D') => self.modal = Some(Modal::DashboardOrder { cursor: 0 }),
            KeyCode::Esc => self.crosshair = None,
            _ => {}
        }
    }

    fn handle_builder_key(&mut self, code: KeyCode) {
        let idx = self.builder_cursor;
        let current = self.session.builder.get(idx).cloned();
        let dirty = match (code, current) {
            (KeyCode::Up, _) => {
                self.builder_cursor = idx.saturating_sub(1);
                None
            }
            (KeyCode::Down, _) => {
                self.builder_cursor = idx + 1;
                None
            }
            (KeyCode::Char('a'), _) => {
                self.modal = Some(Modal::AddSeries {
                    filter: String::new(),
                    cursor: 0,
                });
                None
            }
            (KeyCode::Char('f'), _) => {
                self.modal = Some(Modal::Overlay(None));
                None
            }
            (KeyCode::Char('T'), _) => {
                let render = self.session.builder.default_render().next();
                self.status = format!("all series: {}", render.display_name());
                Some(self.session.builder.bulk_set_type(render))
            }
            (KeyCode::Esc, _) => self.session.builder.clear_selection(),
            (_, None) => None,
            (KeyCode::Enter, Some(b)) => self.session.builder.select(&b.series_id),
            (KeyCode::Char('d'), Some(_)) => self.session.builder.remove(idx),
            (KeyCode::Char('K'), Some(_)) => {
                let to = idx.saturating_sub(1);
                self.builder_cursor = to;
                self.session.builder.move_binding(idx, to)
            }
            (KeyCode::Char('J'), Some(_)) => {
                let to = (idx + 1).min(self.session.builder.len() - 1);
                self.builder_cursor = to;
                self.session.builder.move_binding(idx, to)
            }
            (KeyCode::Char('x'), Some(b)) => self.session.builder.reconfigure(idx, BindingEdit::Axis(b.axis.toggle())),
            (KeyCode::Char('t'), Some(b)) => {
                self.session.builder.reconfigure(idx, BindingEdit::Render(b.render.next()))
            }
            (KeyCode::Char('c'), Some(b)) => {
                self.session.builder.reconfigure(idx, BindingEdit::Color(next_color(b.color)))
            }
            (KeyCode::Char('i'), Some(b)) => {
                self.session.builder.reconfigure(idx, BindingEdit::InvertAxis(!b.invert_axis))
            }
            _ => None,
        };
        self.note(dirty);
    }

    fn handle_data_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('/') => self.editing_filter = true,
            KeyCode::Up => self.table_scroll = self.table_scroll.saturating_sub(1),
            KeyCode::Down => self.table_scroll = self.table_scroll.saturating_add(1),
            KeyCode::PageUp => self.table_scroll = self.table_scroll.saturating_sub(20),
            KeyCode::PageDown => self.table_scroll = self.table_scroll.saturating_add(20),
            KeyCode::Esc => {
                self.table_filter.clear();
                self.table_scroll = 0;
            }
            _ => {}
        }
    }

    fn handle_filter_edit(&mut self, code: KeyCode) {
        match code {
            KeyCode::Enter | KeyCode::Esc => self.editing_filter = false,
            KeyCode::Backspace => {
                self.table_filter.pop();
            }
            KeyCode::Char(c) if c.is_ascii_digit() || c == '-' => self.table_filter.push(c),
            _ => {}
        }
        self.table_scroll = 0;
    }

    fn handle_modal_key(&mut self, modal: Modal, code: KeyCode) -> Option<Modal> {
        match modal {
            Modal::Popup(_) | Modal::Overlay(_) => match code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => {
                    self.crosshair = None;
                    None
                }
                _ => Some(modal),
            },
            Modal::AddSeries { mut filter, mut cursor } => {
                match code {
                    KeyCode::Esc => return None,
                    KeyCode::Enter => {
                        let picked = self.add_candidates(&filter).get(cursor).map(|c| (*c).clone());
                        if let Some(config) = picked {
                            let dirty = self.session.builder.add(&config, config.axis);
                            self.builder_cursor = self.session.builder.len() - 1;
                            self.status = format!("added {}", config.label);
                            self.note(Some(dirty));
                        }
                        return None;
                    }
                    KeyCode::Up => cursor = cursor.saturating_sub(1),
                    KeyCode::Down => cursor += 1,
                    KeyCode::Backspace => {
                        filter.pop();
                        cursor = 0;
                    }
                    KeyCode::Char(c) => {
                        filter.push(c);
                        cursor = 0;
                    }
                    _ => {}
                }
                let max = self.add_candidates(&filter).len().saturating_sub(1);
                Some(Modal::AddSeries {
                    filter,
                    cursor: cursor.min(max),
                })
            }
            Modal::DashboardOrder { mut cursor } => {
                let layout = &mut self.session.layout;
                let last = layout.len().saturating_sub(1);
                match code {
                    KeyCode::Esc | KeyCode::Enter => {
                        self.clamp_cursors();
                        return None;
                    }
                    KeyCode::Up => cursor = cursor.saturating_sub(1),
                    KeyCode::Down => cursor = (cursor + 1).min(last),
                    KeyCode::Char('K') if cursor > 0 => {
                        layout.move_item(cursor, cursor - 1);
                        cursor -= 1;
                    }
                    KeyCode::Char('J') if cursor < last => {
                        layout.move_item(cursor, cursor + 1);
                        cursor += 1;
                    }
                    KeyCode::Char(' ') => {
                        if let Some(id) = layout.order().get(cursor).cloned() {
                            layout.toggle(&id);
                        }
                    }
                    KeyCode::Char('r') => {
                        if let Some(data) = self.session.dataset() {
                            let catalog = data.shared_catalog();
                            self.session.layout.reset(&catalog);
                        }
                        cursor = 0;
                    }
                    _ => {}
                }
                Some(Modal::DashboardOrder { cursor })
            }
        }
    }

    fn switch_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.crosshair = None;
        self.editing_filter = false;
    }

    fn set_range(&mut self, range: RangeWindow) {
        self.session.set_range(range);
        self.crosshair = None;
        self.status = format!("range: {}", range.label());
    }

    fn export(&mut self, format: ExportFormat) {
        let Some(data) = self.session.dataset() else {
            self.status = "Nothing to export.".to_string();
            return;
        };
        let path = PathBuf::from(crate::io::default_export_name(data, format));
        self.status = match crate::io::export_to_path(&path, data, format) {
            Ok(n) => format!("Exported {n} {} to {}", export_noun(format), path.display()),
            Err(e) => format!("Export failed: {e}"),
        };
    }

    /// Step the crosshair to the neighbouring observation date of the focused chart.
    fn move_crosshair(&mut self, step: i32) {
        let next = {
            let Some(spec) = self.focused_spec() else {
                return;
            };
            let mut stamps: Vec<i64> = spec
                .series
                .iter()
                .flat_map(|s| s.points.iter().map(|p| p.timestamp))
                .collect();
            stamps.sort_unstable();
            stamps.dedup();
            let Some(&last) = stamps.last() else {
                return;
            };
            match self.crosshair {
                None => last,
                Some(ts) => {
                    let pos = stamps.partition_point(|&t| t < ts);
                    let exact = stamps.get(pos) == Some(&ts);
                    let target = if step < 0 {
                        pos.saturating_sub(1)
                    } else if exact {
                        pos + 1
                    } else {
                        pos
                    };
                    stamps[target.min(stamps.len() - 1)]
                }
            }
        };
        self.crosshair = Some(next);
    }

    fn focused_spec(&self) -> Option<ChartSpec<'_>> {
        let data = self.session.dataset()?;
        match &self.modal {
            Some(Modal::Popup(id)) => surface::project_popup(data, id, series_render(data, id)),
            Some(Modal::Overlay(Some(id))) => surface::project_single_overlay(data, id),
            Some(Modal::Overlay(None)) => Some(surface::project_overlay(&self.session.builder, data)),
            _ => match self.tab {
                Tab::Dashboard => Some(surface::project_overview(data, self.overview_type)),
                Tab::Builder => Some(surface::project_builder(&self.session.builder, data)),
                Tab::Data => None,
            },
        }
    }

    /// Unbound catalog series whose id or label contains `filter` (case-insensitive).
    fn add_candidates(&self, filter: &str) -> Vec<&SeriesConfig> {
        let Some(data) = self.session.dataset() else {
            return Vec::new();
        };
        let needle = filter.trim().to_lowercase();
        data.catalog()
            .configs()
            .filter(|c| !self.session.builder.contains(&c.id))
            .filter(|c| {
                needle.is_empty()
                    || c.id.to_lowercase().contains(&needle)
                    || c.label.to_lowercase().contains(&needle)
            })
            .collect()
    }

    // ----- drawing ----------------------------------------------------------

    /// Draw one frame and report every chart surface it contains.
    fn draw(&self, frame: &mut ratatui::Frame<'_>) -> Vec<(SurfaceKind, Rect)> {
        let mut drawn = Vec::new();
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        match (&self.error, self.session.dataset()) {
            (Some(err), _) => self.draw_error(frame, chunks[1], err),
            (None, None) => {
                let msg = Paragraph::new("Loading liquidity data...")
                    .style(Style::default().fg(Color::Yellow))
                    .block(Block::default().borders(Borders::ALL));
                frame.render_widget(msg, chunks[1]);
            }
            (None, Some(data)) => {
                match self.tab {
                    Tab::Dashboard => self.draw_dashboard(frame, chunks[1], data, &mut drawn),
                    Tab::Builder => self.draw_builder(frame, chunks[1], data, &mut drawn),
                    Tab::Data => self.draw_data(frame, chunks[1], data),
                }
                if let Some(modal) = &self.modal {
                    self.draw_modal(frame, chunks[1], data, modal, &mut drawn);
                }
            }
        }
        self.draw_footer(frame, chunks[2]);
        drawn
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(40), Constraint::Min(0)])
            .split(area);

        let tabs = Tabs::new(Tab::ALL.iter().map(|t| t.title()))
            .select(self.tab.index())
            .block(Block::default().borders(Borders::ALL).title("liq"))
            .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
        frame.render_widget(tabs, chunks[0]);

        let ranges: Vec<Span> = RangeWindow::ALL
            .iter()
            .enumerate()
            .flat_map(|(i, r)| {
                let style = if *r == self.session.range() {
                    Style::default().fg(Color::Black).bg(Color::Cyan)
                } else {
                    Style::default().fg(Color::Gray)
                };
                [Span::styled(format!("{} {}", i + 1, r.label()), style), Span::raw(" ")]
            })
            .collect();
        let mut spans = ranges;
        let cache = self.session.cache();
        if let Some(age) = cache.age() {
            spans.push(Span::styled(
                format!("| data {}s old (ttl {}s)", age.as_secs(), cache.ttl().as_secs()),
                Style::default().fg(Color::DarkGray),
            ));
        }
        let p = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, chunks[1]);
    }

    fn draw_error(&self, frame: &mut ratatui::Frame<'_>, area: Rect, err: &str) {
        let text = Text::from(vec![
            Line::from(Span::styled(
                "Load failed",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Line::from(err.to_string()),
            Line::from(""),
            Line::from(Span::styled("Press R to retry.", Style::default().fg(Color::Gray))),
        ]);
        let p = Paragraph::new(text)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_dashboard(
        &self,
        frame: &mut ratatui::Frame<'_>,
        area: Rect,
        data: &Dataset,
        drawn: &mut Vec<(SurfaceKind, Rect)>,
    ) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Min(0)])
            .split(area);
        let top = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(62), Constraint::Min(0)])
            .split(rows[0]);

        let spec = surface::project_overview(data, self.overview_type);
        let title = format!("Overview: {} [{}]", spec.title, self.overview_type.display_name());
        let crosshair = self.modal.is_none().then_some(self.crosshair).flatten();
        self.draw_focused_chart(frame, top[0], &spec, title, crosshair, drawn);

        let cards = report::metric_cards(data, self.session.layout.visible_ids(), ChangeBasis::Previous);
        self.draw_cards(frame, top[1], &cards);
        self.draw_minis(frame, rows[1], data, drawn);
    }

    fn draw_cards(&self, frame: &mut ratatui::Frame<'_>, area: Rect, cards: &[MetricCard]) {
        let items: Vec<ListItem> = cards
            .iter()
            .map(|c| {
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{} ", c.trend.symbol()), Style::default().fg(trend_color(c.trend))),
                    Span::styled(format!("{:<15}", c.short_label), Style::default().fg(color(c.color))),
                    Span::raw(format!("{:>10} ", c.formatted)),
                    Span::styled(
                        format_change(c.change.value, c.change.pct),
                        Style::default().fg(Color::Gray),
                    ),
                ]))
            })
            .collect();
        let list = List::new(items).block(Block::default().title("Latest").borders(Borders::ALL));
        frame.render_widget(list, area);
    }

    fn draw_minis(
        &self,
        frame: &mut ratatui::Frame<'_>,
        area: Rect,
        data: &Dataset,
        drawn: &mut Vec<(SurfaceKind, Rect)>,
    ) {
        let visible = self.session.layout.visible_series(data.catalog());
        if visible.is_empty() {
            let p = Paragraph::new("All series hidden. Press D to choose.")
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(p, area);
            return;
        }

        let per_page = MINI_COLUMNS * MINI_ROWS;
        let page = self.dash_cursor / per_page;
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Ratio(1, MINI_ROWS as u32); MINI_ROWS])
            .split(area);

        for (slot, config) in visible.iter().enumerate().skip(page * per_page).take(per_page) {
            let cell = slot - page * per_page;
            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Ratio(1, MINI_COLUMNS as u32); MINI_COLUMNS])
                .split(rows[cell / MINI_COLUMNS]);
            let cell_area = cols[cell % MINI_COLUMNS];

            let points = data.points(&config.id);
            let card = report::metric_card(config, points, ChangeBasis::Window);
            let border = if slot == self.dash_cursor {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(Line::from(vec![
                    Span::styled(config.short_label.clone(), Style::default().fg(color(config.color))),
                    Span::raw(format!(" {} ", card.formatted)),
                    Span::styled(format!("{:+.2}%", card.change.pct), Style::default().fg(trend_color(card.trend))),
                ]));

            if let Some(spec) = surface::project_mini(data, &config.id, config.render) {
                self.draw_chart(frame, cell_area, block, &spec, None, drawn);
            }
        }
    }

    fn draw_builder(
        &self,
        frame: &mut ratatui::Frame<'_>,
        area: Rect,
        data: &Dataset,
        drawn: &mut Vec<(SurfaceKind, Rect)>,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(36), Constraint::Min(0)])
            .split(area);

        let builder = &self.session.builder;
        let items: Vec<ListItem> = builder
            .bindings()
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let label = data
                    .catalog()
                    .config(&b.series_id)
                    .map(|c| c.short_label.as_str())
                    .unwrap_or(b.series_id.as_str());
                let marker = if builder.is_selected(i) { "✎ " } else { "  " };
                ListItem::new(Line::from(vec![
                    Span::raw(marker),
                    Span::styled("■ ", Style::default().fg(color(b.color))),
                    Span::raw(format!("{label:<14} {:<5} {:<4}", b.axis.display_name(), b.render.display_name())),
                    Span::styled(if b.invert_axis { " inv" } else { "" }, Style::default().fg(Color::Yellow)),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(
                Block::default()
                    .title(format!("Series ({}) default: {}", builder.len(), builder.default_render().display_name()))
                    .borders(Borders::ALL),
            )
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");
        let mut state = ListState::default();
        if !builder.is_empty() {
            state.select(Some(self.builder_cursor));
        }
        frame.render_stateful_widget(list, chunks[0], &mut state);

        if builder.is_empty() {
            let p = Paragraph::new("No series bound. Press a to add one.")
                .style(Style::default().fg(Color::Gray))
                .block(Block::default().title("Chart Builder").borders(Borders::ALL));
            frame.render_widget(p, chunks[1]);
            return;
        }
        let spec = surface::project_builder(builder, data);
        let crosshair = self.modal.is_none().then_some(self.crosshair).flatten();
        self.draw_focused_chart(frame, chunks[1], &spec, spec.title.clone(), crosshair, drawn);
    }

    fn draw_data(&self, frame: &mut ratatui::Frame<'_>, area: Rect, data: &Dataset) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0)])
            .split(area);

        let cursor = if self.editing_filter { "_" } else { "" };
        let filter = Line::from(vec![
            Span::styled(" Filter date: ", Style::default().fg(Color::Gray)),
            Span::styled(format!("{}{cursor}", self.table_filter), Style::default().fg(Color::Yellow)),
        ]);
        frame.render_widget(Paragraph::new(filter), chunks[0]);

        let table = report::data_table(data, Some(self.table_filter.as_str()), DATA_TABLE_MAX_ROWS);
        let p = Paragraph::new(format_data_table(&table))
            .scroll((self.table_scroll, 0))
            .block(
                Block::default()
                    .title(format!("Data ({} dates)", table.matched))
                    .borders(Borders::ALL),
            );
        frame.render_widget(p, chunks[1]);
    }

    fn draw_modal(
        &self,
        frame: &mut ratatui::Frame<'_>,
        body: Rect,
        data: &Dataset,
        modal: &Modal,
        drawn: &mut Vec<(SurfaceKind, Rect)>,
    ) {
        match modal {
            Modal::Popup(id) => {
                let area = centered_rect(80, 75, body);
                frame.render_widget(Clear, area);
                if let Some(spec) = surface::project_popup(data, id, series_render(data, id)) {
                    let title = format!("{} (Esc to close)", spec.title);
                    self.draw_focused_chart(frame, area, &spec, title, self.crosshair, drawn);
                }
            }
            Modal::Overlay(single) => {
                frame.render_widget(Clear, body);
                let spec = match single {
                    Some(id) => surface::project_single_overlay(data, id),
                    None => Some(surface::project_overlay(&self.session.builder, data)),
                };
                if let Some(spec) = spec {
                    let title = format!("{} (Esc to close)", spec.title);
                    self.draw_focused_chart(frame, body, &spec, title, self.crosshair, drawn);
                }
            }
            Modal::AddSeries { filter, cursor } => {
                let area = centered_rect(60, 70, body);
                frame.render_widget(Clear, area);
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Length(3), Constraint::Min(0)])
                    .split(area);
                let input = Paragraph::new(format!("{filter}_"))
                    .block(Block::default().title("Add series (type to filter)").borders(Borders::ALL));
                frame.render_widget(input, chunks[0]);

                let items: Vec<ListItem> = self
                    .add_candidates(filter)
                    .into_iter()
                    .map(|c| {
                        ListItem::new(Line::from(vec![
                            Span::styled("■ ", Style::default().fg(color(c.color))),
                            Span::raw(format!("{} [{}]", c.label, c.unit.label())),
                        ]))
                    })
                    .collect();
                let list = List::new(items)
                    .block(Block::default().borders(Borders::ALL))
                    .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
                    .highlight_symbol("» ");
                let mut state = ListState::default();
                state.select(Some(*cursor));
                frame.render_stateful_widget(list, chunks[1], &mut state);
            }
            Modal::DashboardOrder { cursor } => {
                let area = centered_rect(50, 70, body);
                frame.render_widget(Clear, area);
                let layout = &self.session.layout;
                let items: Vec<ListItem> = layout
                    .order()
                    .iter()
                    .filter_map(|id| data.catalog().config(id))
                    .map(|c| {
                        let check = if layout.is_visible(&c.id) { "[x]" } else { "[ ]" };
                        ListItem::new(Line::from(vec![
                            Span::raw(format!("{check} ")),
                            Span::styled("■ ", Style::default().fg(color(c.color))),
                            Span::raw(format!("{} [{}]", c.label, c.unit.label())),
                        ]))
                    })
                    .collect();
                let list = List::new(items)
                    .block(
                        Block::default()
                            .title("Dashboard: space show/hide, J/K move, r reset")
                            .borders(Borders::ALL),
                    )
                    .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
                    .highlight_symbol("» ");
                let mut state = ListState::default();
                state.select(Some(*cursor));
                frame.render_stateful_widget(list, area, &mut state);
            }
        }
    }

    /// A chart with a tooltip line under it.
    fn draw_focused_chart(
        &self,
        frame: &mut ratatui::Frame<'_>,
        area: Rect,
        spec: &ChartSpec<'_>,
        title: String,
        crosshair: Option<i64>,
        drawn: &mut Vec<(SurfaceKind, Rect)>,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(area);
        let block = Block::default().title(title).borders(Borders::ALL);
        self.draw_chart(frame, chunks[0], block, spec, crosshair, drawn);
        frame.render_widget(Paragraph::new(tooltip_line(spec, crosshair)), chunks[1]);
    }

    fn draw_chart(
        &self,
        frame: &mut ratatui::Frame<'_>,
        area: Rect,
        block: Block<'_>,
        spec: &ChartSpec<'_>,
        crosshair: Option<i64>,
        drawn: &mut Vec<(SurfaceKind, Rect)>,
    ) {
        let inner = block.inner(area);
        frame.render_widget(block, area);
        drawn.push((spec.kind.clone(), inner));

        match self.session.surfaces.get(&spec.kind).map(|h| h.state) {
            Some(HandleState::Ready(_)) => {
                frame.render_widget(LiquidityChart { spec, crosshair }, inner);
            }
            _ => {
                frame.render_widget(Paragraph::new("…").style(Style::default().fg(Color::DarkGray)), inner);
            }
        }
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = match (&self.modal, self.tab) {
            (Some(_), _) => "Esc close  ←/→ crosshair",
            (None, Tab::Dashboard) => "Tab switch  1-6 range  ↑/↓ pick  Enter expand  f overlay  o type  D layout  R refresh  e/E export  q quit",
            (None, Tab::Builder) => "a add  d remove  Enter edit  x axis  t type  c color  i invert  T all types  J/K move  f overlay  ←/→ crosshair",
            (None, Tab::Data) => "/ filter  ↑/↓ scroll  Esc clear  e/E export  q quit",
        };
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn tooltip_line(spec: &ChartSpec<'_>, crosshair: Option<i64>) -> Line<'static> {
    let Some(ts) = crosshair else {
        return Line::from(Span::styled(" ←/→ crosshair", Style::default().fg(Color::DarkGray)));
    };
    let tip = tooltip_at(spec, ts);
    let mut spans = vec![Span::styled(
        format!(" {}", tip.date.map(|d| d.to_string()).unwrap_or_default()),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    for e in tip.entries {
        spans.push(Span::raw("  "));
        spans.push(Span::styled("■ ", Style::default().fg(color(e.color))));
        spans.push(Span::raw(format!("{}: {}", e.label, e.formatted)));
    }
    Line::from(spans)
}

fn series_render(data: &Dataset, id: &str) -> RenderType {
    data.catalog().config(id).map(|c| c.render).unwrap_or_default()
}

fn next_color(current: Rgb) -> Rgb {
    let idx = PALETTE.iter().position(|c| *c == current).map(|i| i + 1).unwrap_or(0);
    PALETTE[idx % PALETTE.len()]
}

fn export_noun(format: ExportFormat) -> &'static str {
    match format {
        ExportFormat::Csv => "rows",
        ExportFormat::Json => "series",
    }
}

fn color(c: Rgb) -> Color {
    Color::Rgb(c.0, c.1, c.2)
}

fn trend_color(trend: Trend) -> Color {
    match trend {
        Trend::Up => Color::Green,
        Trend::Down => Color::Red,
        Trend::Flat => Color::Gray,
    }
}

fn centered_rect(pct_x: u16, pct_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - pct_y) / 2),
            Constraint::Percentage(pct_y),
            Constraint::Percentage((100 - pct_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - pct_x) / 2),
            Constraint::Percentage(pct_x),
            Constraint::Percentage((100 - pct_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ratatui::backend::TestBackend;

    use crate::data::source::tests::FakeSource;
    use crate::data::{FetchCache, IngestOptions};
    use crate::meta::ExplicitMapping;

    const JSON: &str = r#"[
        {"date": "2024-01-01", "wresbal_oficjalny": 3200000, "btc_usd": 42000, "tga": 750000, "sofr_rate": 5.31},
        {"date": "2024-01-02", "wresbal_oficjalny": 3250000, "btc_usd": 43000, "tga": 760000, "sofr_rate": 5.32}
    ]"#;

    fn app(source: FakeSource) -> App {
        let options = IngestOptions {
            mapping: ExplicitMapping::builtin(),
            ..IngestOptions::default()
        };
        let cache = FetchCache::new(vec![Box::new(source)], options, Duration::from_secs(300));
        let mut app = App::new(Session::new(cache, RangeWindow::All));
        let force = app.pending_load.take().unwrap();
        app.reload(force);
        app
    }

    fn keys(app: &mut App, codes: &[KeyCode]) {
        for code in codes {
            assert!(!app.handle_key(*code));
        }
    }

    #[test]
    fn range_keys_rewindow_without_refetching() {
        let source = FakeSource::ok("feed", JSON);
        let hits = std::rc::Rc::clone(&source.hits);
        let mut app = app(source);
        keys(&mut app, &[KeyCode::Char('3')]);
        assert_eq!(app.session.range(), RangeWindow::SixMonths);
        assert_eq!(hits.get(), 1);

        keys(&mut app, &[KeyCode::Char('R')]);
        let force = app.pending_load.take().unwrap();
        app.reload(force);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn builder_keys_edit_the_binding_under_the_cursor() {
        let mut app = app(FakeSource::ok("feed", JSON));
        assert_eq!(app.session.builder.len(), 2);
        keys(&mut app, &[KeyCode::Tab]);
        assert_eq!(app.tab, Tab::Builder);

        keys(&mut app, &[KeyCode::Char('x'), KeyCode::Char('t'), KeyCode::Char('i')]);
        let b = app.session.builder.get(0).unwrap();
        assert_eq!(b.axis, crate::domain::Axis::Right);
        assert_eq!(b.render, RenderType::Bar);
        assert!(b.invert_axis);

        keys(&mut app, &[KeyCode::Char('J')]);
        assert_eq!(app.builder_cursor, 1);
        assert_eq!(app.session.builder.get(1).unwrap().series_id, "WRESBAL_MLN_USD");

        keys(&mut app, &[KeyCode::Enter]);
        assert_eq!(app.session.builder.selected(), Some("WRESBAL_MLN_USD"));
        keys(&mut app, &[KeyCode::Char('d')]);
        assert_eq!(app.session.builder.len(), 1);
        assert_eq!(app.session.builder.selected(), None);
        assert_eq!(app.builder_cursor, 0);
    }

    #[test]
    fn add_series_modal_filters_and_binds() {
        let mut app = app(FakeSource::ok("feed", JSON));
        keys(&mut app, &[KeyCode::Tab, KeyCode::Char('a')]);
        for c in "sofr".chars() {
            keys(&mut app, &[KeyCode::Char(c)]);
        }
        assert_eq!(
            app.modal,
            Some(Modal::AddSeries { filter: "sofr".to_string(), cursor: 0 })
        );
        keys(&mut app, &[KeyCode::Enter]);
        assert!(app.modal.is_none());
        assert_eq!(app.session.builder.len(), 3);
        let added = app.session.builder.get(2).unwrap();
        assert_eq!(added.series_id, "SOFR");
        assert_eq!(added.axis, crate::domain::Axis::Right);
        assert_eq!(app.builder_cursor, 2);
    }

    #[test]
    fn add_series_modal_hides_bound_series() {
        let app = app(FakeSource::ok("feed", JSON));
        let ids: Vec<&str> = app.add_candidates("").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["TGA_MLN_USD", "SOFR"]);
        assert!(app.add_candidates("bitcoin").is_empty());
    }

    #[test]
    fn dashboard_order_dialog_hides_and_moves_series() {
        let mut app = app(FakeSource::ok("feed", JSON));
        keys(&mut app, &[KeyCode::Char('D'), KeyCode::Char(' '), KeyCode::Down, KeyCode::Char('K'), KeyCode::Esc]);
        let layout = &app.session.layout;
        assert_eq!(layout.order()[0], "TGA_MLN_USD");
        assert_eq!(layout.order()[1], "WRESBAL_MLN_USD");
        assert!(!layout.is_visible("WRESBAL_MLN_USD"));
        assert_eq!(layout.visible_ids().count(), 3);
    }

    #[test]
    fn crosshair_steps_through_observation_dates() {
        let mut app = app(FakeSource::ok("feed", JSON));
        keys(&mut app, &[KeyCode::Left]);
        let last = app.crosshair.unwrap();
        keys(&mut app, &[KeyCode::Left]);
        let first = app.crosshair.unwrap();
        assert_eq!(last - first, 86_400);
        keys(&mut app, &[KeyCode::Left]);
        assert_eq!(app.crosshair, Some(first));
        keys(&mut app, &[KeyCode::Right, KeyCode::Right]);
        assert_eq!(app.crosshair, Some(last));
    }

    #[test]
    fn surfaces_follow_what_was_drawn() {
        let mut app = app(FakeSource::ok("feed", JSON));
        let rect = Rect::new(0, 0, 40, 10);
        let frame = vec![(SurfaceKind::Overview, rect), (SurfaceKind::Mini("TGA_MLN_USD".into()), rect)];

        assert!(app.sync_surfaces(&frame));
        assert_eq!(app.session.surfaces.get(&SurfaceKind::Overview).unwrap().state, HandleState::Pending);
        assert!(app.sync_surfaces(&frame));
        assert_eq!(
            app.session.surfaces.get(&SurfaceKind::Overview).unwrap().state,
            HandleState::Ready(Size::new(40, 10))
        );
        assert!(!app.sync_surfaces(&frame));

        assert!(app.sync_surfaces(&[(SurfaceKind::Builder, rect)]));
        assert_eq!(app.session.surfaces.len(), 1);
        assert_eq!(app.session.surfaces.observer_count(), 1);
    }

    #[test]
    fn failed_load_renders_an_error_state() {
        let mut app = app(FakeSource::failing("feed", "HTTP 503"));
        assert!(app.error.is_some());

        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        let mut drawn = Vec::new();
        terminal.draw(|f| drawn = app.draw(f)).unwrap();
        assert!(drawn.is_empty());

        let screen: String = terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect();
        assert!(screen.contains("Load failed"));
        assert!(screen.contains("HTTP 503"));
    }
}
