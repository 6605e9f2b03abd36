//! Main application logic and TUI event loop.

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{error, info};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};

use crate::cli::AppConfig;
use crate::data::stats::{self, BoxSummary, Metric, TierSummary};
use crate::data::{sort_entries, EntryColumn, RunEntry, Storage};
use crate::recorder;
use crate::ui::{
    chart::{BoxPlotChart, MetricSelector, RunChart},
    form::{EntryForm, FormAction},
    widgets::{EntryTable, RunEntryTable, StatusBar, SummaryTable, ViewTabs},
    HelpOverlay, Theme,
};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const VIEW_TITLES: [&str; 4] = ["Entries", "Run", "Averages", "Distribution"];

/// Which view fills the main area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Entries,
    Run,
    Averages,
    Distribution,
}

impl View {
    const ORDER: [View; 4] = [View::Entries, View::Run, View::Averages, View::Distribution];

    fn index(self) -> usize {
        Self::ORDER.iter().position(|v| *v == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ORDER[(self.index() + 1) % Self::ORDER.len()]
    }

    fn prev(self) -> Self {
        Self::ORDER[(self.index() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

/// Message shown in the status bar until the next action
#[derive(Debug, Clone)]
struct StatusMessage {
    text: String,
    is_error: bool,
}

/// Application state
pub struct App {
    theme: Theme,
    storage: Storage,
    db_name: String,

    // Data
    entries: Vec<RunEntry>,
    run_entries: Vec<RunEntry>,
    summaries: Vec<TierSummary>,
    latest_per_run: Vec<RunEntry>,
    active_run: Option<i64>,

    // UI State
    view: View,
    sort_column: EntryColumn,
    sort_descending: bool,
    selected_entry: usize,
    /// Run shown in the run view
    detail_run: Option<i64>,
    selected_run_entry: usize,
    run_metric: Metric,
    selected_summary: usize,
    distribution_metric: Metric,
    form: Option<EntryForm>,
    pending_delete: Option<i64>,
    show_help: bool,

    // Exit flag
    should_quit: bool,

    message: Option<StatusMessage>,
}

/// Move a selection one step, wrapping around a list of `len` items
fn step_selection(selected: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        0
    } else if forward {
        (selected + 1) % len
    } else {
        selected.checked_sub(1).unwrap_or(len - 1)
    }
}

impl App {
    /// Create a new App instance
    pub fn new(config: &AppConfig) -> Result<Self> {
        let storage = Storage::new(config.db_path.clone());
        let db_name = storage
            .db_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut app = App {
            theme: Theme::default(),
            storage,
            db_name,
            entries: Vec::new(),
            run_entries: Vec::new(),
            summaries: Vec::new(),
            latest_per_run: Vec::new(),
            active_run: None,
            view: View::Entries,
            sort_column: EntryColumn::Id,
            sort_descending: false,
            selected_entry: 0,
            detail_run: None,
            selected_run_entry: 0,
            run_metric: Metric::Coins,
            selected_summary: 0,
            distribution_metric: Metric::CoinsPerHour,
            form: None,
            pending_delete: None,
            show_help: false,
            should_quit: false,
            message: None,
        };

        app.refresh()?;
        app.detail_run = app.active_run;
        app.load_run_entries()?;
        Ok(app)
    }

    /// Reload everything shown in the dashboard from storage
    fn refresh(&mut self) -> Result<()> {
        self.entries = self.storage.fetch_all_entries()?;
        sort_entries(&mut self.entries, self.sort_column, self.sort_descending);
        self.summaries = stats::summarize_by_tier(&self.entries);
        self.latest_per_run = self.storage.fetch_latest_per_run()?;
        self.active_run = self.storage.get_active_run_id()?;
        self.load_run_entries()?;

        self.selected_entry = self.selected_entry.min(self.entries.len().saturating_sub(1));
        self.selected_summary = self
            .selected_summary
            .min(self.summaries.len().saturating_sub(1));
        Ok(())
    }

    fn load_run_entries(&mut self) -> Result<()> {
        self.run_entries = match self.detail_run {
            Some(run_id) => self.storage.fetch_all_entries_for_run(run_id)?,
            None => Vec::new(),
        };
        self.selected_run_entry = self
            .selected_run_entry
            .min(self.run_entries.len().saturating_sub(1));
        Ok(())
    }

    fn set_info(&mut self, text: String) {
        self.message = Some(StatusMessage {
            text,
            is_error: false,
        });
    }

    /// Set an error message to display (non-fatal)
    pub fn set_error(&mut self, text: String) {
        self.message = Some(StatusMessage {
            text,
            is_error: true,
        });
    }

    fn selected_entry_id(&self) -> Option<i64> {
        match self.view {
            View::Entries => self.entries.get(self.selected_entry).map(|e| e.id),
            View::Run => self.run_entries.get(self.selected_run_entry).map(|e| e.id),
            _ => None,
        }
    }

    /// Open the add-entry form for `run_id`, or for the default run
    fn open_form(&mut self, run_id: Option<i64>) -> Result<()> {
        let run_id = match run_id {
            Some(id) => id,
            None => recorder::default_run_id(&self.storage)?,
        };
        if self.storage.get_run_status(run_id)? {
            self.set_error(format!("Run {run_id} has ended; press a in Entries to start a new run"));
            return Ok(());
        }
        let tier = self.storage.get_run_tier(run_id)?;
        self.form = Some(EntryForm::new(run_id, tier));
        Ok(())
    }

    fn submit_form(&mut self) -> Result<()> {
        let Some(form) = self.form.as_mut() else {
            return Ok(());
        };
        match recorder::submit(&self.storage, form.run_id, &form.draft) {
            Ok(id) => {
                let run_id = form.run_id;
                let ended = form.draft.end_of_round;
                self.form = None;
                self.detail_run = Some(run_id);
                self.refresh()?;
                if ended {
                    self.set_info(format!("Entry {id} added; run {run_id} ended"));
                } else {
                    self.set_info(format!("Entry {id} added to run {run_id}"));
                }
            }
            // Keep the form open so the input can be corrected
            Err(err) => form.error = Some(format!("{err:#}")),
        }
        Ok(())
    }

    fn confirm_delete(&mut self, id: i64) -> Result<()> {
        match self.storage.delete_entry(id) {
            Ok(true) => self.set_info(format!("Entry {id} deleted")),
            Ok(false) => self.set_error(format!("Entry {id} no longer exists")),
            Err(err) => {
                error!("event=entry_delete module=app status=error id={id} error={err:#}");
                self.set_error(format!("Failed to delete entry {id}: {err:#}"));
            }
        }
        self.refresh()
    }

    /// Handle keyboard input
    fn handle_input(&mut self, key: KeyCode) -> Result<()> {
        if let Some(form) = self.form.as_mut() {
            match form.handle_key(key) {
                FormAction::Submit => self.submit_form()?,
                FormAction::Cancel => self.form = None,
                FormAction::None => {}
            }
            return Ok(());
        }

        if let Some(id) = self.pending_delete.take() {
            if matches!(key, KeyCode::Char('y') | KeyCode::Char('Y')) {
                self.confirm_delete(id)?;
            } else {
                self.set_info("Delete cancelled".to_string());
            }
            return Ok(());
        }

        // Any other key clears the previous message
        self.message = None;

        // Global shortcuts
        match key {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return Ok(());
            }
            KeyCode::Char('?') | KeyCode::F(1) => {
                self.show_help = !self.show_help;
                return Ok(());
            }
            KeyCode::Esc if self.show_help => {
                self.show_help = false;
                return Ok(());
            }
            KeyCode::Char('r') => {
                self.refresh()?;
                self.set_info("Reloaded".to_string());
                return Ok(());
            }
            KeyCode::Tab => {
                self.view = self.view.next();
                return Ok(());
            }
            KeyCode::BackTab => {
                self.view = self.view.prev();
                return Ok(());
            }
            _ => {}
        }

        // If help is shown, don't process other keys
        if self.show_help {
            return Ok(());
        }

        if key == KeyCode::Char('d') {
            match self.selected_entry_id() {
                Some(id) => {
                    self.pending_delete = Some(id);
                    self.set_info(format!("Delete entry {id}? [y/N]"));
                }
                None => self.set_error("No entry selected".to_string()),
            }
            return Ok(());
        }

        match self.view {
            View::Entries => self.handle_entries_keys(key)?,
            View::Run => self.handle_run_keys(key)?,
            View::Averages => self.handle_averages_keys(key),
            View::Distribution => self.handle_distribution_keys(key),
        }
        Ok(())
    }

    fn handle_entries_keys(&mut self, key: KeyCode) -> Result<()> {
        match key {
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected_entry = step_selection(self.selected_entry, self.entries.len(), true);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_entry = step_selection(self.selected_entry, self.entries.len(), false);
            }
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Right | KeyCode::Char('l') => {
                let step = if matches!(key, KeyCode::Left | KeyCode::Char('h')) { -1 } else { 1 };
                self.sort_column = self.sort_column.cycle(step);
                sort_entries(&mut self.entries, self.sort_column, self.sort_descending);
            }
            KeyCode::Char('o') => {
                self.sort_descending = !self.sort_descending;
                sort_entries(&mut self.entries, self.sort_column, self.sort_descending);
            }
            KeyCode::Char('a') => self.open_form(None)?,
            KeyCode::Enter => {
                if let Some(entry) = self.entries.get(self.selected_entry) {
                    self.detail_run = Some(entry.run_id);
                    self.selected_run_entry = 0;
                    self.load_run_entries()?;
                    self.view = View::Run;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_run_keys(&mut self, key: KeyCode) -> Result<()> {
        match key {
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected_run_entry =
                    step_selection(self.selected_run_entry, self.run_entries.len(), true);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_run_entry =
                    step_selection(self.selected_run_entry, self.run_entries.len(), false);
            }
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                self.run_metric = Metric::RUN_SERIES[idx];
            }
            KeyCode::Char('a') => match self.detail_run {
                Some(run_id) => self.open_form(Some(run_id))?,
                None => self.open_form(None)?,
            },
            KeyCode::Esc => self.view = View::Entries,
            _ => {}
        }
        Ok(())
    }

    fn handle_averages_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected_summary =
                    step_selection(self.selected_summary, self.summaries.len(), true);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_summary =
                    step_selection(self.selected_summary, self.summaries.len(), false);
            }
            KeyCode::Esc => self.view = View::Entries,
            _ => {}
        }
    }

    fn handle_distribution_keys(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                self.distribution_metric = Metric::RATES[idx];
            }
            KeyCode::Esc => self.view = View::Entries,
            _ => {}
        }
    }

    /// Box summaries per tier for the selected distribution metric
    fn distribution_boxes(&self) -> Vec<(i64, Option<BoxSummary>)> {
        stats::tier_distributions(&self.latest_per_run, self.distribution_metric)
            .into_iter()
            .map(|(tier, values)| (tier, BoxSummary::from_values(&values)))
            .collect()
    }

    /// Render the UI
    fn render(&self, frame: &mut ratatui::Frame) {
        let size = frame.area();

        // Main layout: tabs, body, status bar
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Tabs
                Constraint::Min(5),    // Body
                Constraint::Length(2), // Status bar
            ])
            .split(size);

        ViewTabs::new(&VIEW_TITLES, self.view.index(), &self.theme).render(frame, main_chunks[0]);

        let body = main_chunks[1];
        match self.view {
            View::Entries => {
                EntryTable::new(
                    &self.entries,
                    self.selected_entry,
                    self.sort_column,
                    self.sort_descending,
                    &self.theme,
                )
                .render(frame, body, true);
            }
            View::Run => {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Percentage(45), // Entries
                        Constraint::Min(8),         // Chart
                        Constraint::Length(1),      // Metric selector
                    ])
                    .split(body);

                RunEntryTable::new(
                    self.detail_run,
                    &self.run_entries,
                    self.selected_run_entry,
                    &self.theme,
                )
                .render(frame, chunks[0], true);

                let points = stats::run_series(&self.run_entries, self.run_metric);
                RunChart::new(&points, self.run_metric, &self.theme).render(frame, chunks[1], false);
                MetricSelector::new(&Metric::RUN_SERIES, self.run_metric, &self.theme)
                    .render(frame, chunks[2]);
            }
            View::Averages => {
                SummaryTable::new(&self.summaries, self.selected_summary, &self.theme)
                    .render(frame, body, true);
            }
            View::Distribution => {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(8), Constraint::Length(1)])
                    .split(body);

                let boxes = self.distribution_boxes();
                BoxPlotChart::new(&boxes, self.distribution_metric, &self.theme)
                    .render(frame, chunks[0], true);
                MetricSelector::new(&Metric::RATES, self.distribution_metric, &self.theme)
                    .render(frame, chunks[1]);
            }
        }

        let message = self
            .message
            .as_ref()
            .map(|m| (m.text.as_str(), m.is_error));
        StatusBar::new(self.active_run, &self.db_name, message, &self.theme)
            .render(frame, main_chunks[2]);

        if let Some(form) = &self.form {
            form.render(frame, size, &self.theme);
        }

        // Render help overlay if active
        if self.show_help {
            HelpOverlay::new(&self.theme).render(frame, size);
        }
    }
}

/// Restore terminal to normal state
fn restore_terminal() {
    // Best effort cleanup - ignore errors since we may be in a panic
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

/// Run the TUI application
pub fn run(config: &AppConfig) -> Result<()> {
    // Load data before touching the terminal so storage errors print normally
    let mut app = App::new(config).context("Failed to initialize application")?;
    info!(
        "event=tui_start module=app status=ok entries={} db_path={}",
        app.entries.len(),
        config.db_path.display()
    );

    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen) {
        restore_terminal();
        return Err(e).context("Failed to setup terminal");
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = match Terminal::new(backend) {
        Ok(t) => t,
        Err(e) => {
            restore_terminal();
            return Err(e).context("Failed to create terminal");
        }
    };

    let result = run_main_loop(&mut terminal, &mut app);

    // Always restore terminal, regardless of result
    restore_terminal();
    terminal.show_cursor().ok();

    result
}

/// Main application loop
fn run_main_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Render - if this fails, we should exit
        terminal.draw(|f| app.render(f))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                // Ignore key releases reported by some terminals
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Err(e) = app.handle_input(key.code) {
                    error!("event=input module=app status=error error={e:#}");
                    app.set_error(format!("{e:#}"));
                }
            }
        }

        if app.should_quit {
            info!("event=tui_exit module=app status=ok");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_app() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            db_path: dir.path().join("stats.db"),
            log_dir: PathBuf::from(dir.path()),
            log_level: "off".to_string(),
        };
        let app = App::new(&config).unwrap();
        (dir, app)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_input(KeyCode::Char(c)).unwrap();
        }
    }

    /// Fill the open form: tier (when editable), wave, coins, cells, time
    fn fill_form(app: &mut App, tier: Option<&str>) {
        if let Some(tier) = tier {
            type_text(app, tier);
            app.handle_input(KeyCode::Tab).unwrap();
        }
        for value in ["10", "1.5K", "20", "00:30:00"] {
            type_text(app, value);
            app.handle_input(KeyCode::Tab).unwrap();
        }
    }

    #[test]
    fn test_step_selection_wraps() {
        assert_eq!(step_selection(0, 3, false), 2);
        assert_eq!(step_selection(2, 3, true), 0);
        assert_eq!(step_selection(0, 0, true), 0);
    }

    #[test]
    fn test_view_cycle() {
        assert_eq!(View::Entries.next(), View::Run);
        assert_eq!(View::Entries.prev(), View::Distribution);
    }

    #[test]
    fn test_add_entry_through_form() {
        let (_dir, mut app) = temp_app();
        app.handle_input(KeyCode::Char('a')).unwrap();
        assert_eq!(app.form.as_ref().map(|f| f.run_id), Some(1));

        fill_form(&mut app, Some("4"));
        app.handle_input(KeyCode::Enter).unwrap();

        assert!(app.form.is_none());
        assert_eq!(app.entries.len(), 1);
        assert_eq!(app.entries[0].coins, 1500.0);
        assert_eq!(app.entries[0].time_spent, 1800);
        assert_eq!(app.active_run, Some(1));
        assert_eq!(app.summaries.len(), 1);
        assert_eq!(app.detail_run, Some(1));
    }

    #[test]
    fn test_invalid_form_stays_open() {
        let (_dir, mut app) = temp_app();
        app.handle_input(KeyCode::Char('a')).unwrap();
        type_text(&mut app, "4");
        app.handle_input(KeyCode::Enter).unwrap();

        let form = app.form.as_ref().unwrap();
        assert!(form.error.as_deref().unwrap().contains("wave"));
        assert!(app.entries.is_empty());

        app.handle_input(KeyCode::Esc).unwrap();
        assert!(app.form.is_none());
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let (_dir, mut app) = temp_app();
        app.handle_input(KeyCode::Char('a')).unwrap();
        fill_form(&mut app, Some("4"));
        app.handle_input(KeyCode::Enter).unwrap();
        let id = app.entries[0].id;

        app.handle_input(KeyCode::Char('d')).unwrap();
        assert_eq!(app.pending_delete, Some(id));
        app.handle_input(KeyCode::Char('n')).unwrap();
        assert_eq!(app.entries.len(), 1);

        app.handle_input(KeyCode::Char('d')).unwrap();
        app.handle_input(KeyCode::Char('y')).unwrap();
        assert!(app.entries.is_empty());
        assert!(app.message.as_ref().is_some_and(|m| !m.is_error));
    }

    #[test]
    fn test_ended_run_refuses_new_entries() {
        let (_dir, mut app) = temp_app();
        app.handle_input(KeyCode::Char('a')).unwrap();
        fill_form(&mut app, Some("4"));
        // Focus is now on notes; move to the end-of-round checkbox
        app.handle_input(KeyCode::Tab).unwrap();
        app.handle_input(KeyCode::Char(' ')).unwrap();
        app.handle_input(KeyCode::Enter).unwrap();
        assert_eq!(app.active_run, None);

        app.view = View::Run;
        app.handle_input(KeyCode::Char('a')).unwrap();
        assert!(app.form.is_none());
        assert!(app.message.as_ref().is_some_and(|m| m.is_error));

        // From the entries view a fresh run is started
        app.view = View::Entries;
        app.handle_input(KeyCode::Char('a')).unwrap();
        assert_eq!(app.form.as_ref().map(|f| f.run_id), Some(2));
    }
}
