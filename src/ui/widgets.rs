//! Table, tab and status widgets for the dashboard.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table, TableState, Tabs},
    Frame,
};

use super::theme::Theme;
use crate::data::format::{format_coins, format_duration};
use crate::data::stats::{DerivedMetrics, TierSummary};
use crate::data::{EntryColumn, RunEntry};

const UNDEFINED: &str = "-";

fn coins_or_dash(value: Option<f64>) -> String {
    value.map(format_coins).unwrap_or_else(|| UNDEFINED.to_string())
}

fn number_or_dash(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| UNDEFINED.to_string())
}

fn panel<'a>(title: String, focused: bool, theme: &Theme) -> Block<'a> {
    let (border_style, title_style) = theme.panel_styles(focused);
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(if focused {
            BorderType::Double
        } else {
            BorderType::Plain
        })
        .border_style(border_style)
        .title_style(title_style)
}

fn header_row<'a>(titles: impl IntoIterator<Item = String>, theme: &Theme) -> Row<'a> {
    Row::new(titles.into_iter().map(Cell::from)).style(theme.title_style())
}

/// Table of every recorded entry, sortable by column
pub struct EntryTable<'a> {
    entries: &'a [RunEntry],
    selected: usize,
    sort_column: EntryColumn,
    descending: bool,
    theme: &'a Theme,
}

impl<'a> EntryTable<'a> {
    pub fn new(
        entries: &'a [RunEntry],
        selected: usize,
        sort_column: EntryColumn,
        descending: bool,
        theme: &'a Theme,
    ) -> Self {
        EntryTable {
            entries,
            selected,
            sort_column,
            descending,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let titles = EntryColumn::ALL.iter().map(|&col| {
            if col == self.sort_column {
                let arrow = if self.descending { '▼' } else { '▲' };
                format!("{} {arrow}", col.title())
            } else {
                col.title().to_string()
            }
        });

        let rows: Vec<Row> = self
            .entries
            .iter()
            .map(|e| {
                Row::new(vec![
                    Cell::from(e.id.to_string()),
                    Cell::from(e.run_id.to_string()),
                    Cell::from(e.tier.to_string()),
                    Cell::from(e.wave.to_string()),
                    Cell::from(format_coins(e.coins)),
                    Cell::from(e.cells.to_string()),
                    Cell::from(format_duration(e.time_spent)),
                    Cell::from(e.notes.clone().unwrap_or_default()),
                    Cell::from(if e.end_of_round { "yes" } else { "no" }),
                    Cell::from(e.datetime_collected.format("%Y-%m-%d %H:%M").to_string()),
                ])
                .style(self.theme.run_style(e.end_of_round))
            })
            .collect();

        let widths = [
            Constraint::Length(6),
            Constraint::Length(8),
            Constraint::Length(6),
            Constraint::Length(7),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(11),
            Constraint::Min(10),
            Constraint::Length(14),
            Constraint::Length(17),
        ];

        let table = Table::new(rows, widths)
            .header(header_row(titles, self.theme))
            .block(panel(
                format!(" Entries ({}) ", self.entries.len()),
                focused,
                self.theme,
            ))
            .row_highlight_style(self.theme.highlight_style())
            .highlight_symbol("> ");

        let mut state = TableState::default();
        if !self.entries.is_empty() {
            state.select(Some(self.selected));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }
}

/// Entries of a single run with their per-hour rates
pub struct RunEntryTable<'a> {
    run_id: Option<i64>,
    entries: &'a [RunEntry],
    selected: usize,
    theme: &'a Theme,
}

impl<'a> RunEntryTable<'a> {
    pub fn new(
        run_id: Option<i64>,
        entries: &'a [RunEntry],
        selected: usize,
        theme: &'a Theme,
    ) -> Self {
        RunEntryTable {
            run_id,
            entries,
            selected,
            theme,
        }
    }

    fn title(&self) -> String {
        match self.run_id {
            None => " No run selected ".to_string(),
            Some(run_id) if self.entries.is_empty() => format!(" Run {run_id} (no entries) "),
            Some(run_id) => {
                let ended = self.entries.last().is_some_and(|e| e.end_of_round);
                let status = if ended { "ended" } else { "active" };
                format!(" Run {run_id} ({status}) ")
            }
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let titles = [
            "ID", "Tier", "Wave", "Coins", "Coins/h", "Cells", "Cells/h", "Time Spent", "Notes",
            "Collected",
        ]
        .map(str::to_string);

        let rows: Vec<Row> = self
            .entries
            .iter()
            .map(|e| {
                let rates = DerivedMetrics::from_entry(e);
                Row::new(vec![
                    Cell::from(e.id.to_string()),
                    Cell::from(e.tier.to_string()),
                    Cell::from(e.wave.to_string()),
                    Cell::from(format_coins(e.coins)),
                    Cell::from(coins_or_dash(rates.coins_per_hour)),
                    Cell::from(e.cells.to_string()),
                    Cell::from(number_or_dash(rates.cells_per_hour)),
                    Cell::from(format_duration(e.time_spent)),
                    Cell::from(e.notes.clone().unwrap_or_default()),
                    Cell::from(e.datetime_collected.format("%Y-%m-%d %H:%M").to_string()),
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(6),
            Constraint::Length(5),
            Constraint::Length(7),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(11),
            Constraint::Min(10),
            Constraint::Length(17),
        ];

        let ended = self.entries.last().is_some_and(|e| e.end_of_round);
        let table = Table::new(rows, widths)
            .header(header_row(titles, self.theme))
            .block(panel(self.title(), focused, self.theme))
            .style(self.theme.run_style(ended))
            .row_highlight_style(self.theme.highlight_style())
            .highlight_symbol("> ");

        let mut state = TableState::default();
        if !self.entries.is_empty() {
            state.select(Some(self.selected));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }
}

/// Average statistics per tier
pub struct SummaryTable<'a> {
    summaries: &'a [TierSummary],
    selected: usize,
    theme: &'a Theme,
}

impl<'a> SummaryTable<'a> {
    pub fn new(summaries: &'a [TierSummary], selected: usize, theme: &'a Theme) -> Self {
        SummaryTable {
            summaries,
            selected,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let titles = [
            "Tier",
            "Entries",
            "Avg Wave",
            "Avg Coins/Hour",
            "Avg Coins/Wave",
            "Avg Cells/Hour",
            "Avg Cells/Wave",
        ]
        .map(str::to_string);

        let rows: Vec<Row> = self
            .summaries
            .iter()
            .map(|s| {
                Row::new(vec![
                    Cell::from(s.tier.to_string()),
                    Cell::from(s.entries.to_string()),
                    Cell::from(format!("{:.2}", s.avg_wave)),
                    Cell::from(coins_or_dash(s.avg_coins_per_hour)),
                    Cell::from(coins_or_dash(s.avg_coins_per_wave)),
                    Cell::from(number_or_dash(s.avg_cells_per_hour)),
                    Cell::from(number_or_dash(s.avg_cells_per_wave)),
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(6),
            Constraint::Length(9),
            Constraint::Length(10),
            Constraint::Length(16),
            Constraint::Length(16),
            Constraint::Length(16),
            Constraint::Length(16),
        ];

        let table = Table::new(rows, widths)
            .header(header_row(titles, self.theme))
            .block(panel(" Averages per Tier ".to_string(), focused, self.theme))
            .style(self.theme.normal_style())
            .row_highlight_style(self.theme.highlight_style())
            .highlight_symbol("> ");

        let mut state = TableState::default();
        if !self.summaries.is_empty() {
            state.select(Some(self.selected));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }
}

/// Tab strip naming the available views
pub struct ViewTabs<'a> {
    titles: &'a [&'a str],
    selected: usize,
    theme: &'a Theme,
}

impl<'a> ViewTabs<'a> {
    pub fn new(titles: &'a [&'a str], selected: usize, theme: &'a Theme) -> Self {
        ViewTabs {
            titles,
            selected,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let tabs = Tabs::new(self.titles.iter().copied())
            .select(self.selected)
            .style(self.theme.dimmed_title_style())
            .highlight_style(self.theme.title_style().add_modifier(Modifier::UNDERLINED))
            .divider(" | ");
        frame.render_widget(tabs, area);
    }
}

/// Status bar widget
pub struct StatusBar<'a> {
    active_run: Option<i64>,
    db_name: &'a str,
    message: Option<(&'a str, bool)>,
    theme: &'a Theme,
}

impl<'a> StatusBar<'a> {
    /// `message` is `(text, is_error)`
    pub fn new(
        active_run: Option<i64>,
        db_name: &'a str,
        message: Option<(&'a str, bool)>,
        theme: &'a Theme,
    ) -> Self {
        StatusBar {
            active_run,
            db_name,
            message,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let line = if let Some((text, is_error)) = self.message {
            let prefix = if is_error { "Error: " } else { "" };
            Line::from(Span::styled(
                format!("{prefix}{text}"),
                self.theme.message_style(is_error),
            ))
        } else {
            let run = match self.active_run {
                Some(id) => format!("active run {id}"),
                None => "no active run".to_string(),
            };
            Line::from(vec![
                Span::styled(format!("tower-tracker: {} ", self.db_name), self.theme.title_style()),
                Span::raw(format!("| {run} | [?] Help [q] Quit")),
            ])
        };

        let paragraph = Paragraph::new(line)
            .style(self.theme.normal_style())
            .block(Block::default().borders(Borders::TOP).border_style(Style::default().fg(self.theme.border)));

        frame.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_values_render_as_dash() {
        assert_eq!(coins_or_dash(None), "-");
        assert_eq!(coins_or_dash(Some(1500.0)), "1.50K");
        assert_eq!(number_or_dash(None), "-");
        assert_eq!(number_or_dash(Some(2.0 / 3.0)), "0.67");
    }

    #[test]
    fn test_run_table_title() {
        let theme = Theme::default();
        assert_eq!(RunEntryTable::new(None, &[], 0, &theme).title(), " No run selected ");
        assert_eq!(
            RunEntryTable::new(Some(4), &[], 0, &theme).title(),
            " Run 4 (no entries) "
        );

        let mut entry = RunEntry {
            id: 1,
            run_id: 4,
            tier: 2,
            wave: 10,
            coins: 0.0,
            cells: 0,
            time_spent: 60,
            notes: None,
            end_of_round: false,
            datetime_collected: chrono::Utc::now(),
        };
        let active = [entry.clone()];
        assert_eq!(
            RunEntryTable::new(Some(4), &active, 0, &theme).title(),
            " Run 4 (active) "
        );
        entry.end_of_round = true;
        let ended = [entry];
        assert_eq!(
            RunEntryTable::new(Some(4), &ended, 0, &theme).title(),
            " Run 4 (ended) "
        );
    }
}
