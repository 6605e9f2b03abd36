//! Popup form for adding an entry to a run.

use crossterm::event::KeyCode;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::{centered_rect, theme::Theme};
use crate::recorder::EntryDraft;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Tier,
    Wave,
    Coins,
    Cells,
    Time,
    Notes,
    EndOfRound,
}

impl FormField {
    const ORDER: [FormField; 7] = [
        FormField::Tier,
        FormField::Wave,
        FormField::Coins,
        FormField::Cells,
        FormField::Time,
        FormField::Notes,
        FormField::EndOfRound,
    ];

    fn label(self) -> &'static str {
        match self {
            FormField::Tier => "Tier",
            FormField::Wave => "Wave",
            FormField::Coins => "Coins (e.g. 17.09M)",
            FormField::Cells => "Cells",
            FormField::Time => "Time (hh:mm:ss)",
            FormField::Notes => "Notes",
            FormField::EndOfRound => "End of Round",
        }
    }
}

/// What the app should do after the form consumed a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    None,
    Submit,
    Cancel,
}

/// Editing state of the add-entry form
#[derive(Debug, Clone)]
pub struct EntryForm {
    pub run_id: i64,
    /// Tier of the run when it already has entries; the tier field is then read-only
    pub locked_tier: Option<i64>,
    pub draft: EntryDraft,
    focused: usize,
    pub error: Option<String>,
}

impl EntryForm {
    pub fn new(run_id: i64, locked_tier: Option<i64>) -> Self {
        let draft = EntryDraft {
            tier: locked_tier.map(|t| t.to_string()).unwrap_or_default(),
            ..EntryDraft::default()
        };
        let mut form = EntryForm {
            run_id,
            locked_tier,
            draft,
            focused: 0,
            error: None,
        };
        if form.is_locked(form.focused_field()) {
            form.focused = 1;
        }
        form
    }

    pub fn focused_field(&self) -> FormField {
        FormField::ORDER[self.focused]
    }

    fn is_locked(&self, field: FormField) -> bool {
        field == FormField::Tier && self.locked_tier.is_some()
    }

    fn move_focus(&mut self, forward: bool) {
        let len = FormField::ORDER.len();
        loop {
            self.focused = if forward {
                (self.focused + 1) % len
            } else {
                (self.focused + len - 1) % len
            };
            if !self.is_locked(self.focused_field()) {
                break;
            }
        }
    }

    fn text_mut(&mut self, field: FormField) -> Option<&mut String> {
        match field {
            FormField::Tier => Some(&mut self.draft.tier),
            FormField::Wave => Some(&mut self.draft.wave),
            FormField::Coins => Some(&mut self.draft.coins),
            FormField::Cells => Some(&mut self.draft.cells),
            FormField::Time => Some(&mut self.draft.time),
            FormField::Notes => Some(&mut self.draft.notes),
            FormField::EndOfRound => None,
        }
    }

    fn value(&self, field: FormField) -> String {
        match field {
            FormField::Tier => self.draft.tier.clone(),
            FormField::Wave => self.draft.wave.clone(),
            FormField::Coins => self.draft.coins.clone(),
            FormField::Cells => self.draft.cells.clone(),
            FormField::Time => self.draft.time.clone(),
            FormField::Notes => self.draft.notes.clone(),
            FormField::EndOfRound => {
                let mark = if self.draft.end_of_round { "[x]" } else { "[ ]" };
                mark.to_string()
            }
        }
    }

    /// Apply a key press to the form
    pub fn handle_key(&mut self, key: KeyCode) -> FormAction {
        match key {
            KeyCode::Esc => return FormAction::Cancel,
            KeyCode::Enter => return FormAction::Submit,
            KeyCode::Tab | KeyCode::Down => self.move_focus(true),
            KeyCode::BackTab | KeyCode::Up => self.move_focus(false),
            KeyCode::Char(' ') if self.focused_field() == FormField::EndOfRound => {
                self.draft.end_of_round = !self.draft.end_of_round;
            }
            KeyCode::Char(c) => {
                let field = self.focused_field();
                if let Some(text) = self.text_mut(field) {
                    text.push(c);
                }
            }
            KeyCode::Backspace => {
                let field = self.focused_field();
                if let Some(text) = self.text_mut(field) {
                    text.pop();
                }
            }
            _ => {}
        }
        FormAction::None
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let popup = centered_rect(50, 60, area);
        frame.render_widget(Clear, popup);

        let mut lines = vec![Line::from("")];
        for (i, field) in FormField::ORDER.iter().enumerate() {
            let focused = i == self.focused;
            let label_style = if focused {
                theme.title_style()
            } else {
                theme.normal_style()
            };
            let value_style = if self.is_locked(*field) {
                theme.dimmed_title_style()
            } else if focused {
                theme.highlight_style()
            } else {
                theme.normal_style()
            };
            let cursor = if focused && *field != FormField::EndOfRound { "_" } else { "" };
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<22}", field.label()), label_style),
                Span::styled(format!("{}{cursor}", self.value(*field)), value_style),
            ]));
        }

        lines.push(Line::from(""));
        if let Some(err) = &self.error {
            lines.push(Line::from(Span::styled(format!("  {err}"), theme.message_style(true))));
        } else {
            lines.push(Line::from(Span::styled(
                "  Enter submit | Tab next field | Space toggle | Esc cancel",
                Style::default().add_modifier(Modifier::DIM),
            )));
        }

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(format!(" Add Entry to Run {} ", self.run_id))
                    .title_alignment(Alignment::Center)
                    .borders(Borders::ALL)
                    .border_style(theme.focused_border_style())
                    .title_style(theme.title_style())
                    .style(theme.surface_style()),
            )
            .style(theme.surface_style());

        frame.render_widget(paragraph, popup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_text(form: &mut EntryForm, text: &str) {
        for c in text.chars() {
            form.handle_key(KeyCode::Char(c));
        }
    }

    #[test]
    fn test_locked_tier_is_skipped() {
        let mut form = EntryForm::new(3, Some(7));
        assert_eq!(form.draft.tier, "7");
        assert_eq!(form.focused_field(), FormField::Wave);

        form.handle_key(KeyCode::BackTab);
        assert_eq!(form.focused_field(), FormField::EndOfRound);
        form.handle_key(KeyCode::Tab);
        assert_eq!(form.focused_field(), FormField::Wave);
    }

    #[test]
    fn test_typing_fills_focused_field() {
        let mut form = EntryForm::new(1, None);
        type_text(&mut form, "5");
        form.handle_key(KeyCode::Tab);
        type_text(&mut form, "120");
        form.handle_key(KeyCode::Backspace);
        assert_eq!(form.draft.tier, "5");
        assert_eq!(form.draft.wave, "12");
    }

    #[test]
    fn test_space_toggles_end_of_round_only_on_checkbox() {
        let mut form = EntryForm::new(1, None);
        form.handle_key(KeyCode::Char(' '));
        assert_eq!(form.draft.tier, " ");
        assert!(!form.draft.end_of_round);

        form.handle_key(KeyCode::BackTab);
        assert_eq!(form.focused_field(), FormField::EndOfRound);
        form.handle_key(KeyCode::Char(' '));
        assert!(form.draft.end_of_round);
    }

    #[test]
    fn test_enter_and_esc_actions() {
        let mut form = EntryForm::new(1, None);
        assert_eq!(form.handle_key(KeyCode::Enter), FormAction::Submit);
        assert_eq!(form.handle_key(KeyCode::Esc), FormAction::Cancel);
        assert_eq!(form.handle_key(KeyCode::Char('1')), FormAction::None);
    }
}
