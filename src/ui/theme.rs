//! Colors and styles shared by every dashboard widget.

use ratatui::style::{Color, Modifier, Style};

/// Palette for the dashboard
#[derive(Debug, Clone)]
pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    pub highlight_bg: Color,
    pub highlight_fg: Color,
    pub border: Color,
    pub title: Color,
    pub run_active: Color,
    pub run_ended: Color,
    pub info: Color,
    pub error: Color,
    pub chart_colors: Vec<Color>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            bg: Color::Reset,
            fg: Color::White,
            highlight_bg: Color::Rgb(60, 60, 80),
            highlight_fg: Color::White,
            border: Color::Rgb(100, 100, 120),
            title: Color::Cyan,
            run_active: Color::Green,
            run_ended: Color::Blue,
            info: Color::Green,
            error: Color::Red,
            // Named colors render on 16-color terminals too
            chart_colors: vec![
                Color::Red,
                Color::Green,
                Color::Yellow,
                Color::Blue,
                Color::Magenta,
                Color::Cyan,
                Color::LightRed,
                Color::LightGreen,
            ],
        }
    }
}

impl Theme {
    /// Background fill for panels and popups
    pub fn surface_style(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    /// (border, title) styles for a panel
    pub fn panel_styles(&self, focused: bool) -> (Style, Style) {
        if focused {
            (self.focused_border_style(), self.focused_border_style())
        } else {
            (self.border_style(), self.dimmed_title_style())
        }
    }

    pub fn normal_style(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    /// Selected table row or focused form value
    pub fn highlight_style(&self) -> Style {
        Style::default()
            .fg(self.highlight_fg)
            .bg(self.highlight_bg)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }

    /// Border of the panel that receives keys
    pub fn focused_border_style(&self) -> Style {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    }

    pub fn title_style(&self) -> Style {
        Style::default()
            .fg(self.title)
            .add_modifier(Modifier::BOLD)
    }

    /// Titles of inactive panels and read-only form values
    pub fn dimmed_title_style(&self) -> Style {
        Style::default()
            .fg(self.border)
            .add_modifier(Modifier::DIM)
    }

    /// Row color for an active or ended run
    pub fn run_style(&self, ended: bool) -> Style {
        let color = if ended { self.run_ended } else { self.run_active };
        Style::default().fg(color)
    }

    /// Status bar message color
    pub fn message_style(&self, is_error: bool) -> Style {
        let color = if is_error { self.error } else { self.info };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    /// Series color; wraps past the end of the palette
    pub fn chart_color(&self, index: usize) -> Color {
        self.chart_colors[index % self.chart_colors.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_color_cycles() {
        let theme = Theme::default();
        let len = theme.chart_colors.len();
        assert_eq!(theme.chart_color(0), theme.chart_color(len));
        assert_eq!(theme.chart_color(1), theme.chart_color(len + 1));
    }

    #[test]
    fn test_run_styles_differ() {
        let theme = Theme::default();
        assert_ne!(theme.run_style(true), theme.run_style(false));
        assert_ne!(theme.message_style(true), theme.message_style(false));
    }
}
