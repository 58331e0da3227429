use owo_colors::{OwoColorize, Style};
use std::fmt::Display;

pub trait AppStyles: OwoColorize + Display + Sized {
    fn updated(&self) -> String {
        self.style_if_supported(Style::new().green().bold())
    }

    fn up_to_date(&self) -> String {
        self.style_if_supported(Style::new().cyan().bold())
    }

    fn would_update(&self) -> String {
        self.style_if_supported(Style::new().yellow().bold())
    }

    fn failed(&self) -> String {
        self.style_if_supported(Style::new().red().bold())
    }

    fn field_label(&self) -> String {
        self.style_if_supported(Style::new().dimmed())
    }

    fn muted(&self) -> String {
        self.style_if_supported(Style::new().dimmed())
    }

    /// Plain text when stdout is not a colour-capable terminal
    fn style_if_supported(&self, style: Style) -> String {
        if console::colors_enabled() {
            self.style(style).to_string()
        } else {
            self.to_string()
        }
    }
}

impl<T> AppStyles for T where T: Display {}

/// Padding that ignores ANSI escapes when measuring width
pub trait AnsiPadding: Display {
    fn align_right(&self, width: usize) -> String {
        let s = self.to_string();
        let pad = width.saturating_sub(console::measure_text_width(&s));
        format!("{}{}", " ".repeat(pad), s)
    }

    fn align_left(&self, width: usize) -> String {
        let s = self.to_string();
        let pad = width.saturating_sub(console::measure_text_width(&s));
        format!("{}{}", s, " ".repeat(pad))
    }
}

impl<T> AnsiPadding for T where T: Display {}
