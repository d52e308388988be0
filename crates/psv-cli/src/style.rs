use std::env;

use color_eyre::owo_colors::OwoColorize;

pub struct Style {
    enabled: bool,
}

impl Style {
    pub fn new(force_no_color: bool, is_tty: bool) -> Self {
        let env_no_color = env::var_os("NO_COLOR").is_some();
        Self {
            enabled: !(force_no_color || env_no_color) && is_tty,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn error(&self, code: Option<&str>, text: &str) -> String {
        let line = match code {
            Some(code) => format!("✖ {code} {text}"),
            None => format!("✖ {text}"),
        };
        self.paint(&line, Tone::Red, true)
    }

    pub fn hint(&self, hint: &str) -> String {
        if !self.enabled {
            return format!("psv ▸ Hint: {hint}");
        }
        let prefix = "psv ▸ Hint:".cyan().bold().to_string();
        format!("{prefix} {hint}")
    }

    pub fn label(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        text.bold().to_string()
    }

    pub fn present(&self, yes: bool) -> String {
        if yes {
            self.paint("yes", Tone::Green, false)
        } else {
            self.paint("no", Tone::Yellow, false)
        }
    }

    fn paint(&self, text: &str, tone: Tone, bold: bool) -> String {
        if !self.enabled {
            return text.to_string();
        }
        match (tone, bold) {
            (Tone::Green, true) => text.green().bold().to_string(),
            (Tone::Green, false) => text.green().to_string(),
            (Tone::Yellow, true) => text.yellow().bold().to_string(),
            (Tone::Yellow, false) => text.yellow().to_string(),
            (Tone::Red, true) => text.red().bold().to_string(),
            (Tone::Red, false) => text.red().to_string(),
        }
    }
}

#[derive(Clone, Copy)]
enum Tone {
    Green,
    Yellow,
    Red,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_output_without_tty() {
        let style = Style::new(false, false);
        assert!(!style.enabled());
        assert_eq!(style.error(Some("PSV201"), "python is not available"), "✖ PSV201 python is not available");
        assert_eq!(style.hint("install python3"), "psv ▸ Hint: install python3");
        assert_eq!(style.present(true), "yes");
    }

    #[test]
    fn no_color_flag_wins_over_tty() {
        assert!(!Style::new(true, true).enabled());
    }
}
