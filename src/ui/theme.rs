use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Styles by the role the text plays in symdex output
#[derive(Debug, Clone)]
pub struct Theme {
    pub heading: Style,
    pub ok: Style,
    pub failure: Style,
    pub caution: Style,
    pub label: Style,
    pub faint: Style,
    pub aside: Style,
    pub symbol: Style,
    pub path: Style,
    /// Use emoji markers instead of ASCII tags
    pub emoji: bool,
}

impl Theme {
    /// Colors only on a terminal, and never when `NO_COLOR` is set
    pub fn detect() -> Self {
        let is_term = console::Term::stdout().is_term();
        let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        Self::for_output(is_term, no_color)
    }

    pub fn for_output(is_term: bool, no_color: bool) -> Self {
        if is_term && !no_color { Self::colored() } else { Self::plain() }
    }

    pub fn colored() -> Self {
        Self {
            heading: Style::new().cyan().bold(),
            ok: Style::new().green().bold(),
            failure: Style::new().red().bold(),
            caution: Style::new().yellow().bold(),
            label: Style::new().magenta(),
            faint: Style::new().white().dimmed(),
            aside: Style::new().bright_black(),
            symbol: Style::new().bold(),
            path: Style::new().blue(),
            emoji: true,
        }
    }

    pub fn plain() -> Self {
        let none = Style::new();
        Self {
            heading: none,
            ok: none,
            failure: none,
            caution: none,
            label: none,
            faint: none,
            aside: none,
            symbol: none,
            path: none,
            emoji: false,
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
