//! Line markers for terminal output. Emoji when colors are on, short ASCII
//! tags when output is piped or `NO_COLOR` is set.

use crate::ui::theme;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Start,
    Done,
    Failed,
    Caution,
    Note,
    Watching,
    File,
    Reindexed,
    Part,
}

impl Marker {
    pub fn emoji(self) -> &'static str {
        match self {
            Marker::Start => "🚀",
            Marker::Done => "✅",
            Marker::Failed => "❌",
            Marker::Caution => "⚠️",
            Marker::Note => "ℹ️",
            Marker::Watching => "👀",
            Marker::File => "📄",
            Marker::Reindexed => "📝",
            Marker::Part => "📦",
        }
    }

    pub fn ascii(self) -> &'static str {
        match self {
            Marker::Start => "==>",
            Marker::Done => "[ok]",
            Marker::Failed => "[error]",
            Marker::Caution => "[warn]",
            Marker::Note => "-",
            Marker::Watching => "[watch]",
            Marker::File => "*",
            Marker::Reindexed => "~",
            Marker::Part => "#",
        }
    }

    /// Glyph for the current terminal
    pub fn glyph(self) -> &'static str {
        if theme().emoji { self.emoji() } else { self.ascii() }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glyph())
    }
}
