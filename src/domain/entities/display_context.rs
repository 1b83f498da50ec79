//! Places in the UI that show cover art.

use serde::{Deserialize, Serialize};

/// Where a cover is displayed. Each context maps to one canonical size.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayContext {
    /// Thumbnail in a song or album list row.
    ListRow,
    /// Now-playing bar artwork.
    MiniPlayer,
    /// Cell in a dense album grid.
    #[default]
    GridCell,
    /// Card in a horizontal shelf.
    Card,
    /// Album or artist detail header.
    Detail,
    /// Full-width hero banner.
    Hero,
}

impl DisplayContext {
    /// All contexts, smallest first.
    pub const ALL: [Self; 6] = [
        Self::ListRow,
        Self::MiniPlayer,
        Self::GridCell,
        Self::Card,
        Self::Detail,
        Self::Hero,
    ];
}

impl std::fmt::Display for DisplayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ListRow => write!(f, "list-row"),
            Self::MiniPlayer => write!(f, "mini-player"),
            Self::GridCell => write!(f, "grid-cell"),
            Self::Card => write!(f, "card"),
            Self::Detail => write!(f, "detail"),
            Self::Hero => write!(f, "hero"),
        }
    }
}
