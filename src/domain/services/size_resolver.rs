//! Display context to pixel size mapping.

use crate::domain::entities::DisplayContext;

/// Size requested for list row thumbnails.
pub const LIST_ROW_SIZE: u32 = 80;
/// Size requested for the mini player.
pub const MINI_PLAYER_SIZE: u32 = 120;
/// Size requested for grid cells.
pub const GRID_CELL_SIZE: u32 = 200;
/// Size requested for shelf cards.
pub const CARD_SIZE: u32 = 300;
/// Size requested for detail headers.
pub const DETAIL_SIZE: u32 = 600;
/// Size requested for hero banners.
pub const HERO_SIZE: u32 = 900;

/// Resolves a display context to the canonical pixel size to request.
///
/// Keeping the set of sizes small keeps the number of distinct cache
/// entries per entity small.
#[must_use]
pub const fn resolve_size(context: DisplayContext) -> u32 {
    match context {
        DisplayContext::ListRow => LIST_ROW_SIZE,
        DisplayContext::MiniPlayer => MINI_PLAYER_SIZE,
        DisplayContext::GridCell => GRID_CELL_SIZE,
        DisplayContext::Card => CARD_SIZE,
        DisplayContext::Detail => DETAIL_SIZE,
        DisplayContext::Hero => HERO_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(DisplayContext::ListRow, 80 ; "list_row")]
    #[test_case(DisplayContext::MiniPlayer, 120 ; "mini_player")]
    #[test_case(DisplayContext::GridCell, 200 ; "grid_cell")]
    #[test_case(DisplayContext::Card, 300 ; "card")]
    #[test_case(DisplayContext::Detail, 600 ; "detail")]
    #[test_case(DisplayContext::Hero, 900 ; "hero")]
    fn test_resolve_size(context: DisplayContext, expected: u32) {
        assert_eq!(resolve_size(context), expected);
    }

    #[test]
    fn test_sizes_are_positive_and_ordered() {
        let sizes: Vec<u32> = DisplayContext::ALL.iter().map(|c| resolve_size(*c)).collect();
        assert!(sizes.iter().all(|s| *s > 0));
        assert!(sizes.windows(2).all(|w| w[0] < w[1]));
    }
}
