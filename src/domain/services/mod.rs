//! Stateless domain services.

mod size_resolver;

pub use size_resolver::{
    CARD_SIZE, DETAIL_SIZE, GRID_CELL_SIZE, HERO_SIZE, LIST_ROW_SIZE, MINI_PLAYER_SIZE,
    resolve_size,
};
