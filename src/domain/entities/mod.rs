//! Domain entity definitions.

mod cover_art;
mod display_context;
mod image;
mod load_state;

pub use cover_art::{CacheKey, CoverArtKind};
pub use display_context::DisplayContext;
pub use image::{CachedImage, FetchedImage, ImageSource};
pub use load_state::{LoadState, LoadStateEvent};
