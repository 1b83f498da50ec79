//! Domain error types.

mod cover_art_error;

pub use cover_art_error::{CoverArtError, ErrorKind};
