//! Subsonic-compatible music server adapter.

mod client;
mod dto;

pub use client::{API_VERSION, SubsonicClient, SubsonicClientConfig};
