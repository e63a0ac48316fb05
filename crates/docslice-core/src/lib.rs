//! Docslice Core - Element stream and chunk types shared by the docslice crates.

mod types;

pub use types::*;
