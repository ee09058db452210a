//! Font bytes fetched at build time for deterministic panel text.
//!
//! Empty when the build could neither download the font nor copy one from
//! `ATLAS_FONT`; renderers then fall back to system fonts.

pub const FONT_FILE: &str = "SourceHanSansSC-Regular.otf";

pub static FONT_BYTES: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/SourceHanSansSC-Regular.otf"));
