//! Reusable wire-format extraction routines shared by the source adapters.

pub mod dublin_core;
pub mod marc;
pub mod mods;
pub mod text;
pub mod xml;
