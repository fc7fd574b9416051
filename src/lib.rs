//! Rainflow - shallow-water surface flow over terrain.
//!
//! A virtual-pipe water model stepped ahead of an interpolated playback
//! pipeline. Exposes the engine, the pipeline and its Bevy plugins for
//! testing and reuse.

pub mod config;
pub mod error;
pub mod export;
pub mod grid;
pub mod render;
pub mod resources;
pub mod simulation;
pub mod terrain;
