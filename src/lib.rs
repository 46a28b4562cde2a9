//! Warfront - real-time faction battles on terrain-aware battle zones
//!
//! Two engines share one crate:
//! - `zone`: resumable search for a flat, dry, traversable battlefield
//!   between two warring factions
//! - `battle`: the battle directory and per-battle tick loop
//!
//! The host world (terrain, entities, treasuries, diplomacy) is reached only
//! through the traits in `world`.

pub mod battle;
pub mod core;
pub mod world;
pub mod zone;
