//! Terrain-aware battle zone search
//!
//! A zone is found by sampling candidate rectangles around the frontline
//! between two factions, gating them on water, relief and walkability, and
//! committing the first one that passes. The search is spread over many ticks
//! through a resumable cursor held in [`allocator::ZoneSearchJob`].

pub mod allocator;
pub mod constants;
pub mod sampling;
pub mod scoring;
pub mod traversal;

pub use allocator::{JobStatus, ScoredCandidate, ZoneAllocator, ZoneSearchJob};
pub use sampling::HeightSample;
pub use scoring::{assess, Frontline, ZoneQuality};
pub use traversal::is_traversable;
