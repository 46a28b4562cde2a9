//! Time-budgeted, resumable zone search
//!
//! For each half-size (largest first) and each search radius (smallest first)
//! the job sweeps a ring of candidate centers around the frontline center.
//! Candidates touching claimed land or unloaded regions are skipped. The first
//! candidate that passes every gate is committed on the spot; if none ever
//! passes, the lowest-scoring candidate seen is committed instead. Failing
//! even that, a minimum-size sweep looks outward past the configured radii for
//! a rectangle clear of claimed land, ignoring whether its terrain is loaded.
//!
//! Each call to [`ZoneSearchJob::step`] stops once the per-tick time budget or
//! candidate cap is spent, leaving the cursor where the next call resumes.

use std::collections::VecDeque;
use std::time::Instant;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::core::config::ZoneSearchConfig;
use crate::core::types::{ConflictKey, Rect};
use crate::world::{TerrainOracle, TerritoryMap};
use crate::zone::constants::FALLBACK_RING_WIDTH;
use crate::zone::sampling::{GridShape, HeightSample};
use crate::zone::scoring::{assess, Frontline};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub rect: Rect,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Committed(Rect),
}

/// Search cursor for one conflict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSearchJob {
    pub key: ConflictKey,
    frontline: Frontline,
    center: (i32, i32),
    half_sizes: Vec<i32>,
    radii: Vec<i32>,
    size_idx: usize,
    radius_idx: usize,
    offset_idx: usize,
    best_passing: Option<ScoredCandidate>,
    best_any: Option<ScoredCandidate>,
    fallback: Rect,
    committed: Option<Rect>,
    evaluated: u32,
    skipped: u32,
    #[serde(default)]
    raw: Option<RawSweep>,
}

/// Territory-only sweep used once no candidate could be scored
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawSweep {
    ring: usize,
    offset_idx: usize,
    /// Fewest claimed samples seen, never counting a fully claimed rectangle
    least_claimed: Option<(u32, Rect)>,
}

/// Offsets of the ring currently being swept, rebuilt when the radius changes
struct RingCache {
    radius_idx: usize,
    offsets: Vec<(i32, i32)>,
}

impl ZoneSearchJob {
    /// Set up a search between two anchor footprints
    ///
    /// An anchor is a faction's claimed bounds, or a single block when the
    /// faction holds no land.
    pub fn new(key: ConflictKey, anchor_a: Rect, anchor_b: Rect, config: &ZoneSearchConfig) -> Self {
        let (near_a, near_b) = anchor_a.closest_points(&anchor_b);
        let frontline = Frontline::new(near_a, near_b);
        let mid = frontline.center();
        let center = (mid.x.round() as i32, mid.z.round() as i32);

        let footprint = (anchor_a.half_extent() + anchor_b.half_extent()) / 2.0;
        let half_sizes = half_size_sequence(footprint, frontline.length(), config);
        let fallback = Rect::centered(center.0, center.1, config.min_half_size);

        tracing::debug!(
            "Zone search for {:?}: center {:?}, half sizes {:?}",
            key,
            center,
            half_sizes
        );

        Self {
            key,
            frontline,
            center,
            half_sizes,
            radii: config.search_radii.clone(),
            size_idx: 0,
            radius_idx: 0,
            offset_idx: 0,
            best_passing: None,
            best_any: None,
            fallback,
            committed: None,
            evaluated: 0,
            skipped: 0,
            raw: None,
        }
    }

    pub fn frontline(&self) -> &Frontline {
        &self.frontline
    }

    pub fn half_sizes(&self) -> &[i32] {
        &self.half_sizes
    }

    pub fn best_passing(&self) -> Option<ScoredCandidate> {
        self.best_passing
    }

    pub fn best_any(&self) -> Option<ScoredCandidate> {
        self.best_any
    }

    pub fn fallback(&self) -> Rect {
        self.fallback
    }

    pub fn committed(&self) -> Option<Rect> {
        self.committed
    }

    /// Candidates actually scored
    pub fn evaluated(&self) -> u32 {
        self.evaluated
    }

    /// Candidates passed over for territory or unloaded terrain
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    /// Cursor position as (half-size index, radius index, ring offset index)
    pub fn cursor(&self) -> (usize, usize, usize) {
        (self.size_idx, self.radius_idx, self.offset_idx)
    }

    /// Advance the search within one tick's budget
    ///
    /// Always advances at least one candidate, so a zero budget still makes
    /// progress. Once committed, keeps returning the same zone.
    pub fn step<W>(&mut self, world: &W, config: &ZoneSearchConfig) -> JobStatus
    where
        W: TerrainOracle + TerritoryMap + ?Sized,
    {
        if let Some(zone) = self.committed {
            return JobStatus::Committed(zone);
        }

        let started = Instant::now();
        let budget = config.time_budget();
        let mut ring: Option<RingCache> = None;
        let mut visited = 0u32;

        loop {
            if visited > 0 && (visited >= config.max_candidates_per_tick || started.elapsed() >= budget) {
                return JobStatus::Pending;
            }

            if self.raw.is_some() {
                visited += 1;
                if let Some(zone) = self.raw_step(&mut ring, world, config) {
                    return JobStatus::Committed(zone);
                }
                continue;
            }

            let Some(candidate) = self.next_candidate(&mut ring, config.candidate_step) else {
                if let Some(zone) = self.finish() {
                    return JobStatus::Committed(zone);
                }
                // Nothing scored: switch to the territory-only sweep
                self.raw = Some(RawSweep::default());
                ring = None;
                continue;
            };
            visited += 1;

            if let Some(zone) = self.evaluate(candidate, world, config) {
                return JobStatus::Committed(zone);
            }
        }
    }

    /// Pull the next candidate rectangle and move the cursor past it
    fn next_candidate(&mut self, ring: &mut Option<RingCache>, step: i32) -> Option<Rect> {
        loop {
            let half = *self.half_sizes.get(self.size_idx)?;

            let Some(&radius) = self.radii.get(self.radius_idx) else {
                self.size_idx += 1;
                self.radius_idx = 0;
                self.offset_idx = 0;
                continue;
            };

            if ring.as_ref().map_or(true, |r| r.radius_idx != self.radius_idx) {
                let inner = self.radius_idx.checked_sub(1).map(|i| self.radii[i]);
                *ring = Some(RingCache {
                    radius_idx: self.radius_idx,
                    offsets: ring_offsets(radius, inner, step),
                });
            }

            let offset = ring
                .as_ref()
                .and_then(|r| r.offsets.get(self.offset_idx).copied());

            match offset {
                Some((dx, dz)) => {
                    self.offset_idx += 1;
                    return Some(Rect::centered(self.center.0 + dx, self.center.1 + dz, half));
                }
                None => {
                    self.radius_idx += 1;
                    self.offset_idx = 0;
                }
            }
        }
    }

    /// Score one candidate; returns the zone if it commits the search
    fn evaluate<W>(&mut self, rect: Rect, world: &W, config: &ZoneSearchConfig) -> Option<Rect>
    where
        W: TerrainOracle + TerritoryMap + ?Sized,
    {
        if overlaps_territory(&rect, world, config) {
            self.skipped += 1;
            return None;
        }

        let Some(sample) = HeightSample::collect(world, &rect, config) else {
            self.skipped += 1;
            return None;
        };

        let quality = assess(&sample, config);
        let score = quality.score + self.frontline.penalty(rect.center(), config);
        let candidate = ScoredCandidate { rect, score };
        self.evaluated += 1;

        if self.best_any.map_or(true, |best| score < best.score) {
            self.best_any = Some(candidate);
        }

        if quality.passes && self.best_passing.map_or(true, |best| score < best.score) {
            self.best_passing = Some(candidate);
            self.committed = Some(rect);
            tracing::info!(
                "Zone committed for {:?}: {:?} (score {:.2}, {} evaluated)",
                self.key,
                rect,
                score,
                self.evaluated
            );
            return Some(rect);
        }

        None
    }

    /// Cursor exhausted without a passing candidate; commits the best scored
    /// one, if any was scored
    fn finish(&mut self) -> Option<Rect> {
        let zone = match (self.best_passing, self.best_any) {
            (Some(best), _) => best.rect,
            (None, Some(best)) => {
                tracing::warn!(
                    "No passing zone for {:?}; using best overall {:?} (score {:.2})",
                    self.key,
                    best.rect,
                    best.score
                );
                best.rect
            }
            (None, None) => return None,
        };
        self.committed = Some(zone);
        Some(zone)
    }

    /// Advance the territory-only sweep by one candidate
    ///
    /// Rings follow the configured radii, then keep widening out to
    /// `fallback_radius_limit`. The first minimum-size rectangle with no
    /// claimed sample commits. Past the limit the least claimed rectangle
    /// seen is used, and the default rectangle only if every one was fully
    /// claimed.
    fn raw_step<W>(&mut self, cache: &mut Option<RingCache>, world: &W, config: &ZoneSearchConfig) -> Option<Rect>
    where
        W: TerritoryMap + ?Sized,
    {
        let mut sweep = self.raw.take().unwrap_or_default();

        let zone = loop {
            let radius = fallback_ring_radius(&self.radii, sweep.ring);
            if radius > config.fallback_radius_limit {
                let zone = sweep.least_claimed.map_or(self.fallback, |(_, rect)| rect);
                tracing::warn!(
                    "No unclaimed zone for {:?} within {}; using least claimed {:?}",
                    self.key,
                    config.fallback_radius_limit,
                    zone
                );
                break Some(zone);
            }

            if cache.as_ref().map_or(true, |c| c.radius_idx != sweep.ring) {
                let inner = sweep.ring.checked_sub(1).map(|i| fallback_ring_radius(&self.radii, i));
                *cache = Some(RingCache {
                    radius_idx: sweep.ring,
                    offsets: ring_offsets(radius, inner, config.candidate_step),
                });
            }

            let offset = cache.as_ref().and_then(|c| c.offsets.get(sweep.offset_idx).copied());
            let Some((dx, dz)) = offset else {
                sweep.ring += 1;
                sweep.offset_idx = 0;
                continue;
            };
            sweep.offset_idx += 1;

            let rect = Rect::centered(self.center.0 + dx, self.center.1 + dz, config.min_half_size);
            let (claimed, total) = claimed_samples(&rect, world, config);
            if claimed == 0 {
                tracing::warn!("No evaluable zone for {:?}; using raw fallback {:?}", self.key, rect);
                break Some(rect);
            }
            if claimed < total && sweep.least_claimed.map_or(true, |(least, _)| claimed < least) {
                sweep.least_claimed = Some((claimed, rect));
            }
            break None;
        };

        self.raw = Some(sweep);
        if zone.is_some() {
            self.committed = zone;
        }
        zone
    }
}

/// Outer radius of fallback ring `ring`: the configured radii, then steps of
/// [`FALLBACK_RING_WIDTH`] past the last one
fn fallback_ring_radius(radii: &[i32], ring: usize) -> i32 {
    match radii.get(ring) {
        Some(&radius) => radius,
        None => {
            let last = radii.last().copied().unwrap_or(0);
            let beyond = (ring - radii.len() + 1) as i32;
            last.saturating_add(beyond.saturating_mul(FALLBACK_RING_WIDTH))
        }
    }
}

/// Keeps the half-size loop finite for an unvalidated shrink factor
const MAX_SHRINK: f32 = 0.95;

/// Half-sizes from the preferred size down to the minimum, largest first
pub fn half_size_sequence(footprint_half: f32, distance: f32, config: &ZoneSearchConfig) -> Vec<i32> {
    let min = config.min_half_size;
    let preferred = footprint_half
        .max(distance / 4.0)
        .clamp(min as f32, config.max_half_size as f32);

    let mut sizes = Vec::new();
    let mut half = preferred;
    loop {
        let rounded = half.round() as i32;
        if rounded <= min {
            break;
        }
        if sizes.last() != Some(&rounded) {
            sizes.push(rounded);
        }
        half *= config.half_size_shrink.clamp(0.0, MAX_SHRINK);
    }
    sizes.push(min);
    sizes
}

/// Lattice offsets within `radius` and outside `inner`, nearest first, ties
/// broken by angle
///
/// A radius of zero is the center alone; with no inner radius the center is
/// included.
pub fn ring_offsets(radius: i32, inner: Option<i32>, step: i32) -> Vec<(i32, i32)> {
    let step = step.max(1);
    let r_sq = (radius as i64).pow(2);
    let inner_sq = inner.map(|r| (r as i64).pow(2));
    let span = radius / step;

    let mut offsets = Vec::new();
    for i in -span..=span {
        for j in -span..=span {
            let (dx, dz) = (i * step, j * step);
            let d_sq = (dx as i64).pow(2) + (dz as i64).pow(2);
            if d_sq > r_sq {
                continue;
            }
            if inner_sq.is_some_and(|inner| d_sq <= inner) {
                continue;
            }
            offsets.push((dx, dz));
        }
    }

    offsets.sort_by_key(|&(dx, dz)| {
        let d_sq = (dx as i64).pow(2) + (dz as i64).pow(2);
        (d_sq, OrderedFloat((dz as f32).atan2(dx as f32)))
    });
    offsets
}

/// Blocks checked against territory: the sampling lattice plus the max edges,
/// which the lattice can stop short of
fn territory_samples(rect: &Rect, config: &ZoneSearchConfig) -> impl Iterator<Item = (i32, i32)> {
    let shape = GridShape::fit(rect, config.sample_step, config.max_samples);
    let xs: Vec<i32> = (0..shape.cols)
        .map(|col| rect.min_x + col as i32 * shape.step)
        .chain(std::iter::once(rect.max_x))
        .collect();
    let zs: Vec<i32> = (0..shape.rows)
        .map(|row| rect.min_z + row as i32 * shape.step)
        .chain(std::iter::once(rect.max_z))
        .collect();

    xs.into_iter()
        .flat_map(move |x| zs.clone().into_iter().map(move |z| (x, z)))
}

/// True if any sampled block of the rectangle is claimed by any faction
fn overlaps_territory<W>(rect: &Rect, world: &W, config: &ZoneSearchConfig) -> bool
where
    W: TerritoryMap + ?Sized,
{
    territory_samples(rect, config).any(|(x, z)| world.owner_at(x, z).is_some())
}

/// (claimed, total) sampled blocks of the rectangle
fn claimed_samples<W>(rect: &Rect, world: &W, config: &ZoneSearchConfig) -> (u32, u32)
where
    W: TerritoryMap + ?Sized,
{
    territory_samples(rect, config).fold((0, 0), |(claimed, total), (x, z)| {
        let hit = world.owner_at(x, z).is_some() as u32;
        (claimed + hit, total + 1)
    })
}

/// FIFO of pending searches; one job advances per tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneAllocator {
    queue: VecDeque<ZoneSearchJob>,
}

impl ZoneAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a job; ignored if a search for the same conflict is pending
    pub fn enqueue(&mut self, job: ZoneSearchJob) -> bool {
        if self.contains(job.key) {
            return false;
        }
        self.queue.push_back(job);
        true
    }

    pub fn contains(&self, key: ConflictKey) -> bool {
        self.queue.iter().any(|job| job.key == key)
    }

    /// Drop the pending search for a conflict
    pub fn cancel(&mut self, key: ConflictKey) -> bool {
        let before = self.queue.len();
        self.queue.retain(|job| job.key != key);
        before != self.queue.len()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn job(&self, key: ConflictKey) -> Option<&ZoneSearchJob> {
        self.queue.iter().find(|job| job.key == key)
    }

    /// Step the front job; a job still pending goes to the back of the queue
    pub fn advance<W>(&mut self, world: &W, config: &ZoneSearchConfig) -> Option<(ConflictKey, Rect)>
    where
        W: TerrainOracle + TerritoryMap + ?Sized,
    {
        let mut job = self.queue.pop_front()?;
        match job.step(world, config) {
            JobStatus::Committed(zone) => Some((job.key, zone)),
            JobStatus::Pending => {
                self.queue.push_back(job);
                None
            }
        }
    }
}
