//! Zone search integration tests
//!
//! Drives `ZoneSearchJob` and `ZoneAllocator` against sandbox terrain the way
//! the directory does: one step per tick until a zone is committed.

use warfront::core::{ConflictKey, FactionId, Rect, ZoneSearchConfig};
use warfront::world::{Heightmap, Sandbox};
use warfront::zone::{JobStatus, ZoneAllocator, ZoneSearchJob};

fn key() -> ConflictKey {
    ConflictKey::new(FactionId(1), FactionId(2))
}

/// Step a job until it commits, returning the zone and the number of steps
fn run_to_commit(job: &mut ZoneSearchJob, world: &Sandbox, config: &ZoneSearchConfig) -> (Rect, usize) {
    for steps in 1..100_000 {
        if let JobStatus::Committed(zone) = job.step(world, config) {
            return (zone, steps);
        }
    }
    panic!("zone search never committed");
}

#[test]
fn test_clean_terrain_commits_first_candidate() {
    let config = ZoneSearchConfig::default();
    let world = Sandbox::new(Heightmap::flat(64), 0);
    let mut job = ZoneSearchJob::new(key(), Rect::point(0, 0), Rect::point(400, 0), &config);

    let (zone, steps) = run_to_commit(&mut job, &world, &config);

    assert_eq!(steps, 1);
    assert_eq!(zone, Rect::centered(200, 0, job.half_sizes()[0]));
    assert_eq!(job.evaluated(), 1);
    assert_eq!(job.best_passing().map(|c| c.rect), Some(zone));
}

#[test]
fn test_all_water_falls_back_to_best_overall() {
    let mut config = ZoneSearchConfig::default();
    config.search_radii = vec![0, 32];
    let world = Sandbox::new(Heightmap::flooded(62), 0);
    let mut job = ZoneSearchJob::new(key(), Rect::point(0, 0), Rect::point(400, 0), &config);

    let (zone, _) = run_to_commit(&mut job, &world, &config);

    assert!(job.best_passing().is_none());
    let best = job.best_any().expect("flooded candidates are still scored");
    assert_eq!(zone, best.rect);
    assert_eq!(job.committed(), Some(zone));
}

#[test]
fn test_zone_avoids_claimed_territory() {
    let config = ZoneSearchConfig::default();
    let mut world = Sandbox::new(Heightmap::flat(64), 0);
    let claim = Rect::new(150, -60, 250, 60);
    world.claim(FactionId(7), claim);

    let mut job = ZoneSearchJob::new(key(), Rect::point(0, 0), Rect::point(400, 0), &config);
    let (zone, _) = run_to_commit(&mut job, &world, &config);

    assert!(!zone.intersects(&claim));
    assert!(job.skipped() > 0);
}

#[test]
fn test_unloaded_terrain_is_skipped_not_scored() {
    let config = ZoneSearchConfig::default();
    let terrain = Heightmap::flat(64).with_loaded(Rect::new(-2000, -2000, -1900, -1900));
    let world = Sandbox::new(terrain, 0);
    let mut job = ZoneSearchJob::new(key(), Rect::point(0, 0), Rect::point(400, 0), &config);

    let (zone, _) = run_to_commit(&mut job, &world, &config);

    assert_eq!(job.evaluated(), 0);
    assert!(job.skipped() > 0);
    assert!(job.best_any().is_none());
    // Raw fallback: smallest size at the frontline center
    assert_eq!(zone, Rect::centered(200, 0, config.min_half_size));
}

#[test]
fn test_fallback_never_lands_inside_claimed_land() {
    let mut config = ZoneSearchConfig::default();
    config.max_candidates_per_tick = u32::MAX;
    config.time_budget_micros = u64::MAX / 2;
    let mut world = Sandbox::new(Heightmap::flat(64), 0);
    let claim = Rect::new(-2000, -2000, 2000, 2000);
    world.claim(FactionId(9), claim);

    let mut job = ZoneSearchJob::new(key(), Rect::point(0, 0), Rect::point(400, 0), &config);
    let (zone, _) = run_to_commit(&mut job, &world, &config);

    assert_eq!(job.evaluated(), 0);
    assert!(!claim.contains_rect(&zone));
    assert!(!zone.intersects(&claim));
    assert_eq!(zone.width(), Rect::centered(0, 0, config.min_half_size).width());
    // Only reachable by sweeping past the configured radii
    let last = *config.search_radii.last().unwrap() as f32;
    assert!(zone.center().distance(&job.frontline().center()) > last);
}

#[test]
fn test_bounded_fallback_takes_least_claimed() {
    let mut config = ZoneSearchConfig::default();
    config.max_candidates_per_tick = u32::MAX;
    config.time_budget_micros = u64::MAX / 2;
    config.fallback_radius_limit = *config.search_radii.last().unwrap();
    let mut world = Sandbox::new(Heightmap::flat(64), 0);
    let claim = Rect::new(-2000, -2000, 380, 2000);
    world.claim(FactionId(9), claim);

    let mut job = ZoneSearchJob::new(key(), Rect::point(0, 0), Rect::point(400, 0), &config);
    let (zone, _) = run_to_commit(&mut job, &world, &config);

    assert!(zone.intersects(&claim));
    assert!(!claim.contains_rect(&zone));
    assert!(zone.max_x > claim.max_x);
}

#[test]
fn test_zero_budget_resumes_to_same_zone() {
    let mut eager = ZoneSearchConfig::default();
    eager.max_candidates_per_tick = u32::MAX;
    eager.time_budget_micros = u64::MAX / 2;

    let mut starved = ZoneSearchConfig::default();
    starved.max_candidates_per_tick = 1;
    starved.time_budget_micros = 0;

    let terrain = Heightmap::flat(64).with_water(Rect::new(80, -160, 320, 160));
    let world = Sandbox::new(terrain, 0);

    let mut fast = ZoneSearchJob::new(key(), Rect::point(0, 0), Rect::point(400, 0), &eager);
    let mut slow = ZoneSearchJob::new(key(), Rect::point(0, 0), Rect::point(400, 0), &starved);

    let (fast_zone, fast_steps) = run_to_commit(&mut fast, &world, &eager);
    let (slow_zone, slow_steps) = run_to_commit(&mut slow, &world, &starved);

    assert_eq!(fast_zone, slow_zone);
    assert_eq!(fast_steps, 1);
    assert!(slow_steps > 1);
    // One candidate per tick
    assert_eq!((slow.evaluated() + slow.skipped()) as usize, slow_steps);
}

#[test]
fn test_ravine_is_not_chosen() {
    let config = ZoneSearchConfig::default();
    let ravine = Rect::new(196, -2000, 204, 2000);
    let world = Sandbox::new(Heightmap::flat(64).with_trench(ravine, 20), 0);
    let mut job = ZoneSearchJob::new(key(), Rect::point(0, 0), Rect::point(400, 0), &config);

    let (zone, _) = run_to_commit(&mut job, &world, &config);

    assert!(job.best_passing().is_some());
    assert!(!zone.intersects(&ravine));
}

#[test]
fn test_allocator_round_robins_pending_jobs() {
    let mut config = ZoneSearchConfig::default();
    config.max_candidates_per_tick = 1;
    config.time_budget_micros = 0;
    let world = Sandbox::new(Heightmap::flooded(62), 0);

    let first = ConflictKey::new(FactionId(1), FactionId(2));
    let second = ConflictKey::new(FactionId(3), FactionId(4));
    let mut allocator = ZoneAllocator::new();
    allocator.enqueue(ZoneSearchJob::new(first, Rect::point(0, 0), Rect::point(400, 0), &config));
    allocator.enqueue(ZoneSearchJob::new(second, Rect::point(0, 900), Rect::point(400, 900), &config));

    assert_eq!(allocator.advance(&world, &config), None);
    assert_eq!(allocator.advance(&world, &config), None);

    let progress = |k| allocator.job(k).map(|j| j.evaluated() + j.skipped());
    assert_eq!(progress(first), Some(1));
    assert_eq!(progress(second), Some(1));

    // Cancelling mid-search drops the job for good
    assert!(allocator.cancel(first));
    assert!(!allocator.contains(first));
    assert_eq!(allocator.len(), 1);
}

#[test]
fn test_job_survives_save_and_load() {
    let mut config = ZoneSearchConfig::default();
    config.max_candidates_per_tick = 1;
    config.time_budget_micros = 0;
    let world = Sandbox::new(Heightmap::flat(64).with_water(Rect::new(80, -160, 320, 160)), 0);

    let mut job = ZoneSearchJob::new(key(), Rect::point(0, 0), Rect::point(400, 0), &config);
    for _ in 0..3 {
        job.step(&world, &config);
    }

    let json = serde_json::to_string(&job).unwrap();
    let mut restored: ZoneSearchJob = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.cursor(), job.cursor());

    let (a, _) = run_to_commit(&mut job, &world, &config);
    let (b, _) = run_to_commit(&mut restored, &world, &config);
    assert_eq!(a, b);
}
