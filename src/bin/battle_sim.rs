//! Headless Battle Simulator
//!
//! Declares a conflict between two factions on a sandbox world, lets the zone
//! search run, fights the battle to its end and prints a report.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use warfront::battle::{BattleEventType, Belligerent, Directory, EndReason, Muster, SettlementReport};
use warfront::core::{ConflictKey, FactionId, Rect, Vec2, WarfrontConfig};
use warfront::world::{Heightmap, ResourceKind, Sandbox};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Terrain {
    Flat,
    Hills,
    Ravine,
    Flooded,
}

/// Headless Battle Simulator - zone search plus a full battle on a sandbox world
#[derive(Parser, Debug)]
#[command(name = "battle_sim")]
#[command(about = "Run a sandbox battle from declaration to settlement")]
struct Args {
    /// Distance between the two faction seats, in blocks
    #[arg(long, default_value_t = 400)]
    distance: i32,

    /// Terrain preset
    #[arg(long, value_enum, default_value_t = Terrain::Flat)]
    terrain: Terrain,

    /// Melee soldiers per side
    #[arg(long, default_value_t = 24)]
    melee: u32,

    /// Ranged soldiers per side
    #[arg(long, default_value_t = 12)]
    ranged: u32,

    /// Reserve tickets per side
    #[arg(long, default_value_t = 30)]
    reserves: u32,

    /// Maximum ticks before giving up
    #[arg(long, default_value_t = 20_000)]
    max_ticks: u64,

    /// Zone search budget per tick, in microseconds
    #[arg(long)]
    budget_micros: Option<u64>,

    /// TOML file overriding the default configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,
}

#[derive(Serialize)]
struct SimReport {
    seed: u64,
    terrain: String,
    zone: Option<Rect>,
    zone_ticks: Option<u64>,
    ticks: u64,
    outcome: Option<String>,
    settlement: Option<SettlementReport>,
    winner_gold: u64,
    loser_gold: u64,
    casualty_events: usize,
    relocations: usize,
    elapsed_ms: u128,
}

fn terrain_for(preset: Terrain, distance: i32, seed: u64) -> Heightmap {
    let reach = distance / 2 + 256;
    let bounds = Rect::new(-reach, -reach, reach, reach);
    match preset {
        Terrain::Flat => Heightmap::flat(64),
        Terrain::Hills => Heightmap::hills(64, bounds, 6.0, 24, seed),
        Terrain::Ravine => Heightmap::flat(64).with_trench(Rect::new(-6, -reach, 6, reach), 20),
        Terrain::Flooded => Heightmap::flooded(62),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warfront=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);

    let mut config = match &args.config {
        Some(path) => WarfrontConfig::load(path).unwrap_or_else(|e| {
            eprintln!("Warning: failed to load config {}: {}", path.display(), e);
            eprintln!("Using default configuration");
            WarfrontConfig::default()
        }),
        None => WarfrontConfig::default(),
    };
    if let Some(budget) = args.budget_micros {
        config.zone.time_budget_micros = budget;
    }

    let started = Instant::now();
    let (attacker, defender) = (FactionId(1), FactionId(2));
    let half = args.distance as f32 / 2.0;

    let mut world = Sandbox::new(terrain_for(args.terrain, args.distance, seed), seed);
    world.add_observer(attacker, Vec2::ZERO);
    for faction in [attacker, defender] {
        world.deposit(faction, ResourceKind::Gold, 1_000);
        world.deposit(faction, ResourceKind::Food, 500);
    }

    let muster = |faction| Muster::new(faction, args.melee, args.ranged, args.reserves).with_captain();
    let mut directory = match Directory::new(config, seed) {
        Ok(directory) => directory,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return;
        }
    };
    let key = match directory.declare_conflict(
        Belligerent::new(attacker, Vec2::new(-half, 0.0)).with_muster(muster(attacker)),
        Belligerent::new(defender, Vec2::new(half, 0.0)).with_muster(muster(defender)),
        &world,
    ) {
        Ok(key) => key,
        Err(e) => {
            eprintln!("Conflict not declared: {}", e);
            std::process::exit(1);
        }
    };

    let mut report = SimReport {
        seed,
        terrain: format!("{:?}", args.terrain),
        zone: None,
        zone_ticks: None,
        ticks: 0,
        outcome: None,
        settlement: None,
        winner_gold: 0,
        loser_gold: 0,
        casualty_events: 0,
        relocations: 0,
        elapsed_ms: 0,
    };

    while report.ticks < args.max_ticks {
        report.ticks += 1;
        let tick = directory.tick(&mut world);
        world.step();

        for (k, zone) in &tick.zones_committed {
            if *k == key {
                report.zone = Some(*zone);
                report.zone_ticks = Some(report.ticks);
                // Walk the observer onto the battlefield so the battle is not abandoned
                world.clear_observers();
                world.add_observer(attacker, zone.center());
            }
        }

        for event in &tick.events {
            match event.event_type {
                BattleEventType::UnitLost { .. }
                | BattleEventType::LeaderKilled { .. } => report.casualty_events += 1,
                BattleEventType::UnitRelocated { .. } => report.relocations += 1,
                _ => {}
            }
            if args.format == "text" {
                eprintln!("  [{}] {:?}: {}", event.tick, event.event_type, event.description);
            }
        }

        if let Some(settlement) = tick.settlements.into_iter().find(|s| s.decision.conflict == key) {
            report.outcome = Some(describe(settlement.decision.reason, key));
            report.winner_gold = world.balance(settlement.decision.winner, ResourceKind::Gold);
            report.loser_gold = world.balance(settlement.decision.loser, ResourceKind::Gold);
            report.settlement = Some(settlement);
            break;
        }
    }

    if report.settlement.is_none() {
        directory.call_off(attacker, defender, &mut world);
    }
    report.elapsed_ms = started.elapsed().as_millis();

    if args.format == "json" {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize report: {}", e),
        }
    } else {
        println!("Seed: {}", report.seed);
        println!("Terrain: {}", report.terrain);
        println!("Zone: {:?} (after {:?} ticks)", report.zone, report.zone_ticks);
        println!("Ticks: {}", report.ticks);
        println!("Outcome: {}", report.outcome.as_deref().unwrap_or("undecided"));
        println!("Casualties: {}, relocations: {}", report.casualty_events, report.relocations);
        println!("Gold: winner {}, loser {}", report.winner_gold, report.loser_gold);
    }
}

fn describe(reason: EndReason, key: ConflictKey) -> String {
    match reason {
        EndReason::MoraleCollapse(side) => format!("{:?}: side {:?} routed", key, side),
        EndReason::Exhaustion(side) => format!("{:?}: side {:?} exhausted", key, side),
        EndReason::Surrender(side) => format!("{:?}: side {:?} surrendered", key, side),
        EndReason::Abandoned => format!("{:?}: abandoned, forced peace", key),
    }
}
