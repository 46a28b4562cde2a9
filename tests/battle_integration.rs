//! Battle system integration tests
//!
//! Full declaration -> zone -> battle -> settlement runs against the sandbox
//! host, plus cancellation, command routing, anti-stall and save/load.

use warfront::battle::*;
use warfront::core::{BattleConfig, ConflictKey, EntityId, FactionId, Rect, Vec2, WarfrontConfig};
use warfront::world::{EntityHost, Heightmap, NavCommand, ResourceKind, Sandbox, UnitKind};

const ATTACKER: FactionId = FactionId(1);
const DEFENDER: FactionId = FactionId(2);

fn world(seed: u64) -> Sandbox {
    let mut world = Sandbox::new(Heightmap::flat(64), seed);
    world.add_observer(ATTACKER, Vec2::ZERO);
    for faction in [ATTACKER, DEFENDER] {
        world.deposit(faction, ResourceKind::Gold, 1_000);
        world.deposit(faction, ResourceKind::Timber, 333);
    }
    world
}

fn declare(directory: &mut Directory, world: &Sandbox, melee: u32, ranged: u32, reserves: u32) -> ConflictKey {
    directory
        .declare_conflict(
            Belligerent::new(ATTACKER, Vec2::new(-200.0, 0.0))
                .with_muster(Muster::new(ATTACKER, melee, ranged, reserves).with_captain()),
            Belligerent::new(DEFENDER, Vec2::new(200.0, 0.0))
                .with_muster(Muster::new(DEFENDER, melee, ranged, reserves).with_captain()),
            world,
        )
        .expect("conflict should be eligible")
}

/// Tick until the battle for `key` is running
fn start(directory: &mut Directory, world: &mut Sandbox, key: ConflictKey) {
    for _ in 0..200 {
        directory.tick(world);
        if directory.battle(key).is_some() {
            return;
        }
    }
    panic!("battle never started");
}

#[test]
fn test_battle_runs_to_settlement() {
    let mut world = world(21);
    let mut directory = Directory::new(WarfrontConfig::default(), 21).unwrap();
    let key = declare(&mut directory, &world, 8, 4, 4);

    let mut settlement = None;
    let mut summaries = 0;
    for _ in 0..40_000 {
        let report = directory.tick(&mut world);
        world.step();
        summaries += report.summaries.len();
        if let Some(s) = report.settlements.into_iter().next() {
            settlement = Some(s);
            break;
        }
    }

    let settlement = settlement.expect("battle should end");
    let decision = &settlement.decision;
    assert_eq!(decision.conflict, key);
    assert!(decision.reason.is_decisive());
    assert!(summaries > 0);
    assert!(directory.battle(key).is_none());
    assert!(directory.active_battles().is_empty());

    // Integer transfer with no leakage
    let winner_gold = world.balance(decision.winner, ResourceKind::Gold);
    let loser_gold = world.balance(decision.loser, ResourceKind::Gold);
    assert_eq!(winner_gold + loser_gold, 2_000);
    assert_eq!(loser_gold, 1_000 - 1_000 * decision.transfer_bp as u64 / 10_000);
    let timber = world.balance(decision.winner, ResourceKind::Timber) + world.balance(decision.loser, ResourceKind::Timber);
    assert_eq!(timber, 666);
    assert!(world.peace_treaties.contains(&(decision.winner, decision.loser)));
}

#[test]
fn test_summaries_push_on_cadence() {
    let mut world = world(4);
    let config = WarfrontConfig::default();
    let cadence = config.battle.summary_push_ticks;
    let mut directory = Directory::new(config, 4).unwrap();
    let key = declare(&mut directory, &world, 4, 0, 2);
    start(&mut directory, &mut world, key);

    let mut pushes = Vec::new();
    for _ in 0..(cadence * 3) {
        let report = directory.tick(&mut world);
        if !report.summaries.is_empty() {
            pushes.push(directory.current_tick());
            let own = report.summaries.iter().find(|s| s.side == Side::A).unwrap();
            assert!(own.summary.active);
            assert_eq!(own.summary.own_tickets, 2);
            assert_eq!(own.faction, ATTACKER);
        }
    }

    assert_eq!(pushes.len(), 3);
    assert!(pushes.iter().all(|t| t % cadence == 0));
}

#[test]
fn test_call_off_tears_down_battle() {
    let mut world = world(5);
    let mut directory = Directory::new(WarfrontConfig::default(), 5).unwrap();
    let key = declare(&mut directory, &world, 6, 2, 3);
    start(&mut directory, &mut world, key);

    let tracked: Vec<EntityId> = directory.battle(key).unwrap().combatants().map(|c| c.id).collect();
    world.nav_log.clear();

    assert!(directory.call_off(ATTACKER, DEFENDER, &mut world));

    assert!(directory.battle(key).is_none());
    assert!(!directory.is_tracked(key));
    assert!(tracked
        .iter()
        .all(|id| world.nav_log.contains(&NavCommand::Stop { entity: *id })));
    // No settlement on peace made outside battle
    assert_eq!(world.balance(ATTACKER, ResourceKind::Gold), 1_000);

    let report = directory.tick(&mut world);
    assert!(report.events.is_empty());
}

#[test]
fn test_commands_route_through_directory() {
    let mut world = world(6);
    let mut directory = Directory::new(WarfrontConfig::default(), 6).unwrap();
    let key = declare(&mut directory, &world, 4, 4, 0);
    start(&mut directory, &mut world, key);

    let zone = directory.battle(key).unwrap().zone;
    let commander = world
        .spawn(UnitKind::Captain, ATTACKER, zone.center(), Vec2::new(1.0, 0.0))
        .unwrap();
    let outsider = world
        .spawn(UnitKind::Captain, FactionId(9), zone.center(), Vec2::new(1.0, 0.0))
        .unwrap();

    assert_eq!(
        directory.enlist_commander(outsider, FactionId(9)),
        Err(CommandRejection::NoActiveBattle)
    );
    assert_eq!(directory.enlist_commander(commander, ATTACKER), Ok((key, Side::A)));

    assert_eq!(directory.select_group(commander), Ok(SelectedGroup::Ranged));
    let far = zone.center() + Vec2::new(500.0, 0.0);
    assert!(matches!(
        directory.order_move(commander, far, &world),
        Err(CommandRejection::OutOfRange { .. })
    ));
    let near = zone.center() + Vec2::new(8.0, 8.0);
    assert_eq!(directory.order_move(commander, near, &world), Ok(()));
    assert_eq!(directory.order_follow(commander), Ok(()));

    // Surrender ends the battle as a decisive win for the other side
    assert_eq!(directory.surrender(commander), Ok(Side::A));
    let report = directory.tick(&mut world);
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e.event_type, BattleEventType::SurrenderDeclared { side: Side::A })));
    let settlement = report.settlements.first().expect("surrender settles immediately");
    assert_eq!(settlement.decision.reason, EndReason::Surrender(Side::A));
    assert_eq!(settlement.decision.winner, DEFENDER);
    let (lo, hi) = WarfrontConfig::default().settlement.rout_transfer_bp;
    assert!(settlement.decision.transfer_bp >= lo && settlement.decision.transfer_bp <= hi);

    assert_eq!(directory.order_follow(commander), Err(CommandRejection::NoActiveBattle));
}

#[test]
fn test_stuck_unit_is_relocated() {
    let mut world = world(7);
    world.combat_enabled = false;
    let zone = Rect::centered(0, 0, 96);
    let mut battle = BattleInstance::deploy(
        ConflictKey::new(ATTACKER, DEFENDER),
        zone,
        Vec2::new(1.0, 0.0),
        [vec![Muster::new(ATTACKER, 6, 0, 0)], vec![Muster::new(DEFENDER, 6, 0, 0)]],
        BattleConfig::default(),
        7,
        &mut world,
    );

    let stuck = battle
        .combatants()
        .find(|c| c.side == Side::A && !c.is_leader)
        .map(|c| c.id)
        .unwrap();
    world.place(stuck, Vec2::new(-80.0, 80.0));
    world.set_stuck(stuck, true);

    for _ in 0..300 {
        battle.run_tick(&mut world);
        world.step();
    }

    assert!(world
        .nav_log
        .iter()
        .any(|cmd| matches!(cmd, NavCommand::Teleport { entity, .. } if *entity == stuck)));
    assert!(battle
        .battle_log
        .iter()
        .any(|e| matches!(e.event_type, BattleEventType::UnitRelocated { entity } if entity == stuck)));
    let position = world.position(stuck).unwrap();
    assert!(zone.contains(position));
}

#[test]
fn test_reinforcements_never_exceed_tickets() {
    let mut world = world(8);
    world.combat_enabled = false;
    let mut battle = BattleInstance::deploy(
        ConflictKey::new(ATTACKER, DEFENDER),
        Rect::centered(0, 0, 96),
        Vec2::new(1.0, 0.0),
        [vec![Muster::new(ATTACKER, 5, 0, 3)], vec![Muster::new(DEFENDER, 5, 0, 3)]],
        BattleConfig::default(),
        8,
        &mut world,
    );
    let start = battle.side(Side::A).pool(ATTACKER).unwrap().starting_strength() as usize;

    // Kill every attacker as soon as it appears
    for _ in 0..600 {
        let victims: Vec<EntityId> = battle
            .combatants()
            .filter(|c| c.side == Side::A)
            .map(|c| c.id)
            .collect();
        for id in victims {
            world.kill(id);
        }
        battle.run_tick(&mut world);

        let pool = battle.side(Side::A).pool(ATTACKER).unwrap();
        assert!(battle.living_of_faction(ATTACKER) + pool.remaining() as usize <= start);
        if battle.is_finished() {
            break;
        }
    }

    let outcome = battle.outcome.expect("attackers should be exhausted");
    assert_eq!(outcome.reason, EndReason::Exhaustion(Side::A));
    assert_eq!(battle.side(Side::A).tickets(), 0);
}

#[test]
fn test_morale_collapse_ends_battle_in_same_tick() {
    let mut world = world(10);
    world.combat_enabled = false;
    let mut config = BattleConfig::default();
    // One casualty empties morale
    config.morale_start = config.morale_base_loss;
    let mut battle = BattleInstance::deploy(
        ConflictKey::new(ATTACKER, DEFENDER),
        Rect::centered(0, 0, 64),
        Vec2::new(1.0, 0.0),
        [vec![Muster::new(ATTACKER, 4, 0, 5)], vec![Muster::new(DEFENDER, 4, 0, 5)]],
        config,
        10,
        &mut world,
    );
    let victim = battle
        .combatants()
        .find(|c| c.side == Side::B)
        .map(|c| c.id)
        .unwrap();
    world.kill(victim);

    let events = battle.run_tick(&mut world);

    assert_eq!(battle.tick, 1);
    assert!(battle.side(Side::B).morale.is_broken());
    assert!(battle.is_finished());
    let outcome = battle.outcome.unwrap();
    assert_eq!(outcome.reason, EndReason::MoraleCollapse(Side::B));
    assert_eq!(outcome.winner, Side::A);
    // Side B still has units and tickets, so only morale ended it
    assert!(battle.side(Side::B).tickets() > 0);
    assert!(battle.living_units(Side::B) > 0);
    assert!(events
        .events
        .iter()
        .any(|e| matches!(e.event_type, BattleEventType::BattleEnded { .. })));
}

#[test]
fn test_save_load_clamps_tickets_and_morale() {
    let mut world = world(9);
    let battle = BattleInstance::deploy(
        ConflictKey::new(ATTACKER, DEFENDER),
        Rect::centered(0, 0, 64),
        Vec2::new(1.0, 0.0),
        [vec![Muster::new(ATTACKER, 3, 0, 5)], vec![Muster::new(DEFENDER, 3, 0, 5)]],
        BattleConfig::default(),
        9,
        &mut world,
    );

    let mut value = serde_json::to_value(&battle).unwrap();
    value["sides"][0]["pools"][0]["remaining"] = serde_json::json!(-5);
    value["sides"][1]["pools"][0]["remaining"] = serde_json::json!(10_000);
    value["sides"][0]["morale"]["value"] = serde_json::json!(500.0);
    value["sides"][1]["morale"]["value"] = serde_json::json!(-20.0);

    let loaded: BattleInstance = serde_json::from_value(value).unwrap();

    assert_eq!(loaded.side(Side::A).tickets(), 0);
    assert_eq!(loaded.side(Side::B).tickets(), 8);
    assert_eq!(loaded.side(Side::A).morale.value(), 100.0);
    assert!(loaded.side(Side::B).morale.is_broken());
    assert_eq!(
        loaded.end_condition().map(|o| o.reason),
        Some(EndReason::MoraleCollapse(Side::B))
    );
}
