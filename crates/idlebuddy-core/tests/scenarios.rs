//! End-to-end scenarios through the public API.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use idlebuddy_core::battle::BattlePhase;
use idlebuddy_core::buddy::{Behavior, BuddyState};
use idlebuddy_core::deadline::DeadlineTracker;
use idlebuddy_core::economy::Economy;
use idlebuddy_core::events::topics;
use idlebuddy_core::focus::{FocusState, FocusTimer, SessionType};
use idlebuddy_core::storage::{keys, persistence, BuddyConfig, Config, DeadlineConfig, FocusConfig};
use idlebuddy_core::{
    BattleState, Buddy, Command, Database, Event, EventBus, Game, MemoryStore, Outcome, Persistence,
    Scheduler, TimerKind,
};
use serde_json::json;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 14, 10, 0, 0).unwrap()
}

fn record(bus: &EventBus, topic: &str) -> Rc<RefCell<Vec<Event>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    bus.subscribe(topic, move |e| {
        sink.borrow_mut().push(e.clone());
        Ok(())
    })
    .unwrap();
    seen
}

#[test]
fn scenario_a_ten_clicks_buy_a_miner() {
    let mut economy = Economy::new(EventBus::new());
    assert_eq!(economy.state().price_of("basicMiner"), Some(10));
    for _ in 0..10 {
        economy.click();
    }
    assert_eq!(economy.state().coins, 10.0);

    economy.purchase("basicMiner").unwrap();
    let state = economy.state();
    assert_eq!(state.coins, 0.0);
    assert_eq!(state.upgrades["basicMiner"].count, 1);
    assert_eq!(state.coins_per_second, 2.0);
}

#[test]
fn scenario_b_work_session_completes_once() {
    let bus = EventBus::new();
    let completed = record(&bus, topics::FOCUS_COMPLETED);
    let mut scheduler = Scheduler::new(t0());
    let mut timer = FocusTimer::new(FocusConfig::default(), bus);

    timer.start_work(&mut scheduler, Some(25)).unwrap();
    assert_eq!(timer.remaining_seconds(), 1500);

    let mut ticks = 0;
    let end = t0() + Duration::hours(1);
    while let Some(fired) = scheduler.pop_due(end) {
        assert_eq!(fired.kind, TimerKind::FocusCountdown);
        timer.tick(&mut scheduler);
        ticks += 1;
    }
    assert_eq!(ticks, 1500);
    assert_eq!(timer.session().completed_today, 1);
    assert_eq!(timer.state(), FocusState::Idle);
    assert_eq!(completed.borrow().len(), 1);
    assert!(matches!(
        completed.borrow()[0],
        Event::FocusCompleted {
            session_type: SessionType::Work,
            ..
        }
    ));
}

#[test]
fn scenario_c_urgent_notice_fires_once() {
    let bus = EventBus::new();
    let urgent = record(&bus, topics::DDL_URGENT);
    let mut tracker = DeadlineTracker::new(DeadlineConfig::default(), bus);
    let task = tracker
        .add_task("Hand in thesis", t0() + Duration::minutes(90), None, t0())
        .unwrap();

    tracker.scan_deadlines(t0());
    assert_eq!(urgent.borrow().len(), 1);
    assert!(tracker.get(&task.id).unwrap().reminded);

    tracker.scan_deadlines(t0() + Duration::minutes(30));
    assert_eq!(urgent.borrow().len(), 1);
}

#[test]
fn scenario_d_neglected_buddy_hits_zero_and_sleeps() {
    let mut scheduler = Scheduler::new(t0());
    let mut state = BuddyState::new(t0() - Duration::hours(2));
    state.mood = 100.0;
    let mut buddy = Buddy::from_state(state, BuddyConfig::default(), EventBus::new());

    for _ in 0..334 {
        buddy.decay_tick(&mut scheduler, &[]);
    }
    assert_eq!(buddy.state().mood, 0.0);
    assert_eq!(buddy.state().behavior, Behavior::Sleepy);
}

#[test]
fn scenario_e_deterministic_first_wave() {
    let mut config = Config::default();
    config.battle.jitter = 0.0;
    config.battle.seed = Some(1);
    let mut game = Game::new(config, t0());
    let victories = record(game.bus(), topics::BATTLE_VICTORY);

    // Crits still roll at the player's default rate.
    game.execute(Command::StartBattle { wave: Some(1) }).unwrap();
    assert_eq!(game.battle_state().enemies[0].health, 50.0);
    game.advance(Duration::seconds(60));

    assert_eq!(game.battle_state().phase, BattlePhase::Victory);
    assert_eq!(victories.borrow().len(), 1);
    let player_hits: Vec<String> = game
        .battle_log()
        .into_iter()
        .map(|e| e.text)
        .filter(|t| t.starts_with("Hero hits"))
        .collect();
    assert!(!player_hits.is_empty());
    for text in &player_hits {
        assert!(
            text.contains(" for 13") || text.contains("(critical)"),
            "unexpected hit: {text}"
        );
    }
}

#[test]
fn scenario_e_without_crits_follows_fixed_damage() {
    let mut store = MemoryStore::new();
    let mut saved = BattleState::default();
    saved.player.crit_rate = 0.0;
    persistence::write(&mut store, keys::BATTLE, &saved, t0()).unwrap();

    let mut config = Config::default();
    config.battle.jitter = 0.0;
    config.battle.seed = Some(1);
    let mut game = Game::load(config, &mut store, t0()).unwrap();
    let victories = record(game.bus(), topics::BATTLE_VICTORY);
    game.execute(Command::StartBattle { wave: Some(1) }).unwrap();

    let mut trajectory = vec![game.battle_state().enemies[0].health];
    for _ in 0..60 {
        game.advance(Duration::seconds(1));
        let state = game.battle_state();
        if let Some(enemy) = state.enemies.first() {
            if trajectory.last() != Some(&enemy.health) {
                trajectory.push(enemy.health);
            }
        }
        if state.phase != BattlePhase::InBattle {
            break;
        }
    }
    assert_eq!(&trajectory[..4], &[50.0, 37.0, 24.0, 11.0]);
    assert!(trajectory[4..].iter().all(|hp| *hp == 0.0));

    let state = game.battle_state();
    assert_eq!(state.phase, BattlePhase::Victory);
    assert!((10..20).contains(&state.gold), "gold {}", state.gold);
    assert_eq!(state.exp, 5);
    assert_eq!(state.level, 1);

    let victories = victories.borrow();
    assert_eq!(victories.len(), 1);
    match &victories[0] {
        Event::BattleVictory { wave, gold, exp } => {
            assert_eq!(*wave, 1);
            assert_eq!(*gold, state.gold);
            assert_eq!(*exp, 5);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn deadline_due_right_now_raises_no_notice() {
    let bus = EventBus::new();
    let urgent = record(&bus, topics::DDL_URGENT);
    let approaching = record(&bus, topics::DDL_APPROACHING);
    let overdue = record(&bus, topics::DDL_OVERDUE);
    let mut tracker = DeadlineTracker::new(DeadlineConfig::default(), bus);
    let task = tracker.add_task("Due now", t0(), None, t0()).unwrap();

    let report = tracker.scan_deadlines(t0());
    assert!(report.is_empty());
    assert!(urgent.borrow().is_empty());
    assert!(approaching.borrow().is_empty());
    assert!(overdue.borrow().is_empty());
    assert!(!tracker.get(&task.id).unwrap().reminded);

    // One second later it is overdue.
    let report = tracker.scan_deadlines(t0() + Duration::seconds(1));
    assert_eq!(report.overdue, vec![task.id.clone()]);
    assert_eq!(overdue.borrow().len(), 1);
}

#[test]
fn deadline_a_day_or_more_away_stays_silent() {
    let bus = EventBus::new();
    let approaching = record(&bus, topics::DDL_APPROACHING);
    let mut tracker = DeadlineTracker::new(DeadlineConfig::default(), bus);
    tracker
        .add_task("Exactly a day", t0() + Duration::hours(24), None, t0())
        .unwrap();
    tracker
        .add_task("Next week", t0() + Duration::days(7), None, t0())
        .unwrap();

    assert!(tracker.scan_deadlines(t0()).is_empty());
    assert!(approaching.borrow().is_empty());

    let report = tracker.scan_deadlines(t0() + Duration::seconds(1));
    assert_eq!(report.approaching.len(), 1);
}

#[test]
fn game_state_survives_a_database_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("idlebuddy.db");
    let mut config = Config::default();
    config.economy.lottery_seed = Some(9);

    let mut game = Game::new(config.clone(), t0());
    for _ in 0..40 {
        game.execute(Command::Click).unwrap();
    }
    game.execute(Command::Purchase {
        upgrade_id: "basicMiner".into(),
    })
    .unwrap();
    let Outcome::DeadlineAdded(task) = game
        .execute(Command::AddDeadline {
            name: "Review PR".into(),
            deadline: t0() + Duration::days(2),
            description: None,
        })
        .unwrap()
    else {
        panic!("expected the added task");
    };
    game.execute(Command::StartFocusWork { minutes: Some(1) })
        .unwrap();
    game.advance(Duration::seconds(60));

    {
        let mut db = Database::open_at(&path).unwrap();
        game.save(&mut db).unwrap();
        for (report, at) in game.take_finished_sessions() {
            db.record_session(&report, at).unwrap();
        }
    }
    let before = game.snapshot();

    let mut db = Database::open_at(&path).unwrap();
    let restored = Game::load(config, &mut db, game.now()).unwrap();
    let after = restored.snapshot();
    assert_eq!(after.economy.coins, before.economy.coins);
    assert_eq!(after.economy.upgrades, before.economy.upgrades);
    assert_eq!(after.focus.completed_today, 1);
    assert_eq!(after.deadlines.len(), 1);
    assert_eq!(after.deadlines[0].id, task.id);
    assert_eq!(after.buddy.level, before.buddy.level);

    let stats = db.stats_all(t0().date_naive()).unwrap();
    assert_eq!(stats.completed_work_sessions, 1);
    assert_eq!(stats.today_focus_min, 1);
}

#[test]
fn legacy_save_is_migrated_on_load() {
    let mut store = MemoryStore::new();
    store
        .save(
            keys::LEGACY_GAME_STATE,
            &json!({
                "coins": 250.0,
                "totalCoinsEarned": 900.0,
                "totalClicks": 300,
                "upgrades": {"basicMiner": {"count": 2}, "advancedMiner": {"count": 1}}
            }),
        )
        .unwrap();

    let game = Game::load(Config::default(), &mut store, t0()).unwrap();
    let economy = game.economy_state();
    assert_eq!(economy.coins, 250.0);
    assert_eq!(economy.coins_per_second, 1.0 + 2.0 + 5.0);
    assert!(store.load(keys::LEGACY_GAME_STATE).unwrap().is_none());
    assert!(store.load(keys::ECONOMY).unwrap().is_some());
}

#[test]
fn cancelled_behavior_reversion_never_fires() {
    let mut scheduler = Scheduler::new(t0());
    let bus = EventBus::new();
    let changes = record(&bus, topics::BUDDY_BEHAVIOR_CHANGED);
    let mut buddy = Buddy::new(BuddyConfig::default(), bus, t0());

    buddy.change_behavior(&mut scheduler, Behavior::Happy, Duration::seconds(10));
    buddy.change_behavior(&mut scheduler, Behavior::Eating, Duration::seconds(30));

    let mut reverted_at = None;
    while let Some(fired) = scheduler.pop_due(t0() + Duration::minutes(5)) {
        if fired.kind == TimerKind::BehaviorRevert {
            buddy.revert_behavior(&mut scheduler, fired.id);
            reverted_at = Some(fired.at);
        }
    }
    // Only the latest reversion was armed.
    assert_eq!(reverted_at, Some(t0() + Duration::seconds(30)));
    assert_eq!(buddy.state().behavior, Behavior::Idle);
    assert_eq!(changes.borrow().len(), 3);
}
