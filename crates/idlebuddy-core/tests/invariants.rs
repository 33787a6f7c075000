//! Property tests over random operation sequences.

use chrono::{DateTime, Duration, TimeZone, Utc};
use idlebuddy_core::buddy::{Buddy, CodeDelta, InteractAction};
use idlebuddy_core::economy::{Economy, LotteryTier};
use idlebuddy_core::focus::{FocusState, FocusTimer, SessionType};
use idlebuddy_core::storage::{BuddyConfig, FocusConfig};
use idlebuddy_core::{EventBus, Scheduler};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;

const UPGRADES: &[&str] = &[
    "basicMiner",
    "advancedMiner",
    "coinFactory",
    "quantumRig",
    "aiAssistant",
    "unknownThing",
];

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap()
}

#[derive(Debug, Clone)]
enum EconomyOp {
    Click,
    Purchase(usize),
    Tick(u32),
    Lottery(u8),
    Grant(u64),
}

fn economy_op() -> impl Strategy<Value = EconomyOp> {
    prop_oneof![
        4 => Just(EconomyOp::Click),
        3 => (0..UPGRADES.len()).prop_map(EconomyOp::Purchase),
        3 => (1u32..600).prop_map(EconomyOp::Tick),
        1 => (0u8..3).prop_map(EconomyOp::Lottery),
        1 => (0u64..500).prop_map(EconomyOp::Grant),
    ]
}

#[derive(Debug, Clone)]
enum BuddyOp {
    Decay,
    Interact(u8),
    Code(u32),
    FocusDone(u32),
    Wait(i64),
}

fn buddy_op() -> impl Strategy<Value = BuddyOp> {
    prop_oneof![
        4 => Just(BuddyOp::Decay),
        2 => (0u8..3).prop_map(BuddyOp::Interact),
        2 => (0u32..400).prop_map(BuddyOp::Code),
        1 => (1u32..90).prop_map(BuddyOp::FocusDone),
        1 => (1i64..7200).prop_map(BuddyOp::Wait),
    ]
}

proptest! {
    #[test]
    fn economy_stays_consistent(ops in prop::collection::vec(economy_op(), 1..120)) {
        let mut economy = Economy::new(EventBus::new());
        let mut rng = Mcg128Xsl64::seed_from_u64(3);
        let mut now = t0();
        let mut total = economy.state().total_coins_earned;

        for op in ops {
            match op {
                EconomyOp::Click => economy.click(),
                EconomyOp::Purchase(i) => {
                    let _ = economy.purchase(UPGRADES[i]);
                }
                EconomyOp::Tick(secs) => {
                    now += Duration::seconds(secs as i64);
                    economy.tick(secs as f64, now);
                }
                EconomyOp::Lottery(tier) => {
                    let tiers = [LotteryTier::Bronze, LotteryTier::Silver, LotteryTier::Gold];
                    let tier = tiers[tier as usize];
                    if let Ok(prize) = economy.draw(tier, &mut rng) {
                        economy.settle(&prize, now);
                    }
                }
                EconomyOp::Grant(n) => {
                    economy.grant(n, idlebuddy_core::economy::EarnSource::Reward)
                }
            }

            let state = economy.state();
            prop_assert!(state.coins >= 0.0);
            prop_assert!(state.total_coins_earned >= total);
            total = state.total_coins_earned;

            let expected = 1.0 + state
                .upgrades
                .values()
                .map(|u| u.count as f64 * u.production)
                .sum::<f64>();
            prop_assert!((state.coins_per_second - expected).abs() < 1e-9);
        }

        // Nothing changed, so nothing new unlocks.
        economy.check_achievements();
        prop_assert!(economy.check_achievements().is_empty());
    }

    #[test]
    fn buddy_mood_and_energy_stay_in_bounds(ops in prop::collection::vec(buddy_op(), 1..400)) {
        let mut scheduler = Scheduler::new(t0());
        let mut buddy = Buddy::new(BuddyConfig::default(), EventBus::new(), t0());
        buddy.start(&mut scheduler);

        for op in ops {
            match op {
                BuddyOp::Decay => {
                    buddy.decay_tick(&mut scheduler, &[]);
                }
                BuddyOp::Interact(i) => {
                    let actions = [InteractAction::Pet, InteractAction::Feed, InteractAction::Play];
                    let action = actions[i as usize];
                    buddy.interact(&mut scheduler, action);
                }
                BuddyOp::Code(lines) => {
                    buddy.on_code_changed(&mut scheduler, &CodeDelta { lines, file: None })
                }
                BuddyOp::FocusDone(minutes) => {
                    buddy.on_focus_completed(&mut scheduler, SessionType::Work, minutes, 1)
                }
                BuddyOp::Wait(secs) => {
                    let until = scheduler.now() + Duration::seconds(secs);
                    while let Some(fired) = scheduler.pop_due(until) {
                        if buddy.owns_revert(fired.id) {
                            buddy.revert_behavior(&mut scheduler, fired.id);
                        }
                    }
                    scheduler.advance_to(until);
                }
            }
            let state = buddy.state();
            prop_assert!((0.0..=100.0).contains(&state.mood), "mood {}", state.mood);
            prop_assert!((0.0..=100.0).contains(&state.energy), "energy {}", state.energy);
            prop_assert!(state.level >= 1);
            prop_assert!(state.exp >= 0.0);
            prop_assert!(state.unlocked_skins.contains(&state.current_skin));
        }
    }

    #[test]
    fn idle_focus_timer_only_accepts_starts(minutes in 1u32..120, long in any::<bool>()) {
        let mut scheduler = Scheduler::new(t0());
        let mut timer = FocusTimer::new(FocusConfig::default(), EventBus::new());

        prop_assert!(timer.pause(&mut scheduler).is_err());
        prop_assert!(timer.resume(&mut scheduler).is_err());
        prop_assert!(timer.stop(&mut scheduler).is_err());
        prop_assert!(timer.complete_session(&mut scheduler).is_err());
        prop_assert_eq!(timer.state(), FocusState::Idle);

        if long {
            prop_assert!(timer.start_break(&mut scheduler, Some(true)).is_ok());
        } else {
            prop_assert!(timer.start_work(&mut scheduler, Some(minutes)).is_ok());
            prop_assert_eq!(timer.remaining_seconds(), minutes * 60);
        }
        prop_assert!(timer.resume(&mut scheduler).is_err());
        prop_assert!(timer.start_work(&mut scheduler, None).is_err());
        prop_assert!(timer.pause(&mut scheduler).is_ok());
        prop_assert!(timer.pause(&mut scheduler).is_err());
        prop_assert!(timer.resume(&mut scheduler).is_ok());
    }
}
