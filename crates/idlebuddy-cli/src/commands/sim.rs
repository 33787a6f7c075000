use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use serde_json::json;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::session::{print_json, Session};

/// Jump virtual time forward. The next invocation starts from wall-clock
/// time again.
pub fn advance(seconds: u32) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open()?;
    let fired = session.game().advance(Duration::seconds(i64::from(seconds)));
    let events = session.take_events();
    let snapshot = session.game().snapshot();
    session.close()?;
    print_json(&json!({ "fired": fired, "events": events, "snapshot": snapshot }))
}

/// Follow wall-clock time, printing each event as one JSON line, until the
/// duration runs out or Ctrl-C arrives. Either way the game is saved.
pub fn run(duration: Option<u64>, tick_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    // The game is single-threaded, so everything stays on this thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(follow(duration, tick_ms))
}

async fn follow(duration: Option<u64>, tick_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open()?;
    session.game().start_autosave();

    let started = Instant::now();
    let limit = duration.map(StdDuration::from_secs);
    let mut ticker = tokio::time::interval(StdDuration::from_millis(tick_ms.max(10)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        if limit.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        tokio::select! {
            result = &mut interrupted => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                info!("interrupted, saving");
                break;
            }
            _ = ticker.tick() => {}
        }

        session.game().advance_to(Utc::now());
        for event in session.take_events() {
            println!("{}", serde_json::to_string(&event)?);
        }
        if let Err(e) = session.record_finished() {
            warn!(error = %e, "failed to record focus sessions");
        }
        if session.game().take_save_request() {
            if let Err(e) = session.persist() {
                warn!(error = %e, "autosave failed");
            }
        }
    }

    session.close()
}
