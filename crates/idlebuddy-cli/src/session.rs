//! One CLI invocation's view of the game: load, act, save.

use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;

use chrono::Utc;
use idlebuddy_core::events::topics;
use idlebuddy_core::{Command, Config, Database, Event, Game, Outcome, Subscription};
use serde::Serialize;
use serde_json::json;

/// Topics too chatty to echo: one event per second while timers run.
const QUIET: &[&str] = &[topics::FOCUS_TICK, topics::COINS_EARNED];

pub struct Session {
    game: Game,
    db: Database,
    events: Rc<RefCell<Vec<Event>>>,
    subscriptions: Vec<Subscription>,
}

impl Session {
    /// Load the saved game at the current wall-clock time.
    pub fn open() -> Result<Self, Box<dyn Error>> {
        let config = Config::load()?;
        let mut db = Database::open()?;
        let game = Game::load(config, &mut db, Utc::now())?;

        let events = Rc::new(RefCell::new(Vec::new()));
        let mut subscriptions = Vec::new();
        for topic in topics::ALL.iter().filter(|t| !QUIET.contains(t)) {
            let sink = Rc::clone(&events);
            subscriptions.push(game.bus().subscribe(topic, move |e| {
                sink.borrow_mut().push(e.clone());
                Ok(())
            })?);
        }

        Ok(Self {
            game,
            db,
            events,
            subscriptions,
        })
    }

    pub fn game(&mut self) -> &mut Game {
        &mut self.game
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Events published since the last call.
    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    /// Save the game and record finished focus sessions.
    pub fn persist(&mut self) -> Result<(), Box<dyn Error>> {
        self.game.save(&mut self.db)?;
        self.record_finished()
    }

    /// Move finished focus sessions into the history table.
    pub fn record_finished(&mut self) -> Result<(), Box<dyn Error>> {
        for (report, at) in self.game.take_finished_sessions() {
            self.db.record_session(&report, at)?;
        }
        Ok(())
    }

    /// Persist and detach from the game.
    pub fn close(mut self) -> Result<(), Box<dyn Error>> {
        self.persist()?;
        for sub in self.subscriptions.drain(..) {
            sub.unsubscribe();
        }
        self.game.dispose();
        Ok(())
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Execute one command, print its outcome with the events it caused, and
/// save. The game is saved even when the command is refused.
pub fn execute(command: Command) -> Result<(), Box<dyn Error>> {
    execute_all(vec![command])
}

/// Like [`execute`], for a batch. Stops at the first refusal.
pub fn execute_all(commands: Vec<Command>) -> Result<(), Box<dyn Error>> {
    let mut session = Session::open()?;
    let mut outcomes: Vec<Outcome> = Vec::with_capacity(commands.len());
    let mut failure = None;
    for command in commands {
        match session.game().execute(command) {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    let events = session.take_events();
    session.close()?;

    if let Some(e) = failure {
        return Err(e.into());
    }
    let outcome = match outcomes.as_slice() {
        [single] => json!(single),
        many => json!(many),
    };
    print_json(&json!({ "outcome": outcome, "events": events }))
}
