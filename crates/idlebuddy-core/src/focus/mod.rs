mod engine;

pub use engine::{FocusSession, FocusState, FocusTimer, SessionReport, SessionType};
