use chrono::{DateTime, Duration, Utc};
use clap::Subcommand;
use idlebuddy_core::Command;

use crate::session::{self, print_json, Session};

#[derive(Subcommand)]
pub enum DdlAction {
    /// Add a deadline
    Add {
        /// Task name
        name: String,
        /// Due time (RFC 3339, e.g. "2026-11-01T18:00:00Z")
        #[arg(long, required_unless_present = "in_hours", conflicts_with = "in_hours")]
        due: Option<DateTime<Utc>>,
        /// Due this many hours from now
        #[arg(long)]
        in_hours: Option<f64>,
        /// Optional description
        #[arg(long)]
        description: Option<String>,
    },
    /// Mark a deadline as completed
    Done {
        /// Task ID
        id: String,
    },
    /// Delete a deadline
    Delete {
        /// Task ID
        id: String,
    },
    /// List deadlines, nearest first
    List {
        /// Include completed tasks
        #[arg(long)]
        all: bool,
    },
}

pub fn run(action: DdlAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        DdlAction::Add {
            name,
            due,
            in_hours,
            description,
        } => {
            let deadline = match (due, in_hours) {
                (Some(due), _) => due,
                (None, Some(hours)) => due_in(Utc::now(), hours)?,
                (None, None) => return Err("either --due or --in-hours is required".into()),
            };
            session::execute(Command::AddDeadline {
                name,
                deadline,
                description,
            })
        }
        DdlAction::Done { id } => session::execute(Command::CompleteDeadline { id }),
        DdlAction::Delete { id } => session::execute(Command::DeleteDeadline { id }),
        DdlAction::List { all } => {
            let mut session = Session::open()?;
            let tasks = if all {
                session.game().all_deadlines()
            } else {
                session.game().pending_deadlines()
            };
            session.close()?;
            print_json(&tasks)
        }
    }
}

/// `now` plus a fractional number of hours, refusing values no timestamp
/// can hold.
fn due_in(now: DateTime<Utc>, hours: f64) -> Result<DateTime<Utc>, String> {
    let out_of_range = || format!("--in-hours out of range: {hours}");
    let secs = (hours * 3600.0).round();
    // i64::MAX as f64 rounds up, so the bound is exclusive.
    if !secs.is_finite() || secs.abs() >= i64::MAX as f64 {
        return Err(out_of_range());
    }
    Duration::try_seconds(secs as i64)
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(out_of_range)
}
