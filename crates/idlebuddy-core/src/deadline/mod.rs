//! DDL (deadline) tracking.
//!
//! A periodic scan classifies every pending task by hours left and publishes
//! notices. Two independent one-shot flags keep the overdue and urgent
//! notices from repeating; the approaching notice repeats on every scan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::bus::EventBus;
use crate::error::DeadlineError;
use crate::events::Event;
use crate::scheduler::{Scheduler, TimerId, TimerKind};
use crate::storage::DeadlineConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineTask {
    pub id: String,
    pub name: String,
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Set once the urgent notice has fired.
    #[serde(default)]
    pub reminded: bool,
    /// Set once the overdue notice has fired.
    #[serde(default)]
    pub overdue_warned: bool,
}

impl DeadlineTask {
    pub fn hours_left(&self, now: DateTime<Utc>) -> f64 {
        (self.deadline - now).num_milliseconds() as f64 / 3_600_000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Overdue,
    Urgent,
    Approaching,
    Comfortable,
}

/// What one scan published, by task id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub overdue: Vec<String>,
    pub urgent: Vec<String>,
    pub approaching: Vec<String>,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.overdue.is_empty() && self.urgent.is_empty() && self.approaching.is_empty()
    }
}

#[derive(Debug)]
pub struct DeadlineTracker {
    tasks: Vec<DeadlineTask>,
    config: DeadlineConfig,
    bus: EventBus,
    scan_timer: Option<TimerId>,
}

impl DeadlineTracker {
    pub fn new(config: DeadlineConfig, bus: EventBus) -> Self {
        Self::from_tasks(Vec::new(), config, bus)
    }

    pub fn from_tasks(tasks: Vec<DeadlineTask>, config: DeadlineConfig, bus: EventBus) -> Self {
        Self {
            tasks,
            config,
            bus,
            scan_timer: None,
        }
    }

    pub fn start(&mut self, scheduler: &mut Scheduler) {
        self.dispose(scheduler);
        let interval = self.config.scan_interval();
        self.scan_timer = Some(scheduler.every(TimerKind::DeadlineScan, interval));
    }

    pub fn dispose(&mut self, scheduler: &mut Scheduler) {
        if let Some(id) = self.scan_timer.take() {
            scheduler.cancel(id);
        }
    }

    pub fn tasks(&self) -> &[DeadlineTask] {
        &self.tasks
    }

    pub fn pending(&self) -> Vec<DeadlineTask> {
        self.tasks.iter().filter(|t| !t.completed).cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&DeadlineTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn classify(&self, hours_left: f64) -> Urgency {
        if hours_left < 0.0 {
            Urgency::Overdue
        } else if hours_left < self.config.urgent_hours {
            Urgency::Urgent
        } else if hours_left < self.config.approaching_hours {
            Urgency::Approaching
        } else {
            Urgency::Comfortable
        }
    }

    /// The deadline is not required to be in the future.
    pub fn add_task(
        &mut self,
        name: &str,
        deadline: DateTime<Utc>,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DeadlineTask, DeadlineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DeadlineError::EmptyName);
        }
        let task = DeadlineTask {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            deadline,
            description: description.unwrap_or_default().to_string(),
            completed: false,
            created_at: now,
            completed_at: None,
            reminded: false,
            overdue_warned: false,
        };
        self.tasks.push(task.clone());
        info!(task_id = %task.id, name, %deadline, "deadline added");
        self.bus.publish(Event::DeadlineAdded {
            task_id: task.id.clone(),
            name: task.name.clone(),
            deadline,
        });
        Ok(task)
    }

    /// False if the id is unknown or the task is already completed.
    pub fn complete_task(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        if task.completed {
            return false;
        }
        task.completed = true;
        task.completed_at = Some(now);
        let name = task.name.clone();
        info!(task_id = id, "deadline completed");
        self.bus.publish(Event::DeadlineCompleted {
            task_id: id.to_string(),
            name,
        });
        true
    }

    pub fn delete_task(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return false;
        }
        self.bus.publish(Event::DeadlineDeleted {
            task_id: id.to_string(),
        });
        true
    }

    pub fn scan_deadlines(&mut self, now: DateTime<Utc>) -> ScanReport {
        let mut report = ScanReport::default();
        let mut events = Vec::new();
        let urgent_hours = self.config.urgent_hours;
        let approaching_hours = self.config.approaching_hours;

        for task in self.tasks.iter_mut().filter(|t| !t.completed) {
            let hours_left = task.hours_left(now);
            if hours_left < 0.0 {
                if !task.overdue_warned {
                    task.overdue_warned = true;
                    report.overdue.push(task.id.clone());
                    events.push(Event::DeadlineOverdue {
                        task_id: task.id.clone(),
                        name: task.name.clone(),
                        hours_overdue: -hours_left,
                    });
                }
            } else if hours_left > 0.0 && hours_left < urgent_hours && !task.reminded {
                task.reminded = true;
                report.urgent.push(task.id.clone());
                events.push(Event::DeadlineUrgent {
                    task_id: task.id.clone(),
                    name: task.name.clone(),
                    hours_left,
                });
            } else if hours_left >= urgent_hours
                && hours_left < approaching_hours
                && !task.reminded
            {
                report.approaching.push(task.id.clone());
                events.push(Event::DeadlineApproaching {
                    task_id: task.id.clone(),
                    name: task.name.clone(),
                    hours_left,
                });
            }
        }

        if !report.is_empty() {
            debug!(?report, "deadline scan");
        }
        for event in events {
            self.bus.publish(event);
        }
        report
    }

    /// Earliest pending task.
    pub fn next_deadline(&self) -> Option<DeadlineTask> {
        let mut pending = self.pending();
        pending.sort_by_key(|t| t.deadline);
        pending.into_iter().next()
    }
}
