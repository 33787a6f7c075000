use std::collections::VecDeque;

use serde::{Deserialize, Deserializer, Serialize};

pub const LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub round: u32,
    pub text: String,
}

/// Ring buffer holding the last [`LOG_CAPACITY`] entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleLog {
    #[serde(deserialize_with = "newest_only")]
    entries: VecDeque<LogEntry>,
}

fn newest_only<'de, D: Deserializer<'de>>(deserializer: D) -> Result<VecDeque<LogEntry>, D::Error> {
    let mut entries = VecDeque::<LogEntry>::deserialize(deserializer)?;
    while entries.len() > LOG_CAPACITY {
        entries.pop_front();
    }
    Ok(entries)
}

impl BattleLog {
    pub fn push(&mut self, round: u32, text: impl Into<String>) {
        while self.entries.len() >= LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            round,
            text: text.into(),
        });
    }

    /// The newest `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_newest_fifty() {
        let mut log = BattleLog::default();
        for i in 0..80 {
            log.push(i, format!("entry {i}"));
        }
        assert_eq!(log.len(), LOG_CAPACITY);
        let recent = log.recent(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].text, "entry 70");
        assert_eq!(recent[9].text, "entry 79");
        assert_eq!(log.recent(100)[0].text, "entry 30");
    }

    #[test]
    fn oversized_saved_log_is_trimmed() {
        let entries: Vec<_> = (0..60)
            .map(|i| serde_json::json!({"round": i, "text": format!("entry {i}")}))
            .collect();
        let mut log: BattleLog =
            serde_json::from_value(serde_json::json!({ "entries": entries })).unwrap();
        assert_eq!(log.len(), LOG_CAPACITY);
        assert_eq!(log.recent(100)[0].text, "entry 10");

        for i in 60..70 {
            log.push(i, format!("entry {i}"));
        }
        assert_eq!(log.len(), LOG_CAPACITY);
        assert_eq!(log.recent(100)[0].text, "entry 20");
        assert_eq!(log.recent(1)[0].text, "entry 69");
    }
}
