//! Status collection - Lock files and completed work units per slot

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use super::error::{FleetError, Result};
use super::slot::SlotPool;

/// Created by a client while it runs in a slot
pub const LOCK_FILE: &str = "client.lock";

/// Work-unit log kept by the client in its slot
pub const WORK_RECORD_FILE: &str = "work_FPS.save";

/// Prefix of a work-record line reporting a finished work unit
pub const COMPLETION_MARKER: &str = "End";

const WORK_UNIT_LABEL: &str = "WorkUnit";

/// Running state of a slot as inferred from its lock file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Running,
    Stopped,
}

impl SlotStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// One completed work unit in a slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub slot: u32,
    pub unit: String,
    pub status: SlotStatus,
}

/// Running if the slot's lock file exists, whether or not a client is alive
pub fn slot_status(slot_dir: &Path) -> SlotStatus {
    if slot_dir.join(LOCK_FILE).is_file() {
        SlotStatus::Running
    } else {
        SlotStatus::Stopped
    }
}

/// Extract the work-unit id from a completion line
pub fn completed_unit(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(COMPLETION_MARKER)?.trim_start();
    let rest = rest.strip_prefix(WORK_UNIT_LABEL).unwrap_or(rest);
    Some(rest.trim())
}

/// Lines of a slot's work record; a missing record yields no lines.
///
/// The record is written by the client, so bytes that are not UTF-8 are
/// replaced rather than rejected.
pub fn work_lines(slot_id: u32, slot_dir: &Path) -> Result<Vec<String>> {
    let path = slot_dir.join(WORK_RECORD_FILE);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Slot {} has no work record", slot_id);
            return Ok(Vec::new());
        }
        Err(e) => return Err(FleetError::io(path, e)),
    };
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!("Slot {} work record {:?} is not valid UTF-8", slot_id, path);
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    Ok(text.lines().map(str::to_string).collect())
}

/// Snapshot of every slot's completed work units, ordered by slot id.
///
/// Only the lock file and work record of each slot are read. Slots without
/// a work record contribute nothing. The snapshot is not synchronised with
/// clients starting or stopping.
pub fn collect(pool: &SlotPool) -> Result<Vec<StatusEntry>> {
    let mut entries = Vec::new();
    for id in pool.ids()? {
        let dir = pool.slot_dir(id);
        let status = slot_status(&dir);
        for line in work_lines(id, &dir)? {
            if let Some(unit) = completed_unit(&line) {
                entries.push(StatusEntry {
                    slot: id,
                    unit: unit.to_string(),
                    status,
                });
            }
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::slot::tests::installed_base;

    fn two_slots() -> (tempfile::TempDir, SlotPool) {
        let base = installed_base();
        let pool = SlotPool::new(base.path());
        pool.provision(2).unwrap();
        (base, pool)
    }

    #[test]
    fn test_collect_reports_lock_state_per_slot() {
        let (_base, pool) = two_slots();
        fs::write(pool.slot_dir(2).join(LOCK_FILE), "").unwrap();
        fs::write(
            pool.slot_dir(1).join(WORK_RECORD_FILE),
            "Start WorkUnit W100\nEnd WorkUnit W100\n",
        )
        .unwrap();
        fs::write(
            pool.slot_dir(2).join(WORK_RECORD_FILE),
            "Start WorkUnit W200\nEnd WorkUnit W200\n",
        )
        .unwrap();

        let entries = collect(&pool).unwrap();

        assert_eq!(
            entries,
            [
                StatusEntry {
                    slot: 1,
                    unit: "W100".into(),
                    status: SlotStatus::Stopped
                },
                StatusEntry {
                    slot: 2,
                    unit: "W200".into(),
                    status: SlotStatus::Running
                },
            ]
        );
    }

    #[test]
    fn test_toggling_lock_changes_status() {
        let (_base, pool) = two_slots();
        fs::write(pool.slot_dir(1).join(WORK_RECORD_FILE), "End W1\n").unwrap();
        let lock = pool.slot_dir(1).join(LOCK_FILE);

        assert_eq!(collect(&pool).unwrap()[0].status, SlotStatus::Stopped);
        fs::write(&lock, "").unwrap();
        assert_eq!(collect(&pool).unwrap()[0].status, SlotStatus::Running);
        fs::remove_file(&lock).unwrap();
        assert_eq!(collect(&pool).unwrap()[0].status, SlotStatus::Stopped);
    }

    #[test]
    fn test_slot_without_work_record_contributes_nothing() {
        let (_base, pool) = two_slots();
        fs::write(pool.slot_dir(2).join(WORK_RECORD_FILE), "End WorkUnit A\nEnd WorkUnit B\n")
            .unwrap();

        let entries = collect(&pool).unwrap();
        let units: Vec<(u32, &str)> = entries.iter().map(|e| (e.slot, e.unit.as_str())).collect();
        assert_eq!(units, [(2, "A"), (2, "B")]);
    }

    #[test]
    fn test_collect_orders_slots_numerically() {
        let base = installed_base();
        let pool = SlotPool::new(base.path()).with_executables(["prpclient"]);
        pool.provision(10).unwrap();
        for id in [2, 10, 9] {
            fs::write(
                pool.slot_dir(id).join(WORK_RECORD_FILE),
                format!("End WorkUnit U{id}\n"),
            )
            .unwrap();
        }

        let slots: Vec<u32> = collect(&pool).unwrap().iter().map(|e| e.slot).collect();
        assert_eq!(slots, [2, 9, 10]);
    }

    #[test]
    fn test_malformed_slot_config_does_not_hide_other_slots() {
        let base = installed_base();
        let pool = SlotPool::new(base.path()).with_executables(["prpclient"]);
        pool.provision(3).unwrap();
        fs::write(pool.slot_dir(2).join("prpclient.ini"), "email=a\nstray line\n").unwrap();
        fs::write(pool.slot_dir(2).join(LOCK_FILE), "").unwrap();
        for id in 1..=3 {
            fs::write(
                pool.slot_dir(id).join(WORK_RECORD_FILE),
                format!("End WorkUnit W{id}00\n"),
            )
            .unwrap();
        }

        let entries = collect(&pool).unwrap();

        let view: Vec<(u32, &str, SlotStatus)> = entries
            .iter()
            .map(|e| (e.slot, e.unit.as_str(), e.status))
            .collect();
        assert_eq!(
            view,
            [
                (1, "W100", SlotStatus::Stopped),
                (2, "W200", SlotStatus::Running),
                (3, "W300", SlotStatus::Stopped)
            ]
        );
    }

    #[test]
    fn test_invalid_utf8_record_keeps_other_slots() {
        let (_base, pool) = two_slots();
        fs::write(pool.slot_dir(1).join(WORK_RECORD_FILE), "End WorkUnit W100\n").unwrap();
        fs::write(
            pool.slot_dir(2).join(WORK_RECORD_FILE),
            b"End WorkUnit W2\xff\nEnd WorkUnit W201\n",
        )
        .unwrap();

        let entries = collect(&pool).unwrap();

        let units: Vec<(u32, &str)> = entries.iter().map(|e| (e.slot, e.unit.as_str())).collect();
        assert_eq!(
            units,
            [(1, "W100"), (2, "W2\u{fffd}"), (2, "W201")]
        );
    }

    #[test]
    fn test_completed_unit_parsing() {
        assert_eq!(completed_unit("End WorkUnit W100"), Some("W100"));
        assert_eq!(completed_unit("End W200  "), Some("W200"));
        assert_eq!(completed_unit("End WorkUnit 1667393921"), Some("1667393921"));
        assert_eq!(completed_unit("Start WorkUnit W100"), None);
        assert_eq!(completed_unit(" End WorkUnit W100"), None);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let entry = StatusEntry {
            slot: 3,
            unit: "W1".into(),
            status: SlotStatus::Running,
        };
        assert_eq!(
            serde_json::to_string(&entry).unwrap(),
            r#"{"slot":3,"unit":"W1","status":"running"}"#
        );
    }
}
