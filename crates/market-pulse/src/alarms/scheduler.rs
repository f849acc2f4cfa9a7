//! Pending alarm triggers
//!
//! The scheduler mirrors the rows of the alarm stream one-to-one: slot `n`
//! holds row `n`, so the user-facing id of an alarm is its slot position.
//! Pending firings live in a min-heap keyed by `(instant, token)`. Removing a
//! slot retires its token; stale heap entries are dropped when they surface.
//!
//! The alarm file stays authoritative. [`AlarmScheduler::sync`] lines the
//! slots up with the rows read back from disk, so alarms added or deleted by
//! another process are picked up without losing pending firings.

use super::command::ReportCommand;
use super::fire::{AlarmDefinition, AlarmRequest, FireSpec};
use crate::config::PulseConfig;
use crate::error::{PulseError, Result};
use crate::history::AlarmRecord;
use chrono::NaiveDateTime;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use tracing::{debug, warn};

/// An alarm whose instant has come
#[derive(Debug, Clone, PartialEq)]
pub struct FiredAlarm {
    pub id: usize,
    pub fire_at: NaiveDateTime,
    pub commands: Vec<ReportCommand>,
}

#[derive(Debug)]
struct Slot {
    token: u64,
    /// Row this slot was built from
    row: Option<AlarmRecord>,
    /// `None` for rows that could not be decoded; they keep their position
    alarm: Option<(FireSpec, Vec<ReportCommand>)>,
}

#[derive(Debug, Default)]
pub struct AlarmScheduler {
    queue: BinaryHeap<Reverse<(NaiveDateTime, u64)>>,
    slots: Vec<Slot>,
    next_token: u64,
    synced_at: Option<NaiveDateTime>,
}

impl AlarmScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the persisted rows, scheduling everything still ahead of `now`
    pub fn restore(
        &mut self,
        rows: &[Option<AlarmRecord>],
        config: &PulseConfig,
        now: NaiveDateTime,
    ) {
        self.queue.clear();
        self.slots.clear();
        self.synced_at = None;
        self.sync(rows, config, now);

        debug!(alarms = self.slots.len(), pending = self.pending(), "Alarm schedule restored");
    }

    /// Line the slots up with `rows` as read back from disk; returns whether anything changed.
    ///
    /// Rows matching an existing slot, in order, keep that slot and its pending
    /// firing. Slots without a row are cancelled. New rows are scheduled from
    /// the later of their creation and the previous sync, so an alarm added
    /// elsewhere between two ticks still fires.
    pub fn sync(
        &mut self,
        rows: &[Option<AlarmRecord>],
        config: &PulseConfig,
        now: NaiveDateTime,
    ) -> bool {
        let since = self.synced_at.unwrap_or(now).min(now);
        self.synced_at = Some(now);

        let unchanged = rows.len() == self.slots.len()
            && rows.iter().zip(&self.slots).all(|(row, slot)| *row == slot.row);
        if unchanged {
            return false;
        }

        let mut old: Vec<Option<Slot>> =
            std::mem::take(&mut self.slots).into_iter().map(Some).collect();
        let mut cursor = 0;

        for (idx, row) in rows.iter().enumerate() {
            let matched = old[cursor..]
                .iter()
                .position(|slot| slot.as_ref().is_some_and(|s| s.row == *row))
                .map(|offset| cursor + offset);

            if let Some(pos) = matched {
                if let Some(slot) = old[pos].take() {
                    cursor = pos + 1;
                    self.slots.push(slot);
                    continue;
                }
            }

            let id = idx + 1;
            let alarm = row.as_ref().and_then(|record| {
                match AlarmDefinition::from_record(id, record, config) {
                    Ok(def) => Some((def.fire_spec, def.commands)),
                    Err(e) => {
                        warn!(id, error = %e, "Alarm row not schedulable");
                        None
                    }
                }
            });
            let anchor = row.as_ref().map_or(since, |r| r.created_at.max(since));
            self.insert(row.clone(), alarm, anchor);
        }

        let live: HashSet<u64> = self.slots.iter().map(|s| s.token).collect();
        self.queue.retain(|Reverse((_, token))| live.contains(token));

        debug!(alarms = self.slots.len(), pending = self.pending(), "Alarm schedule synced");
        true
    }

    /// Track a newly persisted alarm; returns its id
    pub fn push(&mut self, request: AlarmRequest, now: NaiveDateTime) -> usize {
        let row = request.to_record(now);
        self.insert(Some(row), Some((request.fire_spec, request.commands)), now);
        self.slots.len()
    }

    fn insert(
        &mut self,
        row: Option<AlarmRecord>,
        alarm: Option<(FireSpec, Vec<ReportCommand>)>,
        after: NaiveDateTime,
    ) {
        let token = self.next_token;
        self.next_token += 1;

        if let Some(at) = alarm.as_ref().and_then(|(spec, _)| spec.next_after(after)) {
            self.queue.push(Reverse((at, token)));
        }
        self.slots.push(Slot { token, row, alarm });
    }

    /// Drop alarm `id` and cancel its pending firing. Later ids shift down by one.
    pub fn remove(&mut self, id: usize) -> Result<()> {
        if id == 0 || id > self.slots.len() {
            return Err(PulseError::NotFound(format!("alarm #{id}")));
        }
        let slot = self.slots.remove(id - 1);
        debug!(id, token = slot.token, "Alarm cancelled");
        Ok(())
    }

    /// Pop every alarm due at `now`.
    ///
    /// Daily alarms are put back for their next occurrence after `now`; one-off
    /// alarms are not rescheduled but keep their slot.
    pub fn due(&mut self, now: NaiveDateTime) -> Vec<FiredAlarm> {
        let mut fired = Vec::new();

        while let Some(&Reverse((at, token))) = self.queue.peek() {
            if at > now {
                break;
            }
            self.queue.pop();

            let Some(idx) = self.slots.iter().position(|s| s.token == token) else {
                continue; // cancelled
            };
            let Some((spec, commands)) = &self.slots[idx].alarm else {
                continue;
            };

            if spec.is_recurring() {
                if let Some(next) = spec.next_after(now) {
                    self.queue.push(Reverse((next, token)));
                }
            }

            fired.push(FiredAlarm {
                id: idx + 1,
                fire_at: at,
                commands: commands.clone(),
            });
        }

        fired
    }

    /// Earliest pending instant of a live alarm
    pub fn next_fire(&self) -> Option<NaiveDateTime> {
        self.queue
            .iter()
            .filter(|Reverse((_, token))| self.slots.iter().any(|s| s.token == *token))
            .map(|Reverse((at, _))| *at)
            .min()
    }

    /// Number of live alarms with a pending firing
    pub fn pending(&self) -> usize {
        self.queue
            .iter()
            .filter(|Reverse((_, token))| self.slots.iter().any(|s| s.token == *token))
            .count()
    }

    /// Number of alarm rows tracked
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
