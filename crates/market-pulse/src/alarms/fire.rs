//! When an alarm fires
//!
//! All times are local wall-clock times, the same clock the history files use.

use super::command::{ReportCommand, decode_commands, encode_commands, parse_commands};
use crate::config::PulseConfig;
use crate::error::{PulseError, Result};
use crate::history::AlarmRecord;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const TIME_FORMAT: &str = "%H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";
const DAILY_PREFIX: &str = "daily ";

/// Trigger of an alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FireSpec {
    /// Every day at `HH:MM`
    Daily(NaiveTime),
    /// Once, at a wall-clock instant
    At(NaiveDateTime),
}

fn parse_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT)
        .map_err(|_| PulseError::Validation(format!("invalid time {raw:?}, expected HH:MM")))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| PulseError::Validation(format!("invalid date {raw:?}, expected YYYY-MM-DD")))
}

impl FireSpec {
    pub fn daily(raw: &str) -> Result<Self> {
        parse_time(raw).map(Self::Daily)
    }

    /// One-off trigger; rejected unless strictly after `now`
    pub fn at(date: &str, time: &str, now: NaiveDateTime) -> Result<Self> {
        let instant = parse_date(date)?.and_time(parse_time(time)?);
        if instant <= now {
            return Err(PulseError::Validation(format!(
                "{} is not in the future",
                instant.format("%Y-%m-%d %H:%M")
            )));
        }
        Ok(Self::At(instant))
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self, Self::Daily(_))
    }

    /// First firing instant strictly after `after`, if any
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        match *self {
            Self::Daily(time) => {
                let today = after.date().and_time(time);
                if today > after {
                    Some(today)
                } else {
                    Some(today + Duration::days(1))
                }
            }
            Self::At(instant) => (instant > after).then_some(instant),
        }
    }
}

/// Stored form: `daily HH:MM` or `YYYY-MM-DD HH:MM`
impl fmt::Display for FireSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily(time) => write!(f, "{DAILY_PREFIX}{}", time.format(TIME_FORMAT)),
            Self::At(instant) => write!(f, "{}", instant.format("%Y-%m-%d %H:%M")),
        }
    }
}

impl FromStr for FireSpec {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(time) = s.strip_prefix(DAILY_PREFIX) {
            return Self::daily(time);
        }
        let (date, time) = s
            .split_once(' ')
            .ok_or_else(|| PulseError::Validation(format!("invalid fire spec {s:?}")))?;
        Ok(Self::At(parse_date(date)?.and_time(parse_time(time)?)))
    }
}

/// A parsed registration: trigger plus commands
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmRequest {
    pub fire_spec: FireSpec,
    pub commands: Vec<ReportCommand>,
}

impl AlarmRequest {
    /// Parse `HH:MM cmd...` or `YYYY-MM-DD HH:MM cmd...`
    pub fn parse(input: &str, now: NaiveDateTime, config: &PulseConfig) -> Result<Self> {
        let mut parts = input.split_whitespace();
        let first = parts
            .next()
            .ok_or_else(|| PulseError::Validation("missing alarm time".to_string()))?;

        let fire_spec = if first.contains('-') {
            let time = parts
                .next()
                .ok_or_else(|| PulseError::Validation("missing time after date".to_string()))?;
            FireSpec::at(first, time, now)?
        } else {
            FireSpec::daily(first)?
        };

        let commands = parse_commands(parts, config)?;
        Ok(Self {
            fire_spec,
            commands,
        })
    }
}

/// Alarm as listed to the user; `id` is its 1-based row position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmDefinition {
    pub id: usize,
    #[serde(with = "crate::history::records::timestamp")]
    pub created_at: NaiveDateTime,
    pub fire_spec: FireSpec,
    pub commands: Vec<ReportCommand>,
    pub recurring: bool,
}

impl AlarmDefinition {
    pub fn from_record(id: usize, record: &AlarmRecord, config: &PulseConfig) -> Result<Self> {
        let fire_spec: FireSpec = record.fire_spec.parse()?;
        let commands = decode_commands(&record.commands, config)?;
        Ok(Self {
            id,
            created_at: record.created_at,
            fire_spec,
            commands,
            recurring: record.recurring,
        })
    }
}

impl AlarmRequest {
    pub fn to_record(&self, created_at: NaiveDateTime) -> AlarmRecord {
        AlarmRecord {
            created_at,
            fire_spec: self.fire_spec.to_string(),
            commands: encode_commands(&self.commands),
            recurring: self.fire_spec.is_recurring(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::parse_timestamp;
    use tokio_test::{assert_err, assert_ok};

    fn now() -> NaiveDateTime {
        parse_timestamp("2026-10-16 12:00:00").unwrap()
    }

    #[test]
    fn test_daily_parse_and_display() {
        let spec = FireSpec::daily("09:30").unwrap();
        assert!(spec.is_recurring());
        assert_eq!(spec.to_string(), "daily 09:30");
        assert_eq!("daily 09:30".parse::<FireSpec>().unwrap(), spec);
    }

    #[test]
    fn test_malformed_times_rejected() {
        assert_err!(FireSpec::daily("25:00"));
        assert_err!(FireSpec::daily("9h30"));
        assert_err!(FireSpec::at("2026-13-01", "10:00", now()));
        assert_err!("tomorrow".parse::<FireSpec>());
    }

    #[test]
    fn test_absolute_must_be_future() {
        assert!(FireSpec::at("2026-10-16", "12:00", now()).unwrap_err().is_validation());
        assert!(FireSpec::at("2026-10-15", "18:00", now()).is_err());

        let spec = assert_ok!(FireSpec::at("2026-10-16", "12:01", now()));
        assert!(!spec.is_recurring());
        assert_eq!(spec.to_string(), "2026-10-16 12:01");
        assert_eq!("2026-10-16 12:01".parse::<FireSpec>().unwrap(), spec);
    }

    #[test]
    fn test_next_after() {
        let daily = FireSpec::daily("09:30").unwrap();
        assert_eq!(
            daily.next_after(now()),
            parse_timestamp("2026-10-17 09:30:00")
        );
        let early = parse_timestamp("2026-10-16 08:00:00").unwrap();
        assert_eq!(daily.next_after(early), parse_timestamp("2026-10-16 09:30:00"));

        // exactly at the fire time schedules tomorrow
        let at_fire = parse_timestamp("2026-10-16 09:30:00").unwrap();
        assert_eq!(daily.next_after(at_fire), parse_timestamp("2026-10-17 09:30:00"));

        let once = FireSpec::at("2026-10-16", "13:00", now()).unwrap();
        assert!(once.next_after(now()).is_some());
        assert!(once.next_after(parse_timestamp("2026-10-16 13:00:00").unwrap()).is_none());
    }

    #[test]
    fn test_request_parse() {
        let config = PulseConfig::default();
        let req = AlarmRequest::parse("09:30 ap io:eth", now(), &config).unwrap();
        assert_eq!(req.fire_spec, FireSpec::daily("09:30").unwrap());
        assert_eq!(req.commands.len(), 2);

        let record = req.to_record(now());
        assert_eq!(record.fire_spec, "daily 09:30");
        assert_eq!(record.commands, "ap io:ETHUSDT");
        assert!(record.recurring);

        let def = AlarmDefinition::from_record(1, &record, &config).unwrap();
        assert_eq!(def.commands, req.commands);

        let req = AlarmRequest::parse("2026-10-20 08:00 npr", now(), &config).unwrap();
        assert!(!req.to_record(now()).recurring);

        assert!(AlarmRequest::parse("", now(), &config).is_err());
        assert!(AlarmRequest::parse("09:30", now(), &config).is_err());
        assert!(AlarmRequest::parse("2026-10-20", now(), &config).is_err());
        assert!(AlarmRequest::parse("2020-01-01 08:00 ap", now(), &config).is_err());
    }
}
