//! Durable CSV history of indicator values and alarm definitions
//!
//! Every stream is a header row followed by data rows. Appends go to the end of
//! the file in a single write; prune and delete rewrite the whole file through a
//! temporary file and a rename, so a failed operation leaves the previous
//! contents intact. All operations on one store are serialized by an internal
//! lock, which makes each read-modify-write a critical section.

pub mod records;
pub mod stream;

pub use records::{
    AlarmRecord, ApRecord, IoRecord, PriceRecord, TIMESTAMP_FORMAT, now_timestamp,
    parse_timestamp,
};
pub use stream::Stream;

use crate::error::{PulseError, Result};
use chrono::{Duration, NaiveDateTime};
use csv::StringRecord;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Age and size bounds applied by [`HistoryStore::prune`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Rows older than this many days are dropped
    pub max_age_days: u32,
    /// At most this many of the newest rows are kept
    pub max_records: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_days: 30,
            max_records: 5000,
        }
    }
}

impl RetentionPolicy {
    pub fn new(max_age_days: u32, max_records: usize) -> Self {
        Self {
            max_age_days,
            max_records,
        }
    }

    /// Bounds that remove every data row
    pub fn wipe() -> Self {
        Self::new(0, 0)
    }
}

/// Outcome of a prune
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PruneReport {
    pub removed: usize,
    pub kept: usize,
}

/// Append-only record streams in one directory
#[derive(Debug)]
pub struct HistoryStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl HistoryStore {
    /// Open (and create if needed) the data directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            PulseError::Persistence(format!("cannot create {}: {e}", dir.display()))
        })?;
        info!(dir = %dir.display(), "History store opened");
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    /// Full path of a stream's file
    pub fn path(&self, stream: &Stream) -> PathBuf {
        self.dir.join(stream.file_name())
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| PulseError::Persistence("history lock poisoned".to_string()))
    }

    /// Append one record, creating the stream with its header first if needed
    pub fn append<R: Serialize>(&self, stream: &Stream, record: &R) -> Result<()> {
        let _guard = self.guard()?;
        let path = self.path(stream);
        let needs_header = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);

        // Encode the whole chunk before touching the file so the append is a
        // single write
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if needs_header {
            writer.write_record(stream.header())?;
        }
        writer.serialize(record)?;
        let bytes = writer
            .into_inner()
            .map_err(|e| PulseError::Persistence(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| persistence(&path, &e))?;
        file.write_all(&bytes).map_err(|e| persistence(&path, &e))?;
        file.flush().map_err(|e| persistence(&path, &e))?;

        debug!(stream = %stream, "Appended history record");
        Ok(())
    }

    /// Most recently appended record, or `None` for an empty or header-only stream
    pub fn previous<R: DeserializeOwned>(&self, stream: &Stream) -> Result<Option<R>> {
        self.previous_where(stream, |_: &R| true)
    }

    /// Most recent record matching `predicate`; unreadable rows are skipped
    pub fn previous_where<R, F>(&self, stream: &Stream, predicate: F) -> Result<Option<R>>
    where
        R: DeserializeOwned,
        F: Fn(&R) -> bool,
    {
        let rows = {
            let _guard = self.guard()?;
            read_rows(&self.path(stream))?
        };

        Ok(rows
            .iter()
            .rev()
            .filter_map(|row| row.deserialize::<R>(None).ok())
            .find(|record| predicate(record)))
    }

    /// Every data row in order; rows that do not decode are `None`.
    ///
    /// Position `i` in the result is data row `i + 1` of the stream.
    pub fn records<R: DeserializeOwned>(&self, stream: &Stream) -> Result<Vec<Option<R>>> {
        let rows = {
            let _guard = self.guard()?;
            read_rows(&self.path(stream))?
        };

        Ok(rows
            .iter()
            .map(|row| match row.deserialize::<R>(None) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(stream = %stream, error = %e, "Unreadable history row");
                    None
                }
            })
            .collect())
    }

    /// Number of data rows
    pub fn len(&self, stream: &Stream) -> Result<usize> {
        let _guard = self.guard()?;
        Ok(read_rows(&self.path(stream))?.len())
    }

    /// Whether the stream has no data rows
    pub fn is_empty(&self, stream: &Stream) -> Result<bool> {
        Ok(self.len(stream)? == 0)
    }

    /// Drop rows older than the policy's age, then trim to its size.
    ///
    /// Rows whose timestamp cannot be parsed survive the age filter but still
    /// count toward the size bound.
    pub fn prune(
        &self,
        stream: &Stream,
        policy: RetentionPolicy,
        now: NaiveDateTime,
    ) -> Result<PruneReport> {
        let _guard = self.guard()?;
        let path = self.path(stream);
        if !path.exists() {
            return Ok(PruneReport::default());
        }

        let rows = read_rows(&path)?;
        let before = rows.len();
        let cutoff = now - Duration::days(i64::from(policy.max_age_days));

        let mut kept: Vec<StringRecord> = rows
            .into_iter()
            .filter(|row| {
                row.get(0)
                    .and_then(parse_timestamp)
                    .is_none_or(|ts| ts >= cutoff)
            })
            .collect();

        if kept.len() > policy.max_records {
            let excess = kept.len() - policy.max_records;
            kept.drain(..excess);
        }

        let report = PruneReport {
            removed: before - kept.len(),
            kept: kept.len(),
        };
        if report.removed > 0 {
            rewrite(&path, stream, &kept)?;
        }

        info!(
            stream = %stream,
            removed = report.removed,
            kept = report.kept,
            "Pruned history stream"
        );
        Ok(report)
    }

    /// Remove the data row at 1-based `index`; later rows move up by one
    pub fn delete_at(&self, stream: &Stream, index: usize) -> Result<()> {
        let _guard = self.guard()?;
        let path = self.path(stream);
        let mut rows = read_rows(&path)?;

        if index == 0 || index > rows.len() {
            return Err(PulseError::Validation(format!(
                "index {index} out of range (1..={})",
                rows.len()
            )));
        }

        rows.remove(index - 1);
        rewrite(&path, stream, &rows)?;
        info!(stream = %stream, index, "Deleted history row");
        Ok(())
    }

    /// Every price-list stream present on disk
    pub fn price_streams(&self) -> Result<Vec<Stream>> {
        let mut streams: Vec<Stream> = fs::read_dir(&self.dir)
            .map_err(|e| persistence(&self.dir, &e))?
            .filter_map(|entry| {
                let name = entry.ok()?.file_name();
                Stream::from_price_file(name.to_str()?)
            })
            .collect();
        streams.sort_by_key(Stream::file_name);
        Ok(streams)
    }
}

fn persistence(path: &Path, err: &std::io::Error) -> PulseError {
    PulseError::Persistence(format!("{}: {err}", path.display()))
}

/// Data rows of a stream file; a missing file has none
fn read_rows(path: &Path) -> Result<Vec<StringRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| PulseError::Persistence(format!("{}: {e}", path.display())))?;

    let mut rows = Vec::new();
    for row in reader.records() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Replace a stream's file with `header + rows`
fn rewrite(path: &Path, stream: &Stream, rows: &[StringRecord]) -> Result<()> {
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&tmp)?;
        writer.write_record(stream.header())?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush().map_err(|e| persistence(&tmp, &e))?;
    }
    fs::rename(&tmp, path).map_err(|e| persistence(path, &e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ts(raw: &str) -> NaiveDateTime {
        parse_timestamp(raw).unwrap()
    }

    fn ap(raw: &str, btc: f64) -> ApRecord {
        ApRecord {
            timestamp: ts(raw),
            btc_strength: btc,
            usdt_strength: 50.0,
            long_term_strength: 42.5,
        }
    }

    fn alarm(spec: &str) -> AlarmRecord {
        AlarmRecord {
            created_at: ts("2026-10-16 08:00:00"),
            fire_spec: spec.to_string(),
            commands: "ap".to_string(),
            recurring: true,
        }
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();

        store.append(&Stream::Ap, &ap("2026-10-16 09:00:00", 10.0)).unwrap();
        store.append(&Stream::Ap, &ap("2026-10-16 10:00:00", 20.0)).unwrap();

        let contents = fs::read_to_string(store.path(&Stream::Ap)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,btc_strength,usdt_strength,long_term_strength");
        assert!(lines[1].starts_with("2026-10-16 09:00:00,10"));
    }

    #[test]
    fn test_previous_returns_latest_record() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        assert_eq!(store.previous::<ApRecord>(&Stream::Ap).unwrap(), None);

        let first = ap("2026-10-16 09:00:00", 61.25);
        store.append(&Stream::Ap, &first).unwrap();
        assert_eq!(store.previous::<ApRecord>(&Stream::Ap).unwrap(), Some(first));

        let second = ap("2026-10-16 09:05:00", 38.5);
        store.append(&Stream::Ap, &second).unwrap();
        assert_eq!(store.previous::<ApRecord>(&Stream::Ap).unwrap(), Some(second));
    }

    #[test]
    fn test_previous_on_header_only_stream() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        fs::write(
            store.path(&Stream::Ap),
            "timestamp,btc_strength,usdt_strength,long_term_strength\n",
        )
        .unwrap();
        assert_eq!(store.previous::<ApRecord>(&Stream::Ap).unwrap(), None);
    }

    #[test]
    fn test_previous_where_filters_by_symbol() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        let stream = Stream::Prices("majors".to_string());
        let prices = [
            ("BTCUSDT", 100.0),
            ("ETHUSDT", 10.0),
            ("BTCUSDT", 110.0),
            ("ETHUSDT", 11.0),
        ];
        for (symbol, price) in prices {
            let record = PriceRecord {
                timestamp: ts("2026-10-16 09:00:00"),
                symbol: symbol.to_string(),
                price,
                change_percent: 1.0,
            };
            store.append(&stream, &record).unwrap();
        }

        let btc: PriceRecord = store
            .previous_where(&stream, |r: &PriceRecord| r.symbol == "BTCUSDT")
            .unwrap()
            .unwrap();
        assert_eq!(btc.price, 110.0);
    }

    #[test]
    fn test_prune_wipe_keeps_header() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        store.append(&Stream::Ap, &ap("2026-10-15 09:00:00", 1.0)).unwrap();
        store.append(&Stream::Ap, &ap("2026-10-16 09:00:00", 2.0)).unwrap();

        let report = store
            .prune(&Stream::Ap, RetentionPolicy::wipe(), ts("2026-10-16 12:00:00"))
            .unwrap();
        assert_eq!(report, PruneReport { removed: 2, kept: 0 });

        let contents = fs::read_to_string(store.path(&Stream::Ap)).unwrap();
        assert_eq!(
            contents.trim_end(),
            "timestamp,btc_strength,usdt_strength,long_term_strength"
        );
        assert_eq!(store.previous::<ApRecord>(&Stream::Ap).unwrap(), None);
    }

    #[test]
    fn test_prune_by_age_retains_unparseable_rows() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        fs::write(
            store.path(&Stream::Ap),
            "timestamp,btc_strength,usdt_strength,long_term_strength\n\
             2026-09-01 09:00:00,1,1,1\n\
             garbage,2,2,2\n\
             2026-10-15 09:00:00,3,3,3\n",
        )
        .unwrap();

        let report = store
            .prune(&Stream::Ap, RetentionPolicy::new(7, 100), ts("2026-10-16 12:00:00"))
            .unwrap();
        assert_eq!(report, PruneReport { removed: 1, kept: 2 });

        let rows = store.records::<ApRecord>(&Stream::Ap).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_none());
        assert_eq!(rows[1].as_ref().unwrap().btc_strength, 3.0);
    }

    #[test]
    fn test_prune_by_count_keeps_newest() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        for hour in 1..=5 {
            let record = ap(&format!("2026-10-16 0{hour}:00:00"), f64::from(hour));
            store.append(&Stream::Ap, &record).unwrap();
        }

        store
            .prune(&Stream::Ap, RetentionPolicy::new(30, 2), ts("2026-10-16 12:00:00"))
            .unwrap();

        let values: Vec<f64> = store
            .records::<ApRecord>(&Stream::Ap)
            .unwrap()
            .into_iter()
            .map(|r| r.unwrap().btc_strength)
            .collect();
        assert_eq!(values, vec![4.0, 5.0]);
    }

    #[test]
    fn test_prune_missing_stream_is_noop() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        let report = store
            .prune(&Stream::Io, RetentionPolicy::wipe(), ts("2026-10-16 12:00:00"))
            .unwrap();
        assert_eq!(report, PruneReport::default());
        assert!(!store.path(&Stream::Io).exists());
    }

    #[test]
    fn test_delete_at_renumbers() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        for spec in ["daily 08:00", "daily 09:00", "daily 10:00"] {
            store.append(&Stream::Alarms, &alarm(spec)).unwrap();
        }

        store.delete_at(&Stream::Alarms, 2).unwrap();

        let specs: Vec<String> = store
            .records::<AlarmRecord>(&Stream::Alarms)
            .unwrap()
            .into_iter()
            .map(|r| r.unwrap().fire_spec)
            .collect();
        assert_eq!(specs, vec!["daily 08:00", "daily 10:00"]);
    }

    #[test]
    fn test_delete_at_out_of_range() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        store.append(&Stream::Alarms, &alarm("daily 08:00")).unwrap();

        let err = store.delete_at(&Stream::Alarms, 0).unwrap_err();
        assert!(err.is_validation());
        let err = store.delete_at(&Stream::Alarms, 2).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.len(&Stream::Alarms).unwrap(), 1);
    }

    #[test]
    fn test_price_streams_discovery() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path()).unwrap();
        let record = PriceRecord {
            timestamp: ts("2026-10-16 09:00:00"),
            symbol: "BTCUSDT".to_string(),
            price: 1.0,
            change_percent: 0.0,
        };
        store.append(&Stream::Prices("majors".into()), &record).unwrap();
        store.append(&Stream::Prices("alts".into()), &record).unwrap();
        store.append(&Stream::Ap, &ap("2026-10-16 09:00:00", 1.0)).unwrap();

        let streams = store.price_streams().unwrap();
        assert_eq!(
            streams,
            vec![Stream::Prices("alts".into()), Stream::Prices("majors".into())]
        );
    }

    #[test]
    fn test_concurrent_appends_stay_well_formed() {
        let dir = tempdir().unwrap();
        let store = std::sync::Arc::new(HistoryStore::open(dir.path()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let record = ap("2026-10-16 09:00:00", f64::from(i));
                    store.append(&Stream::Ap, &record).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let rows = store.records::<ApRecord>(&Stream::Ap).unwrap();
        assert_eq!(rows.len(), 8);
        assert!(rows.iter().all(Option::is_some));
    }
}
