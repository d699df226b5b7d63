use crate::mpn::mpn_value::{CiBound, MpnValue};
use crate::mpn::pattern_key::{PatternKey, REPLICATES};
use crate::utils::log_entry::system::SystemEntry;
use crate::utils::logging::*;
use lazy_static::lazy_static;
use serde::Serialize;
use thiserror::Error;

const PUBLISHED_TABLE: &str = include_str!("mpn_table.csv");

/// Grams of sample per tube, indexed by dilution group.
pub const INOCULA: [f64; 3] = [0.1, 0.01, 0.001];
const DILUTION_RATIO: f64 = 10.0;
const SIGNIFICANT_DIGITS: i32 = 2;

lazy_static! {
    static ref REFERENCE_TABLE: ReferenceTable = ReferenceTable::load();
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("Pattern digit {0} exceeds the replicate count")]
    DigitOutOfRange(u8),
    #[error("Malformed pattern key {0:?}")]
    MalformedKey(String),
    #[error("Malformed value {0:?}")]
    MalformedValue(String),
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },
    #[error("Duplicate entry for {0}")]
    DuplicateEntry(PatternKey),
    #[error("Interval of {0} does not contain its estimate")]
    InconsistentInterval(PatternKey),
    #[error("No entry for {0}")]
    MissingEntry(PatternKey),
}

#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntrySource {
    Published,
    Estimated,
}

#[derive(Serialize, Debug, Copy, Clone, PartialEq)]
pub struct ReferenceEntry {
    pub pattern: PatternKey,
    pub mpn: MpnValue,
    pub ci_low: CiBound,
    pub ci_high: CiBound,
    pub source: EntrySource,
}

#[derive(Debug, Clone)]
pub struct ReferenceTable {
    entries: Vec<Option<ReferenceEntry>>,
}

impl ReferenceTable {
    pub fn instance() -> &'static ReferenceTable {
        &REFERENCE_TABLE
    }

    fn load() -> Self {
        match Self::standard() {
            Ok(table) => table,
            Err(err) => {
                logging_console(emergency_entry!(SystemEntry::ReferenceTableInvalid(err.to_string())));
                panic!("Seriously, the program must be terminated.");
            }
        }
    }

    /// Published three-tube table completed with estimates for the
    /// combinations it leaves out.
    pub fn standard() -> Result<Self, TableError> {
        let mut table = Self::from_csv(PUBLISHED_TABLE)?;
        table.complete_with_estimates();
        table.validate()?;
        Ok(table)
    }

    /// Rows of `pattern,mpn_per_g,ci_low,ci_high`. A header line and blank lines are skipped.
    pub fn from_csv(text: &str) -> Result<Self, TableError> {
        let mut entries = vec![None; PatternKey::COMBINATIONS];
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || (number == 0 && line.starts_with("pattern")) {
                continue;
            }
            let malformed = |reason: String| TableError::MalformedRow { line: number + 1, reason };
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != 4 {
                return Err(malformed(format!("expected 4 fields, found {}", fields.len())));
            }
            let pattern: PatternKey = fields[0].parse().map_err(|err: TableError| malformed(err.to_string()))?;
            let entry = ReferenceEntry {
                pattern,
                mpn: fields[1].parse().map_err(|err: TableError| malformed(err.to_string()))?,
                ci_low: fields[2].parse().map_err(|err: TableError| malformed(err.to_string()))?,
                ci_high: fields[3].parse().map_err(|err: TableError| malformed(err.to_string()))?,
                source: EntrySource::Published,
            };
            let slot = &mut entries[pattern.index()];
            if slot.is_some() {
                return Err(TableError::DuplicateEntry(pattern));
            }
            *slot = Some(entry);
        }
        Ok(Self { entries })
    }

    pub fn complete_with_estimates(&mut self) {
        for key in PatternKey::all() {
            let slot = &mut self.entries[key.index()];
            if slot.is_none() {
                *slot = Some(estimate_entry(key));
            }
        }
    }

    pub fn validate(&self) -> Result<(), TableError> {
        for key in PatternKey::all() {
            let entry = self.resolve(key)?;
            if let MpnValue::Bounded(mpn) = entry.mpn {
                let low_ok = match entry.ci_low {
                    CiBound::Value(low) => low <= mpn,
                    CiBound::Unbounded => true,
                };
                let high_ok = match entry.ci_high {
                    CiBound::Value(high) => mpn <= high,
                    CiBound::Unbounded => true,
                };
                if !(low_ok && high_ok) {
                    return Err(TableError::InconsistentInterval(key));
                }
            }
        }
        Ok(())
    }

    pub fn resolve(&self, key: PatternKey) -> Result<&ReferenceEntry, TableError> {
        self.entries
            .get(key.index())
            .and_then(Option::as_ref)
            .ok_or(TableError::MissingEntry(key))
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> impl Iterator<Item = &ReferenceEntry> {
        self.entries.iter().flatten()
    }
}

/// Maximum-likelihood density for a pattern the published table omits,
/// with Cochran's approximate 95% interval.
pub(crate) fn estimate_entry(key: PatternKey) -> ReferenceEntry {
    let digits = key.digits();
    let positives = key.positives();
    if positives == 0 {
        return ReferenceEntry {
            pattern: key,
            mpn: MpnValue::BelowRange(3.0),
            ci_low: CiBound::Unbounded,
            ci_high: CiBound::Unbounded,
            source: EntrySource::Estimated,
        };
    }
    if positives == REPLICATES * digits.len() {
        return ReferenceEntry {
            pattern: key,
            mpn: MpnValue::AboveRange(1100.0),
            ci_low: CiBound::Unbounded,
            ci_high: CiBound::Unbounded,
            source: EntrySource::Estimated,
        };
    }

    let density = maximum_likelihood(&digits);
    let factor = 10_f64.powf(2.0 * 0.58 * (DILUTION_RATIO.log10() / REPLICATES as f64).sqrt());
    ReferenceEntry {
        pattern: key,
        mpn: MpnValue::Bounded(round_significant(density)),
        ci_low: CiBound::Value(round_significant(density / factor)),
        ci_high: CiBound::Value(round_significant(density * factor)),
        source: EntrySource::Estimated,
    }
}

fn maximum_likelihood(digits: &[u8; 3]) -> f64 {
    let total: f64 = INOCULA.iter().map(|volume| REPLICATES as f64 * volume).sum();
    let score = |density: f64| -> f64 {
        digits
            .iter()
            .zip(INOCULA)
            .filter(|(positive, _)| **positive > 0)
            .map(|(&positive, volume)| positive as f64 * volume / -(-density * volume).exp_m1())
            .sum::<f64>()
            - total
    };

    // Score falls monotonically with density, bisect in log space.
    let (mut low, mut high) = (-10.0_f64, 20.0_f64);
    for _ in 0..200 {
        let middle = (low + high) / 2.0;
        if score(middle.exp()) > 0.0 {
            low = middle;
        } else {
            high = middle;
        }
    }
    ((low + high) / 2.0).exp()
}

pub(crate) fn round_significant(value: f64) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    let exponent = value.abs().log10().floor() as i32 - (SIGNIFICANT_DIGITS - 1);
    if exponent < 0 {
        let scale = 10_f64.powi(-exponent);
        (value * scale).round() / scale
    } else {
        let scale = 10_f64.powi(exponent);
        (value / scale).round() * scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(text: &str) -> PatternKey {
        text.parse().unwrap()
    }

    #[test]
    fn standard_table_covers_every_pattern() {
        let table = ReferenceTable::standard().unwrap();
        assert_eq!(table.len(), 64);
        for pattern in PatternKey::all() {
            assert_eq!(table.resolve(pattern).unwrap().pattern, pattern);
        }
        let published = table.entries().filter(|entry| entry.source == EntrySource::Published).count();
        assert_eq!(published, 40);
    }

    #[test]
    fn published_rows_are_kept_verbatim() {
        let table = ReferenceTable::instance();
        let lowest = table.resolve(key("P000")).unwrap();
        assert_eq!(lowest.mpn, MpnValue::BelowRange(3.0));
        assert_eq!(lowest.ci_low, CiBound::Unbounded);
        assert_eq!(lowest.ci_high, CiBound::Value(9.5));

        let single = table.resolve(key("P100")).unwrap();
        assert_eq!(single.mpn.to_string(), "3.6");
        assert_eq!(single.ci_low, CiBound::Value(0.17));
        assert_eq!(single.ci_high, CiBound::Value(18.0));

        let highest = table.resolve(key("P333")).unwrap();
        assert_eq!(highest.mpn.to_string(), ">1100");
        assert_eq!(highest.ci_high, CiBound::Unbounded);
    }

    #[test]
    fn estimates_agree_with_published_rows() {
        assert_eq!(estimate_entry(key("P100")).mpn, MpnValue::Bounded(3.6));
        assert_eq!(estimate_entry(key("P001")).mpn, MpnValue::Bounded(3.0));
    }

    #[test]
    fn filled_rows_are_estimates_with_intervals() {
        let table = ReferenceTable::instance();
        let entry = table.resolve(key("P003")).unwrap();
        assert_eq!(entry.source, EntrySource::Estimated);
        match (entry.mpn, entry.ci_low, entry.ci_high) {
            (MpnValue::Bounded(mpn), CiBound::Value(low), CiBound::Value(high)) => {
                assert!(low < mpn && mpn < high);
            }
            other => panic!("unexpected estimate {other:?}"),
        }
    }

    #[test]
    fn rounding_keeps_two_significant_digits() {
        assert_eq!(round_significant(3.57), 3.6);
        assert_eq!(round_significant(1234.0), 1200.0);
        assert_eq!(round_significant(0.1549), 0.15);
        assert_eq!(round_significant(0.0), 0.0);
    }

    #[test]
    fn partial_table_fails_validation() {
        let table = ReferenceTable::from_csv("pattern,mpn_per_g,ci_low,ci_high\nP000,<3.0,-,9.5\n").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.validate(), Err(TableError::MissingEntry(key("P001"))));
    }

    #[test]
    fn malformed_rows_are_rejected() {
        assert!(matches!(
            ReferenceTable::from_csv("P000,<3.0,-\n"),
            Err(TableError::MalformedRow { line: 1, .. })
        ));
        assert!(matches!(
            ReferenceTable::from_csv("P000,<3.0,-,9.5\nP000,<3.0,-,9.5\n"),
            Err(TableError::DuplicateEntry(_))
        ));
        assert!(matches!(
            ReferenceTable::from_csv("P400,1,1,1\n"),
            Err(TableError::MalformedRow { .. })
        ));
    }
}
