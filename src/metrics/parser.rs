//! Metrics Parser
//!
//! Turns raw info-protocol text into typed records. Fields are located by
//! `key=value` pattern, never by position, since servers reorder and add
//! fields between versions.
//!
//! ```text
//! sets       ns=persisted:set=lru:objects=26000000:tombstones=0:...;ns=...
//! histogram  units=seconds:hist-width=14400:bucket-width=3600:buckets=0,500000,...
//! ```

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Info key returning per-set statistics for every namespace
pub const SETS_QUERY: &str = "sets";

const RECORD_SEPARATOR: char = ';';
const FIELD_SEPARATOR: char = ':';

const NAMESPACE_KEYS: &[&str] = &["ns", "namespace", "ns_name"];
const SET_NAME_KEYS: &[&str] = &["set", "set_name"];
const OBJECTS_KEYS: &[&str] = &["objects", "n_objects"];

const UNITS_KEY: &str = "units";
const BUCKET_WIDTH_KEYS: &[&str] = &["bucket-width", "bucket_width", "width"];
const BUCKETS_KEY: &str = "buckets";

/// Build the TTL histogram info key for one set
pub fn histogram_query(namespace: &str, set_name: &str) -> String {
    format!("histogram:namespace={};set={};type=ttl", namespace, set_name)
}

// =============================================================================
// Tokenizer
// =============================================================================

/// Key/value pairs of one record, in the order they appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields<'a> {
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> Fields<'a> {
    /// Value of the first field named `key`
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    /// Value of the first field matching any of `keys` (checked in order)
    pub fn get_any(&self, keys: &[&str]) -> Option<&'a str> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// Like [`get_any`](Self::get_any) but fails with a parse error naming `keys[0]`
    pub fn require(&self, keys: &[&str]) -> Result<&'a str> {
        self.get_any(keys)
            .ok_or_else(|| Error::parse(keys[0], "required field missing"))
    }

    /// Numeric field lookup
    pub fn require_u64(&self, keys: &[&str]) -> Result<u64> {
        let raw = self.require(keys)?;
        raw.trim()
            .parse::<u64>()
            .map_err(|_| Error::parse(keys[0], format!("not a non-negative integer: '{}'", raw)))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Split `record` on `separator` into `key=value` pairs.
///
/// Tokens without `=` are ignored. Only the first `=` splits, so values may
/// contain `=` themselves.
pub fn tokenize(record: &str, separator: char) -> Fields<'_> {
    let pairs = record
        .split(separator)
        .filter_map(|token| {
            let (key, value) = token.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                None
            } else {
                Some((key, value.trim()))
            }
        })
        .collect();

    Fields { pairs }
}

// =============================================================================
// Set Occupancy
// =============================================================================

/// Live entry count of one set on one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetOccupancy {
    /// Namespace, when the server reports it in the record
    pub namespace: Option<String>,
    /// Set name
    pub set_name: String,
    /// Live entries on this node (master and replica copies)
    pub objects: u64,
}

/// Selects which set records survive parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetFilter {
    /// Namespace to keep; records without a namespace field are kept
    pub namespace: Option<String>,
    /// Set name to keep
    pub set_name: String,
}

impl SetFilter {
    pub fn new(namespace: impl Into<String>, set_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            set_name: set_name.into(),
        }
    }

    /// Filter on set name only
    pub fn set_only(set_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            set_name: set_name.into(),
        }
    }

    fn matches(&self, namespace: Option<&str>, set_name: &str) -> bool {
        if set_name != self.set_name {
            return false;
        }
        match (&self.namespace, namespace) {
            (Some(wanted), Some(found)) => wanted == found,
            _ => true,
        }
    }
}

fn occupancy_from_fields(fields: &Fields<'_>) -> Result<SetOccupancy> {
    let set_name = fields.require(SET_NAME_KEYS)?;
    let objects = fields.require_u64(OBJECTS_KEYS)?;

    Ok(SetOccupancy {
        namespace: fields.get_any(NAMESPACE_KEYS).map(str::to_string),
        set_name: set_name.to_string(),
        objects,
    })
}

/// Parse one colon-separated set record.
pub fn parse_set_record(record: &str) -> Result<SetOccupancy> {
    occupancy_from_fields(&tokenize(record, FIELD_SEPARATOR))
}

/// Parse a `sets` reply, keeping only records selected by `filter`.
///
/// Malformed records are logged and skipped; they never hide the
/// well-formed records of the same reply.
pub fn parse_sets(raw: &str, filter: &SetFilter) -> Vec<SetOccupancy> {
    let mut occupancies = Vec::new();

    for record in raw.split(RECORD_SEPARATOR) {
        let record = record.trim();
        if record.is_empty() {
            continue;
        }

        let fields = tokenize(record, FIELD_SEPARATOR);
        let Some(set_name) = fields.get_any(SET_NAME_KEYS) else {
            warn!("Skipping set record without a set name: {}", record);
            continue;
        };

        if !filter.matches(fields.get_any(NAMESPACE_KEYS), set_name) {
            debug!("Ignoring set record for {}", set_name);
            continue;
        }

        match occupancy_from_fields(&fields) {
            Ok(occupancy) => occupancies.push(occupancy),
            Err(e) => warn!("Skipping malformed record for set {}: {} ({})", set_name, e, record),
        }
    }

    occupancies
}

// =============================================================================
// Age Histogram
// =============================================================================

/// TTL distribution of one set on one node.
///
/// Bucket `i` covers `[i * width, (i + 1) * width)` seconds. Bucket 0 is the
/// first range a remove-by-age call deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgeHistogram {
    units: String,
    bucket_width_secs: u64,
    buckets: Vec<u64>,
}

impl AgeHistogram {
    /// Build a histogram in seconds. Width must be positive.
    pub fn new(bucket_width_secs: u64, buckets: Vec<u64>) -> Result<Self> {
        if bucket_width_secs == 0 {
            return Err(Error::parse(BUCKET_WIDTH_KEYS[0], "bucket width must be positive"));
        }
        Ok(Self {
            units: "seconds".to_string(),
            bucket_width_secs,
            buckets,
        })
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn bucket_width_secs(&self) -> u64 {
        self.bucket_width_secs
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    /// Sum of all bucket counts (approximate for sampled histograms)
    pub fn total(&self) -> u64 {
        self.buckets.iter().fold(0u64, |acc, c| acc.saturating_add(*c))
    }

    /// Whether no bucket holds any entry
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|c| *c == 0)
    }

    /// Upper age bound of bucket `index`
    pub fn upper_bound_secs(&self, index: usize) -> u64 {
        (index as u64)
            .saturating_add(1)
            .saturating_mul(self.bucket_width_secs)
    }

    /// Upper age bound of the last bucket
    pub fn span_secs(&self) -> u64 {
        (self.buckets.len() as u64).saturating_mul(self.bucket_width_secs)
    }
}

/// Parse a `histogram:...;type=ttl` reply.
pub fn parse_histogram(raw: &str) -> Result<AgeHistogram> {
    let fields = tokenize(raw.trim(), FIELD_SEPARATOR);

    if let Some(units) = fields.get(UNITS_KEY) {
        if units != "seconds" {
            return Err(Error::parse(
                UNITS_KEY,
                format!("unsupported histogram units '{}'", units),
            ));
        }
    }

    let bucket_width_secs = fields.require_u64(BUCKET_WIDTH_KEYS)?;

    let buckets = fields
        .require(&[BUCKETS_KEY])?
        .split(',')
        .map(str::trim)
        .filter(|count| !count.is_empty())
        .map(|count| {
            count.parse::<u64>().map_err(|_| {
                Error::parse(BUCKETS_KEY, format!("not a non-negative integer: '{}'", count))
            })
        })
        .collect::<Result<Vec<u64>>>()?;

    AgeHistogram::new(bucket_width_secs, buckets)
}
