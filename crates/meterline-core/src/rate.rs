use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Units granted when a class has no entry in the table.
pub const DEFAULT_UNIT_COUNT: u32 = 1;
/// Per-unit rate (points per second) used when a class has no entry.
pub const DEFAULT_RATE_PER_UNIT_PER_SECOND: f64 = 0.007;

#[derive(Debug, thiserror::Error)]
pub enum RateTableError {
    #[error("cannot read rate table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON rate table: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML rate table: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("rate for class '{class}' must be a finite number >= 0, got {rate}")]
    InvalidRate { class: String, rate: f64 },
}

/// Rate configuration for one resource class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub resource_class: String,
    pub unit_count: u32,
    pub rate_per_unit_per_second: f64,
}

impl RateEntry {
    pub fn new(resource_class: &str, unit_count: u32, rate_per_unit_per_second: f64) -> Self {
        Self {
            resource_class: resource_class.to_string(),
            unit_count,
            rate_per_unit_per_second,
        }
    }

    /// `unit_count * rate_per_unit_per_second`, in points per second.
    pub fn effective_rate(&self) -> f64 {
        f64::from(self.unit_count) * self.rate_per_unit_per_second
    }

    fn validate(&self) -> Result<(), RateTableError> {
        let rate = self.effective_rate();
        if !rate.is_finite() || self.rate_per_unit_per_second < 0.0 {
            return Err(RateTableError::InvalidRate {
                class: self.resource_class.clone(),
                rate: self.rate_per_unit_per_second,
            });
        }
        Ok(())
    }
}

/// Outcome of a rate lookup. `fallback` is set when the class was not in
/// the table and the default entry was used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub rate: f64,
    pub fallback: bool,
}

/// On-disk shape of a rate table: `{ default, classes: { name: {..} } }`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RateFile {
    #[serde(default)]
    default: Option<RateFields>,
    #[serde(default)]
    classes: BTreeMap<String, RateFields>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RateFields {
    unit_count: u32,
    rate_per_unit_per_second: f64,
}

/// Static mapping from resource class to consumption rate.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    entries: BTreeMap<String, RateEntry>,
    default: RateEntry,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            default: RateEntry::new(
                "default",
                DEFAULT_UNIT_COUNT,
                DEFAULT_RATE_PER_UNIT_PER_SECOND,
            ),
        }
    }
}

impl RateTable {
    /// Build from entries, keeping the built-in default for unknown classes.
    pub fn from_entries(
        entries: impl IntoIterator<Item = RateEntry>,
    ) -> Result<Self, RateTableError> {
        let mut table = Self::default();
        for entry in entries {
            table.insert(entry)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, entry: RateEntry) -> Result<(), RateTableError> {
        entry.validate()?;
        self.entries.insert(entry.resource_class.clone(), entry);
        Ok(())
    }

    pub fn with_default(
        mut self,
        unit_count: u32,
        rate_per_unit_per_second: f64,
    ) -> Result<Self, RateTableError> {
        let default = RateEntry::new("default", unit_count, rate_per_unit_per_second);
        default.validate()?;
        self.default = default;
        Ok(self)
    }

    pub fn default_entry(&self) -> &RateEntry {
        &self.default
    }

    pub fn entries(&self) -> impl Iterator<Item = &RateEntry> {
        self.entries.values()
    }

    /// Points per second for a class; the default rate when unrecognized.
    pub fn resolve(&self, resource_class: &str) -> f64 {
        self.lookup(resource_class).rate
    }

    /// Like [`resolve`](Self::resolve) but reports whether the fallback was used.
    pub fn lookup(&self, resource_class: &str) -> Resolution {
        match self.entries.get(resource_class) {
            Some(entry) => Resolution {
                rate: entry.effective_rate(),
                fallback: false,
            },
            None => Resolution {
                rate: self.default.effective_rate(),
                fallback: true,
            },
        }
    }

    pub fn from_json(s: &str) -> Result<Self, RateTableError> {
        let file: RateFile = serde_json::from_str(s)?;
        Self::from_file(file)
    }

    pub fn from_yaml(s: &str) -> Result<Self, RateTableError> {
        let file: RateFile = serde_yaml::from_str(s)?;
        Self::from_file(file)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file. Other extensions are read as JSON.
    pub fn load(path: &Path) -> Result<Self, RateTableError> {
        let content = std::fs::read_to_string(path).map_err(|source| RateTableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Serialize in the on-disk JSON shape accepted by [`from_json`](Self::from_json).
    pub fn to_json_pretty(&self) -> Result<String, RateTableError> {
        let file = RateFile {
            default: Some(RateFields {
                unit_count: self.default.unit_count,
                rate_per_unit_per_second: self.default.rate_per_unit_per_second,
            }),
            classes: self
                .entries
                .iter()
                .map(|(k, e)| {
                    (
                        k.clone(),
                        RateFields {
                            unit_count: e.unit_count,
                            rate_per_unit_per_second: e.rate_per_unit_per_second,
                        },
                    )
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    fn from_file(file: RateFile) -> Result<Self, RateTableError> {
        let mut table = Self::from_entries(file.classes.into_iter().map(|(class, fields)| {
            RateEntry::new(&class, fields.unit_count, fields.rate_per_unit_per_second)
        }))?;
        if let Some(d) = file.default {
            table = table.with_default(d.unit_count, d.rate_per_unit_per_second)?;
        }
        Ok(table)
    }
}
