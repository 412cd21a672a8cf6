use std::io::Read;

use serde::Deserialize;
use serde_json::{Map, Value};

use fogrelay_api::{GLUCOSE_FEATURES, Reading, TIMESTAMP_SENT, round_to};

use super::error::SimError;

// ═══════════════════════════════════════════════════════════════
//  Device profile
// ═══════════════════════════════════════════════════════════════

/// Static attributes of the wearer, sent with every generated reading.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceProfile {
    #[serde(default = "default_age")]
    pub age: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// 1 = male, 0 = female.
    #[serde(default = "default_gender")]
    pub gender: f64,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            age: default_age(),
            weight: default_weight(),
            gender: default_gender(),
        }
    }
}

fn default_age() -> f64 {
    30.0
}
fn default_weight() -> f64 {
    70.0
}
fn default_gender() -> f64 {
    1.0
}

/// One synthetic sample in the ranges of the reference sensor.
pub fn generate_reading(rng: &mut Rng, device: &DeviceProfile) -> Reading {
    let mut fields = Map::new();
    fields.insert("PPG_Signal".into(), round_to(rng.uniform(0.5, 1.5), 2).into());
    fields.insert("Heart_Rate".into(), rng.int_inclusive(60, 100).into());
    fields.insert("Systolic_Peak".into(), round_to(rng.uniform(100.0, 140.0), 1).into());
    fields.insert("Diastolic_Peak".into(), round_to(rng.uniform(60.0, 90.0), 1).into());
    fields.insert("Pulse_Area".into(), round_to(rng.uniform(10.0, 30.0), 2).into());
    fields.insert("Age".into(), device.age.into());
    fields.insert("Weight".into(), device.weight.into());
    fields.insert("Gender".into(), device.gender.into());
    Reading::new(fields)
}

/// Stamp the producer send time right before the reading leaves.
pub fn stamp(reading: &Reading, now_secs: f64) -> Reading {
    let mut out = reading.clone();
    out.insert(TIMESTAMP_SENT, now_secs);
    out
}

// ═══════════════════════════════════════════════════════════════
//  RNG (xorshift64)
// ═══════════════════════════════════════════════════════════════

pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: i64) -> Self {
        let state = if seed == 0 {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64
                | 1 // ensure non-zero
        } else {
            seed as u64
        };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Returns f64 in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / ((1u64 << 53) as f64)
    }

    /// Returns f64 in [lo, hi)
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }

    /// Returns an integer in [lo, hi]
    pub fn int_inclusive(&mut self, lo: i64, hi: i64) -> i64 {
        let span = (hi - lo + 1) as u64;
        lo + (self.next_u64() % span) as i64
    }
}

// ═══════════════════════════════════════════════════════════════
//  Dataset replay (CSV)
// ═══════════════════════════════════════════════════════════════

/// Rows of a recorded dataset, turned into readings with the model features.
pub struct Dataset {
    rows: Vec<Reading>,
    pos: usize,
    pub skipped: usize,
    pub path: String,
}

impl Dataset {
    pub fn open(path: &str) -> Result<Self, SimError> {
        let file = std::fs::File::open(path).map_err(|e| SimError::Config(format!("cannot open {path}: {e}")))?;
        Self::from_reader(file, path)
    }

    pub fn from_reader<R: Read>(reader: R, path: &str) -> Result<Self, SimError> {
        let dataset_err = |source| SimError::Dataset { path: path.to_string(), source };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers().map_err(dataset_err)?.clone();
        let mut columns = Vec::with_capacity(GLUCOSE_FEATURES.len());
        for name in GLUCOSE_FEATURES {
            let idx = headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| SimError::Config(format!("{path}: missing column '{name}'")))?;
            columns.push((name, idx));
        }

        let mut rows = Vec::new();
        let mut skipped = 0;
        for record in reader.records() {
            let record = record.map_err(dataset_err)?;
            match row_to_reading(&record, &columns) {
                Some(r) => rows.push(r),
                None => skipped += 1,
            }
        }

        if rows.is_empty() {
            return Err(SimError::Config(format!("{path}: no complete rows")));
        }
        Ok(Self {
            rows,
            pos: 0,
            skipped,
            path: path.to_string(),
        })
    }

    pub fn total(&self) -> usize {
        self.rows.len()
    }
    pub fn done(&self) -> bool {
        self.pos >= self.rows.len()
    }

    pub fn next_reading(&mut self) -> Option<&Reading> {
        let row = self.rows.get(self.pos)?;
        self.pos += 1;
        Some(row)
    }
}

/// `None` when any feature cell is empty or unparseable.
fn row_to_reading(record: &csv::StringRecord, columns: &[(&str, usize)]) -> Option<Reading> {
    let mut fields = Map::new();
    for &(name, idx) in columns {
        let cell = record.get(idx).filter(|c| !c.is_empty())?;
        let value = if name == "Gender" { parse_gender(cell)? } else { cell.parse::<f64>().ok()? };
        fields.insert(name.to_string(), Value::from(value));
    }
    Some(Reading::new(fields))
}

fn parse_gender(cell: &str) -> Option<f64> {
    if cell.eq_ignore_ascii_case("male") {
        Some(1.0)
    } else if cell.eq_ignore_ascii_case("female") {
        Some(0.0)
    } else {
        cell.parse().ok()
    }
}
