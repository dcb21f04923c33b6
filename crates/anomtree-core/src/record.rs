//! RecordBuilder: per-row anomaly records from sensor contribution scores.
//!
//! Sensors are grouped into domains by name, each domain gets an aggregate
//! score, and domains are ranked. The resulting [`Record`] is what the oracle
//! reads when it writes a template.
//!
//! Aggregate score of a domain: the sum of its top `k` contribution values
//! divided by `sqrt(k)`, where `k = 1 + min(sensor count of each tracked
//! domain)`. A domain with fewer than `k` sensors sums all of them but is
//! still divided by `sqrt(k)`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ratio of the runner-up to the top score at which two domains count as tied.
pub const CROSS_DOMAIN_RATIO: f64 = 0.95;

/// Sensor domain derived from a sensor's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    Temperature,
    Voltage,
    Other,
}

impl Domain {
    /// Domains that take part in scoring, in tie-break order.
    pub const TRACKED: [Domain; 2] = [Domain::Temperature, Domain::Voltage];

    /// Classify a sensor by case-insensitive substring and prefix rules.
    pub fn of_sensor(name: &str) -> Domain {
        let s = name.to_lowercase();
        if s.contains("temperature") || ["t_", "temp", "tch"].iter().any(|p| s.starts_with(p)) {
            return Domain::Temperature;
        }
        if s.contains("voltage") || ["v_ch", "v_", "volt", "vch"].iter().any(|p| s.starts_with(p)) {
            return Domain::Voltage;
        }
        Domain::Other
    }

    pub fn name(&self) -> &'static str {
        match self {
            Domain::Temperature => "Temperature",
            Domain::Voltage => "Voltage",
            Domain::Other => "Other",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One sensor's contribution value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorValue {
    pub name: String,
    pub value: f64,
}

/// Sensors of one domain, in column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainGroup {
    pub name: String,
    pub sensors: Vec<SensorValue>,
}

/// A domain's aggregate score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainScore {
    pub name: String,
    pub score: f64,
}

/// Structured description of one anomaly event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub domains: Vec<DomainGroup>,
    /// Tracked domains sorted by score, highest first.
    pub ranking: Vec<DomainScore>,
    pub ratio_2_over_1: f64,
    pub cross_domain_close: bool,
}

impl Record {
    pub fn top_domain(&self) -> Option<&str> {
        self.ranking.first().map(|d| d.name.as_str())
    }
}

/// Builds [`Record`]s for rows sharing one sensor layout.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    sensors: Vec<(String, Domain)>,
    top_k: usize,
}

impl RecordBuilder {
    /// Prepare a builder for the given sensor names (column order).
    pub fn new<S: AsRef<str>>(sensor_names: &[S]) -> Self {
        let sensors: Vec<(String, Domain)> = sensor_names
            .iter()
            .map(|s| (s.as_ref().to_string(), Domain::of_sensor(s.as_ref())))
            .collect();

        let min_count = Domain::TRACKED
            .iter()
            .map(|d| sensors.iter().filter(|(_, sd)| sd == d).count())
            .min()
            .unwrap_or(0);

        Self {
            sensors,
            top_k: min_count + 1,
        }
    }

    /// Normalization width shared by every domain.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn sensor_names(&self) -> impl Iterator<Item = &str> {
        self.sensors.iter().map(|(name, _)| name.as_str())
    }

    /// Build the record for one row of contribution values.
    ///
    /// `values` must follow the sensor order given to [`RecordBuilder::new`];
    /// missing trailing values count as `0.0`.
    pub fn build(&self, values: &[f64]) -> Record {
        let mut groups: Vec<DomainGroup> = Domain::TRACKED
            .iter()
            .map(|d| DomainGroup {
                name: d.name().to_string(),
                sensors: Vec::new(),
            })
            .collect();

        for (i, (name, domain)) in self.sensors.iter().enumerate() {
            if let Some(slot) = Domain::TRACKED.iter().position(|d| d == domain) {
                groups[slot].sensors.push(SensorValue {
                    name: name.clone(),
                    value: values.get(i).copied().unwrap_or(0.0),
                });
            }
        }

        let norm = (self.top_k as f64).sqrt();
        let mut ranking: Vec<DomainScore> = groups
            .iter()
            .map(|group| {
                let mut vals: Vec<f64> = group.sensors.iter().map(|s| s.value).collect();
                vals.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
                let k = self.top_k.min(vals.len());
                let score = if k == 0 {
                    0.0
                } else {
                    vals[..k].iter().sum::<f64>() / norm
                };
                DomainScore {
                    name: group.name.clone(),
                    score,
                }
            })
            .collect();
        // Stable sort keeps tracked-domain order on ties.
        ranking.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let (ratio_2_over_1, cross_domain_close) = match ranking.as_slice() {
            [first, second, ..] if first.score > 0.0 => {
                let ratio = second.score / first.score;
                (ratio, ratio >= CROSS_DOMAIN_RATIO)
            }
            _ => (0.0, false),
        };

        groups.retain(|g| !g.sensors.is_empty());

        Record {
            domains: groups,
            ranking,
            ratio_2_over_1,
            cross_domain_close,
        }
    }
}
