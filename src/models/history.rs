//! Daily aggregates built from raw historical readings

use super::{Observation, Pollutant};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean concentration per pollutant for one UTC calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub means: BTreeMap<Pollutant, f64>,
    pub source: String,
}

impl DailyAggregate {
    /// Group readings by UTC day and pollutant, reducing each group to its mean.
    ///
    /// Days without any value are omitted; the result is sorted by date.
    #[must_use]
    pub fn from_observations(observations: &[Observation], source: &str) -> Vec<DailyAggregate> {
        let mut groups: BTreeMap<NaiveDate, BTreeMap<Pollutant, (f64, u32)>> = BTreeMap::new();

        for observation in observations {
            let date = observation.timestamp.date_naive();
            for (pollutant, concentration) in observation.concentrations() {
                let Some(value) = concentration else { continue };
                let slot = groups
                    .entry(date)
                    .or_default()
                    .entry(pollutant)
                    .or_insert((0.0, 0));
                slot.0 += value;
                slot.1 += 1;
            }
        }

        groups
            .into_iter()
            .filter(|(_, sums)| !sums.is_empty())
            .map(|(date, sums)| DailyAggregate {
                date,
                means: sums
                    .into_iter()
                    .map(|(pollutant, (sum, count))| (pollutant, sum / f64::from(count)))
                    .collect(),
                source: source.to_string(),
            })
            .collect()
    }
}
