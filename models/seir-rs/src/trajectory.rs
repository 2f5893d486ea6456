use nalgebra::Vector6;
use serde::{Deserialize, Serialize};

/// Compartment state for a single day, ordered S, E, I, R, D, V.
pub type Compartments = Vector6<f64>;

pub const SUSCEPTIBLE: usize = 0;
pub const EXPOSED: usize = 1;
pub const INFECTED: usize = 2;
pub const RECOVERED: usize = 3;
pub const DECEASED: usize = 4;
pub const VACCINATED: usize = 5;

/// Day-by-day compartment values and the summaries derived from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trajectory {
    pub susceptible: Vec<f64>,
    pub exposed: Vec<f64>,
    pub infected: Vec<f64>,
    pub recovered: Vec<f64>,
    pub deceased: Vec<f64>,
    pub vaccinated: Vec<f64>,
    pub peak_infection: f64,
    pub peak_day: usize,
    pub total_cases: f64,
    pub total_deaths: f64,
    /// `None` when `recoveryRate + mortalityRate` is zero or the estimate is not finite.
    pub r0: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub peak_infection: f64,
    pub peak_day: usize,
    pub total_cases: f64,
    pub total_deaths: f64,
    pub r0: Option<f64>,
    pub attack_rate: f64,
}

impl Trajectory {
    pub const CSV_HEADERS: [&'static str; 7] = [
        "day",
        "susceptible",
        "exposed",
        "infected",
        "recovered",
        "deceased",
        "vaccinated",
    ];

    pub(crate) fn with_capacity(days: usize) -> Trajectory {
        Trajectory {
            susceptible: Vec::with_capacity(days),
            exposed: Vec::with_capacity(days),
            infected: Vec::with_capacity(days),
            recovered: Vec::with_capacity(days),
            deceased: Vec::with_capacity(days),
            vaccinated: Vec::with_capacity(days),
            ..Default::default()
        }
    }

    pub(crate) fn push(&mut self, state: &Compartments) {
        self.susceptible.push(state[SUSCEPTIBLE]);
        self.exposed.push(state[EXPOSED]);
        self.infected.push(state[INFECTED]);
        self.recovered.push(state[RECOVERED]);
        self.deceased.push(state[DECEASED]);
        self.vaccinated.push(state[VACCINATED]);
    }

    pub fn len(&self) -> usize {
        self.susceptible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.susceptible.is_empty()
    }

    pub fn compartments(&self, day: usize) -> Option<Compartments> {
        (day < self.len()).then(|| {
            Compartments::new(
                self.susceptible[day],
                self.exposed[day],
                self.infected[day],
                self.recovered[day],
                self.deceased[day],
                self.vaccinated[day],
            )
        })
    }

    /// Sum of all six compartments for each day.
    pub fn totals(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).filter_map(|day| self.compartments(day).map(|c| c.sum()))
    }

    /// Largest absolute gap between the daily total and `population`.
    /// A non-finite total counts as infinite drift.
    pub fn max_conservation_drift(&self, population: f64) -> f64 {
        self.totals()
            .map(|total| {
                let gap = (total - population).abs();
                if gap.is_finite() { gap } else { f64::INFINITY }
            })
            .fold(0.0, f64::max)
    }

    pub fn has_negative_values(&self) -> bool {
        self.any_value(|v| v < 0.0)
    }

    pub fn has_non_finite_values(&self) -> bool {
        self.any_value(|v| !v.is_finite())
    }

    fn any_value(&self, predicate: impl Fn(f64) -> bool) -> bool {
        [
            &self.susceptible,
            &self.exposed,
            &self.infected,
            &self.recovered,
            &self.deceased,
            &self.vaccinated,
        ]
        .iter()
        .any(|series| series.iter().any(|&v| predicate(v)))
    }

    pub fn summary(&self, population_size: u64) -> Summary {
        Summary {
            peak_infection: self.peak_infection,
            peak_day: self.peak_day,
            total_cases: self.total_cases,
            total_deaths: self.total_deaths,
            r0: self.r0,
            attack_rate: self.total_cases / population_size as f64,
        }
    }

    pub fn csv_rows(&self) -> Vec<Vec<String>> {
        (0..self.len())
            .map(|day| {
                vec![
                    day.to_string(),
                    self.susceptible[day].to_string(),
                    self.exposed[day].to_string(),
                    self.infected[day].to_string(),
                    self.recovered[day].to_string(),
                    self.deceased[day].to_string(),
                    self.vaccinated[day].to_string(),
                ]
            })
            .collect()
    }
}
