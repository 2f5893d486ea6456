use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::ProjectionError;

pub const MAX_TRANSMISSION_RATE: f64 = 10.0;
pub const MAX_SIMULATION_DAYS: usize = 3650;

const UNIT_INTERVAL: RangeInclusive<f64> = 0.0..=1.0;

/// Disease and population description for one projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub population_size: u64,
    pub initial_cases: u64,
    /// Person-to-person transmission coefficient before interventions.
    pub transmission_rate: f64,
    /// Mean latent duration in days.
    pub incubation_period: f64,
    /// Daily fraction of infectious individuals that resolve.
    pub recovery_rate: f64,
    /// Share of the resolving flow that dies.
    pub mortality_rate: f64,
    /// Horizon length including day 0.
    pub simulation_days: usize,
    /// Amplitude of the yearly sinusoidal forcing on transmission.
    #[serde(default)]
    pub seasonality: f64,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            population_size: 1000,
            initial_cases: 10,
            transmission_rate: 0.3,
            incubation_period: 5.0,
            recovery_rate: 0.1,
            mortality_rate: 0.02,
            simulation_days: 100,
            seasonality: 0.0,
        }
    }
}

impl SimulationParameters {
    pub fn validate(&self) -> Result<(), ProjectionError> {
        if self.population_size == 0 {
            return Err(ProjectionError::invalid(
                "populationSize",
                0.0,
                "a positive integer",
            ));
        }
        if self.initial_cases == 0 {
            return Err(ProjectionError::invalid(
                "initialCases",
                0.0,
                "a positive integer",
            ));
        }
        if self.initial_cases > self.population_size {
            return Err(ProjectionError::InitialCasesExceedPopulation {
                initial_cases: self.initial_cases,
                population_size: self.population_size,
            });
        }
        check_range(
            "transmissionRate",
            self.transmission_rate,
            0.0..=MAX_TRANSMISSION_RATE,
            "within [0, 10]",
        )?;
        if !(self.incubation_period.is_finite() && self.incubation_period > 0.0) {
            return Err(ProjectionError::invalid(
                "incubationPeriod",
                self.incubation_period,
                "a positive number of days",
            ));
        }
        check_range("recoveryRate", self.recovery_rate, UNIT_INTERVAL, "within [0, 1]")?;
        check_range("mortalityRate", self.mortality_rate, UNIT_INTERVAL, "within [0, 1]")?;
        if !(1..=MAX_SIMULATION_DAYS).contains(&self.simulation_days) {
            return Err(ProjectionError::invalid(
                "simulationDays",
                self.simulation_days as f64,
                "within [1, 3650]",
            ));
        }
        check_range("seasonality", self.seasonality, UNIT_INTERVAL, "within [0, 1]")
    }
}

/// Interventions in force for the whole horizon. Every field defaults to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterventionParameters {
    pub social_distancing: f64,
    pub mask_effectiveness: f64,
    /// Daily fraction of the current susceptible pool routed to vaccination.
    pub vaccination_rate: f64,
    pub vaccine_effectiveness: f64,
}

impl InterventionParameters {
    /// Factor applied to the raw transmission rate. Distancing and masks compound.
    pub fn transmission_multiplier(&self) -> f64 {
        (1.0 - self.social_distancing) * (1.0 - self.mask_effectiveness)
    }

    /// Daily fraction of S moved into V.
    pub fn daily_vaccination(&self) -> f64 {
        self.vaccination_rate * self.vaccine_effectiveness
    }

    pub fn validate(&self) -> Result<(), ProjectionError> {
        check_range(
            "socialDistancing",
            self.social_distancing,
            UNIT_INTERVAL,
            "within [0, 1]",
        )?;
        check_range(
            "maskEffectiveness",
            self.mask_effectiveness,
            UNIT_INTERVAL,
            "within [0, 1]",
        )?;
        check_range(
            "vaccinationRate",
            self.vaccination_rate,
            UNIT_INTERVAL,
            "within [0, 1]",
        )?;
        check_range(
            "vaccineEffectiveness",
            self.vaccine_effectiveness,
            UNIT_INTERVAL,
            "within [0, 1]",
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Integrator {
    /// Explicit Euler with a fixed daily step.
    #[default]
    Euler,
    /// Classical fourth-order Runge-Kutta over the same daily step.
    Rk4,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectionOptions {
    pub integrator: Integrator,
    /// Clamp every compartment into `[0, populationSize]` after each step.
    pub clamp: bool,
}

// NaN fails `contains`, so non-finite values are rejected here too.
fn check_range(
    name: &'static str,
    value: f64,
    range: RangeInclusive<f64>,
    expected: &'static str,
) -> Result<(), ProjectionError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ProjectionError::invalid(name, value, expected))
    }
}
