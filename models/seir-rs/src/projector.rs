use std::f64::consts::PI;

use tracing::{debug, trace};

use crate::{
    error::ProjectionError,
    parameters::{Integrator, InterventionParameters, ProjectionOptions, SimulationParameters},
    trajectory::{Compartments, DECEASED, EXPOSED, INFECTED, SUSCEPTIBLE, Trajectory, VACCINATED},
};

const DAYS_PER_YEAR: f64 = 365.0;

/// Population movement over one day, all computed from the same state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyFlows {
    pub vaccinated: f64,
    pub exposed: f64,
    pub infected: f64,
    pub recovered: f64,
    pub deceased: f64,
}

impl DailyFlows {
    /// Net change per compartment, ordered like [`Compartments`].
    pub fn delta(&self) -> Compartments {
        Compartments::new(
            -self.exposed - self.vaccinated,
            self.exposed - self.infected,
            self.infected - self.recovered - self.deceased,
            self.recovered,
            self.deceased,
            self.vaccinated,
        )
    }
}

/// Rates that stay fixed over the horizon.
#[derive(Debug, Clone, Copy)]
struct Rates {
    adjusted_beta: f64,
    sigma: f64,
    gamma: f64,
    mortality: f64,
    seasonality: f64,
    vaccination: f64,
    population: f64,
}

impl Rates {
    fn new(parameters: &SimulationParameters, interventions: &InterventionParameters) -> Rates {
        Rates {
            adjusted_beta: parameters.transmission_rate * interventions.transmission_multiplier(),
            sigma: 1.0 / parameters.incubation_period,
            gamma: parameters.recovery_rate,
            mortality: parameters.mortality_rate,
            seasonality: parameters.seasonality,
            vaccination: interventions.daily_vaccination(),
            population: parameters.population_size as f64,
        }
    }

    fn beta_at(&self, t: f64) -> f64 {
        self.adjusted_beta * (1.0 + self.seasonality * (2.0 * PI * t / DAYS_PER_YEAR).sin())
    }

    fn flows(&self, t: f64, state: &Compartments) -> DailyFlows {
        let s = state[SUSCEPTIBLE];
        let i = state[INFECTED];
        let resolving = self.gamma * i;
        DailyFlows {
            vaccinated: s * self.vaccination,
            exposed: self.beta_at(t) * s * i / self.population,
            infected: self.sigma * state[EXPOSED],
            recovered: resolving * (1.0 - self.mortality),
            deceased: resolving * self.mortality,
        }
    }

    /// Structural R0 from the initial susceptible fraction.
    fn basic_reproduction_number(&self, initial_susceptible: f64) -> Option<f64> {
        let resolution = self.gamma + self.mortality;
        if resolution == 0.0 {
            return None;
        }
        let r0 = self.adjusted_beta / resolution * (initial_susceptible / self.population);
        r0.is_finite().then_some(r0)
    }

    fn euler_step(&self, t: f64, state: &Compartments) -> Compartments {
        state + self.flows(t, state).delta()
    }

    fn rk4_step(&self, t: f64, state: &Compartments) -> Compartments {
        let k1 = self.flows(t, state).delta();
        let k2 = self.flows(t + 0.5, &(state + k1 * 0.5)).delta();
        let k3 = self.flows(t + 0.5, &(state + k2 * 0.5)).delta();
        let k4 = self.flows(t + 1.0, &(state + k3)).delta();
        state + (k1 + k2 * 2.0 + k3 * 2.0 + k4) / 6.0
    }
}

/// Deterministic SEIRD-V projection over a daily grid.
///
/// Holds no state between runs; every projection starts from the day-0
/// initial condition of its parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpidemicProjector {
    options: ProjectionOptions,
}

impl EpidemicProjector {
    pub fn new(options: ProjectionOptions) -> EpidemicProjector {
        EpidemicProjector { options }
    }

    pub fn options(&self) -> &ProjectionOptions {
        &self.options
    }

    /// Projects with the default options (Euler, unclamped) and no validation.
    pub fn run(
        parameters: &SimulationParameters,
        interventions: &InterventionParameters,
    ) -> Trajectory {
        EpidemicProjector::default().project(parameters, interventions)
    }

    /// Validates both parameter sets, then projects.
    pub fn try_project(
        &self,
        parameters: &SimulationParameters,
        interventions: &InterventionParameters,
    ) -> Result<Trajectory, ProjectionError> {
        parameters.validate()?;
        interventions.validate()?;
        Ok(self.project(parameters, interventions))
    }

    /// Projects without validation. Out-of-range input propagates NaN or
    /// infinity through the output instead of failing.
    pub fn project(
        &self,
        parameters: &SimulationParameters,
        interventions: &InterventionParameters,
    ) -> Trajectory {
        let rates = Rates::new(parameters, interventions);
        let population = rates.population;
        let initial_cases = parameters.initial_cases as f64;
        let initial =
            Compartments::new(population - initial_cases, 0.0, initial_cases, 0.0, 0.0, 0.0);

        debug!(
            days = parameters.simulation_days,
            adjusted_beta = rates.adjusted_beta,
            integrator = ?self.options.integrator,
            clamp = self.options.clamp,
            "projecting"
        );

        let mut output = Trajectory::with_capacity(parameters.simulation_days);
        output.push(&initial);
        let mut state = initial;
        let mut peak_infection = initial[INFECTED];
        let mut peak_day = 0;

        for day in 0..parameters.simulation_days.saturating_sub(1) {
            let t = day as f64;
            state = match self.options.integrator {
                Integrator::Euler => rates.euler_step(t, &state),
                Integrator::Rk4 => rates.rk4_step(t, &state),
            };
            if self.options.clamp {
                state = state.map(|v| v.clamp(0.0, population));
            }
            output.push(&state);

            // Strict comparison keeps the earliest day on ties
            if state[INFECTED] > peak_infection {
                peak_infection = state[INFECTED];
                peak_day = day + 1;
            }
            trace!(day = day + 1, infected = state[INFECTED], "step");
        }

        output.peak_infection = peak_infection;
        output.peak_day = peak_day;
        output.total_cases = population - state[SUSCEPTIBLE] - state[VACCINATED];
        output.total_deaths = state[DECEASED];
        output.r0 = rates.basic_reproduction_number(initial[SUSCEPTIBLE]);
        output
    }
}
