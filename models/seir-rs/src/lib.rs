//! Deterministic compartmental epidemic projection.
//!
//! A population is split into susceptible, exposed, infected, recovered,
//! deceased and vaccinated compartments and advanced on a daily grid under
//! static interventions and optional seasonal forcing.

pub mod error;
pub mod parameters;
pub mod projector;
pub mod request;
pub mod trajectory;

pub use error::{ProjectionError, RunError};
pub use parameters::{Integrator, InterventionParameters, ProjectionOptions, SimulationParameters};
pub use projector::EpidemicProjector;
pub use trajectory::{Summary, Trajectory};
