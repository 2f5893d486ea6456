use epiproj_mrp::Environment;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    error::RunError,
    parameters::{Integrator, InterventionParameters, ProjectionOptions, SimulationParameters},
    projector::EpidemicProjector,
    trajectory::Trajectory,
};

pub const TRAJECTORY_FILE: &str = "trajectory.csv";
pub const SUMMARY_FILE: &str = "summary.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Relative drift of the daily compartment total that triggers a warning.
pub const CONSERVATION_TOLERANCE: f64 = 1e-6;

/// Model input carried by a run request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionRequest {
    pub parameters: SimulationParameters,
    #[serde(default)]
    pub interventions: InterventionParameters,
    #[serde(default)]
    pub options: ProjectionOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Manifest<'a> {
    input_digest: &'a str,
    seed: u64,
    replicate: u64,
    simulation_days: usize,
    integrator: Integrator,
    clamp: bool,
}

/// Runs the requested projection and writes its outputs.
///
/// The trajectory table always goes out; the summary and manifest are only
/// written when the request names an output directory.
pub fn execute(ctx: &Environment<ProjectionRequest>) -> Result<Trajectory, RunError> {
    let request = ctx.input.as_ref().ok_or(RunError::MissingInput)?;
    let digest = ctx.input_digest()?;
    info!(
        run = %&digest[..12],
        replicate = ctx.replicate,
        days = request.parameters.simulation_days,
        "starting projection"
    );

    let projector = EpidemicProjector::new(request.options);
    let trajectory = projector.try_project(&request.parameters, &request.interventions)?;

    let population = request.parameters.population_size as f64;
    if trajectory.has_non_finite_values() {
        warn!("trajectory has non-finite compartment values; the step is unstable for these rates");
    }
    if trajectory.has_negative_values() {
        warn!("trajectory has negative compartment values; set options.clamp to bound them");
    }
    let drift = trajectory.max_conservation_drift(population);
    if request.options.clamp {
        debug!(drift, "clamped projection; conservation not enforced");
    } else if drift > CONSERVATION_TOLERANCE * population {
        warn!(drift, "compartment totals drifted from the population size");
    }

    ctx.write_csv(TRAJECTORY_FILE, &Trajectory::CSV_HEADERS, &trajectory.csv_rows())?;

    let summary = trajectory.summary(request.parameters.population_size);
    if ctx.output_dir().is_some() {
        ctx.write_json(SUMMARY_FILE, &summary)?;
        ctx.write_json(
            MANIFEST_FILE,
            &Manifest {
                input_digest: &digest,
                seed: ctx.seed,
                replicate: ctx.replicate,
                simulation_days: request.parameters.simulation_days,
                integrator: projector.options().integrator,
                clamp: projector.options().clamp,
            },
        )?;
    }

    info!(
        peak_infection = summary.peak_infection,
        peak_day = summary.peak_day,
        total_cases = summary.total_cases,
        total_deaths = summary.total_deaths,
        r0 = ?summary.r0,
        "projection complete"
    );
    Ok(trajectory)
}

#[cfg(test)]
mod test {
    use std::fs;

    use epiproj_mrp::Environment;
    use serde_json::{Value, json};

    use super::*;
    use crate::error::ProjectionError;

    fn request_json(dir: &std::path::Path) -> Value {
        json!({
            "input": {
                "replicate": 2,
                "parameters": {
                    "populationSize": 1000,
                    "initialCases": 10,
                    "transmissionRate": 0.3,
                    "incubationPeriod": 5,
                    "recoveryRate": 0.1,
                    "mortalityRate": 0.02,
                    "simulationDays": 30
                },
                "interventions": { "maskEffectiveness": 0.25 }
            },
            "output": { "spec": "filesystem", "dir": dir.to_str().unwrap() }
        })
    }

    #[test]
    fn test_request_defaults() {
        let ctx = Environment::from_json(json!({
            "input": {
                "parameters": {
                    "populationSize": 100,
                    "initialCases": 1,
                    "transmissionRate": 0.5,
                    "incubationPeriod": 3.5,
                    "recoveryRate": 0.2,
                    "mortalityRate": 0.0,
                    "simulationDays": 10
                }
            }
        }))
        .with_input_type::<ProjectionRequest>()
        .unwrap();
        let request = ctx.input.unwrap();
        assert_eq!(request.parameters.seasonality, 0.0);
        assert_eq!(request.interventions, InterventionParameters::default());
        assert_eq!(request.options, ProjectionOptions::default());
    }

    #[test]
    fn test_request_options() {
        let ctx = Environment::from_json(json!({
            "input": {
                "parameters": SimulationParameters::default(),
                "options": { "integrator": "rk4", "clamp": true }
            }
        }))
        .with_input_type::<ProjectionRequest>()
        .unwrap();
        let options = ctx.input.unwrap().options;
        assert_eq!(options.integrator, Integrator::Rk4);
        assert!(options.clamp);
    }

    #[test]
    fn test_execute_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Environment::from_json(request_json(dir.path()))
            .with_input_type::<ProjectionRequest>()
            .unwrap();

        let trajectory = execute(&ctx).unwrap();
        assert_eq!(trajectory.len(), 30);

        let table = fs::read_to_string(dir.path().join(TRAJECTORY_FILE)).unwrap();
        let mut lines = table.lines();
        assert_eq!(
            lines.next(),
            Some("day,susceptible,exposed,infected,recovered,deceased,vaccinated")
        );
        assert_eq!(lines.count(), 30);

        let summary: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap())
                .unwrap();
        assert_eq!(summary["peakDay"], trajectory.peak_day);
        assert!((summary["r0"].as_f64().unwrap() - 2.475 * 0.75).abs() < 1e-9);

        let manifest: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(manifest["inputDigest"], ctx.input_digest().unwrap());
        assert_eq!(manifest["replicate"], 2);
        assert_eq!(manifest["integrator"], "euler");
        assert_eq!(manifest["clamp"], false);
    }

    #[test]
    fn test_execute_rejects_invalid_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = request_json(dir.path());
        data["input"]["parameters"]["initialCases"] = json!(5000);
        let ctx = Environment::from_json(data)
            .with_input_type::<ProjectionRequest>()
            .unwrap();

        match execute(&ctx) {
            Err(RunError::Projection(ProjectionError::InitialCasesExceedPopulation {
                initial_cases,
                ..
            })) => assert_eq!(initial_cases, 5000),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!dir.path().join(TRAJECTORY_FILE).exists());
    }

    #[test]
    fn test_bundled_run_file() {
        let ctx = Environment::from_toml_str(include_str!("../runs/baseline.toml"))
            .unwrap()
            .with_input_type::<ProjectionRequest>()
            .unwrap();
        let request = ctx.input.as_ref().unwrap();
        assert_eq!(request.parameters, SimulationParameters::default());
        assert_eq!(request.options.integrator, Integrator::Euler);
        assert_eq!(ctx.output_dir(), Some(std::path::PathBuf::from("output/baseline")));
    }

    #[test]
    fn test_run_id_matches_equivalent_json_request() {
        let from_toml = Environment::from_toml_str(include_str!("../runs/baseline.toml"))
            .unwrap()
            .with_input_type::<ProjectionRequest>()
            .unwrap();
        // Integer spellings, reordered keys and omitted defaults
        let from_json = Environment::from_json(json!({
            "input": {
                "seed": 11,
                "parameters": {
                    "simulationDays": 100,
                    "incubationPeriod": 5,
                    "populationSize": 1000,
                    "initialCases": 10,
                    "transmissionRate": 0.3,
                    "recoveryRate": 0.1,
                    "mortalityRate": 0.02
                }
            }
        }))
        .with_input_type::<ProjectionRequest>()
        .unwrap();

        assert_eq!(
            from_toml.input_digest().unwrap(),
            from_json.input_digest().unwrap()
        );
    }
}
