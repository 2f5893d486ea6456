use std::process::ExitCode;

use anyhow::Context;
use epiproj_mrp::Environment;
use seir_projector::request::{self, ProjectionRequest};
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    // stdout carries model output, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let ctx = match std::env::args_os().nth(1) {
        Some(path) => Environment::from_toml_file(&path)
            .and_then(|env| env.with_input_type::<ProjectionRequest>())
            .with_context(|| format!("failed to load run file {}", path.to_string_lossy()))?,
        None => Environment::<ProjectionRequest>::load()
            .context("failed to load run request from stdin")?,
    };

    request::execute(&ctx).context("projection failed")?;
    Ok(())
}
