use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to read run request: {0}")]
    Read(#[source] io::Error),

    #[error("no input on stdin")]
    EmptyRequest,

    #[error("failed to parse run request: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse run file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write csv output to {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// A single model run: the model input plus where its outputs go.
///
/// `seed` and `replicate` are protocol fields; they are lifted out of the
/// input so the typed model input never sees them.
pub struct Environment<I = ()> {
    input_json: serde_json::Map<String, Value>,
    pub input: Option<I>,
    pub seed: u64,
    pub replicate: u64,
    output: Value,
}

impl Environment {
    pub fn from_json(data: Value) -> Self {
        let mut input_json = data
            .get("input")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        let seed = input_json
            .remove("seed")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let replicate = input_json
            .remove("replicate")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let output = data.get("output").cloned().unwrap_or(Value::Null);

        Self {
            input_json,
            input: None,
            seed,
            replicate,
            output,
        }
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut raw = String::new();
        reader.read_to_string(&mut raw).map_err(ProtocolError::Read)?;
        if raw.trim().is_empty() {
            return Err(ProtocolError::EmptyRequest);
        }
        let data: Value = serde_json::from_str(&raw)?;
        Ok(Self::from_json(data))
    }

    pub fn from_stdin() -> Result<Self> {
        Self::from_reader(io::stdin().lock())
    }

    /// Parses a run file: the same request shape as the JSON protocol,
    /// written as `[input]` and `[output]` tables.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let data: Value = toml::from_str(raw)?;
        Ok(Self::from_json(data))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading run file");
        let raw = fs::read_to_string(path).map_err(ProtocolError::Read)?;
        Self::from_toml_str(&raw)
    }

    pub fn with_input_type<I: DeserializeOwned>(self) -> Result<Environment<I>> {
        let input_value = Value::Object(self.input_json.clone());
        let input = serde_json::from_value(input_value)?;
        Ok(Environment {
            input_json: self.input_json,
            input: Some(input),
            seed: self.seed,
            replicate: self.replicate,
            output: self.output,
        })
    }
}

impl<I: DeserializeOwned> Environment<I> {
    pub fn load() -> Result<Self> {
        Environment::from_stdin()?.with_input_type::<I>()
    }
}

impl<I: Serialize> Environment<I> {
    /// Hex-encoded SHA-256 of the input.
    ///
    /// Typed input is hashed after deserialization, so number spelling
    /// (`5` or `5.0`), key order and omitted defaults do not change the
    /// digest. Untyped input is hashed as given with keys sorted.
    pub fn input_digest(&self) -> Result<String> {
        let canonical = match &self.input {
            Some(input) => serde_json::to_value(input)?,
            None => Value::Object(self.input_json.clone()),
        };
        let encoded = serde_json::to_vec(&canonical)?;
        Ok(hex::encode(Sha256::digest(&encoded)))
    }
}

impl<I> Environment<I> {
    pub fn input_json(&self) -> &serde_json::Map<String, Value> {
        &self.input_json
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        let output = &self.output;

        if output.get("spec").and_then(|v| v.as_str()) == Some("filesystem") {
            return filesystem_dir(output);
        }

        // Profiled output: prefer "default", else the first profile
        let profiles = output.get("profile").and_then(|v| v.as_object())?;
        let profile = profiles
            .get("default")
            .or_else(|| profiles.values().next())?;
        if profile.get("spec").and_then(|v| v.as_str()) == Some("filesystem") {
            return filesystem_dir(profile);
        }

        None
    }

    pub fn write(&self, filename: &str, data: &[u8]) -> Result<()> {
        match self.output_dir() {
            Some(dir) => {
                let path = self.prepare_output(&dir, filename)?;
                fs::write(&path, data).map_err(|source| ProtocolError::Write { path, source })
            }
            None => io::stdout()
                .lock()
                .write_all(data)
                .map_err(|source| ProtocolError::Write {
                    path: PathBuf::from("<stdout>"),
                    source,
                }),
        }
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, filename: &str, value: &T) -> Result<()> {
        let mut data = serde_json::to_vec_pretty(value)?;
        data.push(b'\n');
        self.write(filename, &data)
    }

    pub fn write_csv(&self, filename: &str, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
        match self.output_dir() {
            Some(dir) => {
                let path = self.prepare_output(&dir, filename)?;
                let file = fs::File::create(&path).map_err(|source| ProtocolError::Write {
                    path: path.clone(),
                    source,
                })?;
                write_records(file, &path, headers, rows)
            }
            None => write_records(io::stdout().lock(), Path::new("<stdout>"), headers, rows),
        }
    }

    fn prepare_output(&self, dir: &Path, filename: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|source| ProtocolError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(filename);
        debug!(path = %path.display(), "writing output");
        Ok(path)
    }
}

fn filesystem_dir(output: &Value) -> Option<PathBuf> {
    output
        .get("dir")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
}

fn write_records<W: Write>(
    writer: W,
    path: &Path,
    headers: &[&str],
    rows: &[Vec<String>],
) -> Result<()> {
    let csv_error = |source| ProtocolError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(headers).map_err(csv_error)?;
    for row in rows {
        wtr.write_record(row).map_err(csv_error)?;
    }
    wtr.flush().map_err(|source| ProtocolError::Write {
        path: path.to_path_buf(),
        source,
    })
}
