use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

use crate::{Error, InternalResult};

/// Settings of the root symbol table and the dynamic pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Native packages bound by name in the root scope.
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,

    /// Whether the `print` builtin is bound.
    #[serde(default = "default_print")]
    pub print: bool,

    /// Upper bound on iterations of a single loop during the dynamic pass.
    /// `None` leaves loops unbounded.
    #[serde(default)]
    pub max_loop_iterations: Option<u64>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            packages: default_packages(),
            print: default_print(),
            max_loop_iterations: None,
        }
    }
}

impl EvaluatorConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> InternalResult<Self> {
        from_file(path)
    }

    pub fn has_package(&self, name: &str) -> bool {
        self.packages.iter().any(|package| package == name)
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> InternalResult<T> {
    let file = File::open(path)
        .map_err(|e| Error::Internal(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| Error::Internal(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> InternalResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| Error::Internal(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

fn default_packages() -> Vec<String> {
    crate::stdlib::PACKAGES.iter().map(|name| name.to_string()).collect()
}

fn default_print() -> bool {
    true
}
