//! Python runtime for the external training stack.
//!
//! Model loading, adapter injection and the training loop run inside a
//! managed Python subprocess. Its stderr streams straight to the terminal so
//! progress bars stay visible; stdout is captured for the JSON result.

use crate::config::PythonConfig;
use crate::error::TuneError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Managed Python subprocess runner.
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    python_path: PathBuf,
    venv_path: Option<PathBuf>,
    workspace: PathBuf,
}

impl PythonRuntime {
    /// Create a runtime using `python3` from `PATH`, or the active virtualenv.
    pub fn new(workspace: PathBuf) -> Self {
        Self {
            python_path: PathBuf::from("python3"),
            venv_path: detect_venv(),
            workspace,
        }
    }

    /// Create from configuration, falling back to detection for unset paths.
    pub fn from_config(config: &PythonConfig, workspace: PathBuf) -> Self {
        Self {
            python_path: config
                .python_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("python3")),
            venv_path: venv_for(config, detect_venv),
            workspace,
        }
    }

    /// Get the effective Python command (accounting for venv).
    pub fn python_cmd(&self) -> PathBuf {
        if let Some(venv) = &self.venv_path {
            let bin_dir = if cfg!(windows) { "Scripts" } else { "bin" };
            venv.join(bin_dir).join("python")
        } else {
            self.python_path.clone()
        }
    }

    /// Interpreter version string, e.g. `Python 3.11.9`.
    pub async fn version(&self) -> Result<String, TuneError> {
        let output = Command::new(self.python_cmd())
            .arg("--version")
            .output()
            .await
            .map_err(|e| TuneError::Python(format!("Failed to spawn Python: {e}")))?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            Ok(String::from_utf8_lossy(&output.stderr).trim().to_string())
        } else {
            Ok(stdout)
        }
    }

    /// Run a Python script file and return its stdout.
    ///
    /// `timeout: None` waits for as long as the script runs.
    pub async fn run_script_file(
        &self,
        script_path: &Path,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<String, TuneError> {
        debug!(script = %script_path.display(), ?args, "Running Python script");

        let child = Command::new(self.python_cmd())
            .arg(script_path)
            .args(args)
            .current_dir(&self.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TuneError::Python(format!("Failed to spawn Python: {e}")))?;

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    TuneError::Python(format!(
                        "Script timed out after {}s",
                        limit.as_secs()
                    ))
                })?,
            None => child.wait_with_output().await,
        }?;

        if !output.status.success() {
            return Err(TuneError::Python(format!(
                "Script {} failed ({}); see the output above",
                script_path.display(),
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Check which Python modules can be imported.
    pub async fn check_packages(&self, packages: &[&str]) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();

        for pkg in packages {
            let script = format!("import importlib; importlib.import_module('{pkg}')");
            let available = Command::new(self.python_cmd())
                .args(["-c", &script])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .is_ok_and(|s| s.success());

            results.insert(pkg.to_string(), available);
        }

        results
    }
}

/// The venv to run from: the configured one, else the active one, but only
/// when no interpreter was named explicitly.
fn venv_for(
    config: &PythonConfig,
    detect: impl FnOnce() -> Option<PathBuf>,
) -> Option<PathBuf> {
    match (&config.venv_path, &config.python_path) {
        (Some(venv), _) => Some(venv.clone()),
        (None, Some(_)) => None,
        (None, None) => detect(),
    }
}

/// Detect an active virtual environment.
fn detect_venv() -> Option<PathBuf> {
    std::env::var_os("VIRTUAL_ENV")
        .map(PathBuf::from)
        .filter(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_cmd_prefers_venv() {
        let config = PythonConfig {
            python_path: Some(PathBuf::from("/opt/py/bin/python3.11")),
            venv_path: Some(PathBuf::from("/work/.venv")),
        };
        let rt = PythonRuntime::from_config(&config, PathBuf::from("."));
        let bin_dir = if cfg!(windows) { "Scripts" } else { "bin" };
        assert_eq!(
            rt.python_cmd(),
            PathBuf::from("/work/.venv").join(bin_dir).join("python")
        );
    }

    #[test]
    fn test_explicit_interpreter_wins_over_active_venv() {
        let active = || Some(PathBuf::from("/home/me/other-venv"));
        let config = PythonConfig {
            python_path: Some(PathBuf::from("/opt/cuda-env/bin/python3")),
            venv_path: None,
        };
        assert_eq!(venv_for(&config, active), None);

        let rt = PythonRuntime {
            python_path: config.python_path.clone().unwrap(),
            venv_path: venv_for(&config, active),
            workspace: PathBuf::from("."),
        };
        assert_eq!(rt.python_cmd(), PathBuf::from("/opt/cuda-env/bin/python3"));

        // nothing configured: the active venv is used
        assert_eq!(
            venv_for(&PythonConfig::default(), active),
            Some(PathBuf::from("/home/me/other-venv"))
        );
    }

    #[test]
    fn test_python_cmd_explicit_path() {
        let rt = PythonRuntime {
            python_path: PathBuf::from("/usr/bin/python3"),
            venv_path: None,
            workspace: PathBuf::from("."),
        };
        assert_eq!(rt.python_cmd(), PathBuf::from("/usr/bin/python3"));
    }

    #[tokio::test]
    async fn test_missing_interpreter_reports_python_error() {
        let rt = PythonRuntime {
            python_path: PathBuf::from("/nonexistent/python-for-tests"),
            venv_path: None,
            workspace: PathBuf::from("."),
        };
        let err = rt
            .run_script_file(Path::new("driver.py"), &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, TuneError::Python(_)));

        let packages = rt.check_packages(&["json"]).await;
        assert_eq!(packages.get("json"), Some(&false));
    }
}
