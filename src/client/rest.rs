//! MLflow REST API client
//!
//! Blocking client for a subset of the MLflow REST API 2.0: experiment and
//! run management, batched param/metric logging, proxied artifact upload,
//! and model registry calls. Session state (selected experiment, active run)
//! lives on the client; there is no process-global handle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{ClientError, Experiment, ModelBundle, Result, RunHandle, TrackingClient};

/// Blocking MLflow REST client.
///
/// # Example
///
/// ```no_run
/// use rastrear::client::MlflowRestClient;
///
/// let client = MlflowRestClient::new("http://localhost:5000")?;
/// # Ok::<(), rastrear::client::ClientError>(())
/// ```
pub struct MlflowRestClient {
    base_url: String,
    http: reqwest::blocking::Client,
    current_experiment: Option<Experiment>,
    active: Option<RunHandle>,
}

impl MlflowRestClient {
    /// Create a client pointed at the given tracking endpoint.
    pub fn new(tracking_uri: impl Into<String>) -> Result<Self> {
        let base_url = tracking_uri.into().trim_end_matches('/').to_string();
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("rastrear/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Http {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { base_url, http, current_experiment: None, active: None })
    }

    /// The endpoint this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The experiment currently selected for this session, if any.
    #[must_use]
    pub fn current_experiment(&self) -> Option<&Experiment> {
        self.current_experiment.as_ref()
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api/2.0/mlflow/{path}", self.base_url)
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .http
            .post(self.api(path))
            .json(body)
            .send()
            .map_err(|e| ClientError::Http { message: format!("POST {path}: {e}") })?;
        Self::read_response(response)
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(self.api(path))
            .query(query)
            .send()
            .map_err(|e| ClientError::Http { message: format!("GET {path}: {e}") })?;
        Self::read_response(response)
    }

    /// Map an HTTP response to JSON or a typed API error.
    ///
    /// MLflow error payloads carry `error_code` and `message`.
    fn read_response(response: reqwest::blocking::Response) -> Result<serde_json::Value> {
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| ClientError::Http { message: format!("reading response body: {e}") })?;

        if status.is_success() {
            if text.is_empty() {
                return Ok(serde_json::Value::Null);
            }
            return Ok(serde_json::from_str(&text)?);
        }

        let (code, message) = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .map(|v| {
                (
                    v.get("error_code")
                        .and_then(|c| c.as_str())
                        .unwrap_or("UNKNOWN")
                        .to_string(),
                    v.get("message").and_then(|m| m.as_str()).unwrap_or(&text).to_string(),
                )
            })
            .unwrap_or_else(|| (status.to_string(), text.clone()));
        Err(ClientError::Api { code, message })
    }

    /// Upload raw bytes to the proxied artifact store.
    ///
    /// PUT `/api/2.0/mlflow-artifacts/artifacts/{experiment_id}/{run_id}/artifacts/{path}`
    fn upload_bytes(&self, run: &RunHandle, path_in_run: &str, content: Vec<u8>) -> Result<()> {
        let url = format!(
            "{}/api/2.0/mlflow-artifacts/artifacts/{}/{}/artifacts/{}",
            self.base_url, run.experiment_id, run.run_id, path_in_run
        );

        let response = self
            .http
            .put(&url)
            .header("Content-Type", "application/octet-stream")
            .body(content)
            .send()
            .map_err(|e| ClientError::Http {
                message: format!("artifact upload '{path_in_run}': {e}"),
            })?;

        Self::read_response(response).map(|_| ())
    }

    fn now_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn str_field(value: &serde_json::Value, pointer: &'static str) -> Result<String> {
        value
            .pointer(pointer)
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or(ClientError::MissingField(pointer))
    }
}

impl TrackingClient for MlflowRestClient {
    fn get_experiment_by_name(&mut self, name: &str) -> Result<Option<Experiment>> {
        match self.get("experiments/get-by-name", &[("experiment_name", name)]) {
            Ok(value) => Ok(Some(Experiment {
                experiment_id: Self::str_field(&value, "/experiment/experiment_id")?,
                name: Self::str_field(&value, "/experiment/name")?,
            })),
            Err(ClientError::Api { code, .. }) if code == "RESOURCE_DOES_NOT_EXIST" => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_experiment(&mut self, name: &str) -> Result<String> {
        let value = self.post("experiments/create", &serde_json::json!({ "name": name }))?;
        Self::str_field(&value, "/experiment_id")
    }

    fn set_experiment(&mut self, experiment: &Experiment) -> Result<()> {
        self.current_experiment = Some(experiment.clone());
        Ok(())
    }

    fn active_run(&mut self) -> Result<Option<RunHandle>> {
        Ok(self.active.clone())
    }

    fn start_run(&mut self, experiment_id: &str, run_name: Option<&str>) -> Result<RunHandle> {
        let mut body = serde_json::json!({
            "experiment_id": experiment_id,
            "start_time": Self::now_ms(),
        });
        if let Some(name) = run_name {
            body["run_name"] = serde_json::Value::String(name.to_string());
        }

        let value = self.post("runs/create", &body)?;
        let run = RunHandle {
            run_id: Self::str_field(&value, "/run/info/run_id")?,
            experiment_id: experiment_id.to_string(),
        };
        self.active = Some(run.clone());
        Ok(run)
    }

    fn log_params(&mut self, run: &RunHandle, params: &BTreeMap<String, String>) -> Result<()> {
        let entries: Vec<serde_json::Value> = params
            .iter()
            .map(|(key, value)| serde_json::json!({ "key": key, "value": value }))
            .collect();

        self.post(
            "runs/log-batch",
            &serde_json::json!({ "run_id": run.run_id, "params": entries }),
        )?;
        Ok(())
    }

    fn log_metrics(
        &mut self,
        run: &RunHandle,
        metrics: &BTreeMap<String, f64>,
        step: i64,
    ) -> Result<()> {
        let timestamp = Self::now_ms();
        let entries: Vec<serde_json::Value> = metrics
            .iter()
            .map(|(key, value)| {
                serde_json::json!({ "key": key, "value": value, "timestamp": timestamp, "step": step })
            })
            .collect();

        self.post(
            "runs/log-batch",
            &serde_json::json!({ "run_id": run.run_id, "metrics": entries }),
        )?;
        Ok(())
    }

    fn log_artifact(&mut self, run: &RunHandle, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::InvalidArtifact { path: path.to_path_buf() })?;
        let content = std::fs::read(path)?;
        self.upload_bytes(run, name, content)
    }

    fn register_model(&mut self, model_uri: &str, name: &str) -> Result<()> {
        // Registering an existing name is fine; a new version is added below
        match self.post("registered-models/create", &serde_json::json!({ "name": name })) {
            Ok(_) => {}
            Err(ClientError::Api { code, .. }) if code == "RESOURCE_ALREADY_EXISTS" => {}
            Err(e) => return Err(e),
        }

        self.post(
            "model-versions/create",
            &serde_json::json!({ "name": name, "source": model_uri }),
        )?;
        Ok(())
    }

    fn log_model(&mut self, run: &RunHandle, bundle: &ModelBundle) -> Result<()> {
        let mut flavors = serde_json::Map::new();
        flavors.insert(
            bundle.flavor.clone(),
            serde_json::json!({
                "data": "artifacts",
                "code": bundle.code_dir.as_ref().map(|d| d.display().to_string()),
            }),
        );
        let descriptor = serde_json::json!({
            "artifact_path": bundle.artifact_path,
            "run_id": run.run_id,
            "utc_time_created": Self::now_ms(),
            "flavors": flavors,
        });
        let mlmodel = serde_yaml::to_string(&descriptor)?;
        self.upload_bytes(
            run,
            &format!("{}/MLmodel", bundle.artifact_path),
            mlmodel.into_bytes(),
        )?;

        // Bundle the save directory contents under <artifact_path>/artifacts/
        let mut files = Vec::new();
        collect_files(&bundle.model_dir, &mut files)?;
        for file in files {
            let rel = file.strip_prefix(&bundle.model_dir).unwrap_or(file.as_path());
            let content = std::fs::read(&file)?;
            self.upload_bytes(
                run,
                &format!("{}/artifacts/{}", bundle.artifact_path, rel.display()),
                content,
            )?;
        }
        Ok(())
    }

    fn end_run(&mut self, run: &RunHandle) -> Result<()> {
        self.post(
            "runs/update",
            &serde_json::json!({
                "run_id": run.run_id,
                "status": "FINISHED",
                "end_time": Self::now_ms(),
            }),
        )?;
        if self.active.as_ref().is_some_and(|a| a.run_id == run.run_id) {
            self.active = None;
        }
        Ok(())
    }
}

/// Recursively collect regular files under `dir`.
fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

impl std::fmt::Debug for MlflowRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MlflowRestClient")
            .field("base_url", &self.base_url)
            .field("current_experiment", &self.current_experiment)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
