//! Dataset sources: the Hugging Face datasets hub and local JSON/JSONL files.

use crate::config::HubConfig;
use crate::data::value::{Partition, RawDataset};
use crate::error::TuneError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Information about a data source for the run manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceInfo {
    pub source_type: String,
    pub location: String,
    pub accessed_at: chrono::DateTime<chrono::Utc>,
}

/// Trait for loading a whole dataset, with all of its partitions.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load(&self) -> Result<RawDataset, TuneError>;

    /// Return metadata about this source.
    fn source_info(&self) -> DataSourceInfo;
}

/// Pick a source for `name`: an existing local path, else a hub dataset id.
pub fn open_source(name: &str, config: Option<&str>, hub: &HubConfig) -> Box<dyn DataSource> {
    let path = Path::new(name);
    if path.exists() {
        debug!(path = %path.display(), "Using local dataset");
        Box::new(LocalSource {
            path: path.to_path_buf(),
        })
    } else {
        Box::new(HubSource {
            dataset_name: name.to_string(),
            config: config.map(str::to_string),
            hub: hub.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// HubSource
// ---------------------------------------------------------------------------

/// Hugging Face datasets-server source.
///
/// Enumerates the dataset's splits, then pages every split's rows.
/// Requires network access.
pub struct HubSource {
    pub dataset_name: String,
    pub config: Option<String>,
    pub hub: HubConfig,
}

#[derive(Debug, Deserialize)]
struct SplitsResponse {
    splits: Vec<SplitEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct SplitEntry {
    config: String,
    split: String,
}

#[derive(Debug, Deserialize)]
struct RowsPage {
    #[serde(default)]
    features: Vec<Feature>,
    rows: Vec<RowEntry>,
    #[serde(default)]
    num_rows_total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    row: serde_json::Value,
}

impl HubSource {
    fn client(&self) -> Result<reqwest::Client, TuneError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = self.hub.token() {
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TuneError::config(format!("Invalid hub token: {e}")))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        Ok(reqwest::Client::builder()
            .default_headers(headers)
            .build()?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        client: &reqwest::Client,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TuneError> {
        let url = format!("{}/{path}", self.hub.endpoint.trim_end_matches('/'));
        let response = client.get(&url).query(query).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TuneError::dataset(format!(
                "Hugging Face API returned status {status} for {path}: {body}"
            )));
        }
        Ok(response.json().await?)
    }

    async fn load_split(
        &self,
        client: &reqwest::Client,
        config: &str,
        split: &str,
    ) -> Result<Partition, TuneError> {
        let fetch = move |offset: usize, length: usize| {
            let query = [
                ("dataset", self.dataset_name.clone()),
                ("config", config.to_string()),
                ("split", split.to_string()),
                ("offset", offset.to_string()),
                ("length", length.to_string()),
            ];
            async move { self.get_json::<RowsPage>(client, "rows", &query).await }
        };
        let (columns, rows) = collect_pages(self.hub.page_size, self.hub.max_rows, fetch).await?;
        debug!(split, rows = rows.len(), "Fetched split");

        let mut partition = Partition::from_json_rows(rows);
        if !columns.is_empty() {
            partition.columns = columns;
        }
        Ok(partition)
    }
}

/// Page through `/rows` until the split is exhausted or `max_rows` is reached.
///
/// Without `num_rows_total`, a page shorter than requested marks the end.
async fn collect_pages<F, Fut>(
    page_size: usize,
    max_rows: Option<usize>,
    mut fetch: F,
) -> Result<(Vec<String>, Vec<serde_json::Value>), TuneError>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<RowsPage, TuneError>>,
{
    let page_size = page_size.max(1);
    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::new();

    loop {
        let length = match max_rows {
            Some(max) if max <= rows.len() => break,
            Some(max) => page_size.min(max - rows.len()),
            None => page_size,
        };
        let page = fetch(rows.len(), length).await?;
        if columns.is_empty() {
            columns = page.features.iter().map(|f| f.name.clone()).collect();
        }
        let fetched = page.rows.len();
        rows.extend(page.rows.into_iter().map(|entry| entry.row));

        let exhausted = match page.num_rows_total {
            Some(total) => rows.len() >= total,
            None => fetched < length,
        };
        if fetched == 0 || exhausted {
            break;
        }
    }

    if let Some(max) = max_rows {
        rows.truncate(max);
    }
    Ok((columns, rows))
}

/// Choose which dataset config to read, preferring an explicit request,
/// then `default`, then the first one listed.
fn choose_config(splits: &[SplitEntry], requested: Option<&str>) -> Result<String, TuneError> {
    if let Some(requested) = requested {
        return if splits.iter().any(|s| s.config == requested) {
            Ok(requested.to_string())
        } else {
            let mut available: Vec<&str> = splits.iter().map(|s| s.config.as_str()).collect();
            available.dedup();
            Err(TuneError::dataset(format!(
                "Dataset config '{requested}' not found. Available configs: {available:?}"
            )))
        };
    }
    if splits.iter().any(|s| s.config == "default") {
        return Ok("default".to_string());
    }
    splits
        .first()
        .map(|s| s.config.clone())
        .ok_or_else(|| TuneError::dataset("Dataset has no splits"))
}

#[async_trait]
impl DataSource for HubSource {
    async fn load(&self) -> Result<RawDataset, TuneError> {
        let client = self.client()?;
        let listing: SplitsResponse = self
            .get_json(&client, "splits", &[("dataset", self.dataset_name.clone())])
            .await?;
        let config = choose_config(&listing.splits, self.config.as_deref())?;
        info!(dataset = %self.dataset_name, config = %config, "Loading dataset from hub");

        let mut partitions = BTreeMap::new();
        for entry in listing.splits.iter().filter(|s| s.config == config) {
            let partition = self.load_split(&client, &config, &entry.split).await?;
            partitions.insert(entry.split.clone(), partition);
        }
        Ok(RawDataset::Partitioned(partitions))
    }

    fn source_info(&self) -> DataSourceInfo {
        let config = self.config.as_deref().unwrap_or("default");
        DataSourceInfo {
            source_type: "huggingface".to_string(),
            location: format!("hf://datasets/{}/{config}", self.dataset_name),
            accessed_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// LocalSource
// ---------------------------------------------------------------------------

/// Local dataset on disk.
///
/// A `.json`/`.jsonl` file loads as one unpartitioned collection. A directory
/// loads every `.json`/`.jsonl` file inside it as a partition named after the
/// file stem (`train.jsonl` becomes `train`).
pub struct LocalSource {
    pub path: PathBuf,
}

/// Read one JSON array file or JSON Lines file into a partition.
pub async fn read_partition(path: &Path) -> Result<Partition, TuneError> {
    let content = tokio::fs::read_to_string(path).await?;
    let items = match path.extension().and_then(|e| e.to_str()) {
        Some("jsonl") => {
            let mut items = Vec::new();
            for (lineno, line) in content.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
                    TuneError::dataset(format!("{}:{}: {e}", path.display(), lineno + 1))
                })?;
                items.push(value);
            }
            items
        }
        Some("json") => match serde_json::from_str(&content)? {
            serde_json::Value::Array(arr) => arr,
            value @ serde_json::Value::Object(_) => vec![value],
            _ => return Err(TuneError::dataset("JSON must be an array or object")),
        },
        _ => {
            return Err(TuneError::dataset(format!(
                "Unsupported dataset file '{}': expected .json or .jsonl",
                path.display()
            )));
        }
    };
    Ok(Partition::from_json_rows(items))
}

fn is_dataset_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("jsonl")
    )
}

#[async_trait]
impl DataSource for LocalSource {
    async fn load(&self) -> Result<RawDataset, TuneError> {
        if !tokio::fs::metadata(&self.path).await?.is_dir() {
            return Ok(RawDataset::Single(read_partition(&self.path).await?));
        }

        let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut entries = tokio::fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_dataset_file(&path) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if let Some(previous) = files.insert(name.clone(), path.clone()) {
                let mut both = [previous, path];
                both.sort();
                return Err(TuneError::dataset(format!(
                    "partition '{name}' defined by both {} and {}",
                    both[0].display(),
                    both[1].display()
                )));
            }
        }

        let mut partitions = BTreeMap::new();
        for (name, path) in files {
            partitions.insert(name, read_partition(&path).await?);
        }

        if partitions.is_empty() {
            return Err(TuneError::dataset(format!(
                "No .json or .jsonl files found in {}",
                self.path.display()
            )));
        }
        Ok(RawDataset::Partitioned(partitions))
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "local".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
        }
    }
}
