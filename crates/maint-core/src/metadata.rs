//! Published-simulation and PhET-iO metadata.

use crate::error::{MaintError, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

/// Project names are reported as `html/<repo>`.
const PROJECT_PREFIX: &str = "html/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectVersion {
    pub major: u32,
    pub minor: u32,
    #[serde(default)]
    pub dev: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedProject {
    pub name: String,
    pub version: ProjectVersion,
}

impl PublishedProject {
    /// The repository name, with the `html/` prefix removed.
    pub fn repo(&self) -> &str {
        self.name.strip_prefix(PROJECT_PREFIX).unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhetioProject {
    pub name: String,
    pub version_major: u32,
    pub version_minor: u32,
    #[serde(default)]
    pub version_suffix: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub latest: bool,
}

impl PhetioProject {
    /// `{major}.{minor}`, with `-{suffix}` when a suffix is present.
    pub fn branch(&self) -> String {
        if self.version_suffix.is_empty() {
            format!("{}.{}", self.version_major, self.version_minor)
        } else {
            format!("{}.{}-{}", self.version_major, self.version_minor, self.version_suffix)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhetioQuery {
    pub active: bool,
    pub latest: bool,
}

pub trait MetadataService: Send + Sync {
    /// Every published phet-brand html simulation with its latest version.
    fn published_simulations(&self) -> Result<Vec<PublishedProject>>;

    fn phetio_simulations(&self, query: &PhetioQuery) -> Result<Vec<PhetioProject>>;
}

// ---------------------------------------------------------------------------
// HttpMetadataService
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SimulationsResponse {
    #[serde(default)]
    projects: Vec<PublishedProject>,
}

pub struct HttpMetadataService {
    client: Client,
    base_url: String,
}

impl HttpMetadataService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, ?query, "metadata request");
        let resp = self.client.get(&url).query(query).send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(MaintError::Metadata(format!("GET {url} returned {status}: {body}")));
        }
        Ok(resp.json()?)
    }
}

impl MetadataService for HttpMetadataService {
    fn published_simulations(&self) -> Result<Vec<PublishedProject>> {
        let params = [
            ("format", "json".to_string()),
            ("type", "html".to_string()),
            ("summary", "true".to_string()),
        ];
        let resp: SimulationsResponse = self.get_json("/services/metadata/1.3/simulations", &params)?;
        Ok(resp.projects)
    }

    fn phetio_simulations(&self, query: &PhetioQuery) -> Result<Vec<PhetioProject>> {
        let params = [
            ("active", query.active.to_string()),
            ("latest", query.latest.to_string()),
        ];
        self.get_json("/services/metadata/phetio", &params)
    }
}
