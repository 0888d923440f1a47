//! Materials repository clients
//!
//! The repository is an external table of materials reachable through a
//! filtered query: select fields, filter by status/category/non-null media
//! columns, order by recency. Two sources are supported:
//!
//! - [`RestRepository`]: PostgREST-style HTTP endpoint (`/rest/v1/<table>`)
//! - [`JsonFileRepository`]: local export (`{"materiais": [...]}`) filtered
//!   in memory with the same query semantics
//!
//! Engines only read from here. A fetch failure is fatal for starting a
//! session and is reported to the caller unchanged.

use crate::materials::{Material, MaterialStatus, MediaKind};
use crate::{Error, Result};
use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Columns requested by default
pub const DEFAULT_SELECT: &[&str] = &[
    "external_id",
    "tipo",
    "status",
    "video_url",
    "audio_10s_url",
    "audio_espectral_url",
    "imagem_url",
    "texto_url",
    "uploaded_at",
];

/// Filtered query over the materials table
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialQuery {
    /// Columns to select
    pub select: Vec<String>,
    /// Status filter (None = any status)
    pub status: Option<MaterialStatus>,
    /// Category filter (empty = any category)
    pub categories: Vec<String>,
    /// Media columns that must be non-null
    pub require: Vec<MediaKind>,
    /// Newest first by `uploaded_at`
    pub newest_first: bool,
}

impl Default for MaterialQuery {
    fn default() -> Self {
        Self {
            select: DEFAULT_SELECT.iter().map(|s| s.to_string()).collect(),
            status: Some(MaterialStatus::Approved),
            categories: Vec::new(),
            require: Vec::new(),
            newest_first: true,
        }
    }
}

impl MaterialQuery {
    /// Approved materials of any category, newest first
    pub fn approved() -> Self {
        Self::default()
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn requiring(mut self, kind: MediaKind) -> Self {
        if !self.require.contains(&kind) {
            self.require.push(kind);
        }
        self
    }

    pub fn any_status(mut self) -> Self {
        self.status = None;
        self
    }

    /// Render as PostgREST query parameters
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.select.join(","))];

        if let Some(status) = self.status {
            pairs.push(("status".to_string(), format!("eq.{}", status)));
        }
        if !self.categories.is_empty() {
            pairs.push((
                "tipo".to_string(),
                format!("in.({})", self.categories.join(",")),
            ));
        }
        for kind in &self.require {
            pairs.push((kind.column().to_string(), "not.is.null".to_string()));
        }
        if self.newest_first {
            pairs.push(("order".to_string(), "uploaded_at.desc".to_string()));
        }
        pairs
    }

    /// In-memory equivalent of the server-side filter
    pub fn matches(&self, material: &Material) -> bool {
        if let Some(status) = self.status {
            if material.effective_status() != status {
                return false;
            }
        }
        if !self.categories.is_empty() {
            match material.category.as_deref() {
                Some(cat) if self.categories.iter().any(|c| c == cat) => {}
                _ => return false,
            }
        }
        self.require.iter().all(|kind| material.has(*kind))
    }

    /// Filter and order a row set the way the server would
    pub fn apply(&self, rows: Vec<Material>) -> Vec<Material> {
        let mut out: Vec<Material> = rows.into_iter().filter(|m| self.matches(m)).collect();
        if self.newest_first {
            // Rows without a timestamp sort last
            out.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        }
        out
    }
}

/// Read-only access to the materials pool
pub trait MaterialsRepository {
    fn fetch(&self, query: &MaterialQuery) -> impl Future<Output = Result<Vec<Material>>>;
}

/// PostgREST endpoint client
#[derive(Debug, Clone)]
pub struct RestRepository {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl RestRepository {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            table: table.into(),
        }
    }

    /// Endpoint URL for the configured table
    pub fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }
}

impl MaterialsRepository for RestRepository {
    async fn fetch(&self, query: &MaterialQuery) -> Result<Vec<Material>> {
        let endpoint = self.endpoint();
        debug!("Fetching materials from {}", endpoint);

        let response = self
            .client
            .get(&endpoint)
            .query(&query.to_query_pairs())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Repository(format!(
                "{} answered {}",
                endpoint, status
            )));
        }

        let rows: Vec<Material> = response.json().await?;
        info!("Loaded {} materials from repository", rows.len());
        Ok(rows)
    }
}

/// Local JSON export of the materials table
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExportFile {
    Wrapped { materiais: Vec<Material> },
    Bare(Vec<Material>),
}

impl JsonFileRepository {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse an export document (wrapped or bare array)
    pub fn parse(content: &str) -> Result<Vec<Material>> {
        let rows = match serde_json::from_str::<ExportFile>(content)? {
            ExportFile::Wrapped { materiais } => materiais,
            ExportFile::Bare(rows) => rows,
        };
        Ok(rows)
    }
}

impl MaterialsRepository for JsonFileRepository {
    async fn fetch(&self, query: &MaterialQuery) -> Result<Vec<Material>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let rows = query.apply(Self::parse(&content)?);
        info!(
            "Loaded {} materials from {}",
            rows.len(),
            self.path.display()
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_render_postgrest_filters() {
        let query = MaterialQuery::approved()
            .with_categories(["sonhos", "prospeccoes"])
            .requiring(MediaKind::Video);
        let pairs = query.to_query_pairs();

        assert!(pairs.contains(&("status".to_string(), "eq.approved".to_string())));
        assert!(pairs.contains(&("tipo".to_string(), "in.(sonhos,prospeccoes)".to_string())));
        assert!(pairs.contains(&("video_url".to_string(), "not.is.null".to_string())));
        assert!(pairs.contains(&("order".to_string(), "uploaded_at.desc".to_string())));
        assert_eq!(pairs[0].0, "select");
    }

    #[test]
    fn test_requiring_is_idempotent() {
        let query = MaterialQuery::approved()
            .requiring(MediaKind::Image)
            .requiring(MediaKind::Image);
        assert_eq!(query.require, vec![MediaKind::Image]);
    }

    #[test]
    fn test_matches_applies_all_filters() {
        let query = MaterialQuery::approved()
            .with_categories(["sonhos"])
            .requiring(MediaKind::AmbientAudio);

        let ok = Material::new("1")
            .with_category("sonhos")
            .with_url(MediaKind::AmbientAudio, "a.mp3");
        let wrong_cat = ok.clone().with_category("legacy");
        let rejected = ok.clone().with_status(MaterialStatus::Rejected);
        let no_audio = Material::new("2").with_category("sonhos");

        assert!(query.matches(&ok));
        assert!(!query.matches(&wrong_cat));
        assert!(!query.matches(&rejected));
        assert!(!query.matches(&no_audio));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let repo = RestRepository::new("https://example.supabase.co/", "key", "materials");
        assert_eq!(
            repo.endpoint(),
            "https://example.supabase.co/rest/v1/materials"
        );
    }

    #[test]
    fn test_parse_accepts_wrapped_and_bare_exports() {
        let wrapped = r#"{"materiais": [{"id": "a"}, {"id": "b"}]}"#;
        let bare = r#"[{"external_id": "c"}]"#;
        assert_eq!(JsonFileRepository::parse(wrapped).unwrap().len(), 2);
        assert_eq!(JsonFileRepository::parse(bare).unwrap()[0].external_id, "c");
    }
}
