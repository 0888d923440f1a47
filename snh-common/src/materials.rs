//! Material records
//!
//! A material is one user-submitted contribution after processing: a short
//! ambient clip, a spectral (voice) clip, a still image, a video and a
//! transcript, any of which may be missing. The engines only read materials;
//! ownership stays with the external repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Moderation status tag of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialStatus {
    Pending,
    Approved,
    Rejected,
}

impl MaterialStatus {
    /// Value used in repository filters
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialStatus::Pending => "pending",
            MaterialStatus::Approved => "approved",
            MaterialStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for MaterialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media reference kinds a material can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Text,
    AmbientAudio,
    SpectralAudio,
    Image,
    Video,
}

impl MediaKind {
    /// Repository column holding this kind's URL
    pub fn column(&self) -> &'static str {
        match self {
            MediaKind::Text => "texto_url",
            MediaKind::AmbientAudio => "audio_10s_url",
            MediaKind::SpectralAudio => "audio_espectral_url",
            MediaKind::Image => "imagem_url",
            MediaKind::Video => "video_url",
        }
    }

    pub fn all() -> &'static [MediaKind] {
        &[
            MediaKind::Text,
            MediaKind::AmbientAudio,
            MediaKind::SpectralAudio,
            MediaKind::Image,
            MediaKind::Video,
        ]
    }
}

/// One material row
///
/// Field aliases accept both the REST column names and the local export
/// names (`*_path`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    #[serde(alias = "id")]
    pub external_id: String,

    /// Category tag (`sonhos`, `prospeccoes`, `legacy`, ...)
    #[serde(rename = "tipo", alias = "category", default)]
    pub category: Option<String>,

    /// Moderation status; rows without one are treated as approved
    #[serde(default)]
    pub status: Option<MaterialStatus>,

    #[serde(alias = "video_path", default)]
    pub video_url: Option<String>,

    #[serde(rename = "audio_10s_url", alias = "audio_10s_path", default)]
    pub ambient_audio_url: Option<String>,

    #[serde(
        rename = "audio_espectral_url",
        alias = "audio_espectral_path",
        default
    )]
    pub spectral_audio_url: Option<String>,

    #[serde(rename = "imagem_url", alias = "image_path", default)]
    pub image_url: Option<String>,

    #[serde(rename = "texto_url", alias = "texto_path", default)]
    pub text_url: Option<String>,

    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl Material {
    /// Minimal material with only an id (fields set by the caller)
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            category: None,
            status: None,
            video_url: None,
            ambient_audio_url: None,
            spectral_audio_url: None,
            image_url: None,
            text_url: None,
            uploaded_at: None,
        }
    }

    /// URL for the given media kind, ignoring empty strings
    pub fn url(&self, kind: MediaKind) -> Option<&str> {
        let url = match kind {
            MediaKind::Text => self.text_url.as_deref(),
            MediaKind::AmbientAudio => self.ambient_audio_url.as_deref(),
            MediaKind::SpectralAudio => self.spectral_audio_url.as_deref(),
            MediaKind::Image => self.image_url.as_deref(),
            MediaKind::Video => self.video_url.as_deref(),
        };
        url.filter(|u| !u.is_empty())
    }

    pub fn has(&self, kind: MediaKind) -> bool {
        self.url(kind).is_some()
    }

    pub fn effective_status(&self) -> MaterialStatus {
        self.status.unwrap_or(MaterialStatus::Approved)
    }

    pub fn with_url(mut self, kind: MediaKind, url: impl Into<String>) -> Self {
        let url = Some(url.into());
        match kind {
            MediaKind::Text => self.text_url = url,
            MediaKind::AmbientAudio => self.ambient_audio_url = url,
            MediaKind::SpectralAudio => self.spectral_audio_url = url,
            MediaKind::Image => self.image_url = url,
            MediaKind::Video => self.video_url = url,
        }
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_status(mut self, status: MaterialStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Collect the URLs of `kind` from every material that carries one
pub fn urls_of(materials: &[Material], kind: MediaKind) -> Vec<String> {
    materials
        .iter()
        .filter_map(|m| m.url(kind))
        .map(str::to_string)
        .collect()
}
