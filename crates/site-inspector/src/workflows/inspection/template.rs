use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::catalog::ComponentCatalog;

/// Component catalog together with the identifier persisted on each record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionTemplate {
    pub id: String,
    pub name: String,
    #[serde(rename = "components")]
    pub catalog: ComponentCatalog,
}

impl InspectionTemplate {
    pub fn standard() -> Self {
        Self {
            id: "standard-sanitation-v1".to_string(),
            name: "Standard sanitation facility".to_string(),
            catalog: ComponentCatalog::standard(),
        }
    }
}

/// Source of the active inspection template.
#[async_trait]
pub trait TemplateProvider: Send + Sync {
    /// `Ok(None)` means no template is configured, which blocks submission.
    async fn default_template(&self) -> Result<Option<InspectionTemplate>, TemplateError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("unable to read template {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("template {path} is invalid: {source}")]
    Invalid {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("template source unavailable: {0}")]
    Unavailable(String),
}

/// Serves a template fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplateProvider {
    template: Option<InspectionTemplate>,
}

impl StaticTemplateProvider {
    pub fn new(template: InspectionTemplate) -> Self {
        Self {
            template: Some(template),
        }
    }

    pub fn standard() -> Self {
        Self::new(InspectionTemplate::standard())
    }

    pub fn empty() -> Self {
        Self { template: None }
    }
}

#[async_trait]
impl TemplateProvider for StaticTemplateProvider {
    async fn default_template(&self) -> Result<Option<InspectionTemplate>, TemplateError> {
        Ok(self.template.clone())
    }
}

/// Reads the template from a JSON file on every request so edits apply
/// without a restart. A missing file means "no template".
#[derive(Debug, Clone)]
pub struct FileTemplateProvider {
    path: PathBuf,
}

impl FileTemplateProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TemplateProvider for FileTemplateProvider {
    async fn default_template(&self) -> Result<Option<InspectionTemplate>, TemplateError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(TemplateError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| TemplateError::Invalid {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_provider_round_trips_standard_template() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("template.json");
        let standard = InspectionTemplate::standard();
        std::fs::write(&path, serde_json::to_vec(&standard).expect("serialise"))
            .expect("write template");

        let loaded = FileTemplateProvider::new(&path)
            .default_template()
            .await
            .expect("template loads")
            .expect("template present");
        assert_eq!(loaded, standard);
    }

    #[tokio::test]
    async fn file_provider_reports_missing_file_as_absent() {
        let dir = tempfile::tempdir().expect("temp dir");
        let provider = FileTemplateProvider::new(dir.path().join("missing.json"));
        assert!(provider
            .default_template()
            .await
            .expect("missing file is not an error")
            .is_none());
    }

    #[tokio::test]
    async fn file_provider_rejects_invalid_weights() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("template.json");
        std::fs::write(
            &path,
            r#"{"id":"t","name":"t","components":[{"id":"odor","label":"Odor","category":"aroma","weight":-1,"required":true,"allow_photo":false}]}"#,
        )
        .expect("write template");

        let result = FileTemplateProvider::new(&path).default_template().await;
        assert!(matches!(result, Err(TemplateError::Invalid { .. })));
    }
}
