//! Create-script providers.

use super::CreateScriptProvider;
use crate::config::DatasourceConfig;
use crate::error::BoxError;
use crate::models::TableIdentity;
use async_trait::async_trait;
use std::path::PathBuf;

/// Script text held in memory.
#[derive(Debug, Clone)]
pub struct InlineScript(pub String);

#[async_trait]
impl CreateScriptProvider for InlineScript {
    async fn create_script(&self, _table: &TableIdentity) -> Result<String, BoxError> {
        Ok(self.0.clone())
    }
}

/// Script read from a file each time it is needed.
#[derive(Debug, Clone)]
pub struct ScriptFile(pub PathBuf);

#[async_trait]
impl CreateScriptProvider for ScriptFile {
    async fn create_script(&self, table: &TableIdentity) -> Result<String, BoxError> {
        tokio::fs::read_to_string(&self.0).await.map_err(|e| {
            BoxError::from(format!(
                "failed to read create script {} for {}: {}",
                self.0.display(),
                table,
                e
            ))
        })
    }
}

/// Provider for datasources without a create script; always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScript;

#[async_trait]
impl CreateScriptProvider for NoScript {
    async fn create_script(&self, table: &TableIdentity) -> Result<String, BoxError> {
        Err(BoxError::from(format!(
            "no create script configured for {}",
            table
        )))
    }
}

/// The provider a datasource definition asks for.
pub fn script_provider_for(config: &DatasourceConfig) -> Box<dyn CreateScriptProvider> {
    match &config.create_script {
        Some(path) => Box::new(ScriptFile(path.clone())),
        None => Box::new(NoScript),
    }
}
