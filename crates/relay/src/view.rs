//! Template rendering.
//!
//! Rendering goes through a [`ViewEngine`], picked at render time by the `ViewEngine` setting
//! among the engines registered on the application. Template names are resolved against the
//! `Views` directory setting. [`MiniJinjaEngine`] is the engine shipped with the crate.

use crate::settings::Settings;
use async_trait::async_trait;
use minijinja::Environment;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no view engine configured")]
    NoEngine,

    #[error("view engine '{name}' is not registered")]
    UnknownEngine { name: String },

    #[error("can't read template: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("template error: {source}")]
    Template {
        #[from]
        source: minijinja::Error,
    },

    #[error("can't serialize template data: {source}")]
    Data {
        #[from]
        source: serde_json::Error,
    },
}

#[async_trait(?Send)]
pub trait ViewEngine {
    /// Renders the template stored at `path` with `data` as context.
    async fn render_file(&self, path: &Path, data: &Value) -> Result<String, RenderError>;
}

/// A [`ViewEngine`] backed by `minijinja`. Templates are read from disk on every render.
pub struct MiniJinjaEngine {
    env: Environment<'static>,
}

impl MiniJinjaEngine {
    pub fn new() -> Self {
        Self { env: Environment::new() }
    }

    /// Uses a preconfigured environment, e.g. one with custom filters.
    pub fn with_environment(env: Environment<'static>) -> Self {
        Self { env }
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MiniJinjaEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiniJinjaEngine").finish_non_exhaustive()
    }
}

#[async_trait(?Send)]
impl ViewEngine for MiniJinjaEngine {
    async fn render_file(&self, path: &Path, data: &Value) -> Result<String, RenderError> {
        let source = tokio::fs::read_to_string(path).await?;
        Ok(self.env.render_str(&source, data)?)
    }
}

/// The settings and engines that `Response::render` works with.
pub struct Views {
    settings: Settings,
    engines: HashMap<String, Box<dyn ViewEngine>>,
}

impl Views {
    pub fn new(settings: Settings, engines: HashMap<String, Box<dyn ViewEngine>>) -> Self {
        Self { settings, engines }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolves the configured engine and renders `template` relative to the views directory.
    pub async fn render(&self, template: &str, data: &Value) -> Result<String, RenderError> {
        let name = self.settings.view_engine().ok_or(RenderError::NoEngine)?;
        let engine = self.engines.get(name).ok_or_else(|| RenderError::UnknownEngine { name: name.to_owned() })?;

        let full_path = self.settings.views().join(template);
        engine.render_file(&full_path, data).await
    }
}

impl fmt::Debug for Views {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut engines = self.engines.keys().collect::<Vec<_>>();
        engines.sort();
        f.debug_struct("Views").field("settings", &self.settings).field("engines", &engines).finish()
    }
}
