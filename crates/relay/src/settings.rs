//! Application wide settings.
//!
//! Settings are typed: each one is a named field of [`Settings`], written through a [`Setting`]
//! value and read through an accessor. The dispatch core never reads them; they configure the
//! collaborators, template rendering in particular.

use std::path::{Path, PathBuf};

/// Directory templates are looked up in when no `Views` setting is given.
pub const DEFAULT_VIEWS_DIR: &str = "views";

/// One write to the [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    /// Directory that template names are resolved against.
    Views(PathBuf),
    /// Name of the registered view engine used by `Response::render`.
    ViewEngine(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    views: PathBuf,
    view_engine: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self { views: PathBuf::from(DEFAULT_VIEWS_DIR), view_engine: None }
    }
}

impl Settings {
    /// Applies a setting; the last write wins.
    pub fn set(&mut self, setting: Setting) {
        match setting {
            Setting::Views(views) => self.views = views,
            Setting::ViewEngine(engine) => self.view_engine = Some(engine),
        }
    }

    pub fn views(&self) -> &Path {
        &self.views
    }

    pub fn view_engine(&self) -> Option<&str> {
        self.view_engine.as_deref()
    }
}
