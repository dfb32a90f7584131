//! Tera template engine wrapper.

use std::path::Path;

use tera::{Context, Tera};
use tracing::{debug, info};

use crate::error::CharmError;

/// Name under which the built-in defaults template is registered.
pub const BUILTIN_TEMPLATE: &str = "cadvisor.tera";

const BUILTIN_SOURCE: &str = include_str!("../../templates/cadvisor.tera");

/// Template engine for rendering the daemon configuration.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Engine holding only the built-in template.
    pub fn builtin() -> Result<Self, CharmError> {
        let mut tera = Tera::default();
        tera.add_raw_template(BUILTIN_TEMPLATE, BUILTIN_SOURCE)
            .map_err(|e| CharmError::Template {
                message: format!("Failed to compile built-in template: {}", e),
            })?;
        Ok(Self { tera })
    }

    /// Built-in template, overridden by any `.tera` file found under `template_dir`.
    pub fn with_overrides(template_dir: Option<&Path>) -> Result<Self, CharmError> {
        let builtin = Self::builtin()?;

        let Some(dir) = template_dir else {
            return Ok(builtin);
        };

        let pattern = dir.join("**/*.tera");
        let pattern_str = pattern.to_string_lossy();
        debug!(pattern = %pattern_str, "Loading template overrides");

        let mut tera = Tera::new(&pattern_str).map_err(|e| CharmError::Template {
            message: format!("Failed to load templates from '{}': {}", dir.display(), e),
        })?;
        let override_count = tera.get_template_names().count();

        // extend() keeps templates already present, so the on-disk ones win.
        tera.extend(&builtin.tera).map_err(|e| CharmError::Template {
            message: format!("Failed to merge templates from '{}': {}", dir.display(), e),
        })?;

        info!(
            directory = %dir.display(),
            count = override_count,
            "Template overrides loaded"
        );

        Ok(Self { tera })
    }

    /// Render a template with the given JSON context.
    pub fn render(&self, template_name: &str, context: &serde_json::Value) -> Result<String, CharmError> {
        let tera_context = Context::from_serialize(context).map_err(|e| CharmError::Template {
            message: format!("Invalid template context: {}", e),
        })?;

        self.tera
            .render(template_name, &tera_context)
            .map_err(|e| CharmError::Template {
                message: format!("Failed to render template '{}': {}", template_name, e),
            })
    }

    /// Check if a template exists.
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }
}
