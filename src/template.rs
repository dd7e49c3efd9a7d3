//! Templating adapter.
//!
//! Statements, argument values, and think durations may carry
//! `{{ field }}` placeholders resolved against the per-invocation
//! [`Context`](crate::engine::Context). Rendering is pure: it reads the
//! context and never mutates it. Missing variables render as empty
//! (non-strict mode), and a template that fails to render at all falls
//! back to the raw template text, the same degradation posture as step
//! compilation.

use handlebars::Handlebars;
use serde_json::Value;
use tracing::debug;

use crate::engine::Context;

/// Thin wrapper around an embedded handlebars registry.
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        // Missing variables must substitute empty, not fail.
        registry.set_strict_mode(false);
        Self { registry }
    }

    /// Render a template against the context's variables.
    pub fn render(&self, template: &str, ctx: &Context) -> String {
        if !template.contains("{{") {
            return template.to_string();
        }
        match self.registry.render_template(template, ctx.vars()) {
            Ok(rendered) => rendered,
            Err(err) => {
                debug!(%template, %err, "template failed to render; passing through raw");
                template.to_string()
            }
        }
    }

    /// Render a JSON value: strings are treated as templates, everything
    /// else passes through unchanged.
    pub fn render_value(&self, value: &Value, ctx: &Context) -> Value {
        match value {
            Value::String(template) => Value::String(self.render(template, ctx)),
            other => other.clone(),
        }
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}
