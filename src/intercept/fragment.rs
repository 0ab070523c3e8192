//! Setup-time loading of the content the rewriters insert.
//!
//! Fragments are resolved once when a pipeline is provisioned and are read-only afterwards,
//! so they can be shared by every in-flight request without locking.

use url::Url;

use crate::config::schema::{InjectionConfig, UrlRewriteConfig};
use crate::intercept::error::ConfigurationError;

/// Script injected when neither literal content nor a script file is configured.
pub const EMBEDDED_SCRIPT: &str = r#"// inject-proxy default script
console.log('[inject-proxy] script injection active');
window.__INJECT_PROXY__ = {
  version: '0.1.0',
  timestamp: Date.now(),
  injectedBy: 'inject-proxy'
};"#;

/// Where a script fragment was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentSource {
    Literal,
    File,
    Embedded,
}

/// Script text for HTML injection, with its `<script>` wrapping precomputed.
#[derive(Debug, Clone)]
pub struct ScriptFragment {
    text: String,
    wrapped: String,
    source: FragmentSource,
}

impl ScriptFragment {
    /// Resolve the script: literal content, then file path, then the embedded default.
    pub fn provision(config: &InjectionConfig) -> Result<Self, ConfigurationError> {
        let (text, source) = match (&config.script, &config.script_path) {
            (Some(script), _) if !script.is_empty() => (script.clone(), FragmentSource::Literal),
            (_, Some(path)) => {
                let text = std::fs::read_to_string(path).map_err(|source| {
                    ConfigurationError::ScriptUnreadable {
                        path: path.clone(),
                        source,
                    }
                })?;
                tracing::debug!(path = %path.display(), "Read injection script file");
                (text, FragmentSource::File)
            }
            _ => (EMBEDDED_SCRIPT.to_string(), FragmentSource::Embedded),
        };

        tracing::info!(source = ?source, size = text.len(), "Injection script provisioned");
        Ok(Self::new(text, source))
    }

    pub fn new(text: impl Into<String>, source: FragmentSource) -> Self {
        let text = text.into();
        let wrapped = format!("<script>\n{}\n</script>\n", text);
        Self {
            text,
            wrapped,
            source,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The script wrapped in a `<script>` element, ready for insertion.
    ///
    /// Layout is `<script>\n{text}\n</script>\n`, with no newline before the opening tag.
    pub fn wrapped(&self) -> &str {
        &self.wrapped
    }

    pub fn source(&self) -> FragmentSource {
        self.source
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Replacement URL for the JavaScript rewriter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl(String);

impl TargetUrl {
    /// Resolve from config, falling back to the process environment.
    pub fn resolve(config: &UrlRewriteConfig) -> Result<Self, ConfigurationError> {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve_with<F>(config: &UrlRewriteConfig, lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = match config.target_url.as_deref() {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => lookup(&config.target_env)
                .filter(|url| !url.is_empty())
                .ok_or_else(|| ConfigurationError::MissingTargetUrl {
                    env: config.target_env.clone(),
                })?,
        };

        // Validated only; the configured spelling is what gets substituted.
        Url::parse(&raw).map_err(|source| ConfigurationError::InvalidTargetUrl {
            url: raw.clone(),
            source,
        })?;

        tracing::info!(target_url = %raw, "Rewrite target URL resolved");
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
