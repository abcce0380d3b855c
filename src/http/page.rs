//! HTML page rendering.
//!
//! Templates are plain HTML with `{{ ip }}` and `{{ count }}` placeholders.
//! Substituted values are HTML-escaped.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::PageConfig;
use crate::error::{Result, VisitsError};
use crate::visits::ClientIdentifier;

const DEFAULT_TEMPLATE: &str = include_str!("../../templates/index.html");

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Ip,
    Count,
}

/// A parsed page template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTemplate {
    segments: Vec<Segment>,
}

impl PageTemplate {
    /// Parse a template, rejecting unknown or unterminated placeholders.
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| VisitsError::Render("unterminated placeholder".to_string()))?;

            segments.push(match after[..end].trim() {
                "ip" => Segment::Ip,
                "count" => Segment::Count,
                other => {
                    return Err(VisitsError::Render(format!("unknown placeholder {{{{ {} }}}}", other)))
                }
            });
            rest = &after[end + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Read and parse a template file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            VisitsError::Render(format!("failed to read template {}: {}", path.display(), e))
        })?;
        Self::parse(&source)
    }

    /// Render the page for one client.
    pub fn render(&self, identifier: &ClientIdentifier, count: u64) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Ip => escape_into(&mut out, identifier.as_str()),
                Segment::Count => write!(out, "{}", count)
                    .map_err(|e| VisitsError::Render(e.to_string()))?,
            }
        }
        Ok(out)
    }
}

impl Default for PageTemplate {
    fn default() -> Self {
        // The bundled template is covered by tests.
        Self::parse(DEFAULT_TEMPLATE).unwrap_or(Self {
            segments: vec![Segment::Text(DEFAULT_TEMPLATE.to_string())],
        })
    }
}

fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}

/// Where the page template comes from.
#[derive(Debug, Clone)]
pub enum PageSource {
    /// Parsed once at startup.
    Fixed(PageTemplate),
    /// Re-read from disk for every request.
    Reloading(PathBuf),
}

impl PageSource {
    /// Build the page source from configuration.
    ///
    /// A configured template file is validated up front even when it will be
    /// reloaded per request.
    pub fn from_config(config: &PageConfig) -> Result<Self> {
        let Some(path) = &config.template_path else {
            return Ok(PageSource::Fixed(PageTemplate::default()));
        };

        let template = PageTemplate::from_file(path)?;
        info!(path = %path.display(), reload = config.reload, "Loaded page template");

        if config.reload {
            Ok(PageSource::Reloading(path.clone()))
        } else {
            Ok(PageSource::Fixed(template))
        }
    }

    /// Render the page for one client.
    pub fn render(&self, identifier: &ClientIdentifier, count: u64) -> Result<String> {
        match self {
            PageSource::Fixed(template) => template.render(identifier, count),
            PageSource::Reloading(path) => PageTemplate::from_file(path)?.render(identifier, count),
        }
    }
}

impl Default for PageSource {
    fn default() -> Self {
        PageSource::Fixed(PageTemplate::default())
    }
}
