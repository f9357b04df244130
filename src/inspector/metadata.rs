//! Package metadata extraction.
//!
//! Reads the `PKG-INFO` file that every source distribution carries
//! (either at the package root or inside a `*.egg-info` directory) and
//! resolves the identity fields the agent reasons about.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Sentinel for missing identity fields.
pub const UNKNOWN: &str = "Unknown";

/// Sentinel for missing free-form fields.
pub const NONE: &str = "None";

/// Failure to locate or read package metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("No PKG-INFO found for package: {0}")]
    NotFound(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Identity fields of a source distribution.
///
/// Every field is `None` when the metadata file does not provide it.
/// Use [`MetadataRecord::from`] to get the sentinel-filled view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub name: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
}

impl PackageMetadata {
    /// Resolve metadata for the unpacked package rooted at `root`.
    pub fn from_dir(root: &Path) -> Result<Self, MetadataError> {
        let path = find_pkg_info(root)
            .ok_or_else(|| MetadataError::NotFound(root.display().to_string()))?;

        debug!("Reading metadata from {}", path.display());

        let content = fs::read(&path).map_err(|source| MetadataError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Ok(Self::parse(&String::from_utf8_lossy(&content)))
    }

    /// Parse the RFC 822 style body of a `PKG-INFO` file.
    pub fn parse(content: &str) -> Self {
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut body = String::new();
        let mut in_body = false;

        for line in content.lines() {
            if in_body {
                body.push_str(line);
                body.push('\n');
                continue;
            }

            if line.is_empty() {
                in_body = true;
                continue;
            }

            // Whitespace-only lines are escaped blank lines inside a folded value
            if line.starts_with(' ') || line.starts_with('\t') {
                // Continuation of the previous header
                if let Some((_, value)) = headers.last_mut() {
                    let piece = line.trim_start();
                    let piece = piece.strip_prefix('|').unwrap_or(piece);
                    value.push('\n');
                    value.push_str(piece);
                }
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                headers.push((key.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
        }

        let header = |key: &str| -> Option<String> {
            headers
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let url = header("home-page").or_else(|| {
            header("project-url").map(|v| match v.split_once(',') {
                Some((_, link)) => link.trim().to_string(),
                None => v,
            })
        });

        let body = body.trim();
        let description = header("description")
            .or_else(|| (!body.is_empty()).then(|| body.to_string()))
            .or_else(|| header("summary"));

        Self {
            name: header("name"),
            version: header("version"),
            author: header("author"),
            author_email: header("author-email"),
            url,
            description,
        }
    }
}

/// Locate the metadata file: root `PKG-INFO` first, then `*.egg-info/PKG-INFO`.
fn find_pkg_info(root: &Path) -> Option<PathBuf> {
    let direct = root.join("PKG-INFO");
    if direct.is_file() {
        return Some(direct);
    }

    let mut egg_infos: Vec<PathBuf> = fs::read_dir(root)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("egg-info"))
        })
        .collect();
    egg_infos.sort();

    egg_infos
        .into_iter()
        .map(|dir| dir.join("PKG-INFO"))
        .find(|candidate| candidate.is_file())
}

/// Sentinel-filled metadata, as shown to the reasoning backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub name: String,
    pub version: String,
    pub author: String,
    pub author_email: String,
    pub url: String,
    pub description: String,
}

impl From<PackageMetadata> for MetadataRecord {
    fn from(meta: PackageMetadata) -> Self {
        let or = |value: Option<String>, sentinel: &str| value.unwrap_or_else(|| sentinel.to_string());
        Self {
            name: or(meta.name, UNKNOWN),
            version: or(meta.version, UNKNOWN),
            author: or(meta.author, UNKNOWN),
            author_email: or(meta.author_email, UNKNOWN),
            url: or(meta.url, NONE),
            description: or(meta.description, NONE),
        }
    }
}

impl fmt::Display for MetadataRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "name: {}", self.name)?;
        writeln!(f, "version: {}", self.version)?;
        writeln!(f, "author: {}", self.author)?;
        writeln!(f, "author_email: {}", self.author_email)?;
        writeln!(f, "url: {}", self.url)?;
        write!(f, "description: {}", self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PKG_INFO: &str = "Metadata-Version: 2.1
Name: requests-toolkit
Version: 0.3.1
Summary: Helpers for requests
Home-page: https://example.org/toolkit
Author: Jane Roe
Author-email: jane@example.org
License: MIT

Long description lives in the body.
";

    #[test]
    fn test_parse_headers_and_body() {
        let meta = PackageMetadata::parse(PKG_INFO);
        assert_eq!(meta.name.as_deref(), Some("requests-toolkit"));
        assert_eq!(meta.version.as_deref(), Some("0.3.1"));
        assert_eq!(meta.author.as_deref(), Some("Jane Roe"));
        assert_eq!(meta.author_email.as_deref(), Some("jane@example.org"));
        assert_eq!(meta.url.as_deref(), Some("https://example.org/toolkit"));
        assert_eq!(
            meta.description.as_deref(),
            Some("Long description lives in the body.")
        );
    }

    #[test]
    fn test_parse_description_header_with_continuation() {
        let content = "Name: legacy\nDescription: first line\n        |second line\nVersion: 1.0\n";
        let meta = PackageMetadata::parse(content);
        assert_eq!(meta.description.as_deref(), Some("first line\nsecond line"));
        assert_eq!(meta.version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_parse_legacy_multi_paragraph_description() {
        let content = "Metadata-Version: 1.1\n\
Name: legacy\n\
Description: Para one.\n        \n        Para two.\n\
Keywords: x\n\
Platform: UNKNOWN\n";

        let meta = PackageMetadata::parse(content);
        assert_eq!(meta.name.as_deref(), Some("legacy"));
        assert_eq!(meta.description.as_deref(), Some("Para one.\n\nPara two."));
    }

    #[test]
    fn test_parse_falls_back_to_summary_and_project_url() {
        let content = "Name: tiny\nSummary: a tiny package\nProject-URL: Source, https://example.org/src\n";
        let meta = PackageMetadata::parse(content);
        assert_eq!(meta.description.as_deref(), Some("a tiny package"));
        assert_eq!(meta.url.as_deref(), Some("https://example.org/src"));
    }

    #[test]
    fn test_missing_fields_render_as_sentinels() {
        let record = MetadataRecord::from(PackageMetadata::parse("Name: bare\nAuthor:\n"));
        assert_eq!(record.name, "bare");
        assert_eq!(record.author, UNKNOWN);
        assert_eq!(record.version, UNKNOWN);
        assert_eq!(record.url, NONE);
        assert_eq!(record.description, NONE);

        let text = record.to_string();
        assert!(text.starts_with("name: bare\n"));
        assert!(text.contains("author_email: Unknown"));
        assert!(text.ends_with("description: None"));
    }

    #[test]
    fn test_from_dir_prefers_root_pkg_info() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("PKG-INFO"), "Name: root-name\n").unwrap();
        let egg = temp_dir.path().join("other.egg-info");
        std::fs::create_dir(&egg).unwrap();
        std::fs::write(egg.join("PKG-INFO"), "Name: egg-name\n").unwrap();

        let meta = PackageMetadata::from_dir(temp_dir.path()).unwrap();
        assert_eq!(meta.name.as_deref(), Some("root-name"));
    }

    #[test]
    fn test_from_dir_uses_egg_info() {
        let temp_dir = TempDir::new().unwrap();
        let egg = temp_dir.path().join("demo.egg-info");
        std::fs::create_dir(&egg).unwrap();
        std::fs::write(egg.join("PKG-INFO"), "Name: demo\n").unwrap();

        let meta = PackageMetadata::from_dir(temp_dir.path()).unwrap();
        assert_eq!(meta.name.as_deref(), Some("demo"));
    }

    #[test]
    fn test_from_dir_without_pkg_info() {
        let temp_dir = TempDir::new().unwrap();
        let err = PackageMetadata::from_dir(temp_dir.path()).unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)));
        assert!(err.to_string().starts_with("No PKG-INFO found"));
    }
}
