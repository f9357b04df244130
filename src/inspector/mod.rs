//! Read-only inspection of an unpacked package.
//!
//! Every operation returns text and never fails: errors are rendered
//! into the observation so the reasoning backend can act on them.

pub mod metadata;
pub mod tools;

pub use metadata::{MetadataRecord, PackageMetadata};
pub use tools::ToolSet;

use anyhow::Result;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Maximum characters of file content returned in one observation.
pub const MAX_CONTENT_CHARS: usize = 2000;

/// Appended after truncated file content.
pub const TRUNCATION_MARKER: &str = "[Content truncated due to length]";

/// Handle to one unpacked package. Holds nothing but the root path.
#[derive(Debug, Clone)]
pub struct PackageInspector {
    package_path: PathBuf,
}

impl PackageInspector {
    /// Create an inspector for the package rooted at `package_path`.
    pub fn new(package_path: impl Into<PathBuf>) -> Self {
        Self {
            package_path: package_path.into(),
        }
    }

    /// Root of the inspected package.
    pub fn package_path(&self) -> &Path {
        &self.package_path
    }

    /// Metadata rendered as `key: value` lines.
    pub fn inspect_metadata(&self) -> String {
        match PackageMetadata::from_dir(&self.package_path) {
            Ok(meta) => MetadataRecord::from(meta).to_string(),
            Err(e) => format!("Error extracting metadata: {}", e),
        }
    }

    /// Content of the installation script at the package root.
    pub fn inspect_setup_py(&self) -> String {
        let setup_py = self.package_path.join("setup.py");
        if !setup_py.exists() {
            return "setup.py not found".to_string();
        }

        match read_truncated(&setup_py) {
            Ok(content) => content,
            Err(e) => format!("Error reading setup.py: {}", e),
        }
    }

    /// Content of `__init__.py` inside the directory named after the package.
    pub fn inspect_init_py(&self) -> String {
        let meta = match PackageMetadata::from_dir(&self.package_path) {
            Ok(meta) => meta,
            Err(e) => return format!("Error inspecting __init__.py: {}", e),
        };

        let Some(package_name) = meta.name else {
            return "Could not determine package name from metadata".to_string();
        };

        let package_dir = match self.find_package_dir(&package_name) {
            Ok(Some(dir)) => dir,
            Ok(None) => return "Package directory not found".to_string(),
            Err(e) => return format!("Error inspecting __init__.py: {}", e),
        };
        debug!("Package directory: {}", package_dir.display());

        let init_py = package_dir.join("__init__.py");
        if !init_py.exists() {
            return "__init__.py not found".to_string();
        }

        match read_truncated(&init_py) {
            Ok(content) => content,
            Err(e) => format!("Error inspecting __init__.py: {}", e),
        }
    }

    /// Indented listing of every directory and file in the package.
    pub fn inspect_project_structure(&self) -> String {
        match self.project_structure() {
            Ok(lines) if lines.is_empty() => "No files or directories found".to_string(),
            Ok(lines) => lines.join("\n"),
            Err(e) => format!("Error inspecting project structure: {}", e),
        }
    }

    fn project_structure(&self) -> Result<Vec<String>> {
        let mut structure = Vec::new();
        let mut saw_entries = false;

        for entry in self.directories() {
            let entry = entry?;
            let level = entry.depth();
            let indent = " ".repeat(4 * level);
            let name = if level == 0 {
                dir_label(&self.package_path)
            } else {
                entry.file_name().to_string_lossy().to_string()
            };
            structure.push(format!("{}{}/", indent, name));
            saw_entries |= level > 0;

            let sub_indent = " ".repeat(4 * (level + 1));
            for file in sorted_files(entry.path())? {
                structure.push(format!("{}{}", sub_indent, file));
                saw_entries = true;
            }
        }

        if !saw_entries {
            structure.clear();
        }

        Ok(structure)
    }

    /// Top-down search: at each directory, its direct children are checked
    /// before descending, so the first directory visited that contains a
    /// match wins.
    ///
    /// `package_name` comes from the package itself, so it is only ever
    /// compared against real child names and never joined onto a path.
    fn find_package_dir(&self, package_name: &str) -> Result<Option<PathBuf>> {
        let wanted = OsStr::new(package_name);
        for entry in self.directories() {
            let entry = entry?;
            for child in fs::read_dir(entry.path())?.flatten() {
                let is_dir = child.file_type().map(|t| t.is_dir()).unwrap_or(false);
                if is_dir && child.file_name().as_os_str() == wanted {
                    return Ok(Some(child.path()));
                }
            }
        }
        Ok(None)
    }

    /// Directories of the package in top-down, name-sorted order.
    fn directories(&self) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> {
        WalkDir::new(&self.package_path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter(|entry| match entry {
                Ok(e) => e.file_type().is_dir(),
                Err(_) => true,
            })
    }
}

/// Read a UTF-8 file, capping it at [`MAX_CONTENT_CHARS`] characters.
fn read_truncated(path: &Path) -> std::io::Result<String> {
    let content = fs::read_to_string(path)?;
    Ok(truncate_content(&content))
}

/// Cap `content` at [`MAX_CONTENT_CHARS`] characters, appending the marker when cut.
pub fn truncate_content(content: &str) -> String {
    match content.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((cut, _)) => format!("{}\n{}", &content[..cut], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}

fn sorted_files(dir: &Path) -> Result<Vec<String>> {
    let mut files: Vec<String> = fs::read_dir(dir)?
        .flatten()
        .filter(|entry| entry.file_type().map(|t| !t.is_dir()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    files.sort();
    Ok(files)
}

fn dir_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
