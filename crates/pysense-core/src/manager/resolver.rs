//! Mapping dotted module names to files

use crate::error::ResolutionError;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// A plain `.py` file
    Source,
    /// A package directory; the location is its `__init__.py`
    Package,
    /// A directory without `__init__.py`; the location is the directory
    Namespace,
}

/// Where a module's source lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLocation {
    pub path: PathBuf,
    pub kind: ModuleKind,
}

/// Finds the file for a module name imported from `context_file`
pub trait ModuleResolver: Send + Sync {
    fn find(&self, name: &str, context_file: Option<&Path>) -> Result<FileLocation, ResolutionError>;
}

/// Looks next to the importing file, then through the search paths
#[derive(Debug, Clone, Default)]
pub struct FsResolver {
    search_paths: Vec<PathBuf>,
}

impl FsResolver {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    fn roots(&self, context_file: Option<&Path>) -> Vec<PathBuf> {
        let mut roots = Vec::with_capacity(self.search_paths.len() + 1);
        if let Some(dir) = context_file.and_then(Path::parent) {
            roots.push(dir.to_path_buf());
        }
        for path in &self.search_paths {
            if !roots.contains(path) {
                roots.push(path.clone());
            }
        }
        roots
    }
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_alphabetic() => chars.all(|c| c == '_' || c.is_alphanumeric()),
        _ => false,
    }
}

impl ModuleResolver for FsResolver {
    fn find(&self, name: &str, context_file: Option<&Path>) -> Result<FileLocation, ResolutionError> {
        let parts: Vec<&str> = name.split('.').collect();
        if !parts.iter().all(|part| is_identifier(part)) {
            return Err(ResolutionError::InvalidName {
                modname: name.to_string(),
            });
        }
        let relative: PathBuf = parts.iter().collect();

        let mut searched = Vec::new();
        let mut namespace = None;
        for root in self.roots(context_file) {
            let base = root.join(&relative);
            let package = base.join("__init__.py");
            if package.is_file() {
                return Ok(FileLocation {
                    path: package,
                    kind: ModuleKind::Package,
                });
            }
            let source = base.with_extension("py");
            if source.is_file() {
                return Ok(FileLocation {
                    path: source,
                    kind: ModuleKind::Source,
                });
            }
            if namespace.is_none() && base.is_dir() {
                namespace = Some(base);
            }
            searched.push(root);
        }
        // a regular module in a later root wins over a bare directory
        if let Some(path) = namespace {
            return Ok(FileLocation {
                path,
                kind: ModuleKind::Namespace,
            });
        }
        Err(ResolutionError::NotFound {
            modname: name.to_string(),
            searched,
        })
    }
}
