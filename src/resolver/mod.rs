//! Module resolution
//!
//! Extracts import specifiers from source and resolves them to module ids:
//! relative paths, configured aliases, bare package imports (`node_modules`)
//! and virtual modules.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::policy::ModuleCategory;

/// Regex patterns for extracting imports
static IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:import|export)\s+(?:type\s+)?(?:(?:[\w$]+\s*,\s*)?(?:\{[^}]*\}|\*(?:\s+as\s+[\w$]+)?|[\w$]+)\s*from\s*)?["']([^"']+)["']|require\s*\(\s*["']([^"']+)["']\s*\)"#)
        .expect("import regex is valid")
});

static DYNAMIC_IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s*\(\s*["']([^"']+)["']\s*\)"#).expect("dynamic import regex is valid")
});

const EXTENSIONS: [&str; 9] = ["js", "ts", "jsx", "tsx", "mjs", "cjs", "json", "vue", "css"];

/// What a specifier resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A file on disk
    File(PathBuf),
    /// A virtual module provided by the build host
    Virtual(String),
}

/// An import specifier found in source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub specifier: String,
    /// Found in an `import()` expression
    pub dynamic: bool,
}

/// Module resolver
pub struct Resolver {
    /// Project root
    root: PathBuf,

    /// Aliases, longest first
    aliases: Vec<(String, PathBuf)>,
}

impl Resolver {
    /// Create a new resolver
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let mut aliases: Vec<(String, PathBuf)> = config
            .aliases
            .iter()
            .map(|(alias, target)| (alias.trim_end_matches('/').to_string(), config.root.join(target)))
            .collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Ok(Self {
            root: config.root.clone(),
            aliases,
        })
    }

    /// Extract import/require dependencies from source code
    pub fn extract_dependencies(
        &self,
        source: &str,
        category: ModuleCategory,
    ) -> Vec<Dependency> {
        if category != ModuleCategory::Script {
            return Vec::new();
        }

        let mut dependencies: Vec<Dependency> = Vec::new();

        // Find static imports/exports
        for cap in IMPORT_REGEX.captures_iter(source) {
            if let Some(specifier) = cap.get(1).or_else(|| cap.get(2)) {
                let spec = specifier.as_str();
                if !dependencies.iter().any(|d| d.specifier == spec) {
                    dependencies.push(Dependency {
                        specifier: spec.to_string(),
                        dynamic: false,
                    });
                }
            }
        }

        // Find dynamic imports
        for cap in DYNAMIC_IMPORT_REGEX.captures_iter(source) {
            if let Some(specifier) = cap.get(1) {
                let spec = specifier.as_str();
                if !dependencies.iter().any(|d| d.specifier == spec) {
                    dependencies.push(Dependency {
                        specifier: spec.to_string(),
                        dynamic: true,
                    });
                }
            }
        }

        debug!("Found {} dependencies", dependencies.len());

        dependencies
    }

    /// Resolve an import specifier relative to the importing file
    pub fn resolve(&self, specifier: &str, from: &Path) -> Option<Resolved> {
        debug!("Resolving '{}' from '{}'", specifier, from.display());

        if specifier.starts_with('\0') || specifier.starts_with("virtual:") {
            return Some(Resolved::Virtual(specifier.to_string()));
        }

        let base_dir = from.parent().unwrap_or(Path::new("."));

        let resolved = if specifier.starts_with('.') {
            self.resolve_relative(specifier, base_dir)
        } else if specifier.starts_with('/') {
            self.resolve_relative(specifier.trim_start_matches('/'), &self.root)
        } else if let Some((dir, rest)) = self.match_alias(specifier) {
            self.resolve_relative(rest, &dir)
        } else {
            self.resolve_bare(specifier, base_dir)
        };

        debug!("Resolved to: {:?}", resolved);

        resolved.map(Resolved::File)
    }

    /// Alias directory and remaining subpath for an aliased specifier
    fn match_alias<'s>(&self, specifier: &'s str) -> Option<(PathBuf, &'s str)> {
        self.aliases.iter().find_map(|(alias, dir)| {
            if specifier == alias {
                Some((dir.clone(), "."))
            } else {
                specifier
                    .strip_prefix(alias.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                    .map(|rest| (dir.clone(), rest))
            }
        })
    }

    /// Resolve a path relative to a directory
    fn resolve_relative(&self, specifier: &str, base_dir: &Path) -> Option<PathBuf> {
        let target = base_dir.join(specifier);

        // Try exact path first
        if target.is_file() {
            return Some(target);
        }

        // Try adding extensions
        for ext in &EXTENSIONS {
            let with_ext = PathBuf::from(format!("{}.{}", target.display(), ext));
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }

        // Try as directory with index file
        if target.is_dir() {
            for ext in &EXTENSIONS {
                let index = target.join(format!("index.{}", ext));
                if index.is_file() {
                    return Some(index);
                }
            }
        }

        None
    }

    /// Resolve a bare import (from node_modules)
    fn resolve_bare(&self, specifier: &str, from: &Path) -> Option<PathBuf> {
        let mut current = from.to_path_buf();

        // Walk up directory tree looking for node_modules
        loop {
            let node_modules = current.join("node_modules");

            if node_modules.is_dir() {
                if let Some(resolved) = self.resolve_in_node_modules(&node_modules, specifier) {
                    return Some(resolved);
                }
            }

            if !current.pop() {
                break;
            }
        }

        debug!("Unresolved bare specifier: {}", specifier);
        None
    }

    /// Resolve a module within a node_modules directory
    fn resolve_in_node_modules(&self, node_modules: &Path, specifier: &str) -> Option<PathBuf> {
        let (package_name, subpath) = split_package_specifier(specifier)?;

        let package_dir = node_modules.join(package_name);

        if !package_dir.is_dir() {
            return None;
        }

        if let Some(sub) = subpath {
            return self.resolve_relative(sub, &package_dir);
        }

        if let Some(pkg) = read_package_json(&package_dir.join("package.json")) {
            // module (ESM), then browser, then main
            for field in ["module", "browser", "main"] {
                if let Some(entry) = pkg.get(field).and_then(|v| v.as_str()) {
                    if let Some(resolved) = self.resolve_relative(entry, &package_dir) {
                        return Some(resolved);
                    }
                }
            }
        }

        self.resolve_relative("index.js", &package_dir)
    }
}

/// Parsed `package.json`, `None` when it is missing or unreadable
fn read_package_json(path: &Path) -> Option<serde_json::Value> {
    if !path.is_file() {
        return None;
    }

    let parsed = fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|content| serde_json::from_str(&content).map_err(anyhow::Error::from));

    match parsed {
        Ok(pkg) => Some(pkg),
        Err(err) => {
            warn!("Ignoring {}: {}", path.display(), err);
            None
        }
    }
}

/// Split `@scope/name/sub` or `name/sub` into package name and subpath
fn split_package_specifier(specifier: &str) -> Option<(&str, Option<&str>)> {
    let name_len = if specifier.starts_with('@') {
        let mut parts = specifier.splitn(3, '/');
        let scope = parts.next()?;
        let name = parts.next().filter(|n| !n.is_empty())?;
        scope.len() + 1 + name.len()
    } else {
        specifier.find('/').unwrap_or(specifier.len())
    };

    if name_len == 0 {
        return None;
    }

    let subpath = specifier
        .get(name_len + 1..)
        .filter(|s| !s.is_empty());
    Some((&specifier[..name_len], subpath))
}
