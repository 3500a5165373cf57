//! Module identifier classification
//!
//! Splits a resolved module id into its origin (project source vs. a package
//! under `node_modules`) and a coarse file category.

use std::borrow::Cow;

use thiserror::Error;

const NODE_MODULES: &str = "node_modules/";

/// Why an identifier could not be classified
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("module id is empty")]
    Empty,

    #[error("virtual module id")]
    Virtual,

    #[error("no package name after node_modules/")]
    MissingPackage,

    #[error("module lies outside the project root")]
    OutsideRoot,
}

/// Coarse file category of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleCategory {
    Script,
    Style,
    Data,
    Asset,
    Unknown,
}

impl ModuleCategory {
    /// Determine category from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "js" | "mjs" | "cjs" | "ts" | "mts" | "cts" | "jsx" | "tsx" | "vue" | "svelte" => {
                ModuleCategory::Script
            }
            "css" | "scss" | "sass" | "less" => ModuleCategory::Style,
            "json" => ModuleCategory::Data,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "svg" | "ico" | "woff" | "woff2"
            | "ttf" | "otf" | "eot" | "mp3" | "mp4" | "webm" | "ogg" | "wav" | "flac" | "wasm" => {
                ModuleCategory::Asset
            }
            _ => ModuleCategory::Unknown,
        }
    }

    /// Category of a normalized module id
    pub fn from_id(id: &str) -> Self {
        let file = id.rsplit('/').next().unwrap_or(id);
        match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Self::from_extension(ext),
            _ => ModuleCategory::Unknown,
        }
    }
}

/// Where a module comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin<'a> {
    /// Code from a dependency package
    ThirdParty {
        /// Package name, including the scope for scoped packages
        package: &'a str,
        /// Package name plus subpath, e.g. `dompurify/dist/purify.es.mjs`
        path: &'a str,
    },
    /// Project source, relative to the project root
    FirstParty { path: &'a str },
}

impl<'a> Origin<'a> {
    /// Root-relative path for project source, `package/subpath` otherwise
    pub fn path(&self) -> &'a str {
        match self {
            Origin::ThirdParty { path, .. } | Origin::FirstParty { path } => *path,
        }
    }
}

/// A classified module identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified<'a> {
    pub origin: Origin<'a>,
    pub category: ModuleCategory,
}

/// Normalize a raw module id: forward slashes, no `?` query suffix.
///
/// A `#` only ends the id inside the query; it is a valid path character.
pub fn normalize_id(id: &str) -> Cow<'_, str> {
    let end = id.find('?').unwrap_or(id.len());
    let id = &id[..end];
    if id.contains('\\') {
        Cow::Owned(id.replace('\\', "/"))
    } else {
        Cow::Borrowed(id)
    }
}

/// Classify a normalized module id.
///
/// `root` is the normalized project root without a trailing slash; an empty
/// root means relative ids are taken as already root-relative.
pub fn classify<'a>(id: &'a str, root: &str) -> Result<Classified<'a>, ClassifyError> {
    if id.trim().is_empty() {
        return Err(ClassifyError::Empty);
    }
    if is_virtual(id) {
        return Err(ClassifyError::Virtual);
    }

    let category = ModuleCategory::from_id(id);

    if let Some(start) = last_node_modules(id) {
        let path = &id[start..];
        let package = package_name(path).ok_or(ClassifyError::MissingPackage)?;
        return Ok(Classified {
            origin: Origin::ThirdParty { package, path },
            category,
        });
    }

    let path = relative_to_root(id, root).ok_or(ClassifyError::OutsideRoot)?;
    Ok(Classified {
        origin: Origin::FirstParty { path },
        category,
    })
}

fn is_virtual(id: &str) -> bool {
    id.starts_with('\0') || id.starts_with("virtual:")
}

/// Byte offset just past the last `node_modules/` path segment
fn last_node_modules(id: &str) -> Option<usize> {
    id.rmatch_indices(NODE_MODULES)
        .find(|(idx, _)| *idx == 0 || id.as_bytes()[idx - 1] == b'/')
        .map(|(idx, _)| idx + NODE_MODULES.len())
}

/// Package name at the start of a `node_modules`-relative path
fn package_name(path: &str) -> Option<&str> {
    let mut segments = path.split('/');
    let first = segments.next().filter(|s| !s.is_empty())?;

    if let Some(scope) = first.strip_prefix('@') {
        let name = segments.next().filter(|s| !s.is_empty())?;
        if scope.is_empty() {
            return None;
        }
        return Some(&path[..first.len() + 1 + name.len()]);
    }

    if first.starts_with('.') {
        return None;
    }
    Some(first)
}

fn is_absolute(id: &str) -> bool {
    let bytes = id.as_bytes();
    id.starts_with('/') || (bytes.len() > 2 && bytes[1] == b':' && bytes[2] == b'/')
}

fn relative_to_root<'a>(id: &'a str, root: &str) -> Option<&'a str> {
    let rel = if is_absolute(id) {
        if root.is_empty() {
            return None;
        }
        id.strip_prefix(root)?.strip_prefix('/')?
    } else {
        id.trim_start_matches("./")
    };

    if rel.is_empty() || rel.starts_with("../") {
        None
    } else {
        Some(rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn third_party(id: &str) -> (String, String) {
        match classify(id, "/app").unwrap().origin {
            Origin::ThirdParty { package, path } => (package.to_string(), path.to_string()),
            other => panic!("expected third-party, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_package() {
        let (package, path) = third_party("/app/node_modules/dompurify/dist/purify.es.mjs");
        assert_eq!(package, "dompurify");
        assert_eq!(path, "dompurify/dist/purify.es.mjs");
    }

    #[test]
    fn test_scoped_package() {
        let (package, _) = third_party("/app/node_modules/@jellyfin/sdk/lib/api.js");
        assert_eq!(package, "@jellyfin/sdk");
    }

    #[test]
    fn test_pnpm_and_nested_layouts_use_last_segment() {
        let (package, _) = third_party(
            "/app/node_modules/.pnpm/parse5@7.1.2/node_modules/parse5/dist/index.js",
        );
        assert_eq!(package, "parse5");

        let (package, _) = third_party("/app/node_modules/a/node_modules/b/index.js");
        assert_eq!(package, "b");
    }

    #[test]
    fn test_malformed_package_paths() {
        assert_eq!(
            classify("/app/node_modules/", "/app").unwrap_err(),
            ClassifyError::MissingPackage
        );
        assert_eq!(
            classify("/app/node_modules/@scope", "/app").unwrap_err(),
            ClassifyError::MissingPackage
        );
        assert_eq!(
            classify("/app/node_modules/.bin/x", "/app").unwrap_err(),
            ClassifyError::MissingPackage
        );
    }

    #[test]
    fn test_not_node_modules_substring() {
        // `my_node_modules/` is not a node_modules segment
        let classified = classify("/app/src/my_node_modules/x.js", "/app").unwrap();
        assert_eq!(
            classified.origin,
            Origin::FirstParty {
                path: "src/my_node_modules/x.js"
            }
        );
    }

    #[test]
    fn test_first_party() {
        let classified = classify("/app/src/controllers/home/home.js", "/app").unwrap();
        assert_eq!(
            classified.origin,
            Origin::FirstParty {
                path: "src/controllers/home/home.js"
            }
        );
        assert_eq!(classified.category, ModuleCategory::Script);

        let relative = classify("./src/styles/site.scss", "").unwrap();
        assert_eq!(relative.origin, Origin::FirstParty { path: "src/styles/site.scss" });
        assert_eq!(relative.category, ModuleCategory::Style);
    }

    #[test]
    fn test_outside_root() {
        assert_eq!(
            classify("/other/src/x.js", "/app").unwrap_err(),
            ClassifyError::OutsideRoot
        );
        assert_eq!(
            classify("/application/x.js", "/app").unwrap_err(),
            ClassifyError::OutsideRoot
        );
        assert_eq!(classify("../x.js", "/app").unwrap_err(), ClassifyError::OutsideRoot);
    }

    #[test]
    fn test_virtual_and_empty() {
        assert_eq!(classify("\0vite/preload-helper", "/app").unwrap_err(), ClassifyError::Virtual);
        assert_eq!(classify("virtual:pwa-register", "/app").unwrap_err(), ClassifyError::Virtual);
        assert_eq!(classify("  ", "/app").unwrap_err(), ClassifyError::Empty);
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("/app/src/App.vue?vue&type=style"), "/app/src/App.vue");
        assert_eq!(normalize_id(r"C:\app\src\main.ts"), "C:/app/src/main.ts");
        assert!(matches!(normalize_id("/app/x.js"), Cow::Borrowed(_)));
        assert_eq!(normalize_id("/app/src/c#/x.js"), "/app/src/c#/x.js");
        assert_eq!(normalize_id("/app/src/x.js?raw#top"), "/app/src/x.js");
    }

    #[test]
    fn test_category_detection() {
        assert_eq!(ModuleCategory::from_id("a/b/logo.SVG"), ModuleCategory::Asset);
        assert_eq!(ModuleCategory::from_id("a/b/strings.json"), ModuleCategory::Data);
        assert_eq!(ModuleCategory::from_id("a/b/.eslintrc"), ModuleCategory::Unknown);
        assert_eq!(ModuleCategory::from_id("a/b/LICENSE"), ModuleCategory::Unknown);
    }
}
