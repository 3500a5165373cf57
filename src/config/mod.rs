//! Configuration handling for Chunker
//!
//! Parses and validates chunker.toml configuration files.

mod schema;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::policy::sanitize_chunk_name;

pub use schema::*;

/// Chunk for default-placed modules reached from several entries
pub const SHARED_CHUNK: &str = "shared";

/// Chunk for all third-party code when vendors are not split
pub const VENDOR_CHUNK: &str = "vendor";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project metadata
    pub project: ProjectConfig,

    /// Entry points of the module graph
    #[serde(default)]
    pub entrypoints: BTreeMap<String, String>,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Feature flags
    #[serde(default)]
    pub features: BuildFlags,

    /// Import path aliases (alias -> root-relative directory)
    #[serde(default)]
    pub aliases: HashMap<String, String>,

    /// Chunking policy
    #[serde(default)]
    pub chunks: ChunksConfig,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

/// Flag overrides coming from the command line or environment
#[derive(Debug, Clone, Default)]
pub struct FlagOverrides {
    pub pwa: Option<bool>,
    pub search: Option<bool>,
    pub router_mode: Option<RouterMode>,
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let canonical_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let mut config = Self::parse(&content)?;

        // Set root directory to the directory containing the config file
        config.root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        config.validate()?;
        config.validate_entrypoints()?;

        Ok(config)
    }

    /// Parse configuration from TOML text without touching the file system
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| "Failed to parse chunker.toml")?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            project: ProjectConfig {
                name: "my-app".to_string(),
                version: "0.1.0".to_string(),
            },
            entrypoints: {
                let mut map = BTreeMap::new();
                map.insert("main".to_string(), "src/main.js".to_string());
                map
            },
            output: OutputConfig::default(),
            features: BuildFlags::default(),
            aliases: HashMap::new(),
            chunks: ChunksConfig::default(),
            root: PathBuf::from("."),
        }
    }

    /// Apply command-line / environment overrides to the feature flags
    pub fn apply_overrides(&mut self, overrides: &FlagOverrides) {
        if let Some(pwa) = overrides.pwa {
            self.features.pwa = pwa;
        }
        if let Some(search) = overrides.search {
            self.features.search = search;
        }
        if let Some(mode) = overrides.router_mode {
            self.features.router_mode = mode;
        }
    }

    /// Validate the chunking section
    pub fn validate(&self) -> Result<()> {
        if self.entrypoints.is_empty() {
            anyhow::bail!("At least one entrypoint must be specified in chunker.toml");
        }

        let chunks = &self.chunks;
        if chunks.split_vendors && chunks.vendor_prefix.is_empty() {
            anyhow::bail!("chunks.vendor_prefix must not be empty when split_vendors is on");
        }

        for name in self.entrypoints.keys() {
            if name == SHARED_CHUNK || name == VENDOR_CHUNK {
                anyhow::bail!("Entrypoint name '{}' is reserved for a generated chunk", name);
            }
        }

        let mut group_names = HashSet::new();
        let mut owner: HashMap<&str, &str> = HashMap::new();
        for group in &chunks.groups {
            if group.name.trim().is_empty() {
                anyhow::bail!("Merge group names must not be empty");
            }
            if !group_names.insert(group.name.as_str()) {
                anyhow::bail!("Duplicate merge group '{}'", group.name);
            }
            self.check_chunk_name(&group.name)?;
            if group.packages.is_empty() {
                anyhow::bail!("Merge group '{}' lists no packages", group.name);
            }
            for package in &group.packages {
                if package.trim().is_empty() {
                    anyhow::bail!("Merge group '{}' contains an empty package name", group.name);
                }
                if let Some(previous) = owner.insert(package.as_str(), group.name.as_str()) {
                    anyhow::bail!(
                        "Package '{}' is listed in both '{}' and '{}'",
                        package,
                        previous,
                        group.name
                    );
                }
            }
        }

        for rule in &chunks.rules {
            if rule.prefix.trim_matches('/').is_empty() {
                anyhow::bail!("Chunk rules need a non-empty prefix");
            }
            match (&rule.chunk, &rule.split) {
                (Some(_), Some(_)) => anyhow::bail!(
                    "Rule for '{}' sets both `chunk` and `split`",
                    rule.prefix
                ),
                (None, None) => anyhow::bail!(
                    "Rule for '{}' needs either `chunk` or `split`",
                    rule.prefix
                ),
                (Some(name), None) if name.trim().is_empty() => {
                    anyhow::bail!("Rule for '{}' has an empty chunk name", rule.prefix)
                }
                (Some(name), None) => self.check_chunk_name(name)?,
                _ => {}
            }
        }

        Ok(())
    }

    /// Reject configured chunk names that collide with generated or entry chunks
    fn check_chunk_name(&self, name: &str) -> Result<()> {
        let name = sanitize_chunk_name(name);
        if name == SHARED_CHUNK || name == VENDOR_CHUNK {
            anyhow::bail!("Chunk name '{}' is reserved", name);
        }
        if self.entrypoints.contains_key(&name) {
            anyhow::bail!("Chunk name '{}' is already used by an entrypoint", name);
        }
        Ok(())
    }

    /// Ensure every entrypoint points at an existing file
    fn validate_entrypoints(&self) -> Result<()> {
        for (name, path) in &self.entrypoints {
            let full_path = self.root.join(path);
            if !full_path.exists() {
                anyhow::bail!(
                    "Entrypoint '{}' points to non-existent file: {}",
                    name,
                    full_path.display()
                );
            }
        }

        Ok(())
    }

    /// Get the absolute output directory path
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.output.dir)
    }

    /// Get all entrypoint paths
    pub fn all_entrypoints(&self) -> Vec<(String, PathBuf)> {
        self.entrypoints
            .iter()
            .map(|(name, path)| (name.clone(), self.root.join(path)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [project]
        name = "media-web"

        [entrypoints]
        main = "src/index.ts"

        [features]
        search = true
        router_mode = "history"

        [aliases]
        "@" = "src"

        [[chunks.groups]]
        name = "vendor-captioning"
        packages = ["dompurify", "parse5"]
        when = "search"

        [[chunks.rules]]
        prefix = "src/controllers"
        split = "directory"

        [[chunks.rules]]
        prefix = "src/components/playback"
        chunk = "playback"
    "#;

    #[test]
    fn test_parse_sample() {
        let config = Config::parse(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.project.version, "0.1.0");
        assert!(config.features.search);
        assert!(!config.features.pwa);
        assert_eq!(config.features.router_mode, RouterMode::History);
        assert_eq!(config.chunks.groups[0].when, Some(FlagCondition::Search));
        assert_eq!(config.chunks.rules[0].split, Some(SplitMode::Directory));
        assert_eq!(config.chunks.vendor_prefix, "vendor-");
        assert_eq!(config.output.plan_file, "chunk-plan.json");
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.apply_overrides(&FlagOverrides {
            pwa: Some(true),
            search: Some(false),
            router_mode: None,
        });

        assert!(config.features.pwa);
        assert!(!config.features.search);
        assert_eq!(config.features.router_mode, RouterMode::History);
    }

    #[test]
    fn test_package_in_two_groups_rejected() {
        let mut config = Config::default_config();
        config.chunks.groups = vec![
            MergeGroupConfig {
                name: "a".into(),
                packages: vec!["marked".into()],
                when: None,
            },
            MergeGroupConfig {
                name: "b".into(),
                packages: vec!["marked".into()],
                when: None,
            },
        ];

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("marked"));
    }

    #[test]
    fn test_rule_needs_exactly_one_target() {
        let mut config = Config::default_config();
        config.chunks.rules = vec![PathRuleConfig {
            prefix: "src/views".into(),
            chunk: None,
            split: None,
        }];
        assert!(config.validate().is_err());

        config.chunks.rules[0].chunk = Some("views".into());
        config.chunks.rules[0].split = Some(SplitMode::Directory);
        assert!(config.validate().is_err());

        config.chunks.rules[0].split = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reserved_chunk_names_rejected() {
        let mut config = Config::default_config();
        config.chunks.rules = vec![PathRuleConfig {
            prefix: "src/common".into(),
            chunk: Some("shared".into()),
            split: None,
        }];
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("reserved"), "{}", err);

        config.chunks.rules[0].chunk = Some("main".into());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("entrypoint"), "{}", err);

        config.chunks.rules[0].chunk = Some("common".into());
        config.chunks.groups = vec![MergeGroupConfig {
            name: "vendor".into(),
            packages: vec!["marked".into()],
            when: None,
        }];
        assert!(config.validate().is_err());

        config.chunks.groups.clear();
        config.validate().unwrap();

        config.entrypoints.insert("shared".into(), "src/shared.js".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_router_mode_from_str() {
        assert_eq!("HASH".parse::<RouterMode>(), Ok(RouterMode::Hash));
        assert_eq!("history".parse::<RouterMode>(), Ok(RouterMode::History));
        assert!("memory".parse::<RouterMode>().is_err());
    }
}
