//! Configuration schema definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Project metadata configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Project version
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// File name of the generated chunk plan
    #[serde(default = "default_plan_file")]
    pub plan_file: String,

    /// Pretty-print the plan JSON
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            plan_file: default_plan_file(),
            pretty: true,
        }
    }
}

fn default_output_dir() -> String {
    "dist".to_string()
}

fn default_plan_file() -> String {
    "chunk-plan.json".to_string()
}

fn default_true() -> bool {
    true
}

/// Client-side router mode of the application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterMode {
    #[default]
    Hash,
    History,
}

impl FromStr for RouterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hash" => Ok(RouterMode::Hash),
            "history" => Ok(RouterMode::History),
            other => Err(format!("unknown router mode '{}' (expected hash or history)", other)),
        }
    }
}

impl fmt::Display for RouterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterMode::Hash => f.write_str("hash"),
            RouterMode::History => f.write_str("history"),
        }
    }
}

/// Build-wide feature flags.
///
/// Read once at startup (file values, then CLI/environment overrides) and
/// handed by reference to everything that needs them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFlags {
    /// Progressive web app support (manifest + service worker)
    #[serde(default)]
    pub pwa: bool,

    /// Client-side search
    #[serde(default)]
    pub search: bool,

    /// Router mode
    #[serde(default)]
    pub router_mode: RouterMode,
}

/// A flag a merge group can be gated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlagCondition {
    Pwa,
    Search,
    HashRouter,
    HistoryRouter,
}

impl BuildFlags {
    /// Whether a gating condition holds for this build
    pub fn satisfies(&self, condition: FlagCondition) -> bool {
        match condition {
            FlagCondition::Pwa => self.pwa,
            FlagCondition::Search => self.search,
            FlagCondition::HashRouter => self.router_mode == RouterMode::Hash,
            FlagCondition::HistoryRouter => self.router_mode == RouterMode::History,
        }
    }
}

/// Chunking policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunksConfig {
    /// Prefix for per-package vendor chunks
    #[serde(default = "default_vendor_prefix")]
    pub vendor_prefix: String,

    /// Prefix for chunks produced by directory-splitting rules
    #[serde(default = "default_feature_prefix")]
    pub feature_prefix: String,

    /// Give every third-party package its own chunk. When off, all
    /// third-party code lands in a single `vendor` chunk.
    #[serde(default = "default_true")]
    pub split_vendors: bool,

    /// Warn about chunks whose sources exceed this many bytes
    #[serde(default = "default_size_warning")]
    pub size_warning: usize,

    /// Glob patterns (matched against the normalized id) that are always
    /// left to default placement
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Vendor merge groups
    #[serde(default)]
    pub groups: Vec<MergeGroupConfig>,

    /// First-party path rules
    #[serde(default)]
    pub rules: Vec<PathRuleConfig>,
}

impl Default for ChunksConfig {
    fn default() -> Self {
        Self {
            vendor_prefix: default_vendor_prefix(),
            feature_prefix: default_feature_prefix(),
            split_vendors: true,
            size_warning: default_size_warning(),
            ignore: Vec::new(),
            groups: Vec::new(),
            rules: Vec::new(),
        }
    }
}

fn default_vendor_prefix() -> String {
    "vendor-".to_string()
}

fn default_feature_prefix() -> String {
    "feature-".to_string()
}

fn default_size_warning() -> usize {
    500 * 1024
}

/// Third-party packages merged into one shared chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeGroupConfig {
    /// Chunk name for the group
    pub name: String,

    /// Package names, `package/subpath` prefixes or bare `@scope`s
    pub packages: Vec<String>,

    /// Only active when this flag holds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<FlagCondition>,
}

/// How a directory-splitting rule derives chunk names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// One chunk per direct child of the prefix
    Directory,
}

/// First-party path rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathRuleConfig {
    /// Root-relative path prefix
    pub prefix: String,

    /// Fixed chunk name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,

    /// Derive chunk names from the path below the prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<SplitMode>,
}
