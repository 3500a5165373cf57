//! Chunk assignment policy
//!
//! The manual-chunking hook: given a resolved module id, decide which output
//! chunk it belongs to, or leave it to the bundler's default placement.
//!
//! The policy is built once from the configuration and is immutable after
//! that, so it can be shared freely between worker threads. Every call is a
//! pure function of the id, the configuration and static graph metadata.

mod classify;
mod rules;

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::config::{Config, VENDOR_CHUNK};
use crate::utils::path_to_module_id;

pub use classify::{classify, normalize_id, Classified, ClassifyError, ModuleCategory, Origin};
pub use rules::{normalize_prefix, Rule, RuleMatch, RuleTable, Target};

/// Read-only graph metadata the policy may consult for a single id
pub trait GraphMetadata {
    /// Whether the id is one of the build's entry modules
    fn is_entry(&self, id: &str) -> bool;
}

/// Metadata source for callers without a module graph
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGraph;

impl GraphMetadata for NoGraph {
    fn is_entry(&self, _id: &str) -> bool {
        false
    }
}

/// Why a chunk was chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// Package is listed in a vendor merge group
    MergeGroup { group: String },
    /// Default one-chunk-per-package vendor rule
    VendorPackage { package: String },
    /// All third-party code shares one chunk
    SingleVendor,
    /// Fixed first-party path rule
    PathRule { prefix: String },
    /// Directory-splitting first-party rule
    SplitDirectory { prefix: String, child: String },
}

/// Why the policy left a module to default placement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    Unclassifiable(ClassifyError),
    Ignored,
    Entry,
    Asset,
    NoMatchingRule,
}

/// Full answer of the policy for one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Chunk { name: String, reason: Reason },
    NoDecision(Skip),
}

impl Decision {
    /// Chunk name, if one was chosen
    pub fn into_chunk(self) -> Option<String> {
        match self {
            Decision::Chunk { name, .. } => Some(name),
            Decision::NoDecision(_) => None,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::MergeGroup { group } => write!(f, "merge group '{}'", group),
            Reason::VendorPackage { package } => write!(f, "vendor package '{}'", package),
            Reason::SingleVendor => f.write_str("single vendor chunk"),
            Reason::PathRule { prefix } => write!(f, "path rule '{}'", prefix),
            Reason::SplitDirectory { prefix, child } => {
                write!(f, "directory split of '{}' at '{}'", prefix, child)
            }
        }
    }
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::Unclassifiable(err) => write!(f, "{}", err),
            Skip::Ignored => f.write_str("matches an ignore pattern"),
            Skip::Entry => f.write_str("entry module"),
            Skip::Asset => f.write_str("static asset"),
            Skip::NoMatchingRule => f.write_str("no matching rule"),
        }
    }
}

/// The chunk assignment policy
#[derive(Debug, Clone)]
pub struct ChunkPolicy {
    /// Normalized project root, no trailing slash
    root: String,

    /// Merge-group rules over `package/subpath`
    vendor: RuleTable,

    /// Path rules over root-relative first-party paths
    source: RuleTable,

    ignore: Option<GlobSet>,

    vendor_prefix: String,
    feature_prefix: String,
    split_vendors: bool,
}

impl ChunkPolicy {
    /// Build the policy from a loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let chunks = &config.chunks;

        let mut vendor = RuleTable::new();
        for group in &chunks.groups {
            if let Some(condition) = group.when {
                if !config.features.satisfies(condition) {
                    debug!("Merge group '{}' inactive for this build", group.name);
                    continue;
                }
            }
            let name = sanitize_chunk_name(&group.name);
            for package in &group.packages {
                vendor.push(Rule::new(package, Target::Chunk(name.clone()), &group.name));
            }
        }

        let mut source = RuleTable::new();
        for rule in &chunks.rules {
            let target = match &rule.chunk {
                Some(name) => Target::Chunk(sanitize_chunk_name(name)),
                None => Target::SplitDirectory,
            };
            source.push(Rule::new(&rule.prefix, target, normalize_prefix(&rule.prefix)));
        }

        let ignore = if chunks.ignore.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in &chunks.ignore {
                builder.add(
                    Glob::new(pattern)
                        .with_context(|| format!("Invalid ignore pattern: {}", pattern))?,
                );
            }
            Some(builder.build().context("Failed to compile ignore patterns")?)
        };

        debug!(
            "Chunk policy: {} vendor rule(s), {} path rule(s)",
            vendor.len(),
            source.len()
        );

        Ok(Self {
            root: normalize_root(&path_to_module_id(&config.root)),
            vendor,
            source,
            ignore,
            vendor_prefix: chunks.vendor_prefix.clone(),
            feature_prefix: chunks.feature_prefix.clone(),
            split_vendors: chunks.split_vendors,
        })
    }

    /// The manual-chunking hook: chunk name for `id`, or `None` for default
    /// placement.
    pub fn assign(&self, id: &str, graph: &dyn GraphMetadata) -> Option<String> {
        self.decide(id, graph).into_chunk()
    }

    /// Decide the chunk for `id` and report which rule fired
    pub fn decide(&self, id: &str, graph: &dyn GraphMetadata) -> Decision {
        let normalized = normalize_id(id);

        let classified = match classify(&normalized, &self.root) {
            Ok(classified) => classified,
            Err(err) => {
                debug!("No chunk for '{}': {}", id, err);
                return Decision::NoDecision(Skip::Unclassifiable(err));
            }
        };

        let ignored = self.ignore.as_ref().is_some_and(|set| {
            set.is_match(classified.origin.path()) || set.is_match(&*normalized)
        });
        if ignored {
            return Decision::NoDecision(Skip::Ignored);
        }
        if graph.is_entry(id) {
            return Decision::NoDecision(Skip::Entry);
        }
        if classified.category == ModuleCategory::Asset {
            return Decision::NoDecision(Skip::Asset);
        }

        match classified.origin {
            Origin::ThirdParty { package, path } => self.decide_vendor(package, path),
            Origin::FirstParty { path } => self.decide_source(path),
        }
    }

    fn decide_vendor(&self, package: &str, path: &str) -> Decision {
        if let Some(found) = self.vendor.lookup(path) {
            if let Target::Chunk(name) = &found.rule.target {
                return Decision::Chunk {
                    name: name.clone(),
                    reason: Reason::MergeGroup {
                        group: found.rule.label.clone(),
                    },
                };
            }
        }

        if self.split_vendors {
            Decision::Chunk {
                name: sanitize_chunk_name(&format!("{}{}", self.vendor_prefix, package)),
                reason: Reason::VendorPackage {
                    package: package.to_string(),
                },
            }
        } else {
            Decision::Chunk {
                name: VENDOR_CHUNK.to_string(),
                reason: Reason::SingleVendor,
            }
        }
    }

    fn decide_source(&self, path: &str) -> Decision {
        let Some(found) = self.source.lookup(path) else {
            return Decision::NoDecision(Skip::NoMatchingRule);
        };

        match (&found.rule.target, found.child) {
            (Target::Chunk(name), _) => Decision::Chunk {
                name: name.clone(),
                reason: Reason::PathRule {
                    prefix: found.rule.label.clone(),
                },
            },
            (Target::SplitDirectory, Some(child)) => Decision::Chunk {
                name: sanitize_chunk_name(&format!("{}{}", self.feature_prefix, file_stem(child))),
                reason: Reason::SplitDirectory {
                    prefix: found.rule.label.clone(),
                    child: child.to_string(),
                },
            },
            // split matches always carry a child
            (Target::SplitDirectory, None) => Decision::NoDecision(Skip::NoMatchingRule),
        }
    }
}

/// Make a chunk name safe to use as a file name
pub fn sanitize_chunk_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| *c != '@')
        .map(|c| if c == '/' || c == '\\' || c.is_whitespace() { '-' } else { c })
        .collect()
}

fn normalize_root(root: &str) -> String {
    let root = root.trim_end_matches('/');
    if root == "." {
        String::new()
    } else {
        root.to_string()
    }
}

/// `home.js` -> `home`, `home` -> `home`
fn file_stem(segment: &str) -> &str {
    match segment.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => segment,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;

    use super::*;
    use crate::config::{
        FlagCondition, MergeGroupConfig, PathRuleConfig, SplitMode,
    };

    struct Entries(HashSet<String>);

    impl GraphMetadata for Entries {
        fn is_entry(&self, id: &str) -> bool {
            self.0.contains(id)
        }
    }

    fn config() -> Config {
        let mut config = Config::default_config();
        config.root = PathBuf::from("/srv/media-web");
        config.features.search = true;
        config.chunks.groups = vec![MergeGroupConfig {
            name: "vendor-captioning".into(),
            packages: vec![
                "dompurify".into(),
                "parse5".into(),
                "marked".into(),
                "fuse.js".into(),
            ],
            when: None,
        }];
        config.chunks.rules = vec![
            PathRuleConfig {
                prefix: "src/controllers".into(),
                chunk: None,
                split: Some(SplitMode::Directory),
            },
            PathRuleConfig {
                prefix: "src/components".into(),
                chunk: Some("components".into()),
                split: None,
            },
            PathRuleConfig {
                prefix: "src/components/playback".into(),
                chunk: Some("playback".into()),
                split: None,
            },
        ];
        config
    }

    fn policy() -> ChunkPolicy {
        ChunkPolicy::from_config(&config()).unwrap()
    }

    const IDS: &[&str] = &[
        "/srv/media-web/node_modules/dompurify/dist/purify.es.mjs",
        "/srv/media-web/node_modules/parse5/dist/index.js",
        "/srv/media-web/node_modules/date-fns/esm/format/index.js",
        "/srv/media-web/node_modules/@jellyfin/sdk/lib/api.js",
        "/srv/media-web/src/controllers/home/home.js",
        "/srv/media-web/src/controllers/music/musicalbums.js",
        "/srv/media-web/src/components/playback/playbackmanager.js",
        "/srv/media-web/src/components/dialog/dialog.js",
        "/srv/media-web/src/scripts/settings.js",
        "\0vite/preload-helper",
        "virtual:pwa-register",
        "",
        "/srv/media-web/node_modules/",
    ];

    #[test]
    fn test_merge_group_shares_one_chunk() {
        let policy = policy();
        assert_eq!(
            policy.assign(IDS[0], &NoGraph).as_deref(),
            Some("vendor-captioning")
        );
        assert_eq!(
            policy.assign(IDS[1], &NoGraph).as_deref(),
            Some("vendor-captioning")
        );
        assert_eq!(
            policy.assign(IDS[2], &NoGraph).as_deref(),
            Some("vendor-date-fns")
        );
    }

    #[test]
    fn test_scoped_vendor_name_is_sanitized() {
        assert_eq!(
            policy().assign(IDS[3], &NoGraph).as_deref(),
            Some("vendor-jellyfin-sdk")
        );
    }

    #[test]
    fn test_first_party_rules() {
        let policy = policy();
        assert_eq!(policy.assign(IDS[4], &NoGraph).as_deref(), Some("feature-home"));
        assert_eq!(policy.assign(IDS[5], &NoGraph).as_deref(), Some("feature-music"));
        assert_eq!(policy.assign(IDS[6], &NoGraph).as_deref(), Some("playback"));
        assert_eq!(policy.assign(IDS[7], &NoGraph).as_deref(), Some("components"));
        assert_eq!(
            policy.decide(IDS[8], &NoGraph),
            Decision::NoDecision(Skip::NoMatchingRule)
        );
    }

    #[test]
    fn test_file_directly_under_split_prefix_uses_stem() {
        assert_eq!(
            policy()
                .assign("/srv/media-web/src/controllers/shows.js", &NoGraph)
                .as_deref(),
            Some("feature-shows")
        );
    }

    #[test]
    fn test_virtual_and_malformed_ids_get_no_decision() {
        let policy = policy();
        for id in &IDS[9..] {
            assert!(
                matches!(
                    policy.decide(id, &NoGraph),
                    Decision::NoDecision(Skip::Unclassifiable(_))
                ),
                "{:?}",
                id
            );
        }
        assert_eq!(policy.assign("/elsewhere/lib.js", &NoGraph), None);
    }

    #[test]
    fn test_query_suffix_is_ignored() {
        assert_eq!(
            policy()
                .assign("/srv/media-web/src/controllers/home/home.vue?vue&type=style&index=0", &NoGraph)
                .as_deref(),
            Some("feature-home")
        );
    }

    #[test]
    fn test_entries_and_assets_use_default_placement() {
        let policy = policy();
        let entry = "/srv/media-web/src/controllers/home/home.js";
        let graph = Entries([entry.to_string()].into_iter().collect());

        assert_eq!(policy.decide(entry, &graph), Decision::NoDecision(Skip::Entry));
        assert_eq!(
            policy.decide("/srv/media-web/src/controllers/home/banner.png", &NoGraph),
            Decision::NoDecision(Skip::Asset)
        );
    }

    #[test]
    fn test_ignore_patterns() {
        let mut config = config();
        config.chunks.ignore = vec!["**/*.worker.js".into()];
        let policy = ChunkPolicy::from_config(&config).unwrap();

        assert_eq!(
            policy.decide("/srv/media-web/src/controllers/home/decode.worker.js", &NoGraph),
            Decision::NoDecision(Skip::Ignored)
        );
    }

    #[test]
    fn test_ignore_patterns_are_root_relative() {
        let mut config = config();
        config.chunks.ignore = vec!["src/legacy/**".into(), "marked/lib/**".into()];
        config.chunks.rules.push(PathRuleConfig {
            prefix: "src".into(),
            chunk: Some("app".into()),
            split: None,
        });
        let policy = ChunkPolicy::from_config(&config).unwrap();

        for id in ["src/legacy/a.js", "./src/legacy/a.js", "/srv/media-web/src/legacy/a.js"] {
            assert_eq!(policy.decide(id, &NoGraph), Decision::NoDecision(Skip::Ignored), "{}", id);
        }
        assert_eq!(
            policy.decide("/srv/media-web/node_modules/marked/lib/marked.esm.js", &NoGraph),
            Decision::NoDecision(Skip::Ignored)
        );
        assert_eq!(
            policy.assign("/srv/media-web/src/current/a.js", &NoGraph).as_deref(),
            Some("app")
        );
    }

    #[test]
    fn test_invalid_ignore_pattern_is_a_config_error() {
        let mut config = config();
        config.chunks.ignore = vec!["src/[".into()];
        assert!(ChunkPolicy::from_config(&config).is_err());
    }

    #[test]
    fn test_gated_group_inactive_without_flag() {
        let mut config = config();
        config.chunks.groups[0].when = Some(FlagCondition::Search);
        config.features.search = false;
        let policy = ChunkPolicy::from_config(&config).unwrap();

        assert_eq!(policy.assign(IDS[0], &NoGraph).as_deref(), Some("vendor-dompurify"));

        config.features.search = true;
        let policy = ChunkPolicy::from_config(&config).unwrap();
        assert_eq!(policy.assign(IDS[0], &NoGraph).as_deref(), Some("vendor-captioning"));
    }

    #[test]
    fn test_single_vendor_chunk() {
        let mut config = config();
        config.chunks.split_vendors = false;
        let policy = ChunkPolicy::from_config(&config).unwrap();

        assert_eq!(policy.assign(IDS[2], &NoGraph).as_deref(), Some("vendor"));
        // merge groups still take precedence
        assert_eq!(policy.assign(IDS[1], &NoGraph).as_deref(), Some("vendor-captioning"));
    }

    #[test]
    fn test_longer_vendor_prefix_wins() {
        let mut config = config();
        config.chunks.groups.push(MergeGroupConfig {
            name: "date-locales".into(),
            packages: vec!["date-fns/locale".into()],
            when: None,
        });
        config.chunks.groups.push(MergeGroupConfig {
            name: "date".into(),
            packages: vec!["date-fns".into()],
            when: None,
        });
        let policy = ChunkPolicy::from_config(&config).unwrap();

        assert_eq!(
            policy
                .assign("/srv/media-web/node_modules/date-fns/locale/de/index.js", &NoGraph)
                .as_deref(),
            Some("date-locales")
        );
        assert_eq!(policy.assign(IDS[2], &NoGraph).as_deref(), Some("date"));
    }

    #[test]
    fn test_scope_group_captures_whole_scope() {
        let mut config = config();
        config.chunks.groups.push(MergeGroupConfig {
            name: "vendor-jellyfin".into(),
            packages: vec!["@jellyfin".into()],
            when: None,
        });
        let policy = ChunkPolicy::from_config(&config).unwrap();

        assert_eq!(policy.assign(IDS[3], &NoGraph).as_deref(), Some("vendor-jellyfin"));
        assert_eq!(
            policy
                .assign("/srv/media-web/node_modules/@jellyfin/ui/index.js", &NoGraph)
                .as_deref(),
            Some("vendor-jellyfin")
        );
        // segment boundary: `@jellyfin` does not cover `@jellyfin-extra`
        assert_eq!(
            policy
                .assign("/srv/media-web/node_modules/@jellyfin-extra/x/index.js", &NoGraph)
                .as_deref(),
            Some("vendor-jellyfin-extra-x")
        );

        config.chunks.groups.push(MergeGroupConfig {
            name: "jellyfin-sdk".into(),
            packages: vec!["@jellyfin/sdk".into()],
            when: None,
        });
        let policy = ChunkPolicy::from_config(&config).unwrap();

        assert_eq!(
            policy.decide(IDS[3], &NoGraph),
            Decision::Chunk {
                name: "jellyfin-sdk".into(),
                reason: Reason::MergeGroup {
                    group: "jellyfin-sdk".into()
                },
            }
        );
        assert_eq!(
            policy
                .assign("/srv/media-web/node_modules/@jellyfin/ui/index.js", &NoGraph)
                .as_deref(),
            Some("vendor-jellyfin")
        );
    }

    #[test]
    fn test_deterministic_and_order_independent() {
        let policy = policy();

        let forward: Vec<(&str, Option<String>)> =
            IDS.iter().map(|id| (*id, policy.assign(id, &NoGraph))).collect();

        let mut backward: Vec<(&str, Option<String>)> =
            IDS.iter().rev().map(|id| (*id, policy.assign(id, &NoGraph))).collect();
        backward.reverse();

        assert_eq!(forward, backward);

        for (id, chunk) in &forward {
            assert_eq!(&policy.assign(id, &NoGraph), chunk);
        }
    }

    #[test]
    fn test_concurrent_calls_agree() {
        let policy = policy();
        let expected: Vec<Option<String>> =
            IDS.iter().map(|id| policy.assign(id, &NoGraph)).collect();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let got: Vec<Option<String>> =
                        IDS.iter().map(|id| policy.assign(id, &NoGraph)).collect();
                    assert_eq!(got, expected);
                });
            }
        });
    }

    #[test]
    fn test_sanitize_chunk_name() {
        assert_eq!(sanitize_chunk_name("vendor-@jellyfin/sdk"), "vendor-jellyfin-sdk");
        assert_eq!(sanitize_chunk_name(" media core "), "media-core");
    }
}
