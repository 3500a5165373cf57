//! Chunks and the serialized chunk plan

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ModuleId;
use crate::config::BuildFlags;
use crate::policy::Reason;

/// Type of chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Entry point chunk - loaded immediately
    Entry,
    /// Async chunk - loaded on demand via dynamic import
    Async,
    /// Shared chunk - default-placed modules used by several entry points
    Shared,
    /// Third-party code
    Vendor,
    /// One feature directory of first-party code
    Feature,
    /// Fixed first-party path rule
    Manual,
}

impl ChunkKind {
    /// Kind of chunk a policy decision produces
    pub fn from_reason(reason: &Reason) -> Self {
        match reason {
            Reason::MergeGroup { .. } | Reason::VendorPackage { .. } | Reason::SingleVendor => {
                ChunkKind::Vendor
            }
            Reason::SplitDirectory { .. } => ChunkKind::Feature,
            Reason::PathRule { .. } => ChunkKind::Manual,
        }
    }
}

/// A chunk is a group of modules that will be bundled together
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk name (used for output filename)
    pub name: String,

    /// Type of chunk
    pub kind: ChunkKind,

    /// Module IDs included in this chunk
    pub module_ids: Vec<ModuleId>,
}

impl Chunk {
    pub fn new(name: String, kind: ChunkKind) -> Self {
        Self {
            name,
            kind,
            module_ids: Vec::new(),
        }
    }

    /// Check if chunk is empty
    pub fn is_empty(&self) -> bool {
        self.module_ids.is_empty()
    }

    /// Number of modules in chunk
    pub fn len(&self) -> usize {
        self.module_ids.len()
    }
}

/// One chunk as written to the plan file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedChunk {
    pub name: String,
    pub kind: ChunkKind,

    /// Total source size in bytes
    pub size: usize,

    /// Hash over the module ids; changes only when membership changes
    pub fingerprint: String,

    /// Module ids, root-relative where possible, sorted
    pub modules: Vec<String>,
}

/// The full chunk plan of one build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub project: String,
    pub version: String,
    pub flags: BuildFlags,

    /// Chunks sorted by name
    pub chunks: Vec<PlannedChunk>,

    /// Module id -> chunk name
    pub modules: BTreeMap<String, String>,
}

impl ChunkPlan {
    /// Look up a chunk by name
    pub fn chunk(&self, name: &str) -> Option<&PlannedChunk> {
        self.chunks.iter().find(|c| c.name == name)
    }

    /// Chunk a module was placed in
    pub fn chunk_of(&self, module: &str) -> Option<&str> {
        self.modules.get(module).map(String::as_str)
    }
}
