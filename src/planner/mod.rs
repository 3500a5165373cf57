//! Chunk planner
//!
//! Builds the static module graph from the configured entrypoints, runs the
//! chunk assignment policy over every module and groups the results into a
//! chunk plan. Modules the policy leaves alone get default placement: their
//! entry chunk, a shared chunk when several entries reach them, or the async
//! chunk of the dynamic import that pulls them in.

mod chunk;
mod graph;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::{Config, SHARED_CHUNK};
use crate::policy::{sanitize_chunk_name, ChunkPolicy, Decision, ModuleCategory};
use crate::resolver::{Resolved, Resolver};
use crate::utils::{fingerprint, path_to_module_id, relative_path};

pub use chunk::{Chunk, ChunkKind, ChunkPlan, PlannedChunk};
pub use graph::{EdgeKind, Module, ModuleGraph, ModuleId};

/// Planner options derived from command arguments
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Output directory override
    pub outdir: Option<PathBuf>,

    /// Number of assignment workers, defaults to available parallelism
    pub jobs: Option<usize>,
}

/// The chunk planner
pub struct Planner {
    /// Project configuration (root canonicalized)
    config: Arc<Config>,

    /// Planner options
    options: PlanOptions,

    /// Chunk assignment policy
    policy: ChunkPolicy,

    /// Module resolver
    resolver: Resolver,

    /// Module graph
    graph: Arc<RwLock<ModuleGraph>>,
}

impl Planner {
    /// Create a new planner instance
    pub fn new(mut config: Config, options: PlanOptions) -> Result<Self> {
        config.root = fs::canonicalize(&config.root)
            .with_context(|| format!("Failed to resolve project root: {}", config.root.display()))?;

        let config = Arc::new(config);
        let policy = ChunkPolicy::from_config(&config)?;
        let resolver = Resolver::new(config.clone())?;

        Ok(Self {
            config,
            options,
            policy,
            resolver,
            graph: Arc::new(RwLock::new(ModuleGraph::new())),
        })
    }

    /// Build the graph and compute the chunk plan
    pub async fn plan(&self) -> Result<ChunkPlan> {
        let start = Instant::now();

        // 1. Build the module graph from entrypoints
        info!("Building module graph...");
        self.build_module_graph().await?;

        // 2. Run the policy over every module
        info!("Assigning chunks...");
        let decisions = self.assign_chunks();

        // 3. Group modules into chunks
        info!("Grouping chunks...");
        let chunks = self.group_chunks(&decisions);

        let plan = self.to_plan(&chunks);
        debug!("Planned {} chunk(s) in {:?}", plan.chunks.len(), start.elapsed());

        Ok(plan)
    }

    /// Serialize a plan as JSON
    pub fn render(&self, plan: &ChunkPlan) -> Result<String> {
        let json = if self.config.output.pretty {
            serde_json::to_string_pretty(plan)?
        } else {
            serde_json::to_string(plan)?
        };
        Ok(json)
    }

    /// Write the plan file, returning its path
    pub fn write_plan(&self, plan: &ChunkPlan) -> Result<PathBuf> {
        let output_dir = self
            .options
            .outdir
            .clone()
            .unwrap_or_else(|| self.config.output_dir());

        fs::create_dir_all(&output_dir).context("Failed to create output directory")?;

        let plan_path = output_dir.join(&self.config.output.plan_file);
        fs::write(&plan_path, self.render(plan)?)
            .with_context(|| format!("Failed to write plan: {}", plan_path.display()))?;

        Ok(plan_path)
    }

    /// Build the module graph by traversing from entrypoints
    async fn build_module_graph(&self) -> Result<()> {
        for (name, path) in self.config.all_entrypoints() {
            debug!("Processing entrypoint: {} -> {}", name, path.display());
            self.process_module(&path, Some(&name)).await?;
        }

        let graph = self.graph.read();
        info!("Module graph has {} module(s)", graph.len());
        Ok(())
    }

    /// Process a single module and its dependencies
    ///
    /// Uses Box::pin for async recursion to avoid infinite type size issues
    async fn process_module(&self, path: &Path, entry: Option<&str>) -> Result<ModuleId> {
        let canonical_path = fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve module path: {}", path.display()))?;
        let id = path_to_module_id(&canonical_path);

        // Check if already processed
        {
            let mut graph = self.graph.write();
            if let Some(index) = graph.get_module_id(&id) {
                if let Some(name) = entry {
                    graph.mark_entry(index, name);
                }
                return Ok(index);
            }
        }

        let category = ModuleCategory::from_id(&id);
        let bytes = fs::read(&canonical_path)
            .with_context(|| format!("Failed to read module: {}", canonical_path.display()))?;

        let dependencies = if category == ModuleCategory::Script {
            let source = String::from_utf8_lossy(&bytes);
            self.resolver.extract_dependencies(&source, category)
        } else {
            Vec::new()
        };

        let module = Module {
            id,
            path: Some(canonical_path.clone()),
            category,
            entry: entry.map(str::to_string),
            size: bytes.len(),
        };

        let module_id = {
            let mut graph = self.graph.write();
            graph.add_module(module)
        };

        for dep in dependencies {
            let kind = if dep.dynamic {
                EdgeKind::Dynamic
            } else {
                EdgeKind::Static
            };

            let dep_id = match self.resolver.resolve(&dep.specifier, &canonical_path) {
                Some(Resolved::File(resolved_path)) => {
                    Box::pin(self.process_module(&resolved_path, None)).await?
                }
                Some(Resolved::Virtual(virtual_id)) => {
                    let mut graph = self.graph.write();
                    graph.add_module(Module {
                        id: virtual_id,
                        path: None,
                        category: ModuleCategory::Unknown,
                        entry: None,
                        size: 0,
                    })
                }
                None => {
                    debug!(
                        "Unresolved import '{}' in {}",
                        dep.specifier,
                        canonical_path.display()
                    );
                    continue;
                }
            };

            let mut graph = self.graph.write();
            graph.add_dependency(module_id, dep_id, kind);
        }

        Ok(module_id)
    }

    /// Number of assignment workers to use
    fn worker_count(&self) -> usize {
        self.options
            .jobs
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
            .max(1)
    }

    /// Run the policy over every module in parallel
    fn assign_chunks(&self) -> HashMap<ModuleId, Decision> {
        let graph = self.graph.read();
        let graph: &ModuleGraph = &graph;
        let ids = graph.all_module_ids();

        let workers = self.worker_count().min(ids.len()).max(1);
        let per_worker = ids.len().div_ceil(workers).max(1);
        debug!("Assigning {} module(s) on {} worker(s)", ids.len(), workers);

        let decisions: DashMap<ModuleId, Decision> = DashMap::with_capacity(ids.len());
        let policy = &self.policy;

        std::thread::scope(|s| {
            for slice in ids.chunks(per_worker) {
                let decisions = &decisions;
                s.spawn(move || {
                    for &index in slice {
                        if let Some(module) = graph.get_module(index) {
                            decisions.insert(index, policy.decide(&module.id, graph));
                        }
                    }
                });
            }
        });

        decisions.into_iter().collect()
    }

    /// Group modules into chunks, policy decisions first
    fn group_chunks(&self, decisions: &HashMap<ModuleId, Decision>) -> Vec<Chunk> {
        let graph = self.graph.read();
        let mut chunks: BTreeMap<String, Chunk> = BTreeMap::new();
        let mut placed: HashSet<ModuleId> = HashSet::new();

        // Policy decisions
        for index in graph.all_module_ids() {
            if let Some(Decision::Chunk { name, reason }) = decisions.get(&index) {
                let kind = ChunkKind::from_reason(reason);
                place(&mut chunks, &mut placed, name, kind, index);
            }
        }

        // Entry modules stay in their own chunk
        let entries = graph.get_entry_modules();
        for (name, index) in &entries {
            place(&mut chunks, &mut placed, name, ChunkKind::Entry, *index);
        }

        // Default placement by static reachability from the entries
        let mut owners: BTreeMap<ModuleId, Vec<&str>> = BTreeMap::new();
        for (name, index) in &entries {
            for reached in graph.get_static_reachable(*index) {
                owners.entry(reached).or_default().push(name);
            }
        }
        for (index, names) in owners {
            if let [name] = names.as_slice() {
                place(&mut chunks, &mut placed, name, ChunkKind::Entry, index);
            } else {
                place(&mut chunks, &mut placed, SHARED_CHUNK, ChunkKind::Shared, index);
            }
        }

        // Whatever is left is only reachable through dynamic imports
        for target in graph.get_dynamic_targets() {
            let Some(module) = graph.get_module(target) else {
                continue;
            };
            let name = async_chunk_name(module);
            for reached in graph.get_static_reachable(target) {
                place(&mut chunks, &mut placed, &name, ChunkKind::Async, reached);
            }
        }

        for index in graph.all_module_ids() {
            if place(&mut chunks, &mut placed, SHARED_CHUNK, ChunkKind::Shared, index) {
                warn!("Module {} was not reached from any entry", index);
            }
        }

        chunks.into_values().filter(|c| !c.is_empty()).collect()
    }

    /// Id as written to the plan: root-relative for project files
    fn display_id(&self, module: &Module) -> String {
        module
            .path
            .as_deref()
            .filter(|path| path.starts_with(&self.config.root))
            .and_then(|path| relative_path(&self.config.root, path))
            .unwrap_or_else(|| module.id.clone())
    }

    /// Convert grouped chunks into the serializable plan
    fn to_plan(&self, chunks: &[Chunk]) -> ChunkPlan {
        let graph = self.graph.read();
        let mut planned = Vec::with_capacity(chunks.len());
        let mut modules = BTreeMap::new();

        for chunk in chunks {
            let mut ids: Vec<String> = Vec::with_capacity(chunk.len());
            let mut size = 0;

            for &index in &chunk.module_ids {
                if let Some(module) = graph.get_module(index) {
                    let id = self.display_id(module);
                    modules.insert(id.clone(), chunk.name.clone());
                    size += module.size;
                    ids.push(id);
                }
            }
            ids.sort();

            if size > self.config.chunks.size_warning {
                warn!(
                    "Chunk '{}' is {} bytes, above the {} byte warning limit",
                    chunk.name, size, self.config.chunks.size_warning
                );
            }

            planned.push(PlannedChunk {
                name: chunk.name.clone(),
                kind: chunk.kind,
                size,
                fingerprint: fingerprint(ids.iter().map(String::as_str)),
                modules: ids,
            });
        }

        ChunkPlan {
            project: self.config.project.name.clone(),
            version: self.config.project.version.clone(),
            flags: self.config.features.clone(),
            chunks: planned,
            modules,
        }
    }
}

/// Put a module into a chunk unless it already has one
fn place(
    chunks: &mut BTreeMap<String, Chunk>,
    placed: &mut HashSet<ModuleId>,
    name: &str,
    kind: ChunkKind,
    index: ModuleId,
) -> bool {
    if !placed.insert(index) {
        return false;
    }
    chunks
        .entry(name.to_string())
        .or_insert_with(|| Chunk::new(name.to_string(), kind))
        .module_ids
        .push(index);
    true
}

/// `async-<file stem>` for the target of a dynamic import
fn async_chunk_name(module: &Module) -> String {
    let stem = Path::new(&module.id)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| module.id.clone());
    sanitize_chunk_name(&format!("async-{}", stem.trim_start_matches('\0')))
}
