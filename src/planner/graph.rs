//! Module graph data structures

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use crate::policy::{GraphMetadata, ModuleCategory};

/// Unique identifier for a module
pub type ModuleId = usize;

/// A module in the dependency graph
#[derive(Debug, Clone)]
pub struct Module {
    /// Resolved module id (normalized absolute path or virtual id)
    pub id: String,

    /// File on disk, `None` for virtual modules
    pub path: Option<PathBuf>,

    /// File category
    pub category: ModuleCategory,

    /// Name of the entrypoint this module is, if any
    pub entry: Option<String>,

    /// Size of the file in bytes
    pub size: usize,
}

/// Kind of import edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Static,
    Dynamic,
}

/// The module dependency graph
#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// All modules indexed by their ID
    modules: HashMap<ModuleId, Module>,

    /// Map from module id string to module ID
    id_to_index: HashMap<String, ModuleId>,

    /// Dependency edges: module ID -> set of (dependency ID, kind)
    edges: HashMap<ModuleId, HashSet<(ModuleId, EdgeKind)>>,

    /// Next available module ID
    next_id: ModuleId,
}

impl ModuleGraph {
    /// Create a new empty module graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module to the graph, returning the existing ID for known modules
    pub fn add_module(&mut self, module: Module) -> ModuleId {
        if let Some(&id) = self.id_to_index.get(&module.id) {
            return id;
        }

        let id = self.next_id;
        self.next_id += 1;

        self.id_to_index.insert(module.id.clone(), id);
        self.modules.insert(id, module);
        self.edges.insert(id, HashSet::new());

        id
    }

    /// Record that a known module is an entrypoint; the first name wins
    pub fn mark_entry(&mut self, id: ModuleId, name: &str) {
        if let Some(module) = self.modules.get_mut(&id) {
            if module.entry.is_none() {
                module.entry = Some(name.to_string());
            }
        }
    }

    /// Add a dependency edge between modules
    pub fn add_dependency(&mut self, from: ModuleId, to: ModuleId, kind: EdgeKind) {
        if let Some(deps) = self.edges.get_mut(&from) {
            deps.insert((to, kind));
        }
    }

    /// Get module ID from its id string
    pub fn get_module_id(&self, id: &str) -> Option<ModuleId> {
        self.id_to_index.get(id).copied()
    }

    /// Get a module by ID
    pub fn get_module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(&id)
    }

    /// Get all module IDs, in insertion order
    pub fn all_module_ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.modules.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Modules reachable from `start` through static imports (BFS)
    pub fn get_static_reachable(&self, start: ModuleId) -> Vec<ModuleId> {
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::new();

        queue.push_back(start);
        visited.insert(start);

        while let Some(id) = queue.pop_front() {
            result.push(id);

            if let Some(deps) = self.edges.get(&id) {
                for &(dep_id, kind) in deps {
                    if kind == EdgeKind::Static && visited.insert(dep_id) {
                        queue.push_back(dep_id);
                    }
                }
            }
        }

        result
    }

    /// Modules imported through at least one `import()` expression
    pub fn get_dynamic_targets(&self) -> Vec<ModuleId> {
        let mut targets: Vec<ModuleId> = self
            .edges
            .values()
            .flatten()
            .filter(|(_, kind)| *kind == EdgeKind::Dynamic)
            .map(|(id, _)| *id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        targets.sort_unstable();
        targets
    }

    /// Get entry point modules with their entrypoint names, sorted by name
    pub fn get_entry_modules(&self) -> Vec<(String, ModuleId)> {
        let mut entries: Vec<(String, ModuleId)> = self
            .modules
            .iter()
            .filter_map(|(&id, m)| m.entry.clone().map(|name| (name, id)))
            .collect();
        entries.sort();
        entries
    }

    /// Total number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl GraphMetadata for ModuleGraph {
    fn is_entry(&self, id: &str) -> bool {
        self.get_module_id(id)
            .and_then(|index| self.get_module(index))
            .is_some_and(|m| m.entry.is_some())
    }
}
