//! Chunker library
//!
//! Manual chunk assignment for frontend builds: a pure, deterministic policy
//! mapping resolved module ids to output chunks, plus the graph planner and
//! CLI built around it.

pub mod cli;
pub mod config;
pub mod planner;
pub mod policy;
pub mod resolver;
pub mod utils;

pub use cli::Cli;
pub use config::Config;
pub use planner::Planner;
pub use policy::ChunkPolicy;
