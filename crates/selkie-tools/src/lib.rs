//! Selkie Tools
//!
//! Callable capabilities exposed to the LLM. A tool declares metadata (name,
//! description, typed parameters, whether it needs user confirmation before
//! running) and an async `execute`. The [`ToolRegistry`] validates arguments,
//! enforces per-tool timeouts, tracks statistics and renders JSON schemas
//! for the model.

pub mod builtin;
pub mod error;
pub mod registry;
pub mod traits;

pub use error::{ToolError, ToolResult};
pub use registry::{RegistryStats, ToolRegistry};
pub use traits::{ParamType, Tool, ToolMetadata, ToolOutput, ToolParam};
