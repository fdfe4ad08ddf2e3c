//! Provider registry, health loop, and preference-ordered selection.

mod registry;
mod selection;

pub use registry::Orchestrator;
pub use selection::preference_chain;
