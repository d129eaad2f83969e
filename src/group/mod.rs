//! Stack group registry.
//!
//! A group owns the ordered stack definitions, the shared template storage
//! location and default arguments, and the aggregate listings across them.

mod listing;
mod stack_group;

pub use listing::{
    ExportRow, RECENT_EVENT_COUNT, StackDescription, StackResources, StackRow, TemplateCheck,
};
pub use stack_group::{StackDefinition, StackGroup, TemplateStorage};

pub(crate) use stack_group::join_key;
