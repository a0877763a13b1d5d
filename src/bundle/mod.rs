//! Bundle entry indexing and resolution

pub mod entry_index;
pub mod resolver;

pub use entry_index::{Candidates, EntryIndexMap, EntryRecord};
pub use resolver::{EntryResolver, ReferenceForm, ResolutionError, ResolutionPolicy};
