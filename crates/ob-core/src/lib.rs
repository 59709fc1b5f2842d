pub mod checklist;
pub mod commit;
pub mod config;
pub mod derive;
pub mod error;
pub mod initiatives;
pub mod job;
pub mod rollup;
pub mod session;
pub mod store;
pub mod tasks;
pub mod tracker;
pub mod tree;
pub mod validation;

pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::commit::{SavePlan, SaveReport};
pub use crate::error::BacklogError;
pub use crate::session::{SessionSnapshot, SuggestionSession};
pub use crate::store::Store;
