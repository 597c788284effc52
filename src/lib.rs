//! Wizard drafts - validation, draft persistence and step navigation for
//! multi-step creation flows.
//!
//! The pieces compose bottom-up: a [`schema::Schema`] checks payloads,
//! [`validation::WizardValidator`] turns violations into errors and
//! warnings, [`drafts::DraftStore`] keeps partial payloads in a
//! [`storage::StorageBackend`], [`autosave::AutoSavePipeline`] debounces
//! writes, and [`navigation::StepNavigator`] gates movement between steps.
//! [`session::WizardSession`] ties them together for one user's run.

pub mod autosave;
pub mod config;
pub mod drafts;
pub mod logging;
pub mod navigation;
pub mod payload;
pub mod schema;
pub mod session;
pub mod storage;
pub mod validation;
pub mod wizard;
