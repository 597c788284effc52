//! Static wizard definitions: steps, per-step schemas and settings

pub mod builtin;
mod definition;

pub use builtin::{builtin_config, BuiltinWizard};
pub use definition::{
    NavigationSettings, PersistenceSettings, StepDefinition, WizardConfig, WizardConfigBuilder,
    WizardConfigError,
};
