//! Wizards shipped with the crate: property, land and blog listings

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use super::{WizardConfig, WizardConfigError};

/// Compiled built-in wizards, keyed by wizard type
static BUILTIN_CONFIGS: Lazy<HashMap<&'static str, Arc<WizardConfig>>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for wizard in BuiltinWizard::all() {
        match wizard.load() {
            Ok(config) => {
                map.insert(wizard.key(), Arc::new(config));
            }
            Err(e) => {
                tracing::error!(wizard_type = wizard.key(), error = %e, "Invalid built-in wizard");
            }
        }
    }
    map
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinWizard {
    Property,
    Land,
    Blog,
}

impl BuiltinWizard {
    pub fn all() -> &'static [BuiltinWizard] {
        &[Self::Property, Self::Land, Self::Blog]
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::Land => "land",
            Self::Blog => "blog",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_lowercase().as_str() {
            "property" => Some(Self::Property),
            "land" => Some(Self::Land),
            "blog" => Some(Self::Blog),
            _ => None,
        }
    }

    /// Raw JSON definition
    pub fn definition(self) -> &'static str {
        match self {
            Self::Property => include_str!("builtin/property.json"),
            Self::Land => include_str!("builtin/land.json"),
            Self::Blog => include_str!("builtin/blog.json"),
        }
    }

    fn load(self) -> Result<WizardConfig, WizardConfigError> {
        WizardConfig::from_json(self.definition())
    }

    /// Shared compiled config
    pub fn config(self) -> Option<Arc<WizardConfig>> {
        BUILTIN_CONFIGS.get(self.key()).cloned()
    }
}

/// Look up a built-in wizard by its type key
pub fn builtin_config(wizard_type: &str) -> Option<Arc<WizardConfig>> {
    BuiltinWizard::from_key(wizard_type).and_then(BuiltinWizard::config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtin_wizards_compile() {
        for wizard in BuiltinWizard::all() {
            let config = wizard.load().unwrap();
            assert_eq!(config.wizard_type(), wizard.key());
            assert!(wizard.config().is_some());
        }
    }

    #[test]
    fn test_from_key() {
        assert_eq!(BuiltinWizard::from_key("property"), Some(BuiltinWizard::Property));
        assert_eq!(BuiltinWizard::from_key("LAND"), Some(BuiltinWizard::Land));
        assert_eq!(BuiltinWizard::from_key("villa"), None);
        assert!(builtin_config("blog").is_some());
        assert!(builtin_config("unknown").is_none());
    }

    #[test]
    fn test_every_builtin_ends_with_preview() {
        for wizard in BuiltinWizard::all() {
            let config = wizard.config().unwrap();
            assert_eq!(config.terminal_step().id, "preview");
        }
    }
}
