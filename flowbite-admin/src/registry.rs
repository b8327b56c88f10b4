//! Model registry for admin

use crate::model::ModelDefinition;
use std::collections::{BTreeMap, HashMap};

/// Registry of admin models, keyed by `app_label.model_name`
#[derive(Debug, Default)]
pub struct ModelRegistry {
    /// Registered models by label
    models: HashMap<String, ModelDefinition>,
    /// Registration order
    order: Vec<String>,
}

impl ModelRegistry {
    /// Create a new registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model; registering the same label again replaces it.
    pub fn register(&mut self, model: ModelDefinition) {
        let label = model.label();
        if !self.order.contains(&label) {
            self.order.push(label.clone());
        }
        self.models.insert(label, model);
    }

    /// Get a model
    pub fn get(&self, app_label: &str, model_name: &str) -> Option<&ModelDefinition> {
        self.models.get(&format!("{}.{}", app_label, model_name))
    }

    /// Get a model by `app_label.model_name`
    pub fn get_by_label(&self, label: &str) -> Option<&ModelDefinition> {
        self.models.get(label)
    }

    /// All models in registration order
    pub fn all(&self) -> Vec<&ModelDefinition> {
        self.order
            .iter()
            .filter_map(|label| self.models.get(label))
            .collect()
    }

    /// Models grouped by app label (apps sorted by label)
    pub fn by_app(&self) -> BTreeMap<&str, Vec<&ModelDefinition>> {
        let mut apps: BTreeMap<&str, Vec<&ModelDefinition>> = BTreeMap::new();
        for model in self.all() {
            apps.entry(model.app_label.as_str()).or_default().push(model);
        }
        apps
    }

    /// Check if a model exists
    pub fn contains(&self, app_label: &str, model_name: &str) -> bool {
        self.get(app_label, model_name).is_some()
    }

    /// Get model count
    pub fn count(&self) -> usize {
        self.models.len()
    }
}
