//! Name-keyed registry of detector factories

use framevoice_core::{Error, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::{ActivityDetector, EnergyVad, EnergyVadConfig};

/// Builds a detector from a provider-specific JSON config blob
pub type VadFactory =
    Arc<dyn Fn(&serde_json::Value) -> Result<Arc<dyn ActivityDetector>> + Send + Sync>;

static REGISTRY: Lazy<RwLock<HashMap<String, VadFactory>>> = Lazy::new(|| {
    let mut providers: HashMap<String, VadFactory> = HashMap::new();
    providers.insert("energy".to_string(), Arc::new(energy_factory));
    RwLock::new(providers)
});

fn energy_factory(config: &serde_json::Value) -> Result<Arc<dyn ActivityDetector>> {
    let config: EnergyVadConfig = if config.is_null() {
        EnergyVadConfig::default()
    } else {
        serde_json::from_value(config.clone())?
    };
    Ok(Arc::new(EnergyVad::new(config)))
}

/// Register a detector provider
///
/// # Panics
///
/// On an empty name or a name that is already registered. Registration
/// happens at startup; both cases are programming errors.
pub fn register_vad<F>(name: &str, factory: F)
where
    F: Fn(&serde_json::Value) -> Result<Arc<dyn ActivityDetector>> + Send + Sync + 'static,
{
    assert!(!name.is_empty(), "voice: register_vad called with empty name");

    let mut registry = REGISTRY.write();
    assert!(
        !registry.contains_key(name),
        "voice: register_vad called twice for {name:?}"
    );
    registry.insert(name.to_string(), Arc::new(factory));
    tracing::debug!(provider = name, "Registered VAD provider");
}

/// Build a detector by provider name
pub fn new_vad(name: &str, config: &serde_json::Value) -> Result<Arc<dyn ActivityDetector>> {
    // Clone the factory out so it never runs under the registry lock
    let factory = REGISTRY.read().get(name).cloned();
    match factory {
        Some(factory) => factory(config),
        None => Err(Error::UnknownProvider {
            kind: "vad",
            name: name.to_string(),
            registered: list_vad(),
        }),
    }
}

/// Sorted names of all registered providers
pub fn list_vad() -> Vec<String> {
    let mut names: Vec<String> = REGISTRY.read().keys().cloned().collect();
    names.sort();
    names
}
