//! Explicit component registry.
//!
//! Native adapters register a factory per component key at start-up. Lookup
//! matches manufacturer, type and subtype; the display name in a descriptor
//! path is informational only.

use crate::abi::NativeUnit;
use crate::error::{HostError, Result};
use fxhost_core::{component_types, format_version, ComponentKey, EffectDescriptor};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Creates native unit instances for one component.
pub trait ComponentFactory: Send + Sync {
    fn instantiate(&self) -> std::result::Result<Box<dyn NativeUnit>, String>;
}

impl<F> ComponentFactory for F
where
    F: Fn() -> std::result::Result<Box<dyn NativeUnit>, String> + Send + Sync,
{
    fn instantiate(&self) -> std::result::Result<Box<dyn NativeUnit>, String> {
        self()
    }
}

/// A registered component, ready to instantiate.
#[derive(Clone)]
pub struct ResolvedComponent {
    pub descriptor: EffectDescriptor,
    pub version: u32,
    factory: Arc<dyn ComponentFactory>,
}

impl ResolvedComponent {
    pub fn instantiate(&self) -> Result<Box<dyn NativeUnit>> {
        self.factory
            .instantiate()
            .map_err(|reason| HostError::InstantiationFailed {
                path: self.descriptor.path(),
                reason,
            })
    }

    pub fn version_string(&self) -> String {
        format_version(self.version)
    }
}

impl std::fmt::Debug for ResolvedComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedComponent")
            .field("descriptor", &self.descriptor)
            .field("version", &self.version_string())
            .finish_non_exhaustive()
    }
}

/// Registry of installable components.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    components: Arc<RwLock<BTreeMap<ComponentKey, ResolvedComponent>>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component, replacing any previous one with the same key.
    pub fn register<F>(&self, descriptor: EffectDescriptor, version: u32, factory: F)
    where
        F: Fn() -> std::result::Result<Box<dyn NativeUnit>, String> + Send + Sync + 'static,
    {
        self.register_factory(descriptor, version, Arc::new(factory));
    }

    pub fn register_factory(
        &self,
        descriptor: EffectDescriptor,
        version: u32,
        factory: Arc<dyn ComponentFactory>,
    ) {
        tracing::info!(
            "Registered component {} (version {})",
            descriptor,
            format_version(version)
        );
        let component = ResolvedComponent {
            descriptor: descriptor.clone(),
            version,
            factory,
        };
        self.components.write().insert(descriptor.key(), component);
    }

    pub fn unregister(&self, descriptor: &EffectDescriptor) -> bool {
        self.components.write().remove(&descriptor.key()).is_some()
    }

    pub fn resolve(&self, path: &str) -> Result<ResolvedComponent> {
        let descriptor = EffectDescriptor::parse(path)
            .map_err(|_| HostError::ComponentNotFound(path.to_string()))?;
        self.components
            .read()
            .get(&descriptor.key())
            .cloned()
            .ok_or_else(|| HostError::ComponentNotFound(path.to_string()))
    }

    /// Whether `path` names a usable component. A slow check also creates
    /// and drops an instance.
    pub fn is_valid(&self, path: &str, fast: bool) -> bool {
        match self.resolve(path) {
            Ok(_) if fast => true,
            Ok(component) => component.instantiate().is_ok(),
            Err(_) => false,
        }
    }

    /// Paths of every registered component of a hosted type, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .components
            .read()
            .values()
            .filter(|c| component_types::HOSTED.contains(&c.descriptor.component_type))
            .map(|c| c.descriptor.path())
            .collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.components.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.read().is_empty()
    }

    pub fn clear(&self) {
        self.components.write().clear();
    }
}
