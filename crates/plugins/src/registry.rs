//! In-memory name → implementation map.
//!
//! A name maps to at most one implementation. Registering the identical
//! implementation again is a no-op. Registering a different one under a
//! taken name is an error. Implementation identity is the factory's
//! concrete type plus its [`PluginFactory::discriminator`].
//!
//! The map sits behind a `std::sync::RwLock` that is never held while a
//! plugin is constructed or run, so the registry can be shared freely
//! through an `Arc`.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use warden_core::naming::is_safe_name;

use crate::error::PluginError;
use crate::plugin::{Plugin, PluginFactory, PluginMetadata};

/// Result of a successful [`PluginRegistry::register`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    /// The identical implementation was already registered under the name.
    AlreadyRegistered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    factory_type: TypeId,
    discriminator: String,
}

struct Registration {
    metadata: PluginMetadata,
    identity: Identity,
    factory: Arc<dyn PluginFactory>,
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, Registration>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation under the name its metadata declares.
    pub fn register<F: PluginFactory>(&self, factory: F) -> Result<RegisterOutcome, PluginError> {
        let metadata = factory.metadata();
        if !is_safe_name(&metadata.name) {
            return Err(PluginError::PluginRegistrationError(format!(
                "'{}' is not a valid plugin name",
                metadata.name
            )));
        }

        let identity = Identity {
            factory_type: TypeId::of::<F>(),
            discriminator: factory.discriminator(),
        };

        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = plugins.get(&metadata.name) {
            if existing.identity == identity {
                tracing::debug!(plugin = %metadata.name, "Plugin already registered");
                return Ok(RegisterOutcome::AlreadyRegistered);
            }
            return Err(PluginError::PluginRegistrationError(format!(
                "name '{}' is already registered by a different implementation",
                metadata.name
            )));
        }

        tracing::info!(
            plugin = %metadata.name,
            kind = ?metadata.kind,
            version = %metadata.version,
            "Plugin registered",
        );
        plugins.insert(
            metadata.name.clone(),
            Registration {
                metadata,
                identity,
                factory: Arc::new(factory),
            },
        );
        Ok(RegisterOutcome::Registered)
    }

    /// Remove a plugin. The name may be registered again afterwards.
    pub fn unregister(&self, name: &str) -> Result<PluginMetadata, PluginError> {
        self.plugins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .map(|registration| {
                tracing::info!(plugin = %name, "Plugin unregistered");
                registration.metadata
            })
            .ok_or_else(|| PluginError::PluginNotFound(name.to_string()))
    }

    /// Instantiate a registered plugin with construction arguments.
    pub fn create(&self, name: &str, args: Value) -> Result<Box<dyn Plugin>, PluginError> {
        let factory = self
            .plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|registration| Arc::clone(&registration.factory))
            .ok_or_else(|| PluginError::PluginNotFound(name.to_string()))?;

        factory.create(args)
    }

    pub fn get_info(&self, name: &str) -> Result<PluginMetadata, PluginError> {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|registration| registration.metadata.clone())
            .ok_or_else(|| PluginError::PluginNotFound(name.to_string()))
    }

    /// Metadata of every registered plugin, sorted by name.
    pub fn list_all(&self) -> Vec<PluginMetadata> {
        let mut all: Vec<PluginMetadata> = self
            .plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|registration| registration.metadata.clone())
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
