//! The capability set every simulation variant provides, and the registry
//! that resolves a model name to its factory.

use std::collections::BTreeMap;

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

use super::field::Field;
use super::physics_config::ModelParameters;
use super::vpm::{VirtualPipeModel, VpmOptions};
use crate::error::SimError;
use crate::grid::Grid;
use crate::terrain::TerrainField;

/// A shallow-water model stepped on a regular grid.
///
/// Construction is the factory's job; once built, a model only advances and
/// reports its state.
pub trait SimulationModel: Send + Sync {
    fn grid(&self) -> &Grid;

    /// Advance the fields by one time step.
    fn step_once(&mut self);

    /// Write `terrain + water` into the displaced vertex buffer.
    fn project_height(&mut self);

    /// Displaced vertex positions as of the last `project_height`.
    fn vertices(&self) -> &[[f32; 3]];

    fn snapshot_height(&self) -> Field<f32>;

    fn snapshot_velocity(&self) -> Field<[f32; 2]>;
}

/// Everything a factory needs to build a model.
pub struct ModelInit {
    pub params: ModelParameters,
    pub terrain: TerrainField,
    pub width: f32,
    pub rainfall_rate: Option<f32>,
}

pub type ModelFactory = fn(ModelInit) -> Result<Box<dyn SimulationModel>, SimError>;

/// A named parameter with its default, as shown by a parameter editor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    pub default_value: f32,
}

/// An input file a model expects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub kind: String,
}

/// Static description of a model's inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub model_name: String,
    pub params: Vec<ParamDescriptor>,
    pub files: Vec<FileDescriptor>,
}

impl ModelManifest {
    pub fn default_parameters(&self) -> Vec<f32> {
        self.params.iter().map(|p| p.default_value).collect()
    }
}

struct RegistryEntry {
    manifest: ModelManifest,
    factory: ModelFactory,
}

/// Maps model names to factories.
#[derive(Resource, Default)]
pub struct ModelRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl ModelRegistry {
    /// Registry with every model shipped in this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::default();
        registry.register(VirtualPipeModel::NAME, VirtualPipeModel::manifest(), build_vpm);
        registry
    }

    pub fn register(&mut self, name: &str, manifest: ModelManifest, factory: ModelFactory) {
        self.entries
            .insert(name.to_string(), RegistryEntry { manifest, factory });
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn manifest(&self, name: &str) -> Option<&ModelManifest> {
        self.entries.get(name).map(|entry| &entry.manifest)
    }

    /// Resolve `name` and build the model. Unknown names fail before
    /// anything is allocated.
    pub fn create(&self, name: &str, init: ModelInit) -> Result<Box<dyn SimulationModel>, SimError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| SimError::UnknownModel(name.to_string()))?;
        (entry.factory)(init)
    }
}

fn build_vpm(init: ModelInit) -> Result<Box<dyn SimulationModel>, SimError> {
    let mut options = VpmOptions::default();
    if let Some(rate) = init.rainfall_rate {
        options.rainfall_rate = rate;
    }
    let model = VirtualPipeModel::with_options(init.params, init.terrain, init.width, options)?;
    Ok(Box::new(model))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() -> ModelInit {
        ModelInit {
            params: ModelParameters::default(),
            terrain: TerrainField::flat(3),
            width: 3.0,
            rainfall_rate: None,
        }
    }

    #[test]
    fn builtin_registry_knows_vpm() {
        let registry = ModelRegistry::with_builtin();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["VPM"]);
        let model = registry.create("VPM", init()).unwrap();
        assert_eq!(model.grid().vertex_count(), 16);
    }

    #[test]
    fn unknown_model_is_a_map_miss() {
        let registry = ModelRegistry::with_builtin();
        let err = registry.create("SWE", init()).err().unwrap();
        assert!(matches!(err, SimError::UnknownModel(ref name) if name == "SWE"));
        assert_eq!(err.to_string(), "model SWE does not exist");
    }

    #[test]
    fn manifest_defaults_are_ordered() {
        let registry = ModelRegistry::with_builtin();
        let manifest = registry.manifest("VPM").unwrap();
        let defaults = manifest.default_parameters();
        assert_eq!(defaults.len(), 4);
        assert!(ModelParameters::from_list(&defaults).is_ok());
    }
}
