//! # Optional Capabilities
//!
//! The contract between generic code and stores that may or may not offer
//! hierarchy, tagging, or persistence support.
//!
//! ## Purpose
//! Extensions and tools written against [`CapabilityProvider`] run on any
//! store. Every accessor defaults to [`NotSupportedError`], so a store
//! advertises a capability by overriding the accessor, and callers probe at
//! runtime instead of failing to compile. [`crate::World`] overrides all of
//! them.
//!
//! ## Persistence model
//! A snapshot is a list of `(stable name, bytes)` records plus the optional
//! entity name. Stable names and codec pairs come from component
//! registration; the runtime defines no wire format of its own, it stores
//! whatever the registered encode delegate produced.

use serde::{Deserialize, Serialize};

use crate::engine::entity::Entity;
use crate::engine::error::{EcsResult, NotSupportedError};

/// Parent/child links between live entities.
///
/// Links are non-owning back-references by slot index. Destroying an entity
/// detaches it from its parent and orphans its children; nothing cascades.
pub trait HierarchyOps {
    /// Links `child` under `parent`, replacing any existing parent link.
    /// Rejects self-parenting and anything that would close a cycle.
    fn set_parent(&mut self, child: Entity, parent: Entity) -> EcsResult<()>;

    /// Current parent of `child`, if linked.
    fn parent(&self, child: Entity) -> Option<Entity>;

    /// Children linked under `parent`, in link order.
    fn children(&self, parent: Entity) -> &[Entity];

    /// Removes the parent link. `false` if there was none.
    fn clear_parent(&mut self, child: Entity) -> bool;
}

/// Optional per-entity names.
pub trait TaggingOps {
    /// Names a live entity, replacing any existing name.
    fn set_name(&mut self, entity: Entity, name: &str) -> EcsResult<()>;

    /// Name of the entity, if set.
    fn name(&self, entity: Entity) -> Option<&str>;

    /// Some live entity carrying `name`. Among duplicates the choice is
    /// unspecified.
    fn find_by_name(&self, name: &str) -> Option<Entity>;

    /// Drops the entity's name. `false` if it had none.
    fn clear_name(&mut self, entity: Entity) -> bool;
}

/// One serialized component: the registration's stable name plus the bytes
/// its encode delegate produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// Stable component name from registration.
    pub name: String,
    /// Encoded value.
    pub bytes: Vec<u8>,
}

/// A saved entity: its name and every component, encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity name at save time, if any.
    pub name: Option<String>,
    /// Component records in ascending component-id order at save time.
    pub components: Vec<ComponentRecord>,
}

/// Whole-entity save and restore over registered codecs.
pub trait PersistenceOps {
    /// Encodes every component of a live entity. Fails if any component
    /// was registered without a codec; a snapshot is all-or-nothing.
    fn save_entity(&self, entity: Entity) -> EcsResult<EntitySnapshot>;

    /// Spawns a new entity from a snapshot. Stable names resolve against
    /// the current registry, so the component set must be registered (ids
    /// may differ from the saving world). Creation events fire as for any
    /// spawn.
    fn load_entity(&mut self, snapshot: &EntitySnapshot) -> EcsResult<Entity>;
}

impl std::fmt::Debug for dyn PersistenceOps + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn PersistenceOps")
    }
}

/// Capability discovery surface.
///
/// Every accessor defaults to `Err(NotSupported)`; a store overrides the
/// ones it backs.
pub trait CapabilityProvider {
    /// Hierarchy reads, if supported.
    fn hierarchy(&self) -> Result<&dyn HierarchyOps, NotSupportedError> {
        Err(NotSupportedError { name: "hierarchy" })
    }

    /// Hierarchy mutation, if supported.
    fn hierarchy_mut(&mut self) -> Result<&mut dyn HierarchyOps, NotSupportedError> {
        Err(NotSupportedError { name: "hierarchy" })
    }

    /// Tagging reads, if supported.
    fn tagging(&self) -> Result<&dyn TaggingOps, NotSupportedError> {
        Err(NotSupportedError { name: "tagging" })
    }

    /// Tagging mutation, if supported.
    fn tagging_mut(&mut self) -> Result<&mut dyn TaggingOps, NotSupportedError> {
        Err(NotSupportedError { name: "tagging" })
    }

    /// Snapshot reads, if supported.
    fn persistence(&self) -> Result<&dyn PersistenceOps, NotSupportedError> {
        Err(NotSupportedError { name: "persistence" })
    }

    /// Snapshot restore, if supported.
    fn persistence_mut(&mut self) -> Result<&mut dyn PersistenceOps, NotSupportedError> {
        Err(NotSupportedError { name: "persistence" })
    }
}
