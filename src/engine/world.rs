//! # World
//!
//! The store that owns everything: the component registry, the entity
//! allocator, the archetype tables, the event dispatcher, the extension
//! map, and the capability state (hierarchy links, names).
//!
//! ## Purpose
//! Every structural operation funnels through here so the cross-cutting
//! order is enforced in exactly one place: validate, mutate storage, patch
//! locations, bump the structure version, then dispatch events.
//!
//! ## Design
//! - No ambient instance. A `World` is a plain value; callers pass it (or a
//!   read-only [`WorldView`]) explicitly. Two worlds never share state.
//! - Archetypes are created lazily, keyed by raw signature words, and table
//!   0 is always the zero-component table, so a freshly allocated entity
//!   location is valid before its first row lands.
//! - Migrations walk the add/remove edge cache before falling back to the
//!   signature map, and install the edge in both directions on a miss.
//!
//! ## Invariants
//! - `structure_version` increases on create, destroy, add, and remove.
//!   [`World::set_component`] replaces in place and does not bump it, so
//!   live cursors survive value writes but never structural changes.
//! - Validation completes before any storage is touched; a rejected
//!   mutation leaves the world byte-identical.
//! - Events fire after storage is committed. A failing handler surfaces
//!   from the mutating call, but the mutation stands.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use crate::engine::archetype::Archetype;
use crate::engine::capability::{
    CapabilityProvider, ComponentRecord, EntitySnapshot, HierarchyOps, PersistenceOps, TaggingOps,
};
use crate::engine::component::{ComponentDesc, ComponentRegistry, ComponentSpec};
use crate::engine::entity::{Entities, Entity, EntityLocation};
use crate::engine::error::{
    AlreadyPresentError, CodecError, EcsResult, HierarchyError, NotPresentError, RegistryError,
    StorageError, ValidationError,
};
use crate::engine::events::{EventDispatcher, EventSubscription, HandlerFlow, HandlerResult};
use crate::engine::query::Query;
use crate::engine::types::{
    ArchetypeID, ComponentBundle, ComponentID, EntityCount, IndexID, QuerySignature, Signature,
    SIGNATURE_SIZE,
};

/// `TypeId`-keyed singleton map for world-scoped services.
///
/// This is the backing store for plugin extensions: one value per type,
/// settable and retrievable without the world knowing the type up front.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any>>,
}

impl Extensions {
    /// Stores `value`, returning the displaced value of the same type.
    pub fn set<T: 'static>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    /// Shared reference to the stored `T`, if any.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.map.get(&TypeId::of::<T>())?.downcast_ref::<T>()
    }

    /// Mutable reference to the stored `T`, if any.
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.map.get_mut(&TypeId::of::<T>())?.downcast_mut::<T>()
    }

    /// Removes and returns the stored `T`.
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    /// Returns `true` if a `T` is stored.
    pub fn contains<T: 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    /// Erased removal by `TypeId`, for uninstall bookkeeping.
    pub(crate) fn remove_erased(&mut self, type_id: TypeId) -> bool {
        self.map.remove(&type_id).is_some()
    }
}

/// The entity-component store.
pub struct World {
    registry: ComponentRegistry,
    entities: Entities,
    archetypes: Vec<Archetype>,
    signature_map: HashMap<[u64; SIGNATURE_SIZE], ArchetypeID>,
    events: EventDispatcher,
    extensions: Extensions,
    parents: HashMap<IndexID, Entity>,
    children: HashMap<IndexID, Vec<Entity>>,
    names: HashMap<IndexID, String>,
    structure_version: u64,
}

impl World {
    /// Creates an empty world with the zero-component table preallocated.
    pub fn new() -> Self {
        let mut signature_map = HashMap::new();
        signature_map.insert(Signature::default().components, 0);
        Self {
            registry: ComponentRegistry::new(),
            entities: Entities::new(),
            archetypes: vec![Archetype::empty(0)],
            signature_map,
            events: EventDispatcher::new(),
            extensions: Extensions::default(),
            parents: HashMap::new(),
            children: HashMap::new(),
            names: HashMap::new(),
            structure_version: 0,
        }
    }

    // ── registration ────────────────────────────────────────────────────

    /// Registers a plain component type.
    pub fn register_component<T: 'static>(&mut self) -> EcsResult<ComponentID> {
        Ok(self.registry.register::<T>(false)?.component_id())
    }

    /// Registers a zero-sized tag/marker type.
    pub fn register_tag<T: 'static>(&mut self) -> EcsResult<ComponentID> {
        Ok(self.registry.register::<T>(true)?.component_id())
    }

    /// Registers a component with constraints, a predicate, or a codec.
    pub fn register_component_with<T: 'static>(
        &mut self,
        spec: ComponentSpec<T>,
    ) -> EcsResult<ComponentID> {
        Ok(self.registry.register_with(spec)?.component_id())
    }

    /// The component registry.
    #[inline]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // ── entity lifecycle ────────────────────────────────────────────────

    /// Spawns an entity with the bundle's components, atomically.
    ///
    /// Validation (unknown ids, structural constraints, value predicates)
    /// runs first against a preview of the handle; only then is the handle
    /// allocated and the row stored. On success `ComponentAdded` fires per
    /// component in ascending id order, then `EntityCreated`.
    pub fn create_entity(&mut self, bundle: ComponentBundle) -> EcsResult<Entity> {
        let (name, mut values) = bundle.into_parts();
        values.sort_by_key(|(component_id, _)| *component_id);

        let mut signature = Signature::default();
        for (component_id, _) in &values {
            self.registry.desc(*component_id)?;
            signature.set(*component_id);
        }
        for (component_id, _) in &values {
            self.check_constraints(*component_id, &signature)?;
        }
        let preview = self.entities.peek_next()?;
        for (component_id, value) in &values {
            let desc = self.registry.desc(*component_id)?;
            let view = WorldView::new(self);
            if !desc.check_value(&view, preview, value.as_ref()) {
                let (index, generation) = preview.parts();
                return Err(ValidationError::Rejected {
                    component: desc.name(),
                    index,
                    generation,
                }
                .into());
            }
        }

        let entity = self.entities.create()?;
        debug_assert_eq!(entity, preview);
        let archetype_id = match self.archetype_for(&signature) {
            Ok(archetype_id) => archetype_id,
            Err(error) => {
                self.entities.destroy(entity);
                return Err(error);
            }
        };
        let row = match self.archetypes[archetype_id as usize].push_row(entity, values) {
            Ok(row) => row,
            Err(error) => {
                self.entities.destroy(entity);
                return Err(error);
            }
        };
        self.entities
            .set_location(entity, EntityLocation { archetype: archetype_id, row });
        if let Some(name) = name {
            self.names.insert(entity.index(), name);
        }
        self.structure_version += 1;
        log::trace!("created entity {entity:?} with {} components", signature.count());

        let (events, archetypes, names) = (&mut self.events, &self.archetypes, &self.names);
        let archetype = &archetypes[archetype_id as usize];
        for component_id in signature.iterate_over_components() {
            if let Some(value) = archetype.get_erased(component_id, row)? {
                events.emit_added(component_id, entity, value)?;
            }
        }
        events.emit_created(entity, names.get(&entity.index()).map(String::as_str))?;
        Ok(entity)
    }

    /// Spawns an entity with no components.
    pub fn create_empty(&mut self) -> EcsResult<Entity> {
        self.create_entity(ComponentBundle::new())
    }

    /// Destroys an entity. Returns `Ok(false)` if it was already dead.
    ///
    /// After the row is gone, `ComponentRemoved` fires per former component
    /// in ascending id order, then `EntityDestroyed`. Hierarchy links are
    /// detached and children orphaned; the name mapping is dropped.
    pub fn destroy_entity(&mut self, entity: Entity) -> EcsResult<bool> {
        if !self.entities.is_alive(entity) {
            return Ok(false);
        }
        let location = self.entities.location(entity)?;
        let signature = *self.archetypes[location.archetype as usize].signature();
        let moved = self.archetypes[location.archetype as usize].swap_remove_row(location.row)?;
        if let Some(shifted) = moved {
            self.entities.set_location(shifted, location);
        }
        self.entities.destroy(entity);
        self.detach_from_parent(entity);
        if let Some(orphans) = self.children.remove(&entity.index()) {
            for orphan in orphans {
                self.parents.remove(&orphan.index());
            }
        }
        self.names.remove(&entity.index());
        self.structure_version += 1;
        log::trace!("destroyed entity {entity:?}");

        for component_id in signature.iterate_over_components() {
            self.events.emit_removed(component_id, entity)?;
        }
        self.events.emit_destroyed(entity)?;
        Ok(true)
    }

    /// Returns `true` if the handle refers to a live entity.
    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    #[inline]
    pub fn entity_count(&self) -> EntityCount {
        self.entities.live_count()
    }

    /// Component ids currently on an entity, ascending.
    pub fn components_of(&self, entity: Entity) -> EcsResult<Vec<ComponentID>> {
        let location = self.entities.location(entity)?;
        Ok(self.archetypes[location.archetype as usize]
            .signature()
            .iterate_over_components()
            .collect())
    }

    // ── component mutation ──────────────────────────────────────────────

    /// Adds a component to a live entity, migrating its row.
    ///
    /// Fails with [`AlreadyPresentError`] if the entity already has one,
    /// and re-runs structural constraints and the value predicate against
    /// the would-be signature before anything moves.
    pub fn add_component<T: 'static>(&mut self, entity: Entity, value: T) -> EcsResult<()> {
        let location = self.entities.location(entity)?;
        let component_id = self.registry.resolve::<T>()?;
        let source_id = location.archetype;
        let source_signature = *self.archetypes[source_id as usize].signature();
        if source_signature.has(component_id) {
            let (index, generation) = entity.parts();
            return Err(AlreadyPresentError {
                component: type_name::<T>(),
                index,
                generation,
            }
            .into());
        }
        let mut next_signature = source_signature;
        next_signature.set(component_id);
        self.check_constraints(component_id, &next_signature)?;
        {
            let desc = self.registry.desc(component_id)?;
            let view = WorldView::new(self);
            if !desc.check_value(&view, entity, &value) {
                let (index, generation) = entity.parts();
                return Err(ValidationError::Rejected {
                    component: desc.name(),
                    index,
                    generation,
                }
                .into());
            }
        }

        let target_id = match self.archetypes[source_id as usize].edge_add(component_id) {
            Some(target_id) => target_id,
            None => {
                let target_id = self.archetype_for(&next_signature)?;
                self.archetypes[source_id as usize].set_edge_add(component_id, target_id);
                self.archetypes[target_id as usize].set_edge_remove(component_id, source_id);
                target_id
            }
        };
        let (source, target) = archetype_pair(&mut self.archetypes, source_id, target_id);
        let (target_row, moved) =
            source.move_row_to(location.row, target, Some((component_id, Box::new(value))))?;
        self.entities.set_location(
            entity,
            EntityLocation {
                archetype: target_id,
                row: target_row,
            },
        );
        if let Some(shifted) = moved {
            self.entities.set_location(shifted, location);
        }
        self.structure_version += 1;

        let (events, archetypes) = (&mut self.events, &self.archetypes);
        if let Some(value) = archetypes[target_id as usize].get_erased(component_id, target_row)? {
            events.emit_added(component_id, entity, value)?;
        }
        Ok(())
    }

    /// Removes a component from a live entity, migrating its row.
    ///
    /// Returns `Ok(false)` if the component is not on the entity. Removing
    /// the last component leaves the entity alive in the zero-component
    /// table. `ComponentRemoved` fires after the migration.
    pub fn remove_component<T: 'static>(&mut self, entity: Entity) -> EcsResult<bool> {
        let location = self.entities.location(entity)?;
        let component_id = self.registry.resolve::<T>()?;
        let source_id = location.archetype;
        let source_signature = *self.archetypes[source_id as usize].signature();
        if !source_signature.has(component_id) {
            return Ok(false);
        }
        let mut next_signature = source_signature;
        next_signature.clear(component_id);

        let target_id = match self.archetypes[source_id as usize].edge_remove(component_id) {
            Some(target_id) => target_id,
            None => {
                let target_id = self.archetype_for(&next_signature)?;
                self.archetypes[source_id as usize].set_edge_remove(component_id, target_id);
                self.archetypes[target_id as usize].set_edge_add(component_id, source_id);
                target_id
            }
        };
        let (source, target) = archetype_pair(&mut self.archetypes, source_id, target_id);
        let (target_row, moved) = source.move_row_to(location.row, target, None)?;
        self.entities.set_location(
            entity,
            EntityLocation {
                archetype: target_id,
                row: target_row,
            },
        );
        if let Some(shifted) = moved {
            self.entities.set_location(shifted, location);
        }
        self.structure_version += 1;

        self.events.emit_removed(component_id, entity)?;
        Ok(true)
    }

    /// Replaces a present component's value, returning the previous value.
    ///
    /// This is the only operation that fires `ComponentChanged`, and the
    /// only mutation that does not advance the structure version: writing
    /// through a value does not invalidate live cursors.
    pub fn set_component<T: 'static>(&mut self, entity: Entity, value: T) -> EcsResult<T> {
        let location = self.entities.location(entity)?;
        let component_id = self.registry.resolve::<T>()?;
        let archetype = &mut self.archetypes[location.archetype as usize];
        if !archetype.signature().has(component_id) {
            let (index, generation) = entity.parts();
            return Err(NotPresentError {
                component: type_name::<T>(),
                index,
                generation,
            }
            .into());
        }
        let old = archetype
            .typed_column_mut::<T>(component_id)?
            .replace(location.row, value)?;

        let (events, archetypes) = (&mut self.events, &self.archetypes);
        if let Some(new_value) =
            archetypes[location.archetype as usize].get_erased(component_id, location.row)?
        {
            events.emit_changed(component_id, entity, &old, new_value)?;
        }
        Ok(old)
    }

    // ── component access ────────────────────────────────────────────────

    /// Shared reference to an entity's `T`. `Ok(None)` when the component
    /// (or its registration) is absent; stale handles are errors.
    pub fn get_component<T: 'static>(&self, entity: Entity) -> EcsResult<Option<&T>> {
        let location = self.entities.location(entity)?;
        let Some(component_id) = self.registry.id_of::<T>() else {
            return Ok(None);
        };
        let archetype = &self.archetypes[location.archetype as usize];
        if !archetype.signature().has(component_id) {
            return Ok(None);
        }
        Ok(archetype.get::<T>(component_id, location.row)?)
    }

    /// Mutable reference to an entity's `T`. Does not fire
    /// `ComponentChanged`; use [`World::set_component`] for observed writes.
    pub fn get_component_mut<T: 'static>(&mut self, entity: Entity) -> EcsResult<Option<&mut T>> {
        let location = self.entities.location(entity)?;
        let Some(component_id) = self.registry.id_of::<T>() else {
            return Ok(None);
        };
        let archetype = &mut self.archetypes[location.archetype as usize];
        if !archetype.signature().has(component_id) {
            return Ok(None);
        }
        Ok(archetype.get_mut::<T>(component_id, location.row)?)
    }

    /// Returns `true` if the entity currently has a `T`.
    pub fn has_component<T: 'static>(&self, entity: Entity) -> EcsResult<bool> {
        let location = self.entities.location(entity)?;
        let Some(component_id) = self.registry.id_of::<T>() else {
            return Ok(false);
        };
        Ok(self.archetypes[location.archetype as usize]
            .signature()
            .has(component_id))
    }

    // ── building and querying ───────────────────────────────────────────

    /// Starts a typed bundle builder backed by this world's registry.
    pub fn bundle(&self) -> BundleBuilder<'_> {
        BundleBuilder {
            registry: &self.registry,
            bundle: ComponentBundle::new(),
            error: None,
        }
    }

    /// Starts a query. The builder holds no borrow; resolve it against a
    /// world via `iter`, `cursor`, `count`, or the `for_each` family.
    pub fn query(&self) -> Query {
        Query::new()
    }

    // ── events ──────────────────────────────────────────────────────────

    /// Subscribes to `ComponentAdded` for `T`. Newest subscriptions are
    /// dispatched first.
    pub fn on_component_added<T, F>(&mut self, handler: F) -> EcsResult<EventSubscription>
    where
        T: 'static,
        F: FnMut(Entity, &T) -> HandlerResult + 'static,
    {
        let component_id = self.registry.resolve::<T>()?;
        let mut handler = handler;
        Ok(self
            .events
            .subscribe_added(component_id, Box::new(move |entity, value| {
                match value.downcast_ref::<T>() {
                    Some(value) => handler(entity, value),
                    None => Ok(HandlerFlow::Keep),
                }
            })))
    }

    /// Subscribes to `ComponentRemoved` for `T`. The value is already gone
    /// when the handler runs; only the entity is delivered.
    pub fn on_component_removed<T, F>(&mut self, handler: F) -> EcsResult<EventSubscription>
    where
        T: 'static,
        F: FnMut(Entity) -> HandlerResult + 'static,
    {
        let component_id = self.registry.resolve::<T>()?;
        Ok(self.events.subscribe_removed(component_id, Box::new(handler)))
    }

    /// Subscribes to `ComponentChanged` for `T`, receiving old and new
    /// values.
    pub fn on_component_changed<T, F>(&mut self, handler: F) -> EcsResult<EventSubscription>
    where
        T: 'static,
        F: FnMut(Entity, &T, &T) -> HandlerResult + 'static,
    {
        let component_id = self.registry.resolve::<T>()?;
        let mut handler = handler;
        Ok(self
            .events
            .subscribe_changed(component_id, Box::new(move |entity, old, new| {
                match (old.downcast_ref::<T>(), new.downcast_ref::<T>()) {
                    (Some(old), Some(new)) => handler(entity, old, new),
                    _ => Ok(HandlerFlow::Keep),
                }
            })))
    }

    /// Subscribes to `EntityCreated`, which delivers the spawn name.
    pub fn on_entity_created<F>(&mut self, handler: F) -> EventSubscription
    where
        F: FnMut(Entity, Option<&str>) -> HandlerResult + 'static,
    {
        self.events.subscribe_created(Box::new(handler))
    }

    /// Subscribes to `EntityDestroyed`.
    pub fn on_entity_destroyed<F>(&mut self, handler: F) -> EventSubscription
    where
        F: FnMut(Entity) -> HandlerResult + 'static,
    {
        self.events.subscribe_destroyed(Box::new(handler))
    }

    /// Drops a subscription. `false` if it was already gone.
    pub fn unsubscribe(&mut self, subscription: EventSubscription) -> bool {
        self.events.unsubscribe(subscription)
    }

    // ── extensions ──────────────────────────────────────────────────────

    /// Stores a world-scoped extension value, displacing any previous `T`.
    pub fn set_extension<T: 'static>(&mut self, value: T) -> Option<T> {
        self.extensions.set(value)
    }

    /// Shared reference to the `T` extension.
    pub fn get_extension<T: 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    /// Mutable reference to the `T` extension.
    pub fn get_extension_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.extensions.get_mut::<T>()
    }

    /// Removes and returns the `T` extension.
    pub fn remove_extension<T: 'static>(&mut self) -> Option<T> {
        self.extensions.remove::<T>()
    }

    /// Returns `true` if a `T` extension is stored.
    pub fn has_extension<T: 'static>(&self) -> bool {
        self.extensions.contains::<T>()
    }

    pub(crate) fn remove_extension_erased(&mut self, type_id: TypeId) -> bool {
        self.extensions.remove_erased(type_id)
    }

    // ── introspection and internals ─────────────────────────────────────

    /// Monotonic counter advanced by every structural change. Cursors stamp
    /// this at creation and refuse to continue once it moves.
    #[inline]
    pub fn structure_version(&self) -> u64 {
        self.structure_version
    }

    pub(crate) fn archetypes_slice(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub(crate) fn archetype(&self, archetype_id: ArchetypeID) -> &Archetype {
        &self.archetypes[archetype_id as usize]
    }

    pub(crate) fn archetype_mut(&mut self, archetype_id: ArchetypeID) -> &mut Archetype {
        &mut self.archetypes[archetype_id as usize]
    }

    pub(crate) fn matching_archetypes(&self, query: &QuerySignature) -> Vec<ArchetypeID> {
        self.archetypes
            .iter()
            .filter(|archetype| archetype.matches(query))
            .map(Archetype::id)
            .collect()
    }

    /// Table for `signature`, creating it (and its columns) on first use.
    fn archetype_for(&mut self, signature: &Signature) -> EcsResult<ArchetypeID> {
        if let Some(&archetype_id) = self.signature_map.get(&signature.components) {
            return Ok(archetype_id);
        }
        let next = self.archetypes.len();
        if next > ArchetypeID::MAX as usize {
            return Err(StorageError::ArchetypeCap {
                capacity: ArchetypeID::MAX as usize + 1,
            }
            .into());
        }
        let archetype_id = next as ArchetypeID;
        let archetype = Archetype::new(archetype_id, signature, &self.registry)?;
        self.signature_map.insert(signature.components, archetype_id);
        self.archetypes.push(archetype);
        log::debug!(
            "created archetype {archetype_id} for {} components",
            signature.count()
        );
        Ok(archetype_id)
    }

    /// Structural constraints for `component_id` being part of `signature`:
    /// its requirements present, its conflicts absent, and no present
    /// component conflicting back.
    fn check_constraints(&self, component_id: ComponentID, signature: &Signature) -> EcsResult<()> {
        let desc = self.registry.desc(component_id)?;
        for &required in desc.requires() {
            if !signature.has(required) {
                return Err(ValidationError::MissingRequirement {
                    component: desc.name(),
                    required: self.registry.desc(required)?.name(),
                }
                .into());
            }
        }
        for &conflicting in desc.conflicts() {
            if signature.has(conflicting) {
                return Err(ValidationError::Conflict {
                    component: desc.name(),
                    conflicting: self.registry.desc(conflicting)?.name(),
                }
                .into());
            }
        }
        for other in signature.iterate_over_components() {
            if other == component_id {
                continue;
            }
            let other_desc = self.registry.desc(other)?;
            if other_desc.conflicts().contains(&component_id) {
                return Err(ValidationError::Conflict {
                    component: other_desc.name(),
                    conflicting: desc.name(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn detach_from_parent(&mut self, child: Entity) -> bool {
        match self.parents.remove(&child.index()) {
            Some(old_parent) => {
                if let Some(siblings) = self.children.get_mut(&old_parent.index()) {
                    siblings.retain(|sibling| *sibling != child);
                    if siblings.is_empty() {
                        self.children.remove(&old_parent.index());
                    }
                }
                true
            }
            None => false,
        }
    }

    fn would_cycle(&self, child: Entity, parent: Entity) -> bool {
        if child == parent {
            return true;
        }
        let mut cursor = parent;
        while let Some(&next) = self.parents.get(&cursor.index()) {
            if next == child {
                return true;
            }
            cursor = next;
        }
        false
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Disjoint mutable borrows of two distinct archetype tables.
///
/// Callers guarantee `a != b`; migration source and target always differ
/// because their signatures differ.
fn archetype_pair(
    archetypes: &mut [Archetype],
    a: ArchetypeID,
    b: ArchetypeID,
) -> (&mut Archetype, &mut Archetype) {
    let (a_idx, b_idx) = (a as usize, b as usize);
    debug_assert_ne!(a_idx, b_idx);
    if a_idx < b_idx {
        let (low, high) = archetypes.split_at_mut(b_idx);
        (&mut low[a_idx], &mut high[0])
    } else {
        let (low, high) = archetypes.split_at_mut(a_idx);
        (&mut high[0], &mut low[b_idx])
    }
}

/// Read-only view handed to value predicates.
///
/// During `create_entity` validation the inspected entity is a preview that
/// does not exist yet, so `is_alive` is `false` and lookups return `None`
/// for it; predicates should judge the candidate value, not the entity.
pub struct WorldView<'w> {
    world: &'w World,
}

impl<'w> WorldView<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self { world }
    }

    /// Returns `true` if the handle refers to a live entity.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.world.is_alive(entity)
    }

    /// Shared reference to an entity's `T`; `None` on stale or absent.
    pub fn get<T: 'static>(&self, entity: Entity) -> Option<&'w T> {
        self.world.get_component::<T>(entity).ok().flatten()
    }

    /// Returns `true` if the entity has a `T`.
    pub fn has<T: 'static>(&self, entity: Entity) -> bool {
        self.world.has_component::<T>(entity).unwrap_or(false)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> EntityCount {
        self.world.entity_count()
    }

    /// Name of the entity, if one is set.
    pub fn name_of(&self, entity: Entity) -> Option<&'w str> {
        self.world.names.get(&entity.index()).map(String::as_str)
    }
}

/// Typed bundle construction against a world's registry.
///
/// Registry lookups happen per `with` call; the first failure is held and
/// reported by [`BundleBuilder::finish`], keeping call sites chainable.
#[must_use]
pub struct BundleBuilder<'w> {
    registry: &'w ComponentRegistry,
    bundle: ComponentBundle,
    error: Option<RegistryError>,
}

impl BundleBuilder<'_> {
    /// Adds a component value. Re-adding a type replaces the value.
    pub fn with<T: 'static>(mut self, value: T) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.registry.resolve::<T>() {
            Ok(component_id) => self.bundle.insert(component_id, value),
            Err(error) => self.error = Some(error),
        }
        self
    }

    /// Names the entity for `EntityCreated` and the tagging capability.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.bundle.set_name(name);
        self
    }

    /// Yields the bundle, or the first registry failure.
    pub fn finish(self) -> Result<ComponentBundle, RegistryError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.bundle),
        }
    }
}

// ── capability implementations ──────────────────────────────────────────

impl CapabilityProvider for World {
    fn hierarchy(&self) -> Result<&dyn HierarchyOps, crate::engine::error::NotSupportedError> {
        Ok(self)
    }

    fn hierarchy_mut(
        &mut self,
    ) -> Result<&mut dyn HierarchyOps, crate::engine::error::NotSupportedError> {
        Ok(self)
    }

    fn tagging(&self) -> Result<&dyn TaggingOps, crate::engine::error::NotSupportedError> {
        Ok(self)
    }

    fn tagging_mut(
        &mut self,
    ) -> Result<&mut dyn TaggingOps, crate::engine::error::NotSupportedError> {
        Ok(self)
    }

    fn persistence(&self) -> Result<&dyn PersistenceOps, crate::engine::error::NotSupportedError> {
        Ok(self)
    }

    fn persistence_mut(
        &mut self,
    ) -> Result<&mut dyn PersistenceOps, crate::engine::error::NotSupportedError> {
        Ok(self)
    }
}

impl HierarchyOps for World {
    fn set_parent(&mut self, child: Entity, parent: Entity) -> EcsResult<()> {
        self.entities.location(child)?;
        self.entities.location(parent)?;
        if self.would_cycle(child, parent) {
            return Err(HierarchyError::Cycle {
                child: child.index(),
                parent: parent.index(),
            }
            .into());
        }
        self.detach_from_parent(child);
        self.parents.insert(child.index(), parent);
        self.children.entry(parent.index()).or_default().push(child);
        Ok(())
    }

    fn parent(&self, child: Entity) -> Option<Entity> {
        if !self.entities.is_alive(child) {
            return None;
        }
        self.parents.get(&child.index()).copied()
    }

    fn children(&self, parent: Entity) -> &[Entity] {
        if !self.entities.is_alive(parent) {
            return &[];
        }
        self.children
            .get(&parent.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn clear_parent(&mut self, child: Entity) -> bool {
        if !self.entities.is_alive(child) {
            return false;
        }
        self.detach_from_parent(child)
    }
}

impl TaggingOps for World {
    fn set_name(&mut self, entity: Entity, name: &str) -> EcsResult<()> {
        self.entities.location(entity)?;
        self.names.insert(entity.index(), name.to_owned());
        Ok(())
    }

    fn name(&self, entity: Entity) -> Option<&str> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.names.get(&entity.index()).map(String::as_str)
    }

    fn find_by_name(&self, name: &str) -> Option<Entity> {
        self.names
            .iter()
            .find(|(_, stored)| stored.as_str() == name)
            .and_then(|(&index, _)| self.entities.handle_for(index))
    }

    fn clear_name(&mut self, entity: Entity) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        self.names.remove(&entity.index()).is_some()
    }
}

impl PersistenceOps for World {
    fn save_entity(&self, entity: Entity) -> EcsResult<EntitySnapshot> {
        let location = self.entities.location(entity)?;
        let archetype = &self.archetypes[location.archetype as usize];
        let mut components = Vec::with_capacity(archetype.signature().count());
        for component_id in archetype.signature().iterate_over_components() {
            let desc = self.registry.desc(component_id)?;
            let codec = desc.codec().ok_or(CodecError::MissingCodec {
                component: desc.name(),
            })?;
            let value = archetype
                .get_erased(component_id, location.row)?
                .ok_or(StorageError::RowOutOfBounds {
                    row: location.row,
                    length: archetype.len(),
                })?;
            let bytes = (codec.encode)(value)?;
            components.push(ComponentRecord {
                name: desc.name().to_owned(),
                bytes,
            });
        }
        Ok(EntitySnapshot {
            name: self.names.get(&entity.index()).cloned(),
            components,
        })
    }

    fn load_entity(&mut self, snapshot: &EntitySnapshot) -> EcsResult<Entity> {
        let mut bundle = ComponentBundle::new();
        for record in &snapshot.components {
            let desc: &ComponentDesc =
                self.registry
                    .by_name(&record.name)
                    .ok_or_else(|| RegistryError::UnknownName {
                        name: record.name.clone(),
                    })?;
            let codec = desc.codec().ok_or(CodecError::MissingCodec {
                component: desc.name(),
            })?;
            let value = (codec.decode)(&record.bytes)?;
            desc.apply_to_bundle(&mut bundle, value)
                .map_err(StorageError::TypeMismatch)?;
        }
        if let Some(name) = &snapshot.name {
            bundle.set_name(name.clone());
        }
        self.create_entity(bundle)
    }
}
