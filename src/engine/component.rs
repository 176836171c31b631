//! # Component Registry
//!
//! Assigns stable [`ComponentID`] values to component types and stores, per
//! type, the delegates the rest of the runtime invokes without ever naming
//! the type again.
//!
//! ## Purpose
//! [`ComponentRegistry::register`] is the only generic entry point into the
//! storage engine. Because it is generic, the compiler emits concrete
//! monomorphised functions at the call site (a `capacity -> Column<T>`
//! factory, an erased-value applicator, optionally an encode/decode pair)
//! and the registry stores those function pointers keyed by the assigned id.
//! Archetype construction, deferred spawning, and serialization all run off
//! these captured delegates; nothing in the runtime recovers a type at use
//! time.
//!
//! ## Design
//! - Registries are plain instance state owned by a `World`; there are no
//!   process-wide tables. Two worlds can register the same types
//!   independently.
//! - Ids are assigned sequentially in `[0, COMPONENT_CAP)`.
//! - Registering the same type twice in one registry fails with
//!   [`DuplicateRegistrationError`]; this is a startup programming error.
//! - A descriptor is immutable once created.
//!
//! ## Validation and serialization
//! [`ComponentSpec`] attaches the optional per-type extras: `requires` /
//! `conflicts-with` structural constraints (resolved to ids eagerly, so
//! dependencies must be registered first), a value predicate consulted at
//! create/add time, a stable name for persistence, and a codec.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::mem::size_of;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::engine::entity::Entity;
use crate::engine::error::{
    CodecError, DuplicateRegistrationError, RegistryError, RegistryFullError, TypeMismatchError,
};
use crate::engine::storage::{AnyColumn, Column};
use crate::engine::types::{ComponentBundle, ComponentID, COMPONENT_CAP};
use crate::engine::world::WorldView;

/// Factory producing an empty column for one component type.
pub type ColumnFactoryFn = fn(usize) -> Box<dyn AnyColumn>;

/// Applies a type-erased value to a spawn bundle, checking its concrete type.
pub type ApplyFn =
    fn(&mut ComponentBundle, ComponentID, Box<dyn Any>) -> Result<(), TypeMismatchError>;

/// Encodes one component value to bytes.
pub type EncodeFn = fn(&dyn Any) -> Result<Vec<u8>, CodecError>;

/// Decodes one component value from bytes.
pub type DecodeFn = fn(&[u8]) -> Result<Box<dyn Any>, CodecError>;

/// Erased value predicate consulted before create/add mutations.
pub(crate) type PredicateFn = Box<dyn Fn(&WorldView<'_>, Entity, &dyn Any) -> bool>;

fn new_column<T: 'static>(capacity: usize) -> Box<dyn AnyColumn> {
    Box::new(Column::<T>::with_capacity(capacity))
}

fn apply_boxed<T: 'static>(
    bundle: &mut ComponentBundle,
    component_id: ComponentID,
    value: Box<dyn Any>,
) -> Result<(), TypeMismatchError> {
    if !value.is::<T>() {
        return Err(TypeMismatchError {
            expected: TypeId::of::<T>(),
            actual: value.as_ref().type_id(),
        });
    }
    bundle.insert_boxed(component_id, value);
    Ok(())
}

fn encode_value<T: Serialize + 'static>(value: &dyn Any) -> Result<Vec<u8>, CodecError> {
    let value = value
        .downcast_ref::<T>()
        .ok_or(CodecError::ValueType(TypeMismatchError {
            expected: TypeId::of::<T>(),
            actual: value.type_id(),
        }))?;
    bincode::serde::encode_to_vec(value, bincode::config::standard()).map_err(CodecError::Encode)
}

fn decode_value<T: DeserializeOwned + 'static>(bytes: &[u8]) -> Result<Box<dyn Any>, CodecError> {
    let (value, _read): (T, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(CodecError::Decode)?;
    Ok(Box::new(value))
}

/// Encode/decode pair captured at registration.
///
/// The runtime defines no wire format of its own; this is whatever pair the
/// registration supplied. [`ComponentCodec::serde`] is the stock pair for
/// `serde`-enabled value types.
#[derive(Clone, Copy)]
pub struct ComponentCodec {
    /// Value-to-bytes delegate.
    pub encode: EncodeFn,
    /// Bytes-to-value delegate.
    pub decode: DecodeFn,
}

impl ComponentCodec {
    /// Builds a codec from an explicit function pair.
    pub fn new(encode: EncodeFn, decode: DecodeFn) -> Self {
        Self { encode, decode }
    }

    /// Stock codec for `serde`-enabled component types.
    pub fn serde<T: Serialize + DeserializeOwned + 'static>() -> Self {
        Self {
            encode: encode_value::<T>,
            decode: decode_value::<T>,
        }
    }
}

/// Per-type metadata and delegates, created once at registration.
pub struct ComponentDesc {
    component_id: ComponentID,
    name: &'static str,
    type_id: TypeId,
    size: usize,
    is_tag: bool,
    factory: ColumnFactoryFn,
    apply: ApplyFn,
    requires: Vec<ComponentID>,
    conflicts: Vec<ComponentID>,
    predicate: Option<PredicateFn>,
    codec: Option<ComponentCodec>,
}

impl ComponentDesc {
    /// Stable numeric id assigned at registration.
    #[inline]
    pub fn component_id(&self) -> ComponentID {
        self.component_id
    }

    /// Stable name; `type_name::<T>()` unless overridden via
    /// [`ComponentSpec::named`].
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `TypeId` of the component type.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Byte size of one value (0 for zero-sized tags).
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns `true` if the component was registered as a tag/marker.
    #[inline]
    pub fn is_tag(&self) -> bool {
        self.is_tag
    }

    /// Component ids this component requires alongside it.
    #[inline]
    pub fn requires(&self) -> &[ComponentID] {
        &self.requires
    }

    /// Component ids this component refuses to coexist with.
    #[inline]
    pub fn conflicts(&self) -> &[ComponentID] {
        &self.conflicts
    }

    /// Registered codec, if the component is serializable.
    #[inline]
    pub fn codec(&self) -> Option<&ComponentCodec> {
        self.codec.as_ref()
    }

    /// Allocates an empty column for this component type.
    pub(crate) fn new_column(&self, capacity: usize) -> Box<dyn AnyColumn> {
        (self.factory)(capacity)
    }

    /// Applies an erased value to a bundle after a concrete-type check.
    pub(crate) fn apply_to_bundle(
        &self,
        bundle: &mut ComponentBundle,
        value: Box<dyn Any>,
    ) -> Result<(), TypeMismatchError> {
        (self.apply)(bundle, self.component_id, value)
    }

    /// Runs the value predicate, if one was registered.
    pub(crate) fn check_value(&self, world: &WorldView<'_>, entity: Entity, value: &dyn Any) -> bool {
        match &self.predicate {
            Some(predicate) => predicate(world, entity, value),
            None => true,
        }
    }
}

/// Builder for the optional parts of a component registration.
///
/// ```ignore
/// registry.register_with(
///     ComponentSpec::<Health>::new()
///         .requires::<Position>()
///         .predicate(|_, _, health: &Health| health.current <= health.max)
///         .serializable(),
/// )?;
/// ```
pub struct ComponentSpec<T> {
    is_tag: bool,
    stable_name: Option<&'static str>,
    requires: Vec<(TypeId, &'static str)>,
    conflicts: Vec<(TypeId, &'static str)>,
    predicate: Option<PredicateFn>,
    codec: Option<ComponentCodec>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> ComponentSpec<T> {
    /// Starts an empty spec for `T`.
    pub fn new() -> Self {
        Self {
            is_tag: false,
            stable_name: None,
            requires: Vec::new(),
            conflicts: Vec::new(),
            predicate: None,
            codec: None,
            _marker: PhantomData,
        }
    }

    /// Marks the component as a tag/marker type.
    pub fn tag(mut self) -> Self {
        self.is_tag = true;
        self
    }

    /// Overrides the stable name used for persistence. The default
    /// `type_name::<T>()` is not guaranteed stable across compiler versions.
    pub fn named(mut self, name: &'static str) -> Self {
        self.stable_name = Some(name);
        self
    }

    /// Declares that `T` requires `U` on the same entity. `U` must already
    /// be registered when this spec is submitted.
    pub fn requires<U: 'static>(mut self) -> Self {
        self.requires.push((TypeId::of::<U>(), type_name::<U>()));
        self
    }

    /// Declares that `T` refuses to coexist with `U`. `U` must already be
    /// registered when this spec is submitted.
    pub fn conflicts_with<U: 'static>(mut self) -> Self {
        self.conflicts.push((TypeId::of::<U>(), type_name::<U>()));
        self
    }

    /// Attaches a value predicate consulted at create/add time. Returning
    /// `false` rejects the mutation before storage is touched.
    pub fn predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&WorldView<'_>, Entity, &T) -> bool + 'static,
    {
        self.predicate = Some(Box::new(move |world, entity, value| {
            match value.downcast_ref::<T>() {
                Some(value) => predicate(world, entity, value),
                None => false,
            }
        }));
        self
    }

    /// Attaches the stock `serde` codec for `T`.
    pub fn serializable(self) -> Self
    where
        T: Serialize + DeserializeOwned,
    {
        self.with_codec(ComponentCodec::serde::<T>())
    }

    /// Attaches an explicit codec.
    pub fn with_codec(mut self, codec: ComponentCodec) -> Self {
        self.codec = Some(codec);
        self
    }
}

impl<T: 'static> Default for ComponentSpec<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Instance-owned table of component descriptors.
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentID>,
    by_id: Vec<ComponentDesc>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            by_id: Vec::new(),
        }
    }

    /// Registers `T`, assigning the next sequential id.
    ///
    /// ## Errors
    /// [`DuplicateRegistrationError`] if `T` is already registered here;
    /// [`RegistryFullError`] when `COMPONENT_CAP` ids are in use.
    pub fn register<T: 'static>(&mut self, is_tag: bool) -> Result<&ComponentDesc, RegistryError> {
        let spec = if is_tag {
            ComponentSpec::<T>::new().tag()
        } else {
            ComponentSpec::<T>::new()
        };
        self.register_with(spec)
    }

    /// Registers `T` together with constraints, predicate, and codec.
    pub fn register_with<T: 'static>(
        &mut self,
        spec: ComponentSpec<T>,
    ) -> Result<&ComponentDesc, RegistryError> {
        let type_id = TypeId::of::<T>();
        if self.by_type.contains_key(&type_id) {
            return Err(DuplicateRegistrationError {
                name: type_name::<T>(),
            }
            .into());
        }
        if self.by_id.len() >= COMPONENT_CAP {
            return Err(RegistryFullError {
                capacity: COMPONENT_CAP,
            }
            .into());
        }

        let mut requires = Vec::with_capacity(spec.requires.len());
        for &(required_type, required_name) in &spec.requires {
            let id = self
                .by_type
                .get(&required_type)
                .copied()
                .ok_or(RegistryError::Unregistered {
                    name: required_name,
                })?;
            requires.push(id);
        }
        let mut conflicts = Vec::with_capacity(spec.conflicts.len());
        for &(conflicting_type, conflicting_name) in &spec.conflicts {
            let id = self
                .by_type
                .get(&conflicting_type)
                .copied()
                .ok_or(RegistryError::Unregistered {
                    name: conflicting_name,
                })?;
            conflicts.push(id);
        }

        let component_id = self.by_id.len() as ComponentID;
        let name = spec.stable_name.unwrap_or_else(type_name::<T>);
        self.by_type.insert(type_id, component_id);
        self.by_id.push(ComponentDesc {
            component_id,
            name,
            type_id,
            size: size_of::<T>(),
            is_tag: spec.is_tag,
            factory: new_column::<T>,
            apply: apply_boxed::<T>,
            requires,
            conflicts,
            predicate: spec.predicate,
            codec: spec.codec,
        });
        log::debug!("registered component {name} as id {component_id}");
        Ok(&self.by_id[component_id as usize])
    }

    /// Number of registered component types.
    #[inline]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Descriptor for `component_id`, if assigned.
    #[inline]
    pub fn get(&self, component_id: ComponentID) -> Option<&ComponentDesc> {
        self.by_id.get(component_id as usize)
    }

    /// Descriptor for `component_id`, or a consistency error.
    pub(crate) fn desc(&self, component_id: ComponentID) -> Result<&ComponentDesc, RegistryError> {
        self.by_id
            .get(component_id as usize)
            .ok_or(RegistryError::UnknownId { component_id })
    }

    /// Id assigned to `T`, if registered.
    #[inline]
    pub fn id_of<T: 'static>(&self) -> Option<ComponentID> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Id assigned to `T`, or [`RegistryError::Unregistered`].
    pub fn resolve<T: 'static>(&self) -> Result<ComponentID, RegistryError> {
        self.id_of::<T>().ok_or(RegistryError::Unregistered {
            name: type_name::<T>(),
        })
    }

    /// Id assigned to a raw `TypeId`, if registered.
    #[inline]
    pub fn id_of_type_id(&self, type_id: TypeId) -> Option<ComponentID> {
        self.by_type.get(&type_id).copied()
    }

    /// Descriptor matching a stable name.
    pub fn by_name(&self, name: &str) -> Option<&ComponentDesc> {
        self.by_id.iter().find(|desc| desc.name == name)
    }

    /// Iterates over all descriptors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentDesc> {
        self.by_id.iter()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    #[test]
    fn ids_are_sequential_and_descriptors_match() {
        let mut registry = ComponentRegistry::new();
        let first = registry.register::<u32>(false).unwrap().component_id();
        let second = registry.register::<f64>(false).unwrap().component_id();
        assert_eq!((first, second), (0, 1));
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());

        let desc = registry.get(first).unwrap();
        assert_eq!(desc.type_id(), TypeId::of::<u32>());
        assert_eq!(desc.size(), size_of::<u32>());
        assert!(!desc.is_tag());
        assert_eq!(registry.id_of_type_id(TypeId::of::<f64>()), Some(second));
        assert_eq!(registry.iter().count(), 2);
    }

    #[test]
    fn duplicate_registration_fails_fast() {
        let mut registry = ComponentRegistry::new();
        registry.register::<u32>(false).unwrap();
        assert!(matches!(
            registry.register::<u32>(false),
            Err(RegistryError::Duplicate(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn tags_are_zero_sized() {
        let mut registry = ComponentRegistry::new();
        let desc = registry.register::<Marker>(true).unwrap();
        assert!(desc.is_tag());
        assert_eq!(desc.size(), 0);
    }

    #[test]
    fn stable_names_override_type_names() {
        let mut registry = ComponentRegistry::new();
        registry
            .register_with(ComponentSpec::<u32>::new().named("counter"))
            .unwrap();
        let desc = registry.by_name("counter").unwrap();
        assert_eq!(desc.name(), "counter");
        assert!(registry.by_name(type_name::<u32>()).is_none());
    }

    #[test]
    fn constraints_must_name_registered_types() {
        let mut registry = ComponentRegistry::new();
        let spec = ComponentSpec::<Marker>::new().requires::<u32>();
        assert!(matches!(
            registry.register_with(spec),
            Err(RegistryError::Unregistered { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn factories_build_typed_columns() {
        let mut registry = ComponentRegistry::new();
        let desc = registry.register::<u32>(false).unwrap();
        let column = desc.new_column(8);
        assert_eq!(column.element_type_id(), TypeId::of::<u32>());
        assert_eq!(column.len(), 0);
    }

    #[test]
    fn applicators_reject_mismatched_values() {
        let mut registry = ComponentRegistry::new();
        let component_id = registry.register::<u32>(false).unwrap().component_id();
        let desc = registry.get(component_id).unwrap();

        let mut bundle = ComponentBundle::new();
        desc.apply_to_bundle(&mut bundle, Box::new(7u32)).unwrap();
        assert!(desc.apply_to_bundle(&mut bundle, Box::new(7i64)).is_err());

        let value = bundle.take(component_id).unwrap();
        assert_eq!(*value.downcast::<u32>().unwrap(), 7);
    }
}
