//! Error types for registration, storage, mutation, and dispatch.
//!
//! This module declares focused, composable error types used across the
//! runtime. Each error models a single failure mode and carries enough
//! context to make failures actionable while remaining small and cheap to
//! pass around or convert into the crate-wide [`WorldError`] aggregate.
//!
//! ## Goals
//! * **Specificity:** one type per failure mode (stale handles, duplicate
//!   registration, precondition misses, constraint violations, storage
//!   invariant breaches).
//! * **Ergonomics:** everything derives [`std::error::Error`] and
//!   [`std::fmt::Display`] through `thiserror`, with `From` conversions into
//!   the aggregates so `?` composes naturally.
//! * **Actionability:** structured fields (offending ids, expected vs. actual
//!   types, generation counters) make logs useful without a reproduction.
//!
//! ## Typical flow
//! Low-level column and registry operations return their dedicated types
//! (e.g. [`TypeMismatchError`], [`DuplicateRegistrationError`]). The `World`
//! facade bubbles them into [`WorldError`], which callers can match on:
//!
//! ```ignore
//! match world.add_component(entity, Health { hp: 10 }) {
//!     Ok(()) => {}
//!     Err(WorldError::AlreadyPresent(e)) => eprintln!("{e}"),
//!     Err(WorldError::Stale(e)) => eprintln!("dead entity: {e}"),
//!     Err(other) => return Err(other),
//! }
//! ```

use std::any::TypeId;

use thiserror::Error;

use crate::engine::events::EventStage;
use crate::engine::types::{ComponentID, GenerationID, IndexID, RowID};

/// Crate-wide result alias over [`WorldError`].
pub type EcsResult<T> = Result<T, WorldError>;

/// Returned when the entity registry cannot allocate another slot index.
///
/// The index space is bounded by the handle bit layout; running into this
/// limit means the process has created more simultaneously-tracked slots
/// than the packed handle can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("entity limit reached ({entities_needed} needed; capacity {capacity})")]
pub struct CapacityError {
    /// Total entities the operation attempted to allocate.
    pub entities_needed: u64,

    /// Current capacity limiting the operation.
    pub capacity: u64,
}

/// Returned when an operation targets an entity whose slot has been freed
/// or reissued since the handle was obtained.
///
/// The stored generation at `index` no longer matches the handle's
/// generation, so the handle refers to a dead entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stale entity handle {index}v{generation} (slot generation is {current})")]
pub struct StaleHandleError {
    /// Slot index carried by the handle.
    pub index: IndexID,
    /// Generation carried by the handle.
    pub generation: GenerationID,
    /// Generation currently stored at the slot.
    pub current: GenerationID,
}

/// Returned when a component type is registered twice in the same registry.
///
/// Registration assigns the stable id and captures the per-type delegates;
/// doing it twice is a startup programming error and fails fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("component type {name} is already registered")]
pub struct DuplicateRegistrationError {
    /// Type name of the offending component.
    pub name: &'static str,
}

/// Returned when the registry has no id left to assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("component registry is full (capacity {capacity})")]
pub struct RegistryFullError {
    /// Maximum number of registrable component types.
    pub capacity: usize,
}

/// Registry lookup and registration failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A component type was registered twice.
    #[error(transparent)]
    Duplicate(#[from] DuplicateRegistrationError),

    /// No component id left to assign.
    #[error(transparent)]
    Full(#[from] RegistryFullError),

    /// A typed operation referenced a component type that was never
    /// registered in this registry instance.
    #[error("component type {name} is not registered")]
    Unregistered {
        /// Type name of the missing component.
        name: &'static str,
    },

    /// A component id had no descriptor (internal consistency breach).
    #[error("no descriptor for component id {component_id}")]
    UnknownId {
        /// The unknown id.
        component_id: ComponentID,
    },

    /// A stable component name had no descriptor.
    #[error("no component registered under stable name {name:?}")]
    UnknownName {
        /// The unmatched stable name.
        name: String,
    },
}

/// Returned when an entity already has the component being added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("entity {index}v{generation} already has component {component}")]
pub struct AlreadyPresentError {
    /// Name of the component involved.
    pub component: &'static str,
    /// Slot index of the target entity.
    pub index: IndexID,
    /// Generation of the target entity.
    pub generation: GenerationID,
}

/// Returned when an operation requires a component the entity lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("entity {index}v{generation} has no component {component}")]
pub struct NotPresentError {
    /// Name of the component involved.
    pub component: &'static str,
    /// Slot index of the target entity.
    pub index: IndexID,
    /// Generation of the target entity.
    pub generation: GenerationID,
}

/// Structural-constraint or value-predicate rejection.
///
/// Raised before any storage mutation; a failed validation leaves the world
/// exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A `requires` constraint is not satisfied by the combined set.
    #[error("component {component} requires {required}, which is missing from the target set")]
    MissingRequirement {
        /// Component declaring the constraint.
        component: &'static str,
        /// Component the constraint demands.
        required: &'static str,
    },

    /// A `conflicts-with` constraint is violated by the combined set.
    #[error("component {component} conflicts with {conflicting}, which is present in the target set")]
    Conflict {
        /// Component declaring the constraint.
        component: &'static str,
        /// Component the constraint forbids.
        conflicting: &'static str,
    },

    /// The registered value predicate rejected the incoming value.
    #[error("value predicate rejected {component} for entity {index}v{generation}")]
    Rejected {
        /// Component whose predicate fired.
        component: &'static str,
        /// Slot index of the target entity.
        index: IndexID,
        /// Generation of the target entity.
        generation: GenerationID,
    },
}

/// Returned when storage changed structurally while a query cursor was live.
///
/// Cursors stamp the world's structure version at creation; any entity
/// creation/destruction or component add/remove invalidates them. Deferred
/// mutation through a command buffer is the sanctioned path mid-iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("world structure changed during iteration (cursor stamp {expected}, world at {observed})")]
pub struct ConcurrentModificationError {
    /// Structure version the cursor was created against.
    pub expected: u64,
    /// Structure version observed at the failed step.
    pub observed: u64,
}

/// Returned when a type-erased value does not match a column's element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("column type mismatch (expected {expected:?}, found {actual:?})")]
pub struct TypeMismatchError {
    /// Element type the column stores.
    pub expected: TypeId,
    /// Type that was actually supplied.
    pub actual: TypeId,
}

/// Column and table consistency failures.
///
/// These surface breaches of internal invariants (row alignment, column
/// presence) as errors rather than panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A value or downcast did not match the column element type.
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatchError),

    /// A row index was outside the column's current length.
    #[error("row {row} out of bounds (column length {length})")]
    RowOutOfBounds {
        /// Offending row index.
        row: RowID,
        /// Length of the column at the time.
        length: usize,
    },

    /// An archetype was missing a column its signature promises.
    #[error("archetype has no column for component id {component_id}")]
    MissingColumn {
        /// Component id with no backing column.
        component_id: ComponentID,
    },

    /// Columns disagreed on row count after a move.
    #[error("row misalignment on component id {component_id} (expected {expected} rows, got {got})")]
    RowMisalignment {
        /// Expected row count.
        expected: usize,
        /// Observed row count.
        got: usize,
        /// Column where the mismatch was found.
        component_id: ComponentID,
    },

    /// The same column was requested twice for simultaneous mutable access.
    #[error("component id {component_id} requested twice in one column borrow")]
    AliasedColumn {
        /// The doubly-requested component id.
        component_id: ComponentID,
    },

    /// Distinct-signature table ids are exhausted.
    #[error("archetype table capacity exhausted ({capacity} tables)")]
    ArchetypeCap {
        /// Maximum number of archetype tables.
        capacity: usize,
    },
}

/// Returned when an event handler fails during dispatch.
///
/// Later handlers for the same event are skipped; the storage mutation that
/// triggered the event stays committed.
#[derive(Debug, Error)]
#[error("event handler failed during {stage:?} dispatch")]
pub struct DispatchError {
    /// Stage whose handler failed.
    pub stage: EventStage,
    /// The handler's own failure.
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

/// Serialization-boundary failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The component has no registered encode/decode pair.
    #[error("component {component} has no registered codec")]
    MissingCodec {
        /// Name of the non-serializable component.
        component: &'static str,
    },

    /// The erased value handed to an encoder had the wrong concrete type.
    #[error(transparent)]
    ValueType(#[from] TypeMismatchError),

    /// Encoding failed.
    #[error("component encode failed")]
    Encode(#[source] bincode::error::EncodeError),

    /// Decoding failed.
    #[error("component decode failed")]
    Decode(#[source] bincode::error::DecodeError),
}

/// Hierarchy-capability failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HierarchyError {
    /// Re-parenting would create a cycle through the child.
    #[error("parenting entity index {child} under {parent} would create a cycle")]
    Cycle {
        /// Slot index of the child.
        child: IndexID,
        /// Slot index of the requested parent.
        parent: IndexID,
    },
}

/// Returned when a store does not implement a requested capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("capability {name} is not supported by this store")]
pub struct NotSupportedError {
    /// Name of the missing capability.
    pub name: &'static str,
}

/// Aggregate error for every fallible `World` operation.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Entity slot space exhausted.
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    /// Operation on a dead entity handle.
    #[error(transparent)]
    Stale(#[from] StaleHandleError),

    /// Component already on the entity.
    #[error(transparent)]
    AlreadyPresent(#[from] AlreadyPresentError),

    /// Component missing from the entity.
    #[error(transparent)]
    NotPresent(#[from] NotPresentError),

    /// Constraint or predicate rejection before mutation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Registration or registry lookup failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Column or table consistency breach.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Structural mutation observed mid-iteration.
    #[error(transparent)]
    Concurrent(#[from] ConcurrentModificationError),

    /// An event handler failed after the mutation committed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Serialization-boundary failure.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Hierarchy-capability failure.
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// Requested capability not implemented by the store.
    #[error(transparent)]
    NotSupported(#[from] NotSupportedError),
}
