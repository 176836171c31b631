//! # ECS Runtime
//!
//! Archetype-based Entity-Component-System runtime with deferred
//! mutation, lifecycle events, and pluggable capabilities.
//!
//! ## Design Goals
//! - Archetype (column-major) storage for cache-friendly iteration
//! - Zero reflection: behavior captured as monomorphised delegates at
//!   registration
//! - Explicit worlds, no ambient globals
//! - Structural safety: validation before mutation, events after commit,
//!   deferred commands as the sanctioned mid-iteration mutation path
//!
//! ## Getting started
//! ```ignore
//! use ecs_runtime::prelude::*;
//!
//! let mut world = World::new();
//! world.register_component::<Position>()?;
//! let bundle = world.bundle().with(Position { x: 0.0, y: 0.0 }).finish()?;
//! let entity = world.create_entity(bundle)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

// The world and its views

pub use engine::world::{BundleBuilder, Extensions, World, WorldView};

pub use engine::entity::{Entity, EntityLocation};

// Registration and storage vocabulary

pub use engine::component::{
    ComponentCodec,
    ComponentDesc,
    ComponentRegistry,
    ComponentSpec,
};

pub use engine::types::{
    build_signature,
    ArchetypeID,
    ComponentBundle,
    ComponentID,
    EntityID,
    QuerySignature,
    Signature,
    SystemID,
};

// Events

pub use engine::events::{
    EventStage,
    EventSubscription,
    HandlerFault,
    HandlerFlow,
    HandlerResult,
};

// Queries and deferred mutation

pub use engine::query::{Query, QueryCursor, QueryIter};

pub use engine::commands::{
    CommandBuffer,
    CommandKind,
    EntityBuilder,
    FlushPolicy,
    FlushReport,
};

// Execution

pub use engine::systems::{FnSystem, Phase, Schedule, System};

pub use engine::plugin::{install, uninstall, InstallRecord, Plugin, PluginContext};

// Capabilities

pub use engine::capability::{
    CapabilityProvider,
    ComponentRecord,
    EntitySnapshot,
    HierarchyOps,
    PersistenceOps,
    TaggingOps,
};

// Errors

pub use engine::error::{
    AlreadyPresentError,
    CapacityError,
    CodecError,
    ConcurrentModificationError,
    DispatchError,
    DuplicateRegistrationError,
    EcsResult,
    HierarchyError,
    NotPresentError,
    NotSupportedError,
    RegistryError,
    RegistryFullError,
    StaleHandleError,
    StorageError,
    TypeMismatchError,
    ValidationError,
    WorldError,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used runtime types.
///
/// Import with:
/// ```rust
/// use ecs_runtime::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        CapabilityProvider,
        CommandBuffer,
        ComponentBundle,
        ComponentSpec,
        EcsResult,
        Entity,
        EventStage,
        FlushPolicy,
        FnSystem,
        HandlerFlow,
        HierarchyOps,
        PersistenceOps,
        Phase,
        Plugin,
        Query,
        Schedule,
        System,
        TaggingOps,
        World,
        WorldError,
    };
}
