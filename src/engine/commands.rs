//! # Command Buffer
//!
//! Deferred structural mutation: record while iterating, apply at a flush
//! point.
//!
//! ## Purpose
//! Structural changes (spawn, despawn, add, remove, set) are illegal while
//! query borrows or cursors are live. Systems and event handlers record
//! intent into a [`CommandBuffer`] instead; [`CommandBuffer::flush`]
//! replays the log against the world, in recording order, once iteration
//! is over.
//!
//! ## Failure policy
//! Between recording and flushing, targets can disappear: a command aimed
//! at an entity another command already destroyed is routine, not a bug.
//! [`FlushPolicy::SkipMissing`] (the default) therefore skips commands
//! that fail on a stale handle, an absent component, or an
//! already-present component, counts them in the [`FlushReport`], and
//! keeps going. Validation failures, handler faults, and every other
//! error abort the flush and discard the unapplied remainder.
//! [`FlushPolicy::Strict`] aborts on everything.
//!
//! ## Invariants
//! - Commands apply in recording order.
//! - Each command applies at most once; a completed flush leaves the
//!   buffer empty, and flushing an empty buffer is a no-op.

use std::fmt;

use crate::engine::entity::Entity;
use crate::engine::error::{EcsResult, RegistryError, WorldError};
use crate::engine::types::ComponentBundle;
use crate::engine::world::World;

/// What a recorded command will do, for logs and reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    /// Spawn an entity from a recorded bundle.
    Spawn,
    /// Despawn an entity.
    Despawn,
    /// Add a component value.
    Add,
    /// Remove a component.
    Remove,
    /// Replace a component value.
    Set,
}

/// How a flush treats commands whose target vanished since recording.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Skip stale-target commands (dead entity, component absent on
    /// remove/set, component present on add), logging and counting them.
    #[default]
    SkipMissing,
    /// Abort the flush on any failure.
    Strict,
}

/// Outcome of one flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Commands applied successfully.
    pub applied: usize,
    /// Commands skipped under [`FlushPolicy::SkipMissing`].
    pub skipped: usize,
}

struct Command {
    kind: CommandKind,
    action: Box<dyn FnOnce(&mut World) -> EcsResult<()>>,
}

/// Ordered log of deferred mutations.
pub struct CommandBuffer {
    queue: Vec<Command>,
    policy: FlushPolicy,
}

impl CommandBuffer {
    /// Creates an empty buffer with [`FlushPolicy::SkipMissing`].
    pub fn new() -> Self {
        Self::with_policy(FlushPolicy::default())
    }

    /// Creates an empty buffer with an explicit policy.
    pub fn with_policy(policy: FlushPolicy) -> Self {
        Self {
            queue: Vec::new(),
            policy,
        }
    }

    /// Policy this buffer flushes under.
    #[inline]
    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Starts recording an entity spawn. Call [`EntityBuilder::record`] to
    /// enqueue it.
    pub fn spawn(&mut self) -> EntityBuilder<'_> {
        EntityBuilder {
            buffer: self,
            inserts: Vec::new(),
            name: None,
        }
    }

    /// Records an entity destruction.
    pub fn despawn(&mut self, entity: Entity) {
        self.queue.push(Command {
            kind: CommandKind::Despawn,
            action: Box::new(move |world| world.destroy_entity(entity).map(|_| ())),
        });
    }

    /// Records a component addition.
    pub fn add<T: 'static>(&mut self, entity: Entity, value: T) {
        self.queue.push(Command {
            kind: CommandKind::Add,
            action: Box::new(move |world| world.add_component(entity, value)),
        });
    }

    /// Records a component removal.
    pub fn remove<T: 'static>(&mut self, entity: Entity) {
        self.queue.push(Command {
            kind: CommandKind::Remove,
            action: Box::new(move |world| world.remove_component::<T>(entity).map(|_| ())),
        });
    }

    /// Records a component value replacement.
    pub fn set<T: 'static>(&mut self, entity: Entity, value: T) {
        self.queue.push(Command {
            kind: CommandKind::Set,
            action: Box::new(move |world| world.set_component(entity, value).map(|_| ())),
        });
    }

    /// Number of pending commands.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is pending.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Discards all pending commands without applying them.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Applies every pending command in recording order.
    ///
    /// On a hard failure the command's error propagates and the unapplied
    /// remainder is discarded; a partially applied log must not replay.
    pub fn flush(&mut self, world: &mut World) -> EcsResult<FlushReport> {
        let mut report = FlushReport::default();
        let queue = std::mem::take(&mut self.queue);
        let total = queue.len();
        for command in queue {
            let kind = command.kind;
            match (command.action)(world) {
                Ok(()) => report.applied += 1,
                Err(error) if self.policy == FlushPolicy::SkipMissing && is_skippable(&error) => {
                    log::debug!("skipped {kind:?} command: {error}");
                    report.skipped += 1;
                }
                Err(error) => return Err(error),
            }
        }
        if total > 0 {
            log::trace!(
                "flushed {total} commands ({} applied, {} skipped)",
                report.applied,
                report.skipped
            );
        }
        Ok(report)
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("pending", &self.queue.len())
            .field("policy", &self.policy)
            .finish()
    }
}

/// A vanished target, not a program error: the dead-entity and
/// component-set preconditions commands routinely race against.
fn is_skippable(error: &WorldError) -> bool {
    matches!(
        error,
        WorldError::Stale(_) | WorldError::NotPresent(_) | WorldError::AlreadyPresent(_)
    )
}

type DeferredInsert =
    Box<dyn FnOnce(&World, &mut ComponentBundle) -> Result<(), RegistryError>>;

/// Builder for a deferred spawn.
///
/// Component ids resolve at flush time against the flushing world, so a
/// type registered after recording but before the flush still works.
/// Dropping the builder without calling [`EntityBuilder::record`] records
/// nothing.
#[must_use = "a deferred spawn does nothing until record() is called"]
pub struct EntityBuilder<'b> {
    buffer: &'b mut CommandBuffer,
    inserts: Vec<DeferredInsert>,
    name: Option<String>,
}

impl EntityBuilder<'_> {
    /// Adds a component value to the deferred spawn. Re-adding a type
    /// replaces the value.
    pub fn with<T: 'static>(mut self, value: T) -> Self {
        self.inserts.push(Box::new(move |world, bundle| {
            let component_id = world.registry().resolve::<T>()?;
            bundle.insert(component_id, value);
            Ok(())
        }));
        self
    }

    /// Names the entity-to-be.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Enqueues the spawn into the buffer.
    pub fn record(self) {
        let inserts = self.inserts;
        let name = self.name;
        self.buffer.queue.push(Command {
            kind: CommandKind::Spawn,
            action: Box::new(move |world| {
                let mut bundle = ComponentBundle::new();
                for insert in inserts {
                    insert(&*world, &mut bundle)?;
                }
                if let Some(name) = name {
                    bundle.set_name(name);
                }
                world.create_entity(bundle).map(|_| ())
            }),
        });
    }
}
