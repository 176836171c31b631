//! # Systems and Schedule
//!
//! The sequential execution layer: a [`System`] is a named unit of logic
//! run against the world each tick, a [`Schedule`] owns an ordered set of
//! systems and the command buffer their deferred mutations flow through.
//!
//! ## Execution model
//! Three fixed phases run in order every tick: `First`, `Update`, `Last`.
//! Within a phase, systems run in insertion order. Each system receives
//! `&mut World` and the schedule's [`CommandBuffer`]; after every system
//! the buffer is flushed, so a system observes the structural effects of
//! the systems before it.
//!
//! ## Failure
//! A system returning `Err` aborts the tick: its recorded commands are
//! discarded, later systems do not run, and the error propagates from
//! [`Schedule::run`].
//!
//! ## Function-backed systems
//! Most logic needs no named type; [`Schedule::add_fn`] wraps a closure
//! in [`FnSystem`].

use crate::engine::commands::CommandBuffer;
use crate::engine::error::EcsResult;
use crate::engine::types::SystemID;
use crate::engine::world::World;

/// A named unit of per-tick logic.
pub trait System {
    /// Stable display name, used in logs.
    fn name(&self) -> &str;

    /// Runs one tick. Structural changes go through `commands`; the
    /// schedule flushes them when this returns.
    fn run(&mut self, world: &mut World, commands: &mut CommandBuffer) -> EcsResult<()>;
}

/// Closure-backed [`System`].
pub struct FnSystem<F> {
    name: String,
    body: F,
}

impl<F> FnSystem<F>
where
    F: FnMut(&mut World, &mut CommandBuffer) -> EcsResult<()>,
{
    /// Wraps a closure as a named system.
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut World, &mut CommandBuffer) -> EcsResult<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, world: &mut World, commands: &mut CommandBuffer) -> EcsResult<()> {
        (self.body)(world, commands)
    }
}

/// When in the tick a system runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Before the main update (input, ingestion).
    First,
    /// The main body of the tick.
    Update,
    /// After the main update (cleanup, bookkeeping).
    Last,
}

struct Entry {
    id: SystemID,
    phase: Phase,
    system: Box<dyn System>,
}

/// Ordered system list plus the tick's command buffer.
pub struct Schedule {
    entries: Vec<Entry>,
    commands: CommandBuffer,
    next_id: SystemID,
}

impl Schedule {
    /// Creates an empty schedule with a default command buffer.
    pub fn new() -> Self {
        Self::with_commands(CommandBuffer::new())
    }

    /// Creates an empty schedule flushing through `commands`, for a
    /// non-default [`crate::FlushPolicy`].
    pub fn with_commands(commands: CommandBuffer) -> Self {
        Self {
            entries: Vec::new(),
            commands,
            next_id: 0,
        }
    }

    /// Adds a system to a phase, after everything already in that phase.
    /// Returns the id used to remove it.
    pub fn add_system<S: System + 'static>(&mut self, phase: Phase, system: S) -> SystemID {
        let id = self.next_id;
        self.next_id += 1;
        let position = self
            .entries
            .iter()
            .position(|entry| entry.phase > phase)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            position,
            Entry {
                id,
                phase,
                system: Box::new(system),
            },
        );
        id
    }

    /// Adds a closure-backed system.
    pub fn add_fn<F>(&mut self, phase: Phase, name: impl Into<String>, body: F) -> SystemID
    where
        F: FnMut(&mut World, &mut CommandBuffer) -> EcsResult<()> + 'static,
    {
        self.add_system(phase, FnSystem::new(name, body))
    }

    /// Removes a system by id. `false` if it was not present.
    pub fn remove_system(&mut self, id: SystemID) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Number of scheduled systems.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no systems are scheduled.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs one tick: every system in phase order then insertion order,
    /// flushing the command buffer after each.
    ///
    /// On failure the failing system's pending commands are discarded and
    /// the tick aborts.
    pub fn run(&mut self, world: &mut World) -> EcsResult<()> {
        for entry in &mut self.entries {
            if let Err(error) = entry.system.run(world, &mut self.commands) {
                log::error!("system {} failed: {error}", entry.system.name());
                self.commands.clear();
                return Err(error);
            }
            self.commands.flush(world)?;
        }
        Ok(())
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}
