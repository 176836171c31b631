//! # Queries
//!
//! Signature-filtered iteration over archetype storage.
//!
//! ## Execution model
//! A [`Query`] is a plain description: with/without component sets recorded
//! as `TypeId`s, no world borrow, no allocation. Execution resolves it
//! against a world:
//! 1. map each `TypeId` to its registered component id (an unregistered
//!    `with` type matches nothing, an unregistered `without` type excludes
//!    nothing),
//! 2. collect the archetypes whose signatures match,
//! 3. walk their rows.
//!
//! Matching is lazy and single-pass; nothing is materialised beyond the
//! list of matching table ids. Row order within a table and table order are
//! unspecified.
//!
//! ## Iteration vs. mutation
//! [`Query::iter`] borrows the world, so the borrow checker keeps iteration
//! and mutation apart at compile time. [`Query::cursor`] deliberately does
//! not: a [`QueryCursor`] is detached state that revalidates the world's
//! structure version on every step and fails with
//! `ConcurrentModification` once anything structural happened after its
//! creation. Value writes via `set_component` do not invalidate cursors.
//! The sanctioned pattern for structural work mid-iteration is recording
//! into a [`crate::CommandBuffer`] and flushing after.
//!
//! ## Example
//! ```ignore
//! let movers = world.query().with::<Position>().with::<Velocity>();
//! movers.for_each2_mut(&mut world, |_, vel: &Velocity, pos: &mut Position| {
//!     pos.x += vel.dx;
//!     pos.y += vel.dy;
//! })?;
//! ```

use std::any::TypeId;

use crate::engine::entity::Entity;
use crate::engine::error::{ConcurrentModificationError, EcsResult};
use crate::engine::types::{ArchetypeID, QuerySignature, RowID};
use crate::engine::world::World;

/// World-independent query description.
#[derive(Default, Clone)]
pub struct Query {
    with: Vec<TypeId>,
    without: Vec<TypeId>,
}

impl Query {
    /// Starts an empty query matching every entity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires component `T`.
    pub fn with<T: 'static>(mut self) -> Self {
        self.with.push(TypeId::of::<T>());
        self
    }

    /// Excludes entities carrying component `T`.
    pub fn without<T: 'static>(mut self) -> Self {
        self.without.push(TypeId::of::<T>());
        self
    }

    /// Resolves type ids against a world's registry. `None` means a `with`
    /// type is unregistered and the query cannot match anything.
    fn resolve(&self, world: &World) -> Option<QuerySignature> {
        let mut signature = QuerySignature::default();
        for type_id in &self.with {
            signature.with.set(world.registry().id_of_type_id(*type_id)?);
        }
        for type_id in &self.without {
            if let Some(component_id) = world.registry().id_of_type_id(*type_id) {
                signature.without.set(component_id);
            }
        }
        Some(signature)
    }

    fn matched(&self, world: &World) -> Vec<ArchetypeID> {
        match self.resolve(world) {
            Some(signature) => world.matching_archetypes(&signature),
            None => Vec::new(),
        }
    }

    /// Borrow-tied iterator over matching entities.
    pub fn iter<'w>(&self, world: &'w World) -> QueryIter<'w> {
        QueryIter {
            world,
            archetype_ids: self.matched(world),
            table: 0,
            row: 0,
        }
    }

    /// Detached cursor over matching entities, stamped with the current
    /// structure version.
    pub fn cursor(&self, world: &World) -> QueryCursor {
        QueryCursor {
            archetype_ids: self.matched(world),
            stamp: world.structure_version(),
            table: 0,
            row: 0,
        }
    }

    /// Number of matching entities right now.
    pub fn count(&self, world: &World) -> usize {
        self.matched(world)
            .into_iter()
            .map(|archetype_id| world.archetype(archetype_id).len())
            .sum()
    }

    /// Runs `f` over every match with a shared reference to its `T`.
    /// `T` is implicitly part of the `with` set.
    pub fn for_each<T, F>(&self, world: &World, mut f: F) -> EcsResult<()>
    where
        T: 'static,
        F: FnMut(Entity, &T),
    {
        let Some(component_id) = world.registry().id_of::<T>() else {
            return Ok(());
        };
        let Some(mut signature) = self.resolve(world) else {
            return Ok(());
        };
        signature.with.set(component_id);
        for archetype in world.archetypes_slice() {
            if !archetype.matches(&signature) {
                continue;
            }
            let (entities, values) = archetype.rows1::<T>(component_id)?;
            for (entity, value) in entities.iter().zip(values) {
                f(*entity, value);
            }
        }
        Ok(())
    }

    /// Runs `f` over every match with a mutable reference to its `T`.
    ///
    /// Writes through this path are bulk column access; they do not fire
    /// `ComponentChanged`.
    pub fn for_each_mut<T, F>(&self, world: &mut World, mut f: F) -> EcsResult<()>
    where
        T: 'static,
        F: FnMut(Entity, &mut T),
    {
        let Some(component_id) = world.registry().id_of::<T>() else {
            return Ok(());
        };
        let Some(mut signature) = self.resolve(world) else {
            return Ok(());
        };
        signature.with.set(component_id);
        let archetype_ids = world.matching_archetypes(&signature);
        for archetype_id in archetype_ids {
            let archetype = world.archetype_mut(archetype_id);
            let (entities, values) = archetype.rows1_mut::<T>(component_id)?;
            for (entity, value) in entities.iter().zip(values) {
                f(*entity, value);
            }
        }
        Ok(())
    }

    /// Runs `f` over every match with shared references to its `A` and `B`.
    pub fn for_each2<A, B, F>(&self, world: &World, mut f: F) -> EcsResult<()>
    where
        A: 'static,
        B: 'static,
        F: FnMut(Entity, &A, &B),
    {
        let (Some(id_a), Some(id_b)) =
            (world.registry().id_of::<A>(), world.registry().id_of::<B>())
        else {
            return Ok(());
        };
        let Some(mut signature) = self.resolve(world) else {
            return Ok(());
        };
        signature.with.set(id_a);
        signature.with.set(id_b);
        for archetype in world.archetypes_slice() {
            if !archetype.matches(&signature) {
                continue;
            }
            let (entities, a_values, b_values) = archetype.rows2::<A, B>(id_a, id_b)?;
            for ((entity, a), b) in entities.iter().zip(a_values).zip(b_values) {
                f(*entity, a, b);
            }
        }
        Ok(())
    }

    /// Runs `f` over every match with a shared `A` and a mutable `B`.
    /// `A` and `B` must be distinct component types.
    pub fn for_each2_mut<A, B, F>(&self, world: &mut World, mut f: F) -> EcsResult<()>
    where
        A: 'static,
        B: 'static,
        F: FnMut(Entity, &A, &mut B),
    {
        let (Some(id_a), Some(id_b)) =
            (world.registry().id_of::<A>(), world.registry().id_of::<B>())
        else {
            return Ok(());
        };
        let Some(mut signature) = self.resolve(world) else {
            return Ok(());
        };
        signature.with.set(id_a);
        signature.with.set(id_b);
        let archetype_ids = world.matching_archetypes(&signature);
        for archetype_id in archetype_ids {
            let archetype = world.archetype_mut(archetype_id);
            let (entities, a_values, b_values) = archetype.rows2_mut::<A, B>(id_a, id_b)?;
            for ((entity, a), b) in entities.iter().zip(a_values).zip(b_values.iter_mut()) {
                f(*entity, a, b);
            }
        }
        Ok(())
    }
}

/// Iterator over matching entities, borrowing the world for its lifetime.
///
/// The shared borrow rules out structural mutation while it lives, so no
/// version check is needed.
pub struct QueryIter<'w> {
    world: &'w World,
    archetype_ids: Vec<ArchetypeID>,
    table: usize,
    row: RowID,
}

impl Iterator for QueryIter<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        while let Some(&archetype_id) = self.archetype_ids.get(self.table) {
            if let Some(entity) = self.world.archetype(archetype_id).entity_at(self.row) {
                self.row += 1;
                return Some(entity);
            }
            self.table += 1;
            self.row = 0;
        }
        None
    }
}

/// Detached, single-pass cursor over the entities that matched at creation.
///
/// Holds no world borrow; instead every [`QueryCursor::next`] revalidates
/// the structure version stamped at creation and fails with
/// `ConcurrentModification` if anything structural happened since. Not
/// restartable.
pub struct QueryCursor {
    archetype_ids: Vec<ArchetypeID>,
    stamp: u64,
    table: usize,
    row: RowID,
}

impl QueryCursor {
    /// Advances to the next matching entity, or `Ok(None)` when exhausted.
    pub fn next(&mut self, world: &World) -> EcsResult<Option<Entity>> {
        let observed = world.structure_version();
        if observed != self.stamp {
            return Err(ConcurrentModificationError {
                expected: self.stamp,
                observed,
            }
            .into());
        }
        while let Some(&archetype_id) = self.archetype_ids.get(self.table) {
            if let Some(entity) = world.archetype(archetype_id).entity_at(self.row) {
                self.row += 1;
                return Ok(Some(entity));
            }
            self.table += 1;
            self.row = 0;
        }
        Ok(None)
    }

    /// Structure version this cursor was stamped with.
    #[inline]
    pub fn stamp(&self) -> u64 {
        self.stamp
    }
}
