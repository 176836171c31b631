//! # Archetype Tables
//!
//! Column-major storage for every entity sharing one exact component
//! signature, plus the row moves that carry an entity between tables when
//! its signature changes.
//!
//! ## Design
//! - One [`Archetype`] per distinct signature, created lazily on first use.
//! - Columns are kept sorted by [`ComponentID`] and found by binary search;
//!   tables are narrow enough that this beats a map.
//! - Rows are densely packed. Removal swaps the last row into the gap, so
//!   exactly one surviving entity changes row per removal and the caller
//!   patches its recorded location.
//! - `edges_add` / `edges_remove` memoise "this signature plus/minus one
//!   component" so steady-state migrations skip the signature map.
//!
//! ## Invariants
//! - Every column has exactly `entities.len()` rows; row `i` of every
//!   column belongs to `entities[i]`.
//! - A value is either fully inserted into every column or into none.
//!   Erased pushes are type-checked against every column before the first
//!   column is touched.

use std::any::Any;
use std::collections::HashMap;

use crate::engine::component::ComponentRegistry;
use crate::engine::entity::Entity;
use crate::engine::error::{RegistryError, StorageError, WorldError};
use crate::engine::storage::{AnyColumn, Column};
use crate::engine::types::{ArchetypeID, ComponentID, QuerySignature, RowID, Signature};

/// One table of entities with an identical component set.
pub struct Archetype {
    id: ArchetypeID,
    signature: Signature,
    columns: Vec<(ComponentID, Box<dyn AnyColumn>)>,
    entities: Vec<Entity>,
    edges_add: HashMap<ComponentID, ArchetypeID>,
    edges_remove: HashMap<ComponentID, ArchetypeID>,
}

impl Archetype {
    /// Builds an empty table for `signature`, one column per set bit,
    /// using the registry's captured column factories.
    pub(crate) fn new(
        id: ArchetypeID,
        signature: &Signature,
        registry: &ComponentRegistry,
    ) -> Result<Self, RegistryError> {
        let mut columns = Vec::with_capacity(signature.count());
        for component_id in signature.iterate_over_components() {
            let desc = registry.desc(component_id)?;
            columns.push((component_id, desc.new_column(0)));
        }
        Ok(Self {
            id,
            signature: *signature,
            columns,
            entities: Vec::new(),
            edges_add: HashMap::new(),
            edges_remove: HashMap::new(),
        })
    }

    /// The zero-column table every bare entity lives in. Table 0 in every
    /// world, so a default [`crate::engine::entity::EntityLocation`] is
    /// always addressable.
    pub(crate) fn empty(id: ArchetypeID) -> Self {
        Self {
            id,
            signature: Signature::default(),
            columns: Vec::new(),
            entities: Vec::new(),
            edges_add: HashMap::new(),
            edges_remove: HashMap::new(),
        }
    }

    /// Table id.
    #[inline]
    pub fn id(&self) -> ArchetypeID {
        self.id
    }

    /// The exact component set stored here.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Number of rows (entities) in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if the table holds no entities.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in row order.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Entity occupying `row`, if in bounds.
    #[inline]
    pub fn entity_at(&self, row: RowID) -> Option<Entity> {
        self.entities.get(row as usize).copied()
    }

    /// Returns `true` if this table satisfies a query's with/without sets.
    #[inline]
    pub fn matches(&self, query: &QuerySignature) -> bool {
        query.matches(&self.signature)
    }

    fn column_index(&self, component_id: ComponentID) -> Option<usize> {
        self.columns
            .binary_search_by_key(&component_id, |(id, _)| *id)
            .ok()
    }

    fn column(&self, component_id: ComponentID) -> Result<&dyn AnyColumn, StorageError> {
        self.column_index(component_id)
            .map(|i| self.columns[i].1.as_ref())
            .ok_or(StorageError::MissingColumn { component_id })
    }

    fn column_mut(
        &mut self,
        component_id: ComponentID,
    ) -> Result<&mut Box<dyn AnyColumn>, StorageError> {
        match self.column_index(component_id) {
            Some(i) => Ok(&mut self.columns[i].1),
            None => Err(StorageError::MissingColumn { component_id }),
        }
    }

    /// Typed view of one column.
    pub(crate) fn typed_column<T: 'static>(
        &self,
        component_id: ComponentID,
    ) -> Result<&Column<T>, StorageError> {
        let column = self.column(component_id)?;
        column
            .as_any()
            .downcast_ref::<Column<T>>()
            .ok_or(StorageError::TypeMismatch(
                crate::engine::error::TypeMismatchError {
                    expected: std::any::TypeId::of::<T>(),
                    actual: column.element_type_id(),
                },
            ))
    }

    /// Typed mutable view of one column.
    pub(crate) fn typed_column_mut<T: 'static>(
        &mut self,
        component_id: ComponentID,
    ) -> Result<&mut Column<T>, StorageError> {
        let element_type = self.column(component_id)?.element_type_id();
        let column = self.column_mut(component_id)?;
        column
            .as_any_mut()
            .downcast_mut::<Column<T>>()
            .ok_or(StorageError::TypeMismatch(
                crate::engine::error::TypeMismatchError {
                    expected: std::any::TypeId::of::<T>(),
                    actual: element_type,
                },
            ))
    }

    /// Shared reference to one value.
    pub(crate) fn get<T: 'static>(
        &self,
        component_id: ComponentID,
        row: RowID,
    ) -> Result<Option<&T>, StorageError> {
        Ok(self.typed_column::<T>(component_id)?.get(row))
    }

    /// Mutable reference to one value.
    pub(crate) fn get_mut<T: 'static>(
        &mut self,
        component_id: ComponentID,
        row: RowID,
    ) -> Result<Option<&mut T>, StorageError> {
        Ok(self.typed_column_mut::<T>(component_id)?.get_mut(row))
    }

    /// Erased shared reference to one value, for event payloads and codecs.
    pub(crate) fn get_erased(
        &self,
        component_id: ComponentID,
        row: RowID,
    ) -> Result<Option<&dyn Any>, StorageError> {
        Ok(self.column(component_id)?.get_erased(row))
    }

    /// Appends a full row. `values` must be sorted by component id and
    /// cover this signature exactly.
    ///
    /// All value types are checked against their columns before anything is
    /// pushed, so a mismatch leaves the table untouched.
    pub(crate) fn push_row(
        &mut self,
        entity: Entity,
        values: Vec<(ComponentID, Box<dyn Any>)>,
    ) -> Result<RowID, WorldError> {
        if values.len() != self.columns.len() {
            return Err(StorageError::RowMisalignment {
                expected: self.columns.len(),
                got: values.len(),
                component_id: values.first().map(|(id, _)| *id).unwrap_or(0),
            }
            .into());
        }
        for (slot, (component_id, value)) in values.iter().enumerate() {
            let (column_id, column) = &self.columns[slot];
            if *column_id != *component_id {
                return Err(StorageError::MissingColumn {
                    component_id: *component_id,
                }
                .into());
            }
            if value.as_ref().type_id() != column.element_type_id() {
                return Err(StorageError::TypeMismatch(
                    crate::engine::error::TypeMismatchError {
                        expected: column.element_type_id(),
                        actual: value.as_ref().type_id(),
                    },
                )
                .into());
            }
        }

        let row = self.entities.len() as RowID;
        for (slot, (_, value)) in values.into_iter().enumerate() {
            // Cannot fail: types were checked above.
            self.columns[slot]
                .1
                .push_erased(value)
                .map_err(StorageError::TypeMismatch)?;
        }
        self.entities.push(entity);
        Ok(row)
    }

    /// Removes `row` from every column, swapping the last row into the gap.
    /// Returns the entity that moved into `row`, if any.
    pub(crate) fn swap_remove_row(&mut self, row: RowID) -> Result<Option<Entity>, StorageError> {
        let length = self.entities.len();
        if row as usize >= length {
            return Err(StorageError::RowOutOfBounds { row, length });
        }
        for (_, column) in &mut self.columns {
            column.swap_remove_erased(row)?;
        }
        self.entities.swap_remove(row as usize);
        let moved = if (row as usize) < self.entities.len() {
            Some(self.entities[row as usize])
        } else {
            None
        };
        Ok(moved)
    }

    /// Moves `row` into `target`, carrying shared columns across and
    /// optionally appending one extra value the source does not store.
    ///
    /// Used for both add (carry = the new component) and remove (carry =
    /// `None`, the dropped column simply is not copied). Returns the row
    /// assigned in `target` and the source entity that back-filled `row`.
    pub(crate) fn move_row_to(
        &mut self,
        row: RowID,
        target: &mut Archetype,
        carry: Option<(ComponentID, Box<dyn Any>)>,
    ) -> Result<(RowID, Option<Entity>), WorldError> {
        let length = self.entities.len();
        if row as usize >= length {
            return Err(StorageError::RowOutOfBounds { row, length }.into());
        }
        if let Some((component_id, value)) = &carry {
            let column = target.column(*component_id)?;
            if value.as_ref().type_id() != column.element_type_id() {
                return Err(StorageError::TypeMismatch(
                    crate::engine::error::TypeMismatchError {
                        expected: column.element_type_id(),
                        actual: value.as_ref().type_id(),
                    },
                )
                .into());
            }
        }

        let entity = self.entities[row as usize];
        let target_row = target.entities.len() as RowID;
        for (component_id, column) in &mut self.columns {
            if !target.signature.has(*component_id) {
                // Dropped component: value is discarded with the swap below.
                continue;
            }
            let destination = target.column_mut(*component_id)?;
            column.move_row_to(row, destination.as_mut())?;
        }
        if let Some((component_id, value)) = carry {
            // Checked above; the shared columns are already appended, so a
            // failure here would tear the row. The pre-check prevents it.
            target
                .column_mut(component_id)?
                .push_erased(value)
                .map_err(StorageError::TypeMismatch)?;
        }
        target.entities.push(entity);

        // Compact the source. Shared columns already lost row `row` via
        // move_row_to's internal swap_remove; dropped columns still hold it.
        for (component_id, column) in &mut self.columns {
            if !target.signature.has(*component_id) {
                column.swap_remove_erased(row)?;
            }
        }
        self.entities.swap_remove(row as usize);
        let moved = if (row as usize) < self.entities.len() {
            Some(self.entities[row as usize])
        } else {
            None
        };
        Ok((target_row, moved))
    }

    /// Memoised destination for "this signature plus `component_id`".
    #[inline]
    pub(crate) fn edge_add(&self, component_id: ComponentID) -> Option<ArchetypeID> {
        self.edges_add.get(&component_id).copied()
    }

    /// Memoised destination for "this signature minus `component_id`".
    #[inline]
    pub(crate) fn edge_remove(&self, component_id: ComponentID) -> Option<ArchetypeID> {
        self.edges_remove.get(&component_id).copied()
    }

    #[inline]
    pub(crate) fn set_edge_add(&mut self, component_id: ComponentID, target: ArchetypeID) {
        self.edges_add.insert(component_id, target);
    }

    #[inline]
    pub(crate) fn set_edge_remove(&mut self, component_id: ComponentID, target: ArchetypeID) {
        self.edges_remove.insert(component_id, target);
    }

    /// Entity slice alongside one component column, for read iteration.
    pub(crate) fn rows1<T: 'static>(
        &self,
        component_id: ComponentID,
    ) -> Result<(&[Entity], &[T]), StorageError> {
        let column = self.typed_column::<T>(component_id)?;
        Ok((&self.entities, column.as_slice()))
    }

    /// Entity slice alongside one mutable component column.
    pub(crate) fn rows1_mut<T: 'static>(
        &mut self,
        component_id: ComponentID,
    ) -> Result<(&[Entity], &mut [T]), StorageError> {
        let index = self
            .column_index(component_id)
            .ok_or(StorageError::MissingColumn { component_id })?;
        let element_type = self.columns[index].1.element_type_id();
        let entities = &self.entities;
        let column = self.columns[index]
            .1
            .as_any_mut()
            .downcast_mut::<Column<T>>()
            .ok_or(StorageError::TypeMismatch(
                crate::engine::error::TypeMismatchError {
                    expected: std::any::TypeId::of::<T>(),
                    actual: element_type,
                },
            ))?;
        Ok((entities, column.as_mut_slice()))
    }

    /// Entity slice alongside two component columns, for paired reads.
    pub(crate) fn rows2<A: 'static, B: 'static>(
        &self,
        id_a: ComponentID,
        id_b: ComponentID,
    ) -> Result<(&[Entity], &[A], &[B]), StorageError> {
        let a = self.typed_column::<A>(id_a)?.as_slice();
        let b = self.typed_column::<B>(id_b)?.as_slice();
        Ok((&self.entities, a, b))
    }

    /// Entity slice alongside one shared and one mutable column.
    ///
    /// The two columns must be distinct; requesting the same id both ways
    /// is an aliasing error.
    pub(crate) fn rows2_mut<A: 'static, B: 'static>(
        &mut self,
        id_a: ComponentID,
        id_b: ComponentID,
    ) -> Result<(&[Entity], &[A], &mut [B]), StorageError> {
        if id_a == id_b {
            return Err(StorageError::AliasedColumn { component_id: id_a });
        }
        let index_a = self
            .column_index(id_a)
            .ok_or(StorageError::MissingColumn { component_id: id_a })?;
        let index_b = self
            .column_index(id_b)
            .ok_or(StorageError::MissingColumn { component_id: id_b })?;
        let type_a = self.columns[index_a].1.element_type_id();
        let type_b = self.columns[index_b].1.element_type_id();

        let entities = &self.entities;
        // Columns are sorted by id, so distinct ids give distinct indices;
        // split_at_mut materialises the disjointness for the borrow checker.
        let (column_a, column_b): (&dyn AnyColumn, &mut dyn AnyColumn) = if index_a < index_b {
            let (low, high) = self.columns.split_at_mut(index_b);
            (low[index_a].1.as_ref(), high[0].1.as_mut())
        } else {
            let (low, high) = self.columns.split_at_mut(index_a);
            (high[0].1.as_ref(), low[index_b].1.as_mut())
        };
        let a = column_a
            .as_any()
            .downcast_ref::<Column<A>>()
            .ok_or(StorageError::TypeMismatch(
                crate::engine::error::TypeMismatchError {
                    expected: std::any::TypeId::of::<A>(),
                    actual: type_a,
                },
            ))?;
        let b = column_b
            .as_any_mut()
            .downcast_mut::<Column<B>>()
            .ok_or(StorageError::TypeMismatch(
                crate::engine::error::TypeMismatchError {
                    expected: std::any::TypeId::of::<B>(),
                    actual: type_b,
                },
            ))?;
        Ok((entities, a.as_slice(), b.as_mut_slice()))
    }
}
