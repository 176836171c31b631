//! Typed component columns and their type-erased access surface.
//!
//! ## Purpose
//!
//! Every archetype stores one [`Column`] per component type: a homogeneous,
//! resizable array whose row indices line up across all columns of the table.
//! Archetypes and the world manipulate columns through the object-safe
//! [`AnyColumn`] trait so that structural operations (push, swap-remove,
//! cross-table row moves) need no compile-time knowledge of the element type.
//! The concrete `Column<T>` behind each `Box<dyn AnyColumn>` is produced by
//! the factory captured at component registration, which is the only place
//! the element type is ever named.
//!
//! ## Invariants
//!
//! - A column's element type never changes after construction.
//! - Rows are kept contiguous; removal is always swap-with-last.
//! - Erased insertions are type-checked before the column is touched, so a
//!   rejected value leaves the column unchanged.

use std::any::{Any, TypeId};

use crate::engine::error::{StorageError, TypeMismatchError};
use crate::engine::types::RowID;

/// Homogeneous storage for one component type within one archetype.
pub struct Column<T> {
    values: Vec<T>,
}

impl<T: 'static> Column<T> {
    /// Creates a column with room for `capacity` rows.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Number of rows stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the column holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Appends a value as the last row.
    #[inline]
    pub fn push(&mut self, value: T) {
        self.values.push(value);
    }

    /// Removes the row by swapping the last row into its place.
    pub fn swap_remove(&mut self, row: RowID) -> Result<T, StorageError> {
        let index = row as usize;
        if index >= self.values.len() {
            return Err(StorageError::RowOutOfBounds {
                row,
                length: self.values.len(),
            });
        }
        Ok(self.values.swap_remove(index))
    }

    /// Overwrites the row in place, returning the previous value.
    pub fn replace(&mut self, row: RowID, value: T) -> Result<T, StorageError> {
        let index = row as usize;
        match self.values.get_mut(index) {
            Some(slot) => Ok(std::mem::replace(slot, value)),
            None => Err(StorageError::RowOutOfBounds {
                row,
                length: self.values.len(),
            }),
        }
    }

    /// Shared reference to the value at `row`.
    #[inline]
    pub fn get(&self, row: RowID) -> Option<&T> {
        self.values.get(row as usize)
    }

    /// Mutable reference to the value at `row`.
    #[inline]
    pub fn get_mut(&mut self, row: RowID) -> Option<&mut T> {
        self.values.get_mut(row as usize)
    }

    /// All rows as a slice, row index preserved.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    /// All rows as a mutable slice, row index preserved.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Iterates over the stored values in row order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }
}

/// Unboxes an erased value, reporting the concrete type on mismatch.
pub(crate) fn downcast_boxed<T: 'static>(value: Box<dyn Any>) -> Result<T, TypeMismatchError> {
    match value.downcast::<T>() {
        Ok(boxed) => Ok(*boxed),
        Err(original) => Err(TypeMismatchError {
            expected: TypeId::of::<T>(),
            actual: original.as_ref().type_id(),
        }),
    }
}

/// Object-safe access to a [`Column`] of unknown element type.
///
/// ## Behavior
///
/// Structural operations take and return `Box<dyn Any>` values; each
/// implementation checks the concrete type against its element type before
/// mutating, so failures never leave a column half-changed. [`as_any`] /
/// [`as_any_mut`] expose the concrete `Column<T>` for typed iteration.
///
/// [`as_any`]: AnyColumn::as_any
/// [`as_any_mut`]: AnyColumn::as_any_mut
pub trait AnyColumn: Any {
    /// Number of rows stored.
    fn len(&self) -> usize;

    /// Returns `true` if the column holds no rows.
    fn is_empty(&self) -> bool;

    /// `TypeId` of the element type.
    fn element_type_id(&self) -> TypeId;

    /// Upcast for typed downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Appends an erased value as the last row.
    fn push_erased(&mut self, value: Box<dyn Any>) -> Result<(), TypeMismatchError>;

    /// Removes a row via swap-with-last, dropping its value.
    fn swap_remove_erased(&mut self, row: RowID) -> Result<(), StorageError>;

    /// Moves one row into `destination`, which must store the same element
    /// type. The row is swap-removed here and appended there.
    fn move_row_to(&mut self, row: RowID, destination: &mut dyn AnyColumn)
        -> Result<(), StorageError>;

    /// Erased shared reference to the value at `row`.
    fn get_erased(&self, row: RowID) -> Option<&dyn Any>;
}

impl<T: 'static> AnyColumn for Column<T> {
    fn len(&self) -> usize {
        Column::len(self)
    }

    fn is_empty(&self) -> bool {
        Column::is_empty(self)
    }

    fn element_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn push_erased(&mut self, value: Box<dyn Any>) -> Result<(), TypeMismatchError> {
        let value = downcast_boxed::<T>(value)?;
        self.values.push(value);
        Ok(())
    }

    fn swap_remove_erased(&mut self, row: RowID) -> Result<(), StorageError> {
        self.swap_remove(row).map(drop)
    }

    fn move_row_to(
        &mut self,
        row: RowID,
        destination: &mut dyn AnyColumn,
    ) -> Result<(), StorageError> {
        let destination_type = destination.element_type_id();
        let destination = destination
            .as_any_mut()
            .downcast_mut::<Column<T>>()
            .ok_or(StorageError::TypeMismatch(TypeMismatchError {
                expected: TypeId::of::<T>(),
                actual: destination_type,
            }))?;
        let value = self.swap_remove(row)?;
        destination.values.push(value);
        Ok(())
    }

    fn get_erased(&self, row: RowID) -> Option<&dyn Any> {
        self.values.get(row as usize).map(|value| value as &dyn Any)
    }
}
