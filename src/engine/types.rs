//! Core identifiers, bit-level layouts, and component signatures.
//!
//! This module defines the **fundamental types, identifiers, and bit layouts**
//! shared by every subsystem of the runtime: entity handles, component ids,
//! archetype ids, and the fixed-size bitsets that describe component sets.
//!
//! ## Design
//!
//! The runtime is built around:
//!
//! - **Dense column storage** addressed by small numeric ids,
//! - **Bitset signatures** for archetype identity and query matching,
//! - **Stable integer identifiers** captured once at registration.
//!
//! ## Entity Representation
//!
//! Entities are packed into a single 64-bit integer:
//!
//! ```text
//! | generation | index |
//! ```
//!
//! - **Index** identifies the slot in the entity registry. Slots are reused
//!   after destruction.
//! - **Generation** is bumped every time a slot is freed, so handles held
//!   across a destroy are detectably stale.
//!
//! Bit widths are compile-time constants validated by static assertions.
//!
//! ## Signatures
//!
//! A [`Signature`] is a fixed `[u64; SIGNATURE_SIZE]` bitset with one bit per
//! registered component type. Signatures identify archetypes, key the
//! archetype map, and drive query matching ([`QuerySignature`]). All
//! operations are word-wise and allocation-free.
//!
//! ## Bundles
//!
//! A [`ComponentBundle`] groups heterogeneous, type-erased component values
//! for spawning. Bundles trade compile-time typing for flexibility and stay
//! out of hot iteration paths.

use std::any::Any;

/// Bit-width type used for compile-time layout calculations.
pub type Bits = u8;

/// Globally unique entity identifier encoded as a packed 64-bit value.
pub type EntityID = u64;
/// Index of an entity slot within the registry.
pub type IndexID = u32;
/// Generation counter used to detect stale entity handles.
pub type GenerationID = u32;
/// Count of live entities.
pub type EntityCount = u32;

/// Unique identifier for a component type.
pub type ComponentID = u16;
/// Unique identifier for an archetype.
pub type ArchetypeID = u16;
/// Row index within an archetype table.
pub type RowID = u32;
/// Identifier assigned to a scheduled system.
pub type SystemID = u32;

/// Total number of bits in an [`EntityID`].
pub const ENTITY_BITS: Bits = 64;
/// Number of bits reserved for the slot index.
pub const INDEX_BITS: Bits = 32;
/// Number of bits reserved for the generation counter.
pub const GENERATION_BITS: Bits = ENTITY_BITS - INDEX_BITS;

const _: [(); 1] = [(); (INDEX_BITS > 0) as usize];
const _: [(); 1] = [(); (GENERATION_BITS > 0) as usize];
const _: [(); 1] = [(); (INDEX_BITS as u32 + GENERATION_BITS as u32 == ENTITY_BITS as u32) as usize];

const fn mask(bits: Bits) -> EntityID {
    if bits == 0 { 0 } else { ((1 as EntityID) << bits) - 1 }
}

/// Mask selecting the index portion of an [`EntityID`].
pub const INDEX_MASK: EntityID = mask(INDEX_BITS);
/// Mask selecting the generation portion of a shifted [`EntityID`].
pub const GENERATION_MASK: EntityID = mask(GENERATION_BITS);
/// Maximum representable slot index.
pub const INDEX_CAP: IndexID = INDEX_MASK as IndexID;

/// Maximum number of registered component types.
pub const COMPONENT_CAP: usize = 4096;
/// Number of `u64` words required to represent a full component signature.
pub const SIGNATURE_SIZE: usize = (COMPONENT_CAP + 63) / 64;

const _: [(); 1] = [(); (COMPONENT_CAP <= ComponentID::MAX as usize + 1) as usize];

/// Bitset representing a set of component types.
#[derive(Clone, Copy, Debug)]
pub struct Signature {
    /// Packed component bitset.
    pub components: [u64; SIGNATURE_SIZE],
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            components: [0u64; SIGNATURE_SIZE],
        }
    }
}

impl Signature {
    /// Sets the bit corresponding to `component_id`.
    #[inline]
    pub fn set(&mut self, component_id: ComponentID) {
        let index = (component_id as usize) / 64;
        let bits = (component_id as usize) % 64;
        self.components[index] |= 1u64 << bits;
    }

    /// Clears the bit corresponding to `component_id`.
    #[inline]
    pub fn clear(&mut self, component_id: ComponentID) {
        let index = (component_id as usize) / 64;
        let bits = (component_id as usize) % 64;
        self.components[index] &= !(1u64 << bits);
    }

    /// Returns `true` if `component_id` is present in this signature.
    #[inline]
    pub fn has(&self, component_id: ComponentID) -> bool {
        let index = (component_id as usize) / 64;
        let bits = (component_id as usize) % 64;
        (self.components[index] >> bits) & 1 == 1
    }

    /// Returns `true` if all components in `signature` are present.
    #[inline]
    pub fn contains_all(&self, signature: &Signature) -> bool {
        for (word_a, word_b) in self.components.iter().zip(signature.components.iter()) {
            if (word_a & word_b) != *word_b {
                return false;
            }
        }
        true
    }

    /// Returns `true` if no component is shared with `signature`.
    #[inline]
    pub fn is_disjoint_with(&self, signature: &Signature) -> bool {
        self.components
            .iter()
            .zip(signature.components.iter())
            .all(|(word_a, word_b)| (word_a & word_b) == 0)
    }

    /// Returns `true` if no component bit is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.components.iter().all(|&word| word == 0)
    }

    /// Number of component bits set.
    #[inline]
    pub fn count(&self) -> usize {
        self.components
            .iter()
            .map(|word| word.count_ones() as usize)
            .sum()
    }

    /// Iterates over all component IDs set in this signature, ascending.
    pub fn iterate_over_components(&self) -> impl Iterator<Item = ComponentID> + '_ {
        self.components
            .iter()
            .enumerate()
            .flat_map(|(word_index, &word)| {
                let base = word_index * 64;
                let mut bits = word;
                std::iter::from_fn(move || {
                    if bits == 0 {
                        return None;
                    }
                    let tz = bits.trailing_zeros() as usize;
                    bits &= bits - 1;
                    Some((base + tz) as ComponentID)
                })
            })
    }
}

/// Builds a component signature from a list of component IDs.
pub fn build_signature(component_ids: &[ComponentID]) -> Signature {
    let mut signature = Signature::default();
    for &component_id in component_ids {
        signature.set(component_id);
    }
    signature
}

/// With/without filter pair used for query matching.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuerySignature {
    /// Components an archetype must contain.
    pub with: Signature,

    /// Components an archetype must not contain.
    pub without: Signature,
}

impl QuerySignature {
    /// Returns `true` if an archetype signature satisfies this query:
    /// a superset of `with` and disjoint from `without`.
    #[inline]
    pub fn matches(&self, archetype_signature: &Signature) -> bool {
        archetype_signature.contains_all(&self.with)
            && archetype_signature.is_disjoint_with(&self.without)
    }
}

/// Type-erased group of component values used when spawning an entity.
///
/// Values are keyed by [`ComponentID`]; inserting the same id twice keeps the
/// last value. An optional name travels with the bundle and is delivered to
/// `EntityCreated` handlers.
pub struct ComponentBundle {
    signature: Signature,
    values: Vec<(ComponentID, Box<dyn Any>)>,
    name: Option<String>,
}

impl ComponentBundle {
    /// Creates an empty bundle.
    #[inline]
    pub fn new() -> Self {
        Self {
            signature: Signature::default(),
            values: Vec::new(),
            name: None,
        }
    }

    /// Inserts a component value. A value already stored under
    /// `component_id` is replaced.
    pub fn insert<T: Any>(&mut self, component_id: ComponentID, value: T) {
        self.insert_boxed(component_id, Box::new(value));
    }

    /// Inserts an already type-erased component value.
    pub fn insert_boxed(&mut self, component_id: ComponentID, value: Box<dyn Any>) {
        if self.signature.has(component_id) {
            for slot in &mut self.values {
                if slot.0 == component_id {
                    slot.1 = value;
                    return;
                }
            }
        }
        self.signature.set(component_id);
        self.values.push((component_id, value));
    }

    /// Attaches a name delivered with the `EntityCreated` event.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Name attached to this bundle, if any.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Removes and returns the value stored under `component_id`.
    pub fn take(&mut self, component_id: ComponentID) -> Option<Box<dyn Any>> {
        let index = self
            .values
            .iter()
            .position(|(cid, _)| *cid == component_id)?;
        self.signature.clear(component_id);
        let (_, value) = self.values.swap_remove(index);
        Some(value)
    }

    /// Signature of the components present in this bundle.
    #[inline]
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Number of component values stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no component values are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the bundle, yielding its name and values.
    pub(crate) fn into_parts(self) -> (Option<String>, Vec<(ComponentID, Box<dyn Any>)>) {
        (self.name, self.values)
    }
}

impl Default for ComponentBundle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_bits_round_trip_across_word_boundaries() {
        let mut signature = Signature::default();
        for component_id in [0, 63, 64, 127, (COMPONENT_CAP - 1) as ComponentID] {
            assert!(!signature.has(component_id));
            signature.set(component_id);
            assert!(signature.has(component_id));
        }
        assert_eq!(signature.count(), 5);
        let collected: Vec<_> = signature.iterate_over_components().collect();
        assert_eq!(collected, vec![0, 63, 64, 127, (COMPONENT_CAP - 1) as ComponentID]);

        signature.clear(64);
        assert!(!signature.has(64));
        assert_eq!(signature.count(), 4);
    }

    #[test]
    fn query_matching_requires_subset_and_disjointness() {
        let archetype = build_signature(&[1, 2, 3]);
        let matching = QuerySignature {
            with: build_signature(&[1, 3]),
            without: build_signature(&[9]),
        };
        let missing_with = QuerySignature {
            with: build_signature(&[1, 4]),
            without: Signature::default(),
        };
        let overlapping_without = QuerySignature {
            with: build_signature(&[1]),
            without: build_signature(&[2]),
        };
        assert!(matching.matches(&archetype));
        assert!(!missing_with.matches(&archetype));
        assert!(!overlapping_without.matches(&archetype));

        // The empty query matches every archetype, including the empty one.
        assert!(QuerySignature::default().matches(&archetype));
        assert!(QuerySignature::default().matches(&Signature::default()));
    }

    #[test]
    fn bundle_keeps_the_last_value_per_component() {
        let mut bundle = ComponentBundle::new();
        assert!(bundle.is_empty());
        bundle.insert(3, 1u32);
        bundle.insert(3, 2u32);
        bundle.insert(5, 9i64);
        assert_eq!(bundle.len(), 2);
        assert!(bundle.signature().has(3));

        let value = bundle.take(3).unwrap();
        assert_eq!(*value.downcast::<u32>().unwrap(), 2);
        assert!(!bundle.signature().has(3));
        assert!(bundle.take(3).is_none());
    }

    #[test]
    fn bundle_names_travel_with_the_values() {
        let mut bundle = ComponentBundle::new();
        assert_eq!(bundle.name(), None);
        bundle.set_name("pilot");
        assert_eq!(bundle.name(), Some("pilot"));
    }
}
