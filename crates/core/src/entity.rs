//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Identity is assigned by the store on first persist, so an entity that only
/// lives in memory has no identifier yet.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Human-readable entity kind, used in error messages.
    const KIND: &'static str;

    /// Returns the store-assigned identifier, if the entity has been persisted.
    fn id(&self) -> Option<Self::Id>;

    fn is_persisted(&self) -> bool {
        self.id().is_some()
    }
}
