use std::any::Any;

use utils::{BlockVec, PageRef, PageRefMut};

use crate::component::Component;

/// Storage for every live instance of one component type `T`, indexed
/// directly by entity id (spec §4.2).
///
/// The `BlockVec` already gives us the paged, lazily-(de)allocated slot
/// layout the spec asks for, with its own per-page dynamic borrow checking;
/// `ComponentPool` just adds the type-erased `AnyPool` surface `World`
/// needs to drive `destroyEntity` across every registered pool uniformly.
/// Because `BlockVec`'s locking is per-page rather than pool-wide, a
/// structural change to one entity's slot (`add`/`remove`) never contends
/// with a view already held over a *different* page of the same pool — in
/// particular, a system dispatched with access to `T` that creates a new
/// entity and gives it a `T` does not conflict with its own in-flight
/// iteration (spec §8 end-to-end scenario 5).
pub struct ComponentPool<T: Component> {
    slots: BlockVec<T>,
}

impl<T: Component> ComponentPool<T> {
    pub fn new() -> Self {
        Self { slots: BlockVec::new(T::BLOCK_SIZE) }
    }

    /// Constructs `value` in entity `e`'s slot. Panics if the slot is
    /// already occupied (spec §4.2: "Fails (assertion) if slot is already
    /// occupied").
    pub fn add(&self, e: usize, value: T) -> ComponentRefMut<'_, T> {
        assert!(!self.slots.contains(e), "component already present for entity {}", e);
        self.slots.insert(e, value);
        self.get_mut(e)
    }

    pub fn has(&self, e: usize) -> bool {
        self.slots.contains(e)
    }

    /// Borrows a read guard to entity `e`'s component. Panics if the slot
    /// is not occupied (spec §4.2: "requires the slot occupied").
    pub fn get(&self, e: usize) -> ComponentRef<'_, T> {
        let inner = self.slots.get(e).unwrap_or_else(|| panic!("no component to read for entity {}", e));
        ComponentRef { inner }
    }

    /// Borrows a mutable guard to entity `e`'s component. Panics if the
    /// slot is not occupied.
    pub fn get_mut(&self, e: usize) -> ComponentRefMut<'_, T> {
        let inner = self.slots.get_mut(e).unwrap_or_else(|| panic!("no component to read for entity {}", e));
        ComponentRefMut { inner }
    }

    /// Destroys the instance in `e`'s slot in place. Panics if the slot is
    /// not occupied (spec §4.2: "requires the slot occupied").
    pub fn remove(&self, e: usize) {
        assert!(self.slots.contains(e), "no component to remove for entity {}", e);
        self.slots.remove(e);
    }

    /// True iff some block has at least one occupied slot — used by tests
    /// exercising invariant 7 (pool block storage allocated iff occupied).
    pub fn any_block_allocated(&self) -> bool {
        (0..self.slots.block_count()).any(|b| self.slots.is_block_allocated(b))
    }

    /// Fetches entity `e`'s component without holding any lock across the
    /// call. Used exclusively by `Access::get` during system dispatch.
    ///
    /// # Safety
    ///
    /// See `utils::BlockVec::get_racy`.
    pub(crate) unsafe fn get_racy(&self, e: usize) -> Option<&mut T> {
        self.slots.get_racy(e)
    }
}

/// A read guard to one entity's component, borrowed out of the pool's
/// underlying page. Dereferences to `&T`.
pub struct ComponentRef<'w, T: Component> {
    inner: PageRef<'w, T>,
}

impl<'w, T: Component> std::ops::Deref for ComponentRef<'w, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner
    }
}

/// A mutable guard to one entity's component. Dereferences to `&T`/`&mut T`.
pub struct ComponentRefMut<'w, T: Component> {
    inner: PageRefMut<'w, T>,
}

impl<'w, T: Component> std::ops::Deref for ComponentRefMut<'w, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<'w, T: Component> std::ops::DerefMut for ComponentRefMut<'w, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

/// The type-erased operation every pool must support so `World` can iterate
/// "every pool whose bit is set in this entity's mask" without knowing `T`
/// (spec §9: "Component pools as polymorphic collection").
pub trait AnyPool: Any + Send + Sync {
    fn remove_erased(&self, e: usize);
    fn has_erased(&self, e: usize) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Component> AnyPool for ComponentPool<T> {
    fn remove_erased(&self, e: usize) {
        self.remove(e);
    }

    fn has_erased(&self, e: usize) -> bool {
        self.has(e)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Downcasts a type-erased pool back to `ComponentPool<T>`. Safety of the
/// cast is guaranteed by the id-to-type mapping in `component::component_id`:
/// the slot at a given `ComponentId` in `World`'s pool array is only ever
/// populated with a `ComponentPool<T>` for the `T` that owns that id.
pub fn downcast_pool<T: Component>(pool: &dyn AnyPool) -> &ComponentPool<T> {
    pool.as_any()
        .downcast_ref::<ComponentPool<T>>()
        .expect("component pool type mismatch — id/type mapping is corrupt")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Position {
        x: f32,
    }
    impl Component for Position {}

    #[test]
    fn add_then_has_then_remove() {
        let pool = ComponentPool::<Position>::new();
        assert!(!pool.has(0));
        pool.add(0, Position { x: 1.0 });
        assert!(pool.has(0));
        assert_eq!(pool.get(0).x, 1.0);
        pool.remove(0);
        assert!(!pool.has(0));
    }

    #[test]
    #[should_panic(expected = "already present")]
    fn double_add_panics() {
        let pool = ComponentPool::<Position>::new();
        pool.add(0, Position { x: 1.0 });
        pool.add(0, Position { x: 2.0 });
    }

    #[test]
    #[should_panic(expected = "no component to remove")]
    fn remove_without_have_panics() {
        let pool = ComponentPool::<Position>::new();
        pool.remove(0);
    }

    #[test]
    fn block_storage_allocated_iff_occupied() {
        let pool = ComponentPool::<Position>::new();
        assert!(!pool.any_block_allocated());
        pool.add(0, Position { x: 0.0 });
        assert!(pool.any_block_allocated());
        pool.remove(0);
        assert!(!pool.any_block_allocated());
    }

    #[test]
    fn erased_access_roundtrips() {
        let pool = ComponentPool::<Position>::new();
        pool.add(3, Position { x: 9.0 });
        let erased: &dyn AnyPool = &pool;
        assert!(erased.has_erased(3));
        erased.remove_erased(3);
        assert!(!erased.has_erased(3));
    }

    #[test]
    fn add_into_a_different_page_does_not_conflict_with_a_held_reference() {
        // A held guard only locks its own page: `add` for an entity that
        // lands on a different page must not block behind it.
        let pool = ComponentPool::<Position>::new();
        pool.add(0, Position { x: 1.0 });
        let held = pool.get(0);
        pool.add(Position::BLOCK_SIZE, Position { x: 2.0 });
        assert_eq!(held.x, 1.0);
        assert_eq!(pool.get(Position::BLOCK_SIZE).x, 2.0);
    }

    #[test]
    fn racy_get_releases_its_borrow_before_returning() {
        // The property the dispatcher depends on: `get_racy` does not keep
        // a page borrowed after it returns, so a subsequent `add` into the
        // very same page (e.g. a system creating a new entity with the
        // component type it is being dispatched over) does not panic.
        let pool = ComponentPool::<Position>::new();
        pool.add(0, Position { x: 1.0 });
        let r = unsafe { pool.get_racy(0) }.unwrap();
        assert_eq!(r.x, 1.0);
        pool.add(1, Position { x: 2.0 });
        assert_eq!(pool.get(1).x, 2.0);
    }
}
