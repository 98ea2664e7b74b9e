use std::cell::UnsafeCell;
use std::sync::RwLock;

use atomic_refcell::{AtomicRef, AtomicRefCell, AtomicRefMut};

/// A sparse, paged vector: storage for page `p` of `block_size` slots is
/// allocated lazily on first insert into that page and released again once
/// every slot in the page is empty.
///
/// Synchronization is split across two independent layers so that a
/// structural change to one page (allocating it, freeing it, or growing the
/// page directory to make room for a brand new one) never has to contend
/// for the same lock as a live reference into a *different* page:
///
/// - The page directory (`pages`) is a `RwLock<Vec<Box<Page<T>>>>`. Growing
///   it takes a brief exclusive lock only to push new pages; once a page is
///   pushed its `Box` is never moved or removed, so a pointer into it stays
///   valid for the life of the `BlockVec` regardless of later growth (only
///   the directory's own `Vec` buffer reallocates, not the pages it points
///   to).
/// - Each page's own occupancy and slot storage lives behind its own
///   `AtomicRefCell`, so two different pages never contend at all, and
///   structural mutation of one page (e.g. a fresh entity's first
///   component landing there) only ever has to borrow that one page.
pub struct BlockVec<T> {
    block_size: usize,
    pages: RwLock<Vec<Box<Page<T>>>>,
}

struct Page<T> {
    meta: AtomicRefCell<PageMeta<T>>,
}

struct PageMeta<T> {
    cells: Option<Box<[UnsafeCell<Option<T>>]>>,
    occupied: usize,
}

// `PageMeta<T>`'s `UnsafeCell` only ever changes hands through the
// `AtomicRefCell` that wraps it (or, for `get_racy`, through a pointer
// fetched while that cell was briefly borrowed) — never moved across
// threads on its own, so `Send` is enough to make the wrapping cell `Sync`.
unsafe impl<T: Send> Send for PageMeta<T> {}

impl<T> Page<T> {
    fn empty() -> Self {
        Self { meta: AtomicRefCell::new(PageMeta { cells: None, occupied: 0 }) }
    }

    fn contains(&self, local: usize) -> bool {
        let meta = self.meta.borrow();
        meta.cells.as_ref().map_or(false, |c| unsafe { (*c[local].get()).is_some() })
    }

    fn insert(&self, local: usize, value: T, block_size: usize) {
        let mut meta = self.meta.borrow_mut();
        if meta.cells.is_none() {
            meta.cells = Some((0..block_size).map(|_| UnsafeCell::new(None)).collect());
        }
        let slot = unsafe { &mut *meta.cells.as_ref().unwrap()[local].get() };
        assert!(slot.is_none(), "slot {} already occupied", local);
        *slot = Some(value);
        meta.occupied += 1;
    }

    fn remove(&self, local: usize) -> T {
        let mut meta = self.meta.borrow_mut();
        let value = {
            let cells = meta.cells.as_ref().expect("remove from an unallocated block");
            unsafe { &mut *cells[local].get() }.take().expect("slot is not occupied")
        };
        meta.occupied -= 1;
        if meta.occupied == 0 {
            meta.cells = None;
        }
        value
    }

    fn is_allocated(&self) -> bool {
        self.meta.borrow().cells.is_some()
    }

    fn read(&self, local: usize) -> Option<PageRef<'_, T>> {
        let guard = self.meta.borrow();
        let occupied = guard.cells.as_ref().map_or(false, |c| unsafe { (*c[local].get()).is_some() });
        if occupied {
            Some(PageRef { guard, local })
        } else {
            None
        }
    }

    fn write(&self, local: usize) -> Option<PageRefMut<'_, T>> {
        let guard = self.meta.borrow_mut();
        let occupied = guard.cells.as_ref().map_or(false, |c| unsafe { (*c[local].get()).is_some() });
        if occupied {
            Some(PageRefMut { guard, local })
        } else {
            None
        }
    }

    /// Returns a raw pointer to slot `local`'s cell, taking the page's own
    /// borrow only long enough to read it — not across the caller's use of
    /// the pointer. See `BlockVec::get_racy`.
    fn racy_cell(&self, local: usize) -> Option<*const UnsafeCell<Option<T>>> {
        let meta = self.meta.borrow();
        meta.cells.as_ref().map(|c| &c[local] as *const UnsafeCell<Option<T>>)
    }
}

/// A read guard to one occupied slot, borrowed out of a page's
/// `AtomicRefCell`. Dereferences to `&T`.
pub struct PageRef<'w, T> {
    guard: AtomicRef<'w, PageMeta<T>>,
    local: usize,
}

impl<'w, T> std::ops::Deref for PageRef<'w, T> {
    type Target = T;
    fn deref(&self) -> &T {
        let cells = self.guard.cells.as_ref().expect("slot not occupied");
        unsafe { (*cells[self.local].get()).as_ref() }.expect("slot not occupied")
    }
}

/// A mutable guard to one occupied slot. Dereferences to `&T`/`&mut T`.
pub struct PageRefMut<'w, T> {
    guard: AtomicRefMut<'w, PageMeta<T>>,
    local: usize,
}

impl<'w, T> std::ops::Deref for PageRefMut<'w, T> {
    type Target = T;
    fn deref(&self) -> &T {
        let cells = self.guard.cells.as_ref().expect("slot not occupied");
        unsafe { (*cells[self.local].get()).as_ref() }.expect("slot not occupied")
    }
}

impl<'w, T> std::ops::DerefMut for PageRefMut<'w, T> {
    fn deref_mut(&mut self) -> &mut T {
        let cells = self.guard.cells.as_ref().expect("slot not occupied");
        unsafe { (*cells[self.local].get()).as_mut() }.expect("slot not occupied")
    }
}

impl<T> BlockVec<T> {
    pub fn new(block_size: usize) -> Self {
        assert!(block_size > 0, "block_size must be non-zero");
        Self { block_size, pages: RwLock::new(Vec::new()) }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn location(&self, index: usize) -> (usize, usize) {
        (index / self.block_size, index % self.block_size)
    }

    /// Returns a pointer to page `page_index`'s record if it already
    /// exists, taking only a brief read lock on the directory.
    fn page_if_present(&self, page_index: usize) -> Option<*const Page<T>> {
        let pages = self.pages.read().unwrap();
        pages.get(page_index).map(|p| p.as_ref() as *const Page<T>)
    }

    /// Returns a pointer to page `page_index`'s record, growing the
    /// directory under a brief exclusive lock if it doesn't exist yet.
    ///
    /// The pointer outlives both locks: once a page is pushed, its `Box` is
    /// never moved or dropped for the life of `self`, so detaching its
    /// lifetime from the guard that produced it is sound.
    fn ensure_page(&self, page_index: usize) -> *const Page<T> {
        if let Some(ptr) = self.page_if_present(page_index) {
            return ptr;
        }
        let mut pages = self.pages.write().unwrap();
        if page_index >= pages.len() {
            pages.resize_with(page_index + 1, || Box::new(Page::empty()));
        }
        pages[page_index].as_ref() as *const Page<T>
    }

    pub fn contains(&self, index: usize) -> bool {
        let (page, local) = self.location(index);
        match self.page_if_present(page) {
            Some(ptr) => unsafe { &*ptr }.contains(local),
            None => false,
        }
    }

    pub fn insert(&self, index: usize, value: T) {
        let (page, local) = self.location(index);
        let ptr = self.ensure_page(page);
        unsafe { &*ptr }.insert(local, value, self.block_size);
    }

    pub fn get(&self, index: usize) -> Option<PageRef<'_, T>> {
        let (page, local) = self.location(index);
        let ptr = self.page_if_present(page)?;
        unsafe { &*ptr }.read(local)
    }

    pub fn get_mut(&self, index: usize) -> Option<PageRefMut<'_, T>> {
        let (page, local) = self.location(index);
        let ptr = self.page_if_present(page)?;
        unsafe { &*ptr }.write(local)
    }

    pub fn remove(&self, index: usize) -> T {
        let (page, local) = self.location(index);
        let ptr = self.page_if_present(page).expect("remove from an unallocated block");
        unsafe { &*ptr }.remove(local)
    }

    /// Returns the slot at `index` without holding any lock across the
    /// call — a page's borrow is taken only long enough to read the raw
    /// cell pointer, then released before the pointer is dereferenced.
    ///
    /// # Safety
    ///
    /// The caller must guarantee no other live reference (shared or
    /// exclusive) into the *same slot* exists for the duration of the
    /// returned borrow. `ComponentPool`'s dispatch path upholds this: it
    /// only reaches here after the dispatcher's write-mask conflict check
    /// has serialised every other system touching this component type, and
    /// the entity ids handed to one dispatch (sequential or parallel) are
    /// disjoint by construction — so this is sound even though, unlike the
    /// guarded accessors above, nothing is held borrowed while the
    /// reference lives. That is precisely what lets a system create a new
    /// entity and populate a component of the type it is being dispatched
    /// over without deadlocking or double-borrowing against its own
    /// in-flight iteration (spec §8 end-to-end scenario 5).
    pub unsafe fn get_racy(&self, index: usize) -> Option<&mut T> {
        let (page, local) = self.location(index);
        let ptr = self.page_if_present(page)?;
        let cell = (&*ptr).racy_cell(local)?;
        (*(*cell).get()).as_mut()
    }

    pub fn block_count(&self) -> usize {
        self.pages.read().unwrap().len()
    }

    pub fn is_block_allocated(&self, block_index: usize) -> bool {
        match self.page_if_present(block_index) {
            Some(ptr) => unsafe { &*ptr }.is_allocated(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_starts_empty() {
        let v = BlockVec::<i32>::new(64);
        assert_eq!(v.block_count(), 0);
    }

    #[test]
    fn insert_get_roundtrip() {
        let v = BlockVec::<String>::new(4);
        v.insert(50, "A".to_string());
        v.insert(3, "B".to_string());
        v.insert(5, "C".to_string());

        assert_eq!(v.get(50).as_deref(), Some(&"A".to_string()));
        assert_eq!(v.get(3).as_deref(), Some(&"B".to_string()));
        assert_eq!(v.get(5).as_deref(), Some(&"C".to_string()));
        assert!(v.get(6).is_none());
    }

    #[test]
    #[should_panic(expected = "already occupied")]
    fn double_insert_panics() {
        let v = BlockVec::<i32>::new(8);
        v.insert(1, 1);
        v.insert(1, 2);
    }

    #[test]
    fn remove_frees_block_storage_when_empty() {
        let v = BlockVec::<i32>::new(4);
        for i in 0..4 {
            v.insert(i, i as i32);
        }
        assert!(v.is_block_allocated(0));

        v.insert(7, 99);
        assert!(v.is_block_allocated(1));

        v.remove(7);
        assert!(!v.is_block_allocated(1), "emptied block must release storage");
        assert_eq!(v.block_count(), 2, "block record itself must stay stable");

        for i in 0..4 {
            v.remove(i);
        }
        assert!(!v.is_block_allocated(0));
    }

    #[test]
    fn reinsert_after_remove_succeeds() {
        let v = BlockVec::<i32>::new(4);
        v.insert(0, 1);
        v.remove(0);
        v.insert(0, 2);
        assert_eq!(v.get(0).as_deref(), Some(&2));
    }

    #[test]
    fn block_size_one_and_large_both_work() {
        for size in [1usize, 4096] {
            let v = BlockVec::<i32>::new(size);
            v.insert(0, 10);
            v.insert(size * 3 + 1, 20);
            assert_eq!(v.get(0).as_deref(), Some(&10));
            assert_eq!(v.get(size * 3 + 1).as_deref(), Some(&20));
        }
    }

    #[test]
    fn insert_into_one_page_does_not_borrow_another() {
        // The scenario the dispatcher relies on: a read/write guard held
        // live on one page must not block a structural insert that lands
        // on a different page.
        let v = BlockVec::<i32>::new(4);
        v.insert(0, 1);
        let _held = v.get(0).unwrap();
        v.insert(9, 2);
        assert_eq!(v.get(9).as_deref(), Some(&2));
    }

    #[test]
    fn get_racy_can_insert_into_the_same_page_once_released() {
        let v = BlockVec::<i32>::new(4);
        v.insert(0, 1);
        let r = unsafe { v.get_racy(0) }.unwrap();
        assert_eq!(*r, 1);
        // `get_racy` does not hold the page borrowed past this point, so a
        // structural insert into the very same page is free to proceed —
        // exactly what a system creating an entity mid-dispatch needs.
        v.insert(1, 2);
        assert_eq!(v.get(1).as_deref(), Some(&2));
    }
}
