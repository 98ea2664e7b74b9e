use std::marker::PhantomData;

use crate::component::{mask_of, Component, ComponentMask};
use crate::pool::ComponentPool;

/// One component access declared by a system's access set `C` (spec §4.4):
/// either a read-only or mutable view of a single component type.
///
/// `View` is what a dispatch resolves a pool to once before iterating;
/// `Item` is the per-entity reference handed to the system callable. Since
/// `ComponentPool` now does its own per-page dynamic borrow checking, the
/// view here is simply the pool reference itself — no guard needs to be
/// held across the whole dispatch.
pub trait Access {
    type Component: Component;
    type View<'w>;
    type Item<'w>;

    /// True for `Write<T>`, false for `Read<T>` — feeds `SystemDispatcher`'s
    /// read/write mask derivation.
    const MUTABLE: bool;

    fn mask() -> ComponentMask {
        mask_of::<Self::Component>()
    }

    fn view<'w>(pool: &'w ComponentPool<Self::Component>) -> Self::View<'w>;

    /// Fetches entity `e`'s component through `view`.
    ///
    /// # Safety contract (not an `unsafe fn` — upheld by the dispatcher)
    ///
    /// Internally this reaches through `ComponentPool::get_racy`, which
    /// asks its caller to guarantee no conflicting live reference into the
    /// same slot exists, and that every other system touching this
    /// component type has already been serialized against this dispatch.
    /// `SystemDispatcher::dispatch` upholds both before calling here.
    fn get<'w>(view: &'w Self::View<'w>, e: usize) -> Option<Self::Item<'w>>;
}

/// Read-only access to component `T`.
pub struct Read<T: Component>(PhantomData<T>);

/// Mutable access to component `T`.
pub struct Write<T: Component>(PhantomData<T>);

impl<T: Component> Access for Read<T> {
    type Component = T;
    type View<'w> = &'w ComponentPool<T>;
    type Item<'w> = &'w T;

    const MUTABLE: bool = false;

    fn view<'w>(pool: &'w ComponentPool<T>) -> Self::View<'w> {
        pool
    }

    fn get<'w>(view: &'w Self::View<'w>, e: usize) -> Option<&'w T> {
        unsafe { view.get_racy(e) }.map(|r| &*r)
    }
}

impl<T: Component> Access for Write<T> {
    type Component = T;
    type View<'w> = &'w ComponentPool<T>;
    type Item<'w> = &'w mut T;

    const MUTABLE: bool = true;

    fn view<'w>(pool: &'w ComponentPool<T>) -> Self::View<'w> {
        pool
    }

    fn get<'w>(view: &'w Self::View<'w>, e: usize) -> Option<&'w mut T> {
        unsafe { view.get_racy(e) }
    }
}
