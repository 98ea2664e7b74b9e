use paste::paste;

use crate::access::Access;
use crate::component::{Component, ComponentMask};
use crate::pool::ComponentPool;

/// Whatever owns the pools a `ComponentSet` needs to borrow. Implemented by
/// `World`; kept as a trait so `query`/`dispatch` modules don't depend on
/// `World`'s concrete layout.
pub trait PoolSource {
    fn pool<T: Component>(&self) -> &ComponentPool<T>;
}

/// A system's component-access signature `C = {C₁, …, Cₖ}` (spec §4.4):
/// a tuple of `Read<T>`/`Write<T>`. Generated for arities 1..=8 below —
/// mirrors the teacher's own `generate_query!` macro, generalized from a
/// generic `Iterator`-zipping helper into the access-set/mask/fetch
/// abstraction this spec's dispatcher needs.
pub trait ComponentSet {
    type Views<'w>;
    type Items<'w>;

    fn read_mask() -> ComponentMask;
    fn write_mask() -> ComponentMask;

    fn full_mask() -> ComponentMask {
        Self::read_mask() | Self::write_mask()
    }

    fn view<'w, S: PoolSource>(source: &'w S) -> Self::Views<'w>;

    /// Fetches every `Cᵢ` for entity `e`, or `None` if any is missing. A
    /// matched entity (mask superset of `full_mask()`) is only ever `None`
    /// here if the registry and the pools have fallen out of sync — a
    /// programmer-error-class bug the caller should treat as fatal (spec
    /// §7), not a normal "entity doesn't match" case.
    fn get<'w>(views: &'w Self::Views<'w>, e: usize) -> Option<Self::Items<'w>>;
}

macro_rules! impl_component_set {
    ($([$t:ident, $idx:tt]),+) => {
        impl<$($t: Access),+> ComponentSet for ($($t,)+) {
            type Views<'w> = ($($t::View<'w>,)+);
            type Items<'w> = ($($t::Item<'w>,)+);

            fn read_mask() -> ComponentMask {
                let mut mask = ComponentMask::EMPTY;
                $(if !$t::MUTABLE { mask |= $t::mask(); })+
                mask
            }

            fn write_mask() -> ComponentMask {
                let mut mask = ComponentMask::EMPTY;
                $(if $t::MUTABLE { mask |= $t::mask(); })+
                mask
            }

            fn view<'w, S: PoolSource>(source: &'w S) -> Self::Views<'w> {
                ($($t::view(source.pool::<$t::Component>()),)+)
            }

            fn get<'w>(views: &'w Self::Views<'w>, e: usize) -> Option<Self::Items<'w>> {
                paste! {
                    $(let [<$t _item>] = $t::get(&views.$idx, e)?;)+
                    Some(($([<$t _item>],)+))
                }
            }
        }
    };
}

impl_component_set!([A, 0]);
impl_component_set!([A, 0], [B, 1]);
impl_component_set!([A, 0], [B, 1], [C, 2]);
impl_component_set!([A, 0], [B, 1], [C, 2], [D, 3]);
impl_component_set!([A, 0], [B, 1], [C, 2], [D, 3], [E, 4]);
impl_component_set!([A, 0], [B, 1], [C, 2], [D, 3], [E, 4], [F, 5]);
impl_component_set!([A, 0], [B, 1], [C, 2], [D, 3], [E, 4], [F, 5], [G, 6]);
impl_component_set!([A, 0], [B, 1], [C, 2], [D, 3], [E, 4], [F, 5], [G, 6], [H, 7]);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Read, Write};

    struct Position {
        x: f32,
    }
    impl Component for Position {}
    struct Velocity {
        x: f32,
    }
    impl Component for Velocity {}

    #[test]
    fn masks_split_by_mutability() {
        type Set = (Write<Position>, Read<Velocity>);
        assert!(<Set as ComponentSet>::read_mask().contains(crate::component::component_id::<Velocity>()));
        assert!(<Set as ComponentSet>::write_mask().contains(crate::component::component_id::<Position>()));
        assert_eq!(<Set as ComponentSet>::full_mask(), <Set as ComponentSet>::read_mask() | <Set as ComponentSet>::write_mask());
    }
}
