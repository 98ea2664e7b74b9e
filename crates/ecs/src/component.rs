use std::any::TypeId;
use std::sync::{Mutex, OnceLock};

use fxhash::FxHashMap;

/// The process-wide ceiling on distinct component types: a mask must fit in
/// one 64-bit word (spec §3 invariant 8).
pub const MAX_COMPONENTS: usize = 64;

/// The default page size used by a `ComponentPool<T>` when `T` does not
/// override `Component::BLOCK_SIZE`.
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// A small integer identifying a component type, stable for the lifetime of
/// the process. Ids are assigned on first use by the global registry below.
pub type ComponentId = u8;

/// A 64-bit bitset over `ComponentId`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
pub struct ComponentMask(u64);

impl ComponentMask {
    pub const EMPTY: ComponentMask = ComponentMask(0);

    pub fn of(id: ComponentId) -> Self {
        ComponentMask(1u64 << id)
    }

    pub fn set(&mut self, id: ComponentId) {
        self.0 |= 1u64 << id;
    }

    pub fn clear(&mut self, id: ComponentId) {
        self.0 &= !(1u64 << id);
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.0 & (1u64 << id) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    /// True iff `self` carries every bit `other` requires. This is the
    /// relation a query/dispatch mask uses against an entity's mask.
    pub fn is_superset_of(&self, other: ComponentMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// True iff `self` and `other` share at least one set bit — the
    /// dispatcher's write-conflict test (spec §4.4).
    pub fn intersects(&self, other: ComponentMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for ComponentMask {
    type Output = ComponentMask;
    fn bitor(self, rhs: Self) -> Self::Output {
        ComponentMask(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ComponentMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for ComponentMask {
    type Output = ComponentMask;
    fn bitand(self, rhs: Self) -> Self::Output {
        ComponentMask(self.0 & rhs.0)
    }
}

/// Marker trait every component type implements. `BLOCK_SIZE` is the
/// per-type page size of its `ComponentPool` (spec §4.2, §6); a type that
/// does not override it gets the default of 64.
///
/// The registry treats a type and its read-only view as the same component:
/// there is exactly one `ComponentId` per `T`, regardless of whether it is
/// accessed through `Read<T>` or `Write<T>`.
pub trait Component: 'static + Send + Sync {
    const BLOCK_SIZE: usize = DEFAULT_BLOCK_SIZE;
}

struct Registry {
    ids: Mutex<FxHashMap<TypeId, ComponentId>>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry { ids: Mutex::new(FxHashMap::default()) })
}

/// Returns the `ComponentId` for `T`, assigning a fresh one from the global
/// monotonic counter on first call. Ids are process-global, not per-`World`
/// (spec §4.1), so two `World`s in the same process share the 64-type
/// ceiling.
pub fn component_id<T: Component>() -> ComponentId {
    let reg = registry();
    let type_id = TypeId::of::<T>();

    if let Some(id) = reg.ids.lock().unwrap().get(&type_id) {
        return *id;
    }

    let mut ids = reg.ids.lock().unwrap();
    // Re-check: another thread may have raced us between the read above and
    // taking this lock.
    if let Some(id) = ids.get(&type_id) {
        return *id;
    }

    let next = ids.len();
    assert!(
        next < MAX_COMPONENTS,
        "component registry exhausted: more than {} distinct component types",
        MAX_COMPONENTS
    );
    let id = next as ComponentId;
    ids.insert(type_id, id);
    id
}

pub fn mask_of<T: Component>() -> ComponentMask {
    ComponentMask::of(component_id::<T>())
}
