use crate::component::Component;
use crate::entity::EntityId;
use crate::pool::{ComponentRef, ComponentRefMut};
use crate::world::World;

/// A value pair `(world, id)` (spec §4.6). Forwards every entity-level
/// operation to the owning `World`; carries no storage of its own, so it
/// may be copied freely.
#[derive(Clone, Copy)]
pub struct EntityHandle<'w> {
    world: &'w World,
    id: EntityId,
}

impl<'w> EntityHandle<'w> {
    pub(crate) fn new(world: &'w World, id: EntityId) -> Self {
        Self { world, id }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn add<T: Component>(&self, value: T) -> ComponentRefMut<'w, T> {
        self.world.add_component(self.id, value)
    }

    pub fn has<T: Component>(&self) -> bool {
        self.world.has_component::<T>(self.id)
    }

    pub fn get<T: Component>(&self) -> ComponentRef<'w, T> {
        self.world.get_component::<T>(self.id)
    }

    pub fn get_mut<T: Component>(&self) -> ComponentRefMut<'w, T> {
        self.world.get_component_mut::<T>(self.id)
    }

    /// Ergonomic "create-if-absent" variant gated on `T: Default` (spec
    /// §4.6).
    pub fn get_or_default<T: Component + Default>(&self) -> ComponentRefMut<'w, T> {
        if !self.has::<T>() {
            self.world.add_component(self.id, T::default());
        }
        self.world.get_component_mut::<T>(self.id)
    }

    pub fn remove<T: Component>(&self) {
        self.world.remove_component::<T>(self.id)
    }

    pub fn destroy(&self) {
        self.world.destroy_entity(self.id)
    }

    /// True iff this id's mask is non-zero — "is this id still live?" The
    /// pattern a stale handle uses to tolerate batched destructions (spec
    /// §7).
    pub fn is_alive(&self) -> bool {
        !self.world.component_mask(self.id).is_empty()
    }
}

impl<'w> PartialEq for EntityHandle<'w> {
    /// Equality is `(same world) ∧ (same id)` (spec §4.6).
    ///
    /// "Same world" means the same `WorldInner` allocation, not the same
    /// `&World` reference: a system dispatched over a cloned `World` builds
    /// every `EntityHandle` it receives from that clone's own local
    /// binding, a different address than the caller's `World` variable even
    /// though both share the same underlying world.
    fn eq(&self, other: &Self) -> bool {
        self.world.same_instance(other.world) && self.id == other.id
    }
}

impl<'w> Eq for EntityHandle<'w> {}
