use std::sync::{Arc, Mutex};

use crate::component::{component_id, Component, ComponentMask};
use crate::dispatch::{PoolRegistry, SystemDispatcher};
use crate::entity::{EntityId, EntityRegistry};
use crate::handle::EntityHandle;
use crate::pool::{ComponentRef, ComponentRefMut};
use crate::query::ComponentSet;
use crate::sync::TaskSync;
use crate::system::System;

struct WorldInner {
    pools: PoolRegistry,
    entities: Mutex<EntityRegistry>,
    dispatcher: SystemDispatcher,
}

/// `World` has no storage of its own beyond the `Arc`: every mutating
/// operation on its interior goes through a `Mutex` (the entity registry)
/// or a per-page `AtomicRefCell` (each component pool's block storage,
/// guarded at page granularity rather than pool-wide), and the dispatcher
/// serializes systems whose write masks conflict before either ever runs
/// concurrently. That is the same reasoning the teacher's own `World`
/// documented when it hand-wrote `unsafe impl Send`/`Sync` over its
/// `Arc`-wrapped storages; here it is centralized on `WorldInner` since
/// `World` itself is just `Arc<WorldInner>`.
unsafe impl Send for WorldInner {}
unsafe impl Sync for WorldInner {}

/// The ECS world: entity registry, component pools, and system dispatcher,
/// composed behind a single cheap-to-clone handle (spec §4.5).
///
/// `World` is deliberately an ordinary value the caller owns (spec §1's
/// non-goal: "no global ECS instance") — cloning it is just an `Arc` bump,
/// which is what lets `tickSystem(async = true)` hand a live `World` to a
/// worker thread without the dispatch borrowing from `&self` for the
/// worker's entire lifetime.
#[derive(Clone)]
pub struct World {
    inner: Arc<WorldInner>,
}

impl Default for World {
    fn default() -> Self {
        Self {
            inner: Arc::new(WorldInner {
                pools: PoolRegistry::new(),
                entities: Mutex::new(EntityRegistry::new()),
                dispatcher: SystemDispatcher::new(),
            }),
        }
    }
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn pools(&self) -> &PoolRegistry {
        &self.inner.pools
    }

    /// True iff `self` and `other` are handles onto the same `WorldInner`
    /// allocation, regardless of which local binding each was cloned
    /// through. Two `World` clones always compare equal here; two
    /// independently-constructed `World::new()`s never do (spec §4.6's
    /// "same world").
    pub(crate) fn same_instance(&self, other: &World) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn entities(&self) -> &Mutex<EntityRegistry> {
        &self.inner.entities
    }

    /// Creates a new entity, invalid until `flush`/`flush_all` (spec §4.3).
    pub fn create_entity(&self) -> EntityHandle<'_> {
        let id = self.inner.entities.lock().unwrap().create();
        EntityHandle::new(self, id)
    }

    pub fn entity_handle(&self, id: EntityId) -> EntityHandle<'_> {
        EntityHandle::new(self, id)
    }

    /// Removes every component the entity's mask reports present, then
    /// recycles its id (spec §4.3).
    pub fn destroy_entity(&self, id: EntityId) {
        let mask = {
            let entities = self.inner.entities.lock().unwrap();
            entities.mask(id)
        };

        for bit in 0..crate::component::MAX_COMPONENTS as u8 {
            if !mask.contains(bit) {
                continue;
            }
            guard!(let Some(pool) = self.inner.pools.any_pool(bit) else {
                panic!("entity mask has bit {} set but its pool was never created", bit);
            });
            pool.remove_erased(id as usize);
        }

        self.inner.entities.lock().unwrap().destroy(id);
    }

    /// Constructs `value` in place for `id`. Panics if `T` is already
    /// present (spec §4.2, §3 invariant 4).
    pub fn add_component<T: Component>(&self, id: EntityId, value: T) -> ComponentRefMut<'_, T> {
        let bit = component_id::<T>();
        let guard = self.inner.pools.pool::<T>().add(id as usize, value);
        self.inner.entities.lock().unwrap().set_bit(id, bit);
        guard
    }

    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.inner.pools.pool::<T>().has(id as usize)
    }

    /// Requires the component present (spec §4.2).
    pub fn get_component<T: Component>(&self, id: EntityId) -> ComponentRef<'_, T> {
        self.inner.pools.pool::<T>().get(id as usize)
    }

    pub fn get_component_mut<T: Component>(&self, id: EntityId) -> ComponentRefMut<'_, T> {
        self.inner.pools.pool::<T>().get_mut(id as usize)
    }

    /// Destroys `T` in place for `id`. Panics if not present (spec §4.2).
    pub fn remove_component<T: Component>(&self, id: EntityId) {
        let bit = component_id::<T>();
        self.inner.pools.pool::<T>().remove(id as usize);
        self.inner.entities.lock().unwrap().clear_bit(id, bit);
    }

    pub fn component_mask(&self, id: EntityId) -> ComponentMask {
        self.inner.entities.lock().unwrap().mask(id)
    }

    pub fn has_components(&self, id: EntityId, required: ComponentMask) -> bool {
        self.inner.entities.lock().unwrap().has_components(id, required)
    }

    /// A lazy forward sequence of handles to every live, valid entity
    /// matching `CS`'s component set (spec §4.5's `entitiesWith`).
    pub fn entities_with<CS: ComponentSet>(&self) -> EntitiesWith<'_, CS> {
        let ids: Vec<EntityId> =
            self.inner.entities.lock().unwrap().iter_matching(CS::full_mask()).collect();
        EntitiesWith { world: self, ids: ids.into_iter(), _marker: std::marker::PhantomData }
    }

    /// Dispatches `system` over the entities matching `CS` (spec §4.4,
    /// §6's `tickSystem`). Returns `Some` join handle when `is_async` is
    /// set; `None` for a synchronous dispatch, which has already completed
    /// by the time this returns.
    pub fn tick_system<CS, F, Marker>(
        &self,
        is_async: bool,
        parallel_for: bool,
        system: F,
    ) -> Option<Arc<TaskSync>>
    where
        CS: ComponentSet + 'static,
        F: System<CS, Marker> + Send + Sync + 'static,
        Marker: 'static,
    {
        self.inner.dispatcher.dispatch(self.clone(), system, is_async, parallel_for)
    }

    /// Joins every running worker (arbitrary order), then marks every
    /// entity valid (spec §4.4's "Tick boundary").
    pub fn finish_tick(&self) {
        self.join_system_threads();
        self.flush_all();
    }

    pub fn join_system_threads(&self) {
        self.inner.dispatcher.join_all();
    }

    pub fn flush(&self, id: EntityId) {
        self.inner.entities.lock().unwrap().flush_one(id);
    }

    pub fn flush_all(&self) {
        self.inner.entities.lock().unwrap().flush_all();
    }

    pub fn entity_count(&self) -> usize {
        self.inner.entities.lock().unwrap().entity_count()
    }
}

/// The lazy forward sequence returned by `World::entities_with` (spec
/// §4.5). Ids are snapshotted at call time, matching the sequential
/// dispatch iteration order (ascending id) spec §4.4 specifies.
pub struct EntitiesWith<'w, CS> {
    world: &'w World,
    ids: std::vec::IntoIter<EntityId>,
    _marker: std::marker::PhantomData<fn() -> CS>,
}

impl<'w, CS> Iterator for EntitiesWith<'w, CS> {
    type Item = EntityHandle<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        self.ids.next().map(|id| EntityHandle::new(self.world, id))
    }
}
