use std::sync::{Arc, Mutex, OnceLock};

use rayon::prelude::*;
use tasks::{Dispatcher, Task, Workers};

use crate::component::{component_id, Component, ComponentId, ComponentMask, MAX_COMPONENTS};
use crate::entity::EntityId;
use crate::handle::EntityHandle;
use crate::pool::{downcast_pool, AnyPool, ComponentPool};
use crate::query::{ComponentSet, PoolSource};
use crate::sync::TaskSync;
use crate::system::System;
use crate::world::World;

/// Owns one `ComponentPool<T>` per registered component type, lazily
/// constructed on first access.
///
/// Pools live behind `OnceLock` slots in a fixed-size array rather than a
/// `HashMap` so that a borrow handed out by `pool::<T>()` is valid for the
/// lifetime of `&self`: `OnceLock`'s storage never moves once initialized,
/// unlike a map entry that could be relocated by a later rehash.
pub struct PoolRegistry {
    pools: [OnceLock<Box<dyn AnyPool>>; MAX_COMPONENTS],
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self { pools: std::array::from_fn(|_| OnceLock::new()) }
    }

    pub fn any_pool(&self, id: ComponentId) -> Option<&dyn AnyPool> {
        self.pools[id as usize].get().map(|b| b.as_ref())
    }
}

impl PoolSource for PoolRegistry {
    fn pool<T: Component>(&self) -> &ComponentPool<T> {
        let id = component_id::<T>() as usize;
        let boxed = self.pools[id].get_or_init(|| Box::new(ComponentPool::<T>::new()) as Box<dyn AnyPool>);
        downcast_pool::<T>(boxed.as_ref())
    }
}

/// A record of an asynchronously dispatched system (spec §3): the masks it
/// was scheduled with and a handle to join its worker.
struct RunningSystem {
    write_mask: ComponentMask,
    sync: Arc<TaskSync>,
}

/// Derives read/write masks, waits out write conflicts, and invokes a
/// system either inline or on a worker, sequentially or in parallel over
/// matching entities (spec §4.4).
pub struct SystemDispatcher {
    running: Mutex<Vec<RunningSystem>>,
    workers: Workers,
}

impl SystemDispatcher {
    pub fn new() -> Self {
        let mut workers = Workers::default();
        workers.start();
        Self { running: Mutex::new(Vec::new()), workers }
    }

    /// Joins every running system whose write mask intersects `full_mask`,
    /// then purges it from the list (spec §4.4's "Scheduling rule").
    fn wait_for_conflicts(&self, full_mask: ComponentMask) {
        let mut running = self.running.lock().unwrap();
        let mut still_running = Vec::with_capacity(running.len());
        for entry in running.drain(..) {
            if entry.write_mask.intersects(full_mask) {
                entry.sync.wait();
            } else {
                still_running.push(entry);
            }
        }
        *running = still_running;
    }

    /// Joins every running worker, in arbitrary order (`finishTick`'s first
    /// half, spec §4.4).
    pub fn join_all(&self) {
        let mut running = self.running.lock().unwrap();
        for entry in running.drain(..) {
            entry.sync.wait();
        }
    }

    pub fn dispatch<CS, F, Marker>(
        &self,
        world: World,
        system: F,
        is_async: bool,
        parallel_for: bool,
    ) -> Option<Arc<TaskSync>>
    where
        CS: ComponentSet + 'static,
        F: System<CS, Marker> + Send + Sync + 'static,
        Marker: 'static,
    {
        let read_mask = CS::read_mask();
        let write_mask = CS::write_mask();
        let full_mask = read_mask | write_mask;

        self.wait_for_conflicts(full_mask);

        if is_async {
            let task_sync = Arc::new(TaskSync::default());
            let finished = task_sync.clone();
            let job = move || {
                run_matching::<CS, F, Marker>(&world, &system, parallel_for);
                finished.mark_as_finish();
            };

            self.running.lock().unwrap().push(RunningSystem { write_mask, sync: task_sync.clone() });

            self.workers.execute(Task::new(job));
            Some(task_sync)
        } else {
            run_matching::<CS, F, Marker>(&world, &system, parallel_for);
            None
        }
    }
}

/// Resolves every pool `CS` needs once, then fetches each matching entity's
/// components through it.
///
/// # Safety
///
/// `Access::get` reaches into each pool through `ComponentPool::get_racy`,
/// which asks callers to guarantee no conflicting reference into the *same
/// slot* exists and is not itself held across the call. That guarantee
/// comes from two things working together: `SystemDispatcher::
/// wait_for_conflicts` has already serialized every other system whose
/// write mask overlaps this dispatch before it starts, and every entity id
/// handed to this dispatch (sequential or parallel) is distinct by
/// construction (`EntityRegistry::iter_matching` yields each id once). Two
/// concurrent fetches therefore only ever reach disjoint slots of the same
/// pool — exactly the "one footgun" the core documents rather than fully
/// defending against (spec §5, §9). `CS::Views` is a tuple of plain pool
/// references, which are `Send`/`Sync` on their own merit (each
/// `ComponentPool` synchronizes itself internally), so no wrapper is needed
/// to share it across `rayon`'s worker threads in the `parallelFor` branch.
fn run_matching<CS, F, Marker>(world: &World, system: &F, parallel_for: bool)
where
    CS: ComponentSet,
    F: System<CS, Marker> + Sync,
{
    let ids: Vec<EntityId> = {
        let entities = world.entities().lock().unwrap();
        entities.iter_matching(CS::full_mask()).collect()
    };

    let views = CS::view(world.pools());

    if parallel_for {
        ids.par_iter().for_each(|&e| {
            if let Some(items) = CS::get(&views, e as usize) {
                system.call(EntityHandle::new(world, e), items);
            }
        });
    } else {
        for e in ids {
            if let Some(items) = CS::get(&views, e as usize) {
                system.call(EntityHandle::new(world, e), items);
            }
        }
    }
}
