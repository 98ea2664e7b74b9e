mod component;
pub use component::{component_id, mask_of, Component, ComponentId, ComponentMask, DEFAULT_BLOCK_SIZE, MAX_COMPONENTS};

mod pool;
pub use pool::{ComponentPool, ComponentRef, ComponentRefMut};

mod entity;
pub use entity::{EntityId, EntityRegistry};

mod access;
pub use access::{Access, Read, Write};

mod query;
pub use query::{ComponentSet, PoolSource};

mod system;
pub use system::{NoHandle, System, WithHandle};

mod dispatch;
pub use dispatch::{PoolRegistry, SystemDispatcher};

mod sync;
pub use sync::{TaskSync, TaskWaitable};

mod handle;
pub use handle::EntityHandle;

mod world;
pub use world::{EntitiesWith, World};

extern crate fxhash;
#[macro_use]
extern crate guard;
