use ecs::{Component, World};

struct Health(u32);
impl Component for Health {}

struct IsPlayer;
impl Component for IsPlayer {}

fn main() {
    let world = World::new();

    let player = world.create_entity();
    player.add(IsPlayer);
    player.add(Health(100));
    world.flush(player.id());

    println!("player {} has {} hp", player.id(), player.get::<Health>().0);

    player.remove::<Health>();
    println!("player {} still has health? {}", player.id(), player.has::<Health>());

    player.destroy();
    println!("player alive after destroy? {}", player.is_alive());
}
