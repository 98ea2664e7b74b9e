use ecs::{Component, Read, World, Write};

struct Health(u32);
impl Component for Health {}

struct Commander;
impl Component for Commander {}

struct IsPlayer;
impl Component for IsPlayer {}

struct IsEnemy;
impl Component for IsEnemy {}

fn main() {
    let world = World::new();

    for _ in 1..1000 {
        let player = world.create_entity();
        player.add(IsPlayer);
        player.add(Health(123));
        world.flush(player.id());

        let enemy = world.create_entity();
        enemy.add(Commander);
        enemy.add(IsEnemy);
        enemy.add(Health(333));
        world.flush(enemy.id());
    }

    world.entity_handle(3).destroy();

    let straggler = world.create_entity();
    straggler.add(IsEnemy);
    world.flush(straggler.id());

    world.tick_system::<(Read<Health>,), _, _>(false, false, |(health,): (&Health,)| {
        println!("entity has {} hp", health.0);
    });
}
