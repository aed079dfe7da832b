#![allow(dead_code)]

use std::rc::Rc;

use abm_observers::{pair, ComponentID, Entity, World, WorldResult};

pub const ENTITIES_SMALL: usize = 1_000;
pub const ENTITIES_MED: usize = 10_000;

pub const POSITION: ComponentID = 1;
pub const VELOCITY: ComponentID = 2;
pub const FROZEN: ComponentID = 3;
pub const LIKES: u16 = 10;

/// Spawns `count` entities carrying `POSITION` and a `LIKES` pair with a
/// rotating target.
pub fn setup_world(count: usize) -> WorldResult<(Rc<World>, Vec<Entity>)> {
    let world = World::new();
    let mut entities = Vec::with_capacity(count);
    for index in 0..count {
        let target = (index % 16) as u16 + 100;
        entities.push(world.spawn_with(&[POSITION, pair(LIKES, target)])?);
    }
    Ok((world, entities))
}
