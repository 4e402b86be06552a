//! The scene-graph model: map objects, displacements and identifiers

mod core;
mod displacement;
mod id;

pub use self::core::{
    Color, Entity, EntityData, Face, Group, LoadWarning, Map, MapObject, Solid, Texture, Visgroup,
    World,
};
pub use displacement::{Displacement, DisplacementPoint, MAX_POWER, MIN_POWER};
pub use id::IdGenerator;
