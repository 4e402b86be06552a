//! Copy/paste streams
//!
//! A selection of map objects can be serialized into a self-contained
//! `clipboard` structure-tree fragment and later reconstructed into any
//! document. Extraction decodes the fragment as a world fragment with a
//! throwaway allocator, then reindexes every object and face against the
//! destination document's allocator so pasted objects never collide with
//! live IDs.

use crate::model::{IdGenerator, MapObject};
use crate::parser;
use crate::structure::StructureNode;
use crate::writer;

/// Serialize a selection into a standalone `clipboard` fragment
///
/// Hidden solids are not exported: a solid hidden by code or by a visgroup
/// is not part of the visible selection. Groups are exported as records
/// only; their children follow flattened, exactly as in a full document.
pub fn create_copy_stream(objects: &[MapObject]) -> StructureNode {
    let mut stream = StructureNode::new("clipboard");
    for object in objects {
        match object {
            MapObject::Solid(solid) => {
                if !solid.is_code_hidden && !solid.is_visgroup_hidden {
                    stream.children.push(writer::solid_node(solid, 0));
                }
            }
            MapObject::Group(group) => {
                stream.children.push(writer::group_node(group, 0));
                // Flatten the group's subtree the way a document write does
                collect_children(group.id, &group.children, &mut stream);
            }
            MapObject::Entity(entity) => {
                stream.children.push(writer::entity_node(entity, 0));
            }
        }
    }
    stream
}

fn collect_children(owner: i64, children: &[MapObject], stream: &mut StructureNode) {
    for child in children {
        match child {
            MapObject::Solid(solid) => {
                if !solid.is_code_hidden && !solid.is_visgroup_hidden {
                    stream.children.push(writer::solid_node(solid, owner));
                }
            }
            MapObject::Group(group) => {
                stream.children.push(writer::group_node(group, owner));
                collect_children(group.id, &group.children, stream);
            }
            MapObject::Entity(entity) => {
                stream.children.push(writer::entity_node(entity, owner));
            }
        }
    }
}

/// Reconstruct the objects of a `clipboard` fragment
///
/// Returns `None` when the node is not a clipboard fragment. The fragment
/// is decoded exactly like a world block (groups, group linking, visible
/// solids) plus its loose entities, then every resulting object is
/// reindexed against the supplied generator.
pub fn extract_copy_stream(
    node: &StructureNode,
    generator: &mut IdGenerator,
) -> Option<Vec<MapObject>> {
    if node.name != "clipboard" {
        return None;
    }
    // A throwaway allocator keeps decoding self-consistent; the real IDs
    // are assigned by the reindex pass below
    let mut scratch = IdGenerator::new();
    let mut warnings = Vec::new();
    let world = parser::read_world(node, &mut scratch, &mut warnings).ok()?;
    let mut objects: Vec<MapObject> = world.children;
    for entity_node in node.children_named("entity") {
        if let Ok(entity) = parser::read_entity(entity_node, &mut scratch, &mut warnings) {
            objects.push(MapObject::Entity(entity));
        }
    }
    reindex(&mut objects, generator);
    Some(objects)
}

/// Replace every object ID and face ID in a subtree with fresh ones
///
/// Depth-first, preserving tree shape and relative order. Used when
/// merging objects into a document whose allocator must not collide with
/// the subtree's existing IDs.
pub fn reindex(objects: &mut [MapObject], generator: &mut IdGenerator) {
    for object in objects {
        match object {
            MapObject::Solid(solid) => {
                solid.id = generator.next_object_id();
                for face in &mut solid.faces {
                    face.id = generator.next_face_id();
                }
            }
            MapObject::Entity(entity) => {
                entity.id = generator.next_object_id();
                for solid in &mut entity.solids {
                    solid.id = generator.next_object_id();
                    for face in &mut solid.faces {
                        face.id = generator.next_face_id();
                    }
                }
            }
            MapObject::Group(group) => {
                group.id = generator.next_object_id();
                reindex(&mut group.children, generator);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, Group, Solid};

    #[test]
    fn test_non_clipboard_node_rejected() {
        let node = StructureNode::new("world");
        let mut generator = IdGenerator::new();
        assert!(extract_copy_stream(&node, &mut generator).is_none());
    }

    #[test]
    fn test_hidden_solids_filtered_from_copy() {
        let mut visible = Solid::new(1);
        visible.is_visgroup_hidden = false;
        let mut hidden = Solid::new(2);
        hidden.is_visgroup_hidden = true;
        let mut code_hidden = Solid::new(3);
        code_hidden.is_code_hidden = true;

        let stream = create_copy_stream(&[
            MapObject::Solid(visible),
            MapObject::Solid(hidden),
            MapObject::Solid(code_hidden),
        ]);
        assert_eq!(stream.children_named("solid").count(), 1);
        assert_eq!(
            stream.children_named("solid").next().unwrap().property("id"),
            Some("1")
        );
    }

    #[test]
    fn test_reindex_depth_first() {
        let mut group = Group::new(10);
        let mut entity = Entity::new(11);
        let mut solid = Solid::new(12);
        solid.faces.push(crate::model::Face::new(
            90,
            crate::geometry::Plane {
                normal: nalgebra::Vector3::z(),
                distance: 0.0,
            },
        ));
        entity.solids.push(solid);
        group.children.push(MapObject::Entity(entity));
        let mut objects = vec![MapObject::Group(group)];

        let mut generator = IdGenerator::new();
        generator.seen_object_id(99);
        generator.seen_face_id(200);
        reindex(&mut objects, &mut generator);

        let MapObject::Group(group) = &objects[0] else {
            panic!("expected group");
        };
        assert_eq!(group.id, 100);
        let MapObject::Entity(entity) = &group.children[0] else {
            panic!("expected entity");
        };
        assert_eq!(entity.id, 101);
        assert_eq!(entity.solids[0].id, 102);
        assert_eq!(entity.solids[0].faces[0].id, 201);
    }
}
