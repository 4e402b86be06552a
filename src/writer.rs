//! Document writing
//!
//! The writer flattens the object tree back into the flat, ID-referenced
//! records of the format: solids and groups are collected from the whole
//! tree into the `world` block with `groupid` back-references in their
//! editor blocks, entities become top-level blocks, and visgroup-hidden
//! solids are wrapped in structural `hidden` blocks.
//!
//! Coordinates are emitted to 3 decimal places; plane points read
//! clockwise when viewed from outside the solid, so each face's plane is
//! written from its first three vertices in reverse. Displacement grids
//! are written in the same row-keyed channel layout the parser consumes,
//! making displaced solids round-trip complete.

use crate::error::Result;
use crate::geometry::Point;
use crate::model::{
    Color, Displacement, Entity, EntityData, Face, Group, Map, MapObject, Solid, Visgroup, World,
};
use crate::structure::StructureNode;
use std::io::Write;

/// Write a complete VMF document
///
/// Blocks are emitted in the conventional order: `versioninfo`,
/// `visgroups`, `viewsettings`, `world`, entities, `cameras`, `cordon`.
pub fn write_map<W: Write>(map: &Map, mut writer: W) -> Result<()> {
    let flat = flatten_world(&map.world);

    write!(writer, "{}", versioninfo_node(map))?;
    write!(writer, "{}", visgroups_node(&map.visgroups))?;
    let viewsettings = map
        .view_settings
        .clone()
        .unwrap_or_else(|| StructureNode::new("viewsettings"));
    write!(writer, "{}", viewsettings)?;
    write!(writer, "{}", world_node(map, &flat))?;
    for (entity, group_id) in &flat.entities {
        write!(writer, "{}", entity_node(entity, *group_id))?;
    }
    let cameras = map
        .cameras
        .clone()
        .unwrap_or_else(|| StructureNode::new("cameras"));
    write!(writer, "{}", cameras)?;
    let cordon = map
        .cordon
        .clone()
        .unwrap_or_else(|| StructureNode::new("cordon"));
    write!(writer, "{}", cordon)?;
    Ok(())
}

/// The object tree flattened into per-kind record lists
///
/// Each record carries the ID of its owning group (0 = attached directly
/// under the world), which the reader uses to rebuild the tree.
struct FlatTree<'a> {
    solids: Vec<(&'a Solid, i64)>,
    entities: Vec<(&'a Entity, i64)>,
    groups: Vec<(&'a Group, i64)>,
}

fn flatten_world(world: &World) -> FlatTree<'_> {
    let mut flat = FlatTree {
        solids: Vec::new(),
        entities: Vec::new(),
        groups: Vec::new(),
    };
    flatten_children(&world.children, 0, &mut flat);
    flat
}

fn flatten_children<'a>(children: &'a [MapObject], group_id: i64, flat: &mut FlatTree<'a>) {
    for child in children {
        match child {
            MapObject::Solid(solid) => flat.solids.push((solid, group_id)),
            MapObject::Entity(entity) => flat.entities.push((entity, group_id)),
            MapObject::Group(group) => {
                flat.groups.push((group, group_id));
                flatten_children(&group.children, group.id, flat);
            }
        }
    }
}

fn versioninfo_node(map: &Map) -> StructureNode {
    let mut node = StructureNode::new("versioninfo");
    node.add_property("editorversion", "400");
    node.add_property("editorbuild", "0");
    node.add_property("mapversion", map.version.to_string());
    node.add_property("formatversion", "100");
    node.add_property("prefab", "0");
    node
}

fn visgroups_node(visgroups: &[Visgroup]) -> StructureNode {
    let mut node = StructureNode::new("visgroups");
    for visgroup in visgroups {
        let mut vg = StructureNode::new("visgroup");
        vg.add_property("name", visgroup.name.clone());
        vg.add_property("visgroupid", visgroup.id.to_string());
        vg.add_property("color", fmt_color(visgroup.color));
        node.children.push(vg);
    }
    node
}

fn world_node(map: &Map, flat: &FlatTree<'_>) -> StructureNode {
    let mut node = StructureNode::new("world");
    node.add_property("id", map.world.id.to_string());
    node.add_property("classname", "worldspawn");

    let mut data = map.world.data.clone();
    data.set("mapversion", map.version.to_string());
    for (key, default) in [
        ("detailmaterial", "detail/detailsprites"),
        ("detailvbsp", "detail.vbsp"),
        ("maxpropscreenwidth", "-1"),
        ("skyname", "sky_day01_01"),
    ] {
        if data.get(key).is_none() {
            data.set(key, default);
        }
    }
    write_entity_data(&mut node, &data);

    for (solid, group_id) in &flat.solids {
        node.children.push(solid_node(solid, *group_id));
    }
    for (group, owner_id) in &flat.groups {
        node.children.push(group_node(group, *owner_id));
    }
    node
}

fn write_entity_data(node: &mut StructureNode, data: &EntityData) {
    for (key, value) in &data.properties {
        if key != "classname" {
            node.add_property(key.clone(), value.clone());
        }
    }
    node.add_property("spawnflags", data.flags.to_string());
}

/// Encode one solid, wrapping it in a `hidden` block when the solid is
/// hidden by a visgroup (a structural convention of this format)
pub(crate) fn solid_node(solid: &Solid, group_id: i64) -> StructureNode {
    let mut node = StructureNode::new("solid");
    node.add_property("id", solid.id.to_string());
    for face in &solid.faces {
        node.children.push(face_node(face));
    }
    node.children
        .push(editor_node(solid.color, &solid.visgroups, group_id));

    if solid.is_visgroup_hidden {
        let mut hidden = StructureNode::new("hidden");
        hidden.children.push(node);
        return hidden;
    }
    node
}

/// Encode one face
///
/// The plane is written as three representative points from the polygon;
/// the `vertex` child block is auxiliary display data the reader never
/// consumes, since polygons are reconstructed from the planes.
fn face_node(face: &Face) -> StructureNode {
    let mut node = StructureNode::new("side");
    node.add_property("id", face.id.to_string());
    node.add_property(
        "plane",
        format!(
            "({}) ({}) ({})",
            fmt_coord(&face.vertices[2]),
            fmt_coord(&face.vertices[1]),
            fmt_coord(&face.vertices[0]),
        ),
    );
    node.add_property("material", face.texture.material.clone());
    node.add_property(
        "uaxis",
        fmt_axis(&face.texture.u_axis, face.texture.x_shift, face.texture.x_scale),
    );
    node.add_property(
        "vaxis",
        fmt_axis(&face.texture.v_axis, face.texture.y_shift, face.texture.y_scale),
    );
    node.add_property("rotation", fmt_num(face.texture.rotation));
    node.add_property("lightmapscale", face.lightmap_scale.to_string());
    node.add_property("smoothing_groups", face.smoothing_groups.to_string());

    let mut vertices = StructureNode::new("vertex");
    for (i, v) in face.vertices.iter().enumerate() {
        vertices.add_property(format!("vertex{}", i), fmt_coord(v));
    }
    node.children.push(vertices);

    if let Some(disp) = &face.displacement {
        node.children.push(displacement_node(disp));
    }
    node
}

/// Encode a displacement grid in the row-keyed channel layout
fn displacement_node(disp: &Displacement) -> StructureNode {
    let mut node = StructureNode::new("dispinfo");
    node.add_property("power", disp.power().to_string());
    node.add_property(
        "startposition",
        format!("[{}]", fmt_coord(&disp.start_position)),
    );
    node.add_property("elevation", fmt_num(disp.elevation));
    node.add_property("subdiv", if disp.sub_div { "1" } else { "0" });

    let size = disp.size();
    let mut channel = |name: &str, value: &dyn Fn(usize, usize) -> String| {
        let mut block = StructureNode::new(name);
        for row in 0..size {
            let cells: Vec<String> = (0..size).map(|col| value(row, col)).collect();
            block.add_property(format!("row{}", row), cells.join(" "));
        }
        node.children.push(block);
    };
    channel("normals", &|r, c| fmt_vector(&disp.point(r, c).normal));
    channel("distances", &|r, c| fmt_num(disp.point(r, c).distance));
    channel("offsets", &|r, c| fmt_num(disp.point(r, c).offset_distance));
    channel("offset_normals", &|r, c| {
        fmt_vector(&disp.point(r, c).offset_normal)
    });
    channel("alphas", &|r, c| fmt_num(disp.point(r, c).alpha));
    node
}

/// Encode one entity with its child solids
pub(crate) fn entity_node(entity: &Entity, group_id: i64) -> StructureNode {
    let mut node = StructureNode::new("entity");
    node.add_property("id", entity.id.to_string());
    node.add_property("classname", entity.classname.clone());
    write_entity_data(&mut node, &entity.data);
    if entity.is_point_entity() {
        node.add_property("origin", fmt_coord(&entity.origin));
    }
    node.children
        .push(editor_node(entity.color, &entity.visgroups, group_id));
    for solid in &entity.solids {
        node.children.push(solid_node(solid, 0));
    }
    node
}

/// Encode one group record (its children are written flattened)
pub(crate) fn group_node(group: &Group, owner_id: i64) -> StructureNode {
    let mut node = StructureNode::new("group");
    node.add_property("id", group.id.to_string());
    node.children
        .push(editor_node(group.color, &group.visgroups, owner_id));
    node
}

fn editor_node(color: Color, visgroups: &[i64], group_id: i64) -> StructureNode {
    let mut node = StructureNode::new("editor");
    node.add_property("color", fmt_color(color));
    for visgroup in visgroups {
        node.add_property("visgroupid", visgroup.to_string());
    }
    node.add_property("visgroupshown", "1");
    node.add_property("visgroupautoshown", "1");
    if group_id > 0 {
        node.add_property("groupid", group_id.to_string());
    }
    node
}

// ---------------------------------------------------------------------------
// Value formatting
// ---------------------------------------------------------------------------

fn fmt_coord(p: &Point) -> String {
    format!("{:.3} {:.3} {:.3}", p.x, p.y, p.z)
}

fn fmt_color(c: Color) -> String {
    format!("{} {} {}", c.r, c.g, c.b)
}

fn fmt_axis(axis: &Point, shift: f64, scale: f64) -> String {
    format!(
        "[{} {} {} {}] {}",
        fmt_num(axis.x),
        fmt_num(axis.y),
        fmt_num(axis.z),
        fmt_num(shift),
        fmt_num(scale)
    )
}

fn fmt_vector(v: &Point) -> String {
    format!("{} {} {}", fmt_num(v.x), fmt_num(v.y), fmt_num(v.z))
}

fn fmt_num(v: f64) -> String {
    // f64 Display is shortest round-trip, so reparsing loses nothing
    format!("{}", v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Plane;
    use nalgebra::Vector3;

    #[test]
    fn test_fmt_coord_three_decimals() {
        let p = Point::new(1.0, -2.5, 0.125);
        assert_eq!(fmt_coord(&p), "1.000 -2.500 0.125");
    }

    #[test]
    fn test_fmt_axis() {
        assert_eq!(
            fmt_axis(&Vector3::new(0.0, -1.0, 0.0), 32.0, 0.25),
            "[0 -1 0 32] 0.25"
        );
    }

    #[test]
    fn test_face_plane_points_reparse_to_same_plane() {
        let plane = Plane {
            normal: Vector3::z(),
            distance: 64.0,
        };
        let mut face = Face::new(1, plane);
        // Counter-clockwise about +Z
        face.vertices = vec![
            Point::new(0.0, 0.0, 64.0),
            Point::new(64.0, 0.0, 64.0),
            Point::new(64.0, 64.0, 64.0),
            Point::new(0.0, 64.0, 64.0),
        ];
        let node = face_node(&face);
        let [p1, p2, p3] =
            crate::parser::parse_plane_points(node.property("plane").unwrap()).unwrap();
        let reparsed = Plane::from_points(p1, p2, p3).unwrap();
        assert!(plane.normal_equivalent(&reparsed));
    }

    #[test]
    fn test_visgroup_hidden_solid_wrapped() {
        let plane = Plane {
            normal: Vector3::z(),
            distance: 0.0,
        };
        let mut face = Face::new(1, plane);
        face.vertices = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(1.0, 1.0, 0.0),
        ];
        let mut solid = Solid::new(7);
        solid.faces.push(face);
        solid.is_visgroup_hidden = true;
        let node = solid_node(&solid, 0);
        assert_eq!(node.name, "hidden");
        assert_eq!(node.children[0].name, "solid");
        assert_eq!(node.children[0].property("id"), Some("7"));
    }

    #[test]
    fn test_editor_node_omits_zero_group() {
        let node = editor_node(Color::new(1, 2, 3), &[4, 5], 0);
        assert_eq!(node.property("groupid"), None);
        let values: Vec<&str> = node.all_values("visgroupid").collect();
        assert_eq!(values, vec!["4", "5"]);

        let node = editor_node(Color::new(1, 2, 3), &[], 9);
        assert_eq!(node.property("groupid"), Some("9"));
    }

    #[test]
    fn test_displacement_node_round_keyed_layout() {
        let mut disp = Displacement::new(2);
        disp.point_mut(0, 0).normal = Vector3::z();
        disp.point_mut(0, 0).distance = 16.0;
        disp.point_mut(4, 4).alpha = 255.0;
        let node = displacement_node(&disp);
        let normals = node.first_child("normals").unwrap();
        assert!(normals.property("row0").unwrap().starts_with("0 0 1"));
        assert_eq!(
            node.first_child("distances").unwrap().property("row0").unwrap(),
            "16 0 0 0 0"
        );
        assert!(
            node.first_child("alphas").unwrap().property("row4").unwrap().ends_with("255")
        );
        // All five channels and every row are present
        for name in ["normals", "distances", "offsets", "offset_normals", "alphas"] {
            let block = node.first_child(name).unwrap();
            for row in 0..5 {
                assert!(block.property(&format!("row{}", row)).is_some());
            }
        }
    }
}
