//! Document parsing and scene assembly
//!
//! A VMF document is a flat sequence of top-level blocks: `versioninfo`,
//! `visgroups`, `viewsettings`, `world`, zero or more `entity` blocks,
//! `cameras` and `cordon`. Assembly runs in fixed passes per load: parse
//! the structure text, read visgroups, read the world header, read group
//! records, link groups into a tree, read visible then hidden solids, then
//! loose entities.
//!
//! A parse failure of the top-level text is fatal. A solid that cannot be
//! reconstructed is dropped with a [`LoadWarning`] and assembly continues;
//! one bad solid never sinks the rest of the map.

mod displacement;
mod solid;

pub(crate) use displacement::decode_displacement;
pub(crate) use solid::decode_solid;

use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::model::{
    Color, Entity, EntityData, Group, IdGenerator, LoadWarning, Map, MapObject, Visgroup, World,
};
use crate::structure::StructureNode;
use nalgebra::Vector3;
use std::collections::{HashMap, HashSet};
use std::io::Read;

/// Properties handled as dedicated fields rather than entity-data entries
const RESERVED_KEYS: [&str; 4] = ["id", "classname", "origin", "spawnflags"];

/// Parse a complete VMF document from a reader
pub fn parse_map<R: Read>(reader: R) -> Result<Map> {
    let nodes = StructureNode::parse_from(reader)?;
    assemble_map(&nodes)
}

/// Assemble a map from already-parsed top-level blocks
pub fn assemble_map(nodes: &[StructureNode]) -> Result<Map> {
    let mut generator = IdGenerator::new();
    let mut warnings = Vec::new();

    let version = nodes
        .iter()
        .find(|n| n.name == "versioninfo")
        .map(|n| n.property_i64("mapversion", 1))
        .unwrap_or(1);

    let mut visgroups = Vec::new();
    for block in nodes.iter().filter(|n| n.name == "visgroups") {
        for vg in block.children_named("visgroup") {
            visgroups.push(read_visgroup(vg));
        }
    }

    let mut world = match nodes.iter().find(|n| n.name == "world") {
        Some(node) => read_world(node, &mut generator, &mut warnings)?,
        None => World::new(generator.next_object_id()),
    };

    for node in nodes.iter().filter(|n| n.name == "entity") {
        let entity = read_entity(node, &mut generator, &mut warnings)?;
        world.children.push(MapObject::Entity(entity));
        world.update_bounding_box();
    }

    Ok(Map {
        version,
        visgroups,
        world,
        view_settings: nodes.iter().find(|n| n.name == "viewsettings").cloned(),
        cameras: nodes.iter().find(|n| n.name == "cameras").cloned(),
        cordon: nodes.iter().find(|n| n.name == "cordon").cloned(),
        warnings,
        id_generator: generator,
    })
}

/// Decode one visgroup record
fn read_visgroup(node: &StructureNode) -> Visgroup {
    let id = node.property_i64("visgroupid", 0);
    Visgroup {
        id,
        name: node.property_or("name", "").to_string(),
        color: parse_color(node.property_or("color", ""), Color::brush_color(id)),
        visible: true,
    }
}

/// Decode the world block (or a clipboard fragment shaped like one)
///
/// Runs the group, group-linking, visible-solid and hidden-solid passes.
pub(crate) fn read_world(
    node: &StructureNode,
    generator: &mut IdGenerator,
    warnings: &mut Vec<LoadWarning>,
) -> Result<World> {
    let mut world = World::new(generator.object_id_or_next(node.property_i64("id", 0)));
    world.data = read_entity_data(node);
    world.data.set("classname", "worldspawn");

    // Group records arrive flat; each carries its owning group's ID
    let mut groups: HashMap<i64, Group> = HashMap::new();
    let mut owners: Vec<(i64, i64)> = Vec::new();
    for group_node in node.children_named("group") {
        let group = read_group(group_node, generator);
        let owner = editor_block(group_node).map_or(0, |e| e.property_i64("groupid", 0));
        owners.push((group.id, owner));
        groups.insert(group.id, group);
    }

    let (roots, children_of) = link_groups(&owners, warnings);

    // Solids are bucketed by owning group before the tree is built, so a
    // group's bounding box can be computed once on construction
    let mut group_solids: HashMap<i64, Vec<MapObject>> = HashMap::new();
    let mut world_solids: Vec<MapObject> = Vec::new();
    let read_solid_pass = |solid_node: &StructureNode,
                              hidden: bool,
                              generator: &mut IdGenerator,
                              warnings: &mut Vec<LoadWarning>,
                              group_solids: &mut HashMap<i64, Vec<MapObject>>,
                              world_solids: &mut Vec<MapObject>| {
        match decode_solid(solid_node, generator) {
            Ok(mut solid) => {
                solid.is_visgroup_hidden = hidden;
                let gid = editor_block(solid_node).map_or(0, |e| e.property_i64("groupid", 0));
                if gid > 0 && groups.contains_key(&gid) {
                    group_solids.entry(gid).or_default().push(MapObject::Solid(solid));
                } else {
                    world_solids.push(MapObject::Solid(solid));
                }
            }
            Err(err) => warnings.push(LoadWarning::InvalidSolid {
                id: solid_node.property_i64("id", 0),
                reason: err.to_string(),
            }),
        }
    };

    for solid_node in node.children_named("solid") {
        read_solid_pass(
            solid_node,
            false,
            generator,
            warnings,
            &mut group_solids,
            &mut world_solids,
        );
    }
    // Visgroup-hidden solids are wrapped in a structural "hidden" block
    for hidden_node in node.children_named("hidden") {
        for solid_node in hidden_node.children_named("solid") {
            read_solid_pass(
                solid_node,
                true,
                generator,
                warnings,
                &mut group_solids,
                &mut world_solids,
            );
        }
    }

    for root in roots {
        let built = build_group(root, &mut groups, &children_of, &mut group_solids);
        world.children.push(MapObject::Group(built));
        world.update_bounding_box();
    }
    for solid in world_solids {
        world.children.push(solid);
        world.update_bounding_box();
    }

    Ok(world)
}

/// Resolve the flat owner-ID relation into a forest
///
/// A topological pass over the owner edges: groups owned by the world
/// (owner 0) seed the attached set and children attach once their owner
/// has. Dangling owners and cycles leave groups unattachable; each is
/// reported and promoted to a root so no data is lost.
fn link_groups(
    owners: &[(i64, i64)],
    warnings: &mut Vec<LoadWarning>,
) -> (Vec<i64>, HashMap<i64, Vec<i64>>) {
    let known: HashSet<i64> = owners.iter().map(|(id, _)| *id).collect();
    let mut children_of: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut roots: Vec<i64> = Vec::new();

    for &(id, owner) in owners {
        if owner == 0 {
            roots.push(id);
        } else if known.contains(&owner) {
            children_of.entry(owner).or_default().push(id);
        } else {
            warnings.push(LoadWarning::UnresolvedGroup { id, owner });
            roots.push(id);
        }
    }

    // Every group reachable from a root attaches; what remains is cyclic.
    // Break each cycle by promoting its first member (file order) to a root.
    let mut attached: HashSet<i64> = HashSet::new();
    let mut queue: Vec<i64> = roots.clone();
    while let Some(id) = queue.pop() {
        if attached.insert(id) {
            if let Some(kids) = children_of.get(&id) {
                queue.extend(kids.iter().copied());
            }
        }
    }
    for &(id, owner) in owners {
        if !attached.contains(&id) {
            warnings.push(LoadWarning::UnresolvedGroup { id, owner });
            roots.push(id);
            // Detach the cycle edge so the subtree builds under the new root
            if let Some(kids) = children_of.get_mut(&owner) {
                kids.retain(|&k| k != id);
            }
            let mut queue = vec![id];
            while let Some(next) = queue.pop() {
                if attached.insert(next) {
                    if let Some(kids) = children_of.get(&next) {
                        queue.extend(kids.iter().copied());
                    }
                }
            }
        }
    }

    (roots, children_of)
}

/// Move a group out of the flat registry, building its subtree bottom-up
fn build_group(
    id: i64,
    groups: &mut HashMap<i64, Group>,
    children_of: &HashMap<i64, Vec<i64>>,
    group_solids: &mut HashMap<i64, Vec<MapObject>>,
) -> Group {
    let mut group = groups.remove(&id).unwrap_or_else(|| Group::new(id));
    if let Some(child_ids) = children_of.get(&id) {
        for &child in child_ids {
            let built = build_group(child, groups, children_of, group_solids);
            group.children.push(MapObject::Group(built));
        }
    }
    if let Some(solids) = group_solids.remove(&id) {
        group.children.extend(solids);
    }
    group.update_bounding_box();
    group
}

/// Decode one group record (children are attached by the linking pass)
fn read_group(node: &StructureNode, generator: &mut IdGenerator) -> Group {
    let mut group = Group::new(generator.object_id_or_next(node.property_i64("id", 0)));
    apply_editor_block(node, &mut group.color, &mut group.visgroups, group.id);
    group
}

/// Decode one entity record, including any child solids
pub(crate) fn read_entity(
    node: &StructureNode,
    generator: &mut IdGenerator,
    warnings: &mut Vec<LoadWarning>,
) -> Result<Entity> {
    let mut entity = Entity::new(generator.object_id_or_next(node.property_i64("id", 0)));
    entity.classname = node.property_or("classname", "").to_string();
    entity.data = read_entity_data(node);
    entity.origin = parse_coordinate(node.property_or("origin", "0 0 0")).unwrap_or_else(|_| Point::zeros());
    apply_editor_block(node, &mut entity.color, &mut entity.visgroups, entity.id);

    for solid_node in node.children_named("solid") {
        match decode_solid(solid_node, generator) {
            Ok(solid) => entity.solids.push(solid),
            Err(err) => warnings.push(LoadWarning::InvalidSolid {
                id: solid_node.property_i64("id", 0),
                reason: err.to_string(),
            }),
        }
    }
    entity.update_bounding_box();
    Ok(entity)
}

/// Read a record's property bag, excluding bookkeeping keys
fn read_entity_data(node: &StructureNode) -> EntityData {
    let mut data = EntityData::default();
    for (key, value) in &node.properties {
        if !RESERVED_KEYS.contains(&key.as_str()) {
            data.properties.push((key.clone(), value.clone()));
        }
    }
    data.flags = node.property_i64("spawnflags", 0);
    data
}

/// The `editor` child block of a record, if present
fn editor_block(node: &StructureNode) -> Option<&StructureNode> {
    node.first_child("editor")
}

/// Apply color and visgroup membership from a record's editor block
fn apply_editor_block(node: &StructureNode, color: &mut Color, visgroups: &mut Vec<i64>, id: i64) {
    if let Some(editor) = editor_block(node) {
        *color = parse_color(editor.property_or("color", ""), Color::brush_color(id));
        for value in editor.all_values("visgroupid") {
            if let Ok(vid) = value.trim().parse() {
                visgroups.push(vid);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Value formats
// ---------------------------------------------------------------------------

/// Parse three space-separated coordinates, tolerating `[...]`/`(...)`
/// wrapping as used by `startposition` and plane points
pub(crate) fn parse_coordinate(value: &str) -> Result<Point> {
    let trimmed = value
        .trim()
        .trim_start_matches(['[', '('])
        .trim_end_matches([']', ')']);
    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(Error::numeric("coordinate", value));
    }
    Ok(Vector3::new(
        parts[0].parse()?,
        parts[1].parse()?,
        parts[2].parse()?,
    ))
}

/// Parse a plane as three parenthesized coordinate triples
pub(crate) fn parse_plane_points(value: &str) -> Result<[Point; 3]> {
    let mut points = Vec::with_capacity(3);
    let mut rest = value;
    while let Some(open) = rest.find('(') {
        let close = rest[open..]
            .find(')')
            .ok_or_else(|| Error::numeric("plane", value))?;
        points.push(parse_coordinate(&rest[open + 1..open + close])?);
        rest = &rest[open + close + 1..];
    }
    points
        .try_into()
        .map_err(|_| Error::numeric("plane", value))
}

/// Parse a texture axis: `[x y z shift] scale`
pub(crate) fn parse_texture_axis(value: &str) -> Result<(Vector3<f64>, f64, f64)> {
    let open = value.find('[').ok_or_else(|| Error::numeric("texture axis", value))?;
    let close = value.find(']').ok_or_else(|| Error::numeric("texture axis", value))?;
    if close < open {
        return Err(Error::numeric("texture axis", value));
    }
    let bracketed: Vec<&str> = value[open + 1..close].split_whitespace().collect();
    if bracketed.len() != 4 {
        return Err(Error::numeric("texture axis", value));
    }
    let axis = Vector3::new(
        bracketed[0].parse()?,
        bracketed[1].parse()?,
        bracketed[2].parse()?,
    );
    let shift: f64 = bracketed[3].parse()?;
    let scale: f64 = value[close + 1..].trim().parse()?;
    Ok((axis, shift, scale))
}

/// Parse a color as three 0-255 integers, falling back on malformed input
pub(crate) fn parse_color(value: &str, default: Color) -> Color {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() != 3 {
        return default;
    }
    match (parts[0].parse(), parts[1].parse(), parts[2].parse()) {
        (Ok(r), Ok(g), Ok(b)) => Color::new(r, g, b),
        _ => default,
    }
}

/// Parse a row of scalars, padding or truncating to `count`
pub(crate) fn parse_scalar_row(value: Option<&str>, count: usize) -> Vec<f64> {
    let mut row: Vec<f64> = value
        .unwrap_or("")
        .split_whitespace()
        .map(|t| t.parse().unwrap_or(0.0))
        .collect();
    row.resize(count, 0.0);
    row
}

/// Parse a row of coordinate triples, padding or truncating to `count`
pub(crate) fn parse_vector_row(value: Option<&str>, count: usize) -> Vec<Vector3<f64>> {
    let scalars = parse_scalar_row(value, count * 3);
    scalars
        .chunks_exact(3)
        .map(|c| Vector3::new(c[0], c[1], c[2]))
        .collect()
}
