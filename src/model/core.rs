//! Core scene-graph types
//!
//! A loaded map is a strict single-owner tree: the world owns its top-level
//! children, groups own theirs, brush entities own their solids. Parent
//! references in the file (a solid's `groupid`) are resolved during
//! assembly and never stored as back-pointers; the writer recomputes them
//! while flattening the tree.

use crate::geometry::{BoundingBox, Plane, Point, polygon_plane, union_opt};
use crate::model::Displacement;
use nalgebra::Vector3;

/// An RGB display color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

impl Color {
    /// Create a color from channels
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// A deterministic brush color for an object with no stored color
    ///
    /// Hammer assigns random pastel colors to new brushes; for decoding we
    /// want reproducible output, so the palette is indexed by object ID.
    pub fn brush_color(id: i64) -> Self {
        const PALETTE: [(u8, u8, u8); 8] = [
            (120, 220, 120),
            (220, 120, 120),
            (120, 120, 220),
            (220, 220, 120),
            (120, 220, 220),
            (220, 120, 220),
            (160, 220, 130),
            (220, 160, 130),
        ];
        let (r, g, b) = PALETTE[(id.rem_euclid(PALETTE.len() as i64)) as usize];
        Self { r, g, b }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::new(255, 255, 255)
    }
}

/// Texture alignment data for one face
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    /// Material name
    pub material: String,
    /// U axis direction
    pub u_axis: Vector3<f64>,
    /// Shift along the U axis
    pub x_shift: f64,
    /// Scale along the U axis
    pub x_scale: f64,
    /// V axis direction
    pub v_axis: Vector3<f64>,
    /// Shift along the V axis
    pub y_shift: f64,
    /// Scale along the V axis
    pub y_scale: f64,
    /// Texture rotation in degrees
    pub rotation: f64,
}

impl Default for Texture {
    fn default() -> Self {
        Self {
            material: String::new(),
            u_axis: Vector3::x(),
            x_shift: 0.0,
            x_scale: 0.25,
            v_axis: -Vector3::y(),
            y_shift: 0.0,
            y_scale: 0.25,
            rotation: 0.0,
        }
    }
}

/// A planar polygon bounding one side of a solid
///
/// Vertices are wound counter-clockwise with respect to the outward normal
/// and are coplanar with `plane` within tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// Face ID, unique within a map
    pub id: i64,
    /// The face's plane, outward normal
    pub plane: Plane,
    /// Polygon vertices, counter-clockwise
    pub vertices: Vec<Point>,
    /// Texture alignment
    pub texture: Texture,
    /// Lightmap resolution for this face
    pub lightmap_scale: i64,
    /// Smoothing group bitmask
    pub smoothing_groups: i64,
    /// Hidden by code: set on every non-displacement face of a solid that
    /// carries a displacement, a convention of this format
    pub is_hidden: bool,
    /// Displacement payload, when this face is a displaced surface
    pub displacement: Option<Displacement>,
}

impl Face {
    /// Create a face on a plane with no vertices yet
    pub fn new(id: i64, plane: Plane) -> Self {
        Self {
            id,
            plane,
            vertices: Vec::new(),
            texture: Texture::default(),
            lightmap_scale: 16,
            smoothing_groups: 0,
            is_hidden: false,
            displacement: None,
        }
    }

    /// Align the texture axes to the world axes closest to this face
    ///
    /// Must run before a displacement's grid is projected, so the U/V axes
    /// match what the game derives for displaced surfaces.
    pub fn align_texture_to_world(&mut self) {
        let axis = self.plane.closest_axis();
        if axis == Vector3::<f64>::x() {
            self.texture.u_axis = Vector3::y();
            self.texture.v_axis = -Vector3::z();
        } else if axis == Vector3::<f64>::y() {
            self.texture.u_axis = Vector3::x();
            self.texture.v_axis = -Vector3::z();
        } else {
            self.texture.u_axis = Vector3::x();
            self.texture.v_axis = -Vector3::y();
        }
        self.texture.x_shift = 0.0;
        self.texture.y_shift = 0.0;
        self.texture.rotation = 0.0;
    }

    /// The bounding box of this face's polygon
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        if let Some(disp) = &self.displacement {
            disp.bounding_box()
        } else {
            BoundingBox::from_points(self.vertices.iter().copied())
        }
    }

    /// Recompute the plane from the current polygon winding
    pub fn recompute_plane(&mut self) -> crate::error::Result<()> {
        self.plane = polygon_plane(&self.vertices)?;
        Ok(())
    }
}

/// A convex polyhedron bounded by its faces
#[derive(Debug, Clone, PartialEq)]
pub struct Solid {
    /// Object ID, unique within a map
    pub id: i64,
    /// Bounding faces; their planes enclose a convex volume
    pub faces: Vec<Face>,
    /// Display color
    pub color: Color,
    /// Visgroup membership by visgroup ID
    pub visgroups: Vec<i64>,
    /// Hidden by code (e.g. cordon or tooling state)
    pub is_code_hidden: bool,
    /// Hidden because a visgroup containing it is hidden
    pub is_visgroup_hidden: bool,
    /// Cached bounding box over all face vertices
    pub bounding_box: Option<BoundingBox>,
}

impl Solid {
    /// Create an empty solid
    pub fn new(id: i64) -> Self {
        Self {
            id,
            faces: Vec::new(),
            color: Color::brush_color(id),
            visgroups: Vec::new(),
            is_code_hidden: false,
            is_visgroup_hidden: false,
            bounding_box: None,
        }
    }

    /// Recompute the bounding box from the current face vertices
    pub fn update_bounding_box(&mut self) {
        self.bounding_box = self
            .faces
            .iter()
            .map(Face::bounding_box)
            .fold(None, union_opt);
    }

    /// Whether any face carries a displacement
    pub fn has_displacement(&self) -> bool {
        self.faces.iter().any(|f| f.displacement.is_some())
    }
}

/// An entity's key/value bag plus its flag bitmask
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityData {
    /// Ordered key/value properties, excluding bookkeeping keys
    pub properties: Vec<(String, String)>,
    /// The `spawnflags` bitmask
    pub flags: i64,
}

impl EntityData {
    /// The first value for a property key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a property, replacing the first occurrence of the key
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        match self.properties.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.into(),
            None => self.properties.push((key.to_string(), value.into())),
        }
    }
}

/// A game object: a point entity or a brush entity owning solids
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Object ID, unique within a map
    pub id: i64,
    /// Entity class name
    pub classname: String,
    /// Property bag and spawnflags
    pub data: EntityData,
    /// Origin; meaningful only for point entities (no child solids)
    pub origin: Point,
    /// Display color
    pub color: Color,
    /// Visgroup membership by visgroup ID
    pub visgroups: Vec<i64>,
    /// Child solids; non-empty for brush entities
    pub solids: Vec<Solid>,
    /// Cached bounding box
    pub bounding_box: Option<BoundingBox>,
}

impl Entity {
    /// Create an entity with an empty property bag
    pub fn new(id: i64) -> Self {
        Self {
            id,
            classname: String::new(),
            data: EntityData::default(),
            origin: Point::zeros(),
            color: Color::brush_color(id),
            visgroups: Vec::new(),
            solids: Vec::new(),
            bounding_box: None,
        }
    }

    /// Whether this is a point entity (owns no solids)
    pub fn is_point_entity(&self) -> bool {
        self.solids.is_empty()
    }

    /// Recompute the bounding box from child solids, or the origin for a
    /// point entity
    pub fn update_bounding_box(&mut self) {
        self.bounding_box = if self.solids.is_empty() {
            BoundingBox::from_points(std::iter::once(self.origin))
        } else {
            self.solids
                .iter()
                .map(|s| s.bounding_box)
                .fold(None, union_opt)
        };
    }
}

/// An organizational container with no geometry of its own
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Object ID, unique within a map
    pub id: i64,
    /// Display color
    pub color: Color,
    /// Visgroup membership by visgroup ID
    pub visgroups: Vec<i64>,
    /// Child objects, in attach order
    pub children: Vec<MapObject>,
    /// Cached bounding box over all children
    pub bounding_box: Option<BoundingBox>,
}

impl Group {
    /// Create an empty group
    pub fn new(id: i64) -> Self {
        Self {
            id,
            color: Color::brush_color(id),
            visgroups: Vec::new(),
            children: Vec::new(),
            bounding_box: None,
        }
    }

    /// Recompute the bounding box from the current children
    pub fn update_bounding_box(&mut self) {
        self.bounding_box = self
            .children
            .iter()
            .map(MapObject::bounding_box)
            .fold(None, union_opt);
    }
}

/// Any object that can live in the map tree
///
/// A closed sum type so every consumer matches exhaustively; adding a
/// variant forces every consumption site to handle it.
#[derive(Debug, Clone, PartialEq)]
pub enum MapObject {
    /// A convex brush
    Solid(Solid),
    /// A point or brush entity
    Entity(Entity),
    /// An organizational group
    Group(Group),
}

impl MapObject {
    /// The object's ID
    pub fn id(&self) -> i64 {
        match self {
            MapObject::Solid(s) => s.id,
            MapObject::Entity(e) => e.id,
            MapObject::Group(g) => g.id,
        }
    }

    /// The object's bounding box, when it has any geometry
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self {
            MapObject::Solid(s) => s.bounding_box,
            MapObject::Entity(e) => e.bounding_box,
            MapObject::Group(g) => g.bounding_box,
        }
    }
}

/// The root container: the worldspawn record plus all top-level objects
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    /// Object ID of the worldspawn record
    pub id: i64,
    /// World-level entity data (`skyname`, `mapversion`, ...)
    pub data: EntityData,
    /// Top-level groups, solids and entities
    pub children: Vec<MapObject>,
    /// Cached bounding box over all children
    pub bounding_box: Option<BoundingBox>,
}

impl World {
    /// Create an empty world
    pub fn new(id: i64) -> Self {
        let mut data = EntityData::default();
        data.set("classname", "worldspawn");
        Self {
            id,
            data,
            children: Vec::new(),
            bounding_box: None,
        }
    }

    /// Recompute the bounding box from the current children
    pub fn update_bounding_box(&mut self) {
        self.bounding_box = self
            .children
            .iter()
            .map(MapObject::bounding_box)
            .fold(None, union_opt);
    }
}

/// A named visibility tag objects can be associated with
///
/// Visgroups are a flat registry on the map, referenced by ID from object
/// membership sets; they are never nested in the object tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Visgroup {
    /// Visgroup ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// Display color
    pub color: Color,
    /// Whether objects in this visgroup are currently shown
    pub visible: bool,
}

/// A recoverable condition recorded while loading a document
///
/// Warnings never abort a load; callers decide whether to surface them.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadWarning {
    /// A solid whose plane set could not be reconstructed; it was dropped
    InvalidSolid {
        /// The stored ID of the dropped solid
        id: i64,
        /// Why reconstruction failed
        reason: String,
    },
    /// A group whose owning group ID resolved to no loaded group; it was
    /// attached directly under the world instead
    UnresolvedGroup {
        /// The group's ID
        id: i64,
        /// The owner ID that did not resolve
        owner: i64,
    },
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadWarning::InvalidSolid { id, reason } => {
                write!(f, "invalid solid {} dropped: {}", id, reason)
            }
            LoadWarning::UnresolvedGroup { id, owner } => {
                write!(
                    f,
                    "group {} references missing owner group {}; attached to world",
                    id, owner
                )
            }
        }
    }
}

/// A fully loaded map document
#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    /// Map version from the `versioninfo` block
    pub version: i64,
    /// Flat visgroup registry
    pub visgroups: Vec<Visgroup>,
    /// The object tree root
    pub world: World,
    /// Raw `viewsettings` block, preserved for round-trips
    pub view_settings: Option<crate::structure::StructureNode>,
    /// Raw `cameras` block, preserved for round-trips
    pub cameras: Option<crate::structure::StructureNode>,
    /// Raw `cordon` block, preserved for round-trips
    pub cordon: Option<crate::structure::StructureNode>,
    /// Recoverable conditions encountered while loading
    pub warnings: Vec<LoadWarning>,
    /// The document's identifier allocator
    pub id_generator: crate::model::IdGenerator,
}

impl Map {
    /// Create an empty map with a fresh world
    pub fn new() -> Self {
        let mut generator = crate::model::IdGenerator::new();
        let world_id = generator.next_object_id();
        Self {
            version: 1,
            visgroups: Vec::new(),
            world: World::new(world_id),
            view_settings: None,
            cameras: None,
            cordon: None,
            warnings: Vec::new(),
            id_generator: generator,
        }
    }
}

impl Default for Map {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brush_color_deterministic() {
        assert_eq!(Color::brush_color(3), Color::brush_color(3));
        assert_ne!(Color::brush_color(3), Color::brush_color(4));
    }

    #[test]
    fn test_point_entity_bounding_box_is_origin() {
        let mut entity = Entity::new(5);
        entity.origin = Point::new(16.0, -8.0, 32.0);
        entity.update_bounding_box();
        let bbox = entity.bounding_box.unwrap();
        assert_eq!(bbox.min, entity.origin);
        assert_eq!(bbox.max, entity.origin);
    }

    #[test]
    fn test_entity_data_set_replaces() {
        let mut data = EntityData::default();
        data.set("skyname", "sky_day01_01");
        data.set("skyname", "sky_night_01");
        assert_eq!(data.get("skyname"), Some("sky_night_01"));
        assert_eq!(data.properties.len(), 1);
    }

    #[test]
    fn test_align_texture_to_world_floor() {
        let plane = Plane {
            normal: Vector3::z(),
            distance: 0.0,
        };
        let mut face = Face::new(1, plane);
        face.align_texture_to_world();
        assert_eq!(face.texture.u_axis, Vector3::x());
        assert_eq!(face.texture.v_axis, -Vector3::y());
    }

    #[test]
    fn test_new_map_world_id_allocated() {
        let mut map = Map::new();
        assert_eq!(map.world.id, 1);
        assert_eq!(map.id_generator.next_object_id(), 2);
    }
}
