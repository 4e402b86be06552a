//! Face and solid decoding
//!
//! A solid record stores only its bounding planes; the polygons are
//! reconstructed here by intersecting every plane's half-space with all the
//! others. Reconstructed faces are matched back to their source records by
//! normal so texture alignment and displacement payloads can be
//! transferred onto the rebuilt geometry.

use crate::error::{Error, Result};
use crate::geometry::{Plane, clip_polygon, polygon_is_degenerate, polygon_plane, seed_polygon};
use crate::model::{Face, IdGenerator, Solid};
use crate::parser::{parse_plane_points, parse_texture_axis};
use crate::structure::StructureNode;

/// Decode one `side` record into a face with no polygon yet
///
/// The plane comes from the three stored reference points, never from the
/// eventual polygon. A stored face ID of 0 draws a fresh one.
pub(crate) fn decode_face(node: &StructureNode, generator: &mut IdGenerator) -> Result<Face> {
    let id = generator.face_id_or_next(node.property_i64("id", 0));

    let plane_text = node
        .property("plane")
        .ok_or_else(|| Error::missing_property("side", "plane"))?;
    let [p1, p2, p3] = parse_plane_points(plane_text)?;
    let plane = Plane::from_points(p1, p2, p3)?;

    let mut face = Face::new(id, plane);
    face.texture.material = node.property_or("material", "").to_string();
    if let Some(uaxis) = node.property("uaxis") {
        let (axis, shift, scale) = parse_texture_axis(uaxis)?;
        face.texture.u_axis = axis;
        face.texture.x_shift = shift;
        face.texture.x_scale = scale;
    }
    if let Some(vaxis) = node.property("vaxis") {
        let (axis, shift, scale) = parse_texture_axis(vaxis)?;
        face.texture.v_axis = axis;
        face.texture.y_shift = shift;
        face.texture.y_scale = scale;
    }
    face.texture.rotation = node.property_f64("rotation", 0.0);
    face.lightmap_scale = node.property_i64("lightmapscale", 16);
    face.smoothing_groups = node.property_i64("smoothing_groups", 0);

    if let Some(dispinfo) = node.first_child("dispinfo") {
        face.displacement = Some(super::decode_displacement(dispinfo));
    }

    Ok(face)
}

/// Decode one `solid` record by intersecting its face planes
///
/// Fails with a geometry error when a face's plane points are collinear,
/// when fewer than four usable planes remain, or when a reconstructed
/// polygon matches no source record's normal. Callers treat the error as
/// local to this solid: the record is dropped and the load continues.
pub(crate) fn decode_solid(node: &StructureNode, generator: &mut IdGenerator) -> Result<Solid> {
    let mut source_faces = Vec::new();
    for side in node.children_named("side") {
        source_faces.push(decode_face(side, generator)?);
    }
    if source_faces.len() < 4 {
        return Err(Error::Geometry(format!(
            "a solid needs at least 4 bounding planes, found {}",
            source_faces.len()
        )));
    }

    let mut solid = Solid::new(generator.object_id_or_next(node.property_i64("id", 0)));
    if let Some(editor) = node.first_child("editor") {
        solid.color = super::parse_color(
            editor.property_or("color", ""),
            crate::model::Color::brush_color(solid.id),
        );
        for value in editor.all_values("visgroupid") {
            if let Ok(vid) = value.trim().parse() {
                solid.visgroups.push(vid);
            }
        }
    }

    // Each plane's polygon is the part of it inside every other half-space.
    // Planes that lie entirely outside the intersection contribute nothing
    // and are dropped rather than treated as errors.
    let planes: Vec<Plane> = source_faces.iter().map(|f| f.plane).collect();
    let mut matched = vec![false; source_faces.len()];
    for (i, plane) in planes.iter().enumerate() {
        let mut polygon = seed_polygon(plane);
        for (j, other) in planes.iter().enumerate() {
            if i == j {
                continue;
            }
            polygon = clip_polygon(&polygon, other);
            if polygon.is_empty() {
                break;
            }
        }
        if polygon_is_degenerate(&polygon) {
            continue;
        }

        // Recover the plane from the clipped winding and match it back to a
        // source record; an unmatched polygon means the record set does not
        // describe a convex volume
        let rebuilt_plane = polygon_plane(&polygon)?;
        let source = source_faces
            .iter()
            .position(|f| f.plane.normal_equivalent(&rebuilt_plane))
            .ok_or_else(|| {
                Error::geometry(
                    &format!("solid {}", solid.id),
                    "reconstructed face matches no source plane",
                )
            })?;
        matched[source] = true;

        // Reconstructed geometry wins; source appearance data wins
        let mut face = source_faces[source].clone();
        face.plane = rebuilt_plane;
        face.vertices = polygon;
        if let Some(mut disp) = face.displacement.take() {
            face.align_texture_to_world();
            disp.calculate_points(&face.plane, &face.vertices)?;
            face.displacement = Some(disp);
        }
        solid.faces.push(face);
    }

    if solid.faces.len() < 4 {
        return Err(Error::geometry(
            &format!("solid {}", solid.id),
            "plane set does not enclose a volume",
        ));
    }

    // A displaced solid renders only through its displacement surfaces, so
    // every other face is hidden by code
    if solid.has_displacement() {
        for face in &mut solid.faces {
            face.is_hidden = face.displacement.is_none();
        }
    }

    solid.update_bounding_box();
    Ok(solid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::EPSILON;
    use nalgebra::Vector3;

    fn side(plane: &str) -> String {
        format!(
            "side\n{{\n\t\"id\" \"0\"\n\t\"plane\" \"{}\"\n\t\"material\" \"BRICK/BRICKFLOOR001A\"\n\t\"uaxis\" \"[1 0 0 0] 0.25\"\n\t\"vaxis\" \"[0 -1 0 0] 0.25\"\n\t\"rotation\" \"0\"\n}}\n",
            plane
        )
    }

    fn cube_record() -> StructureNode {
        // A 128-unit cube centered on the origin; plane points read
        // clockwise from outside
        let sides = [
            "(-64 -64 64) (-64 64 64) (64 64 64)",    // top, +Z
            "(-64 64 -64) (-64 -64 -64) (64 -64 -64)", // bottom, -Z
            "(-64 -64 -64) (-64 64 -64) (-64 64 64)", // -X
            "(64 64 -64) (64 -64 -64) (64 -64 64)",   // +X
            "(64 -64 -64) (-64 -64 -64) (-64 -64 64)", // -Y
            "(-64 64 -64) (64 64 -64) (64 64 64)",    // +Y
        ];
        let text = format!(
            "solid\n{{\n\t\"id\" \"2\"\n{}}}\n",
            sides.map(side).join("")
        );
        StructureNode::parse(&text).unwrap().remove(0)
    }

    #[test]
    fn test_decode_cube() {
        let mut generator = IdGenerator::new();
        let solid = decode_solid(&cube_record(), &mut generator).unwrap();
        assert_eq!(solid.id, 2);
        assert_eq!(solid.faces.len(), 6);
        for face in &solid.faces {
            assert_eq!(face.vertices.len(), 4);
        }
        let bbox = solid.bounding_box.unwrap();
        assert!((bbox.min - Vector3::new(-64.0, -64.0, -64.0)).amax() < EPSILON);
        assert!((bbox.max - Vector3::new(64.0, 64.0, 64.0)).amax() < EPSILON);
    }

    #[test]
    fn test_decode_cube_winding_is_ccw_outward() {
        let mut generator = IdGenerator::new();
        let solid = decode_solid(&cube_record(), &mut generator).unwrap();
        for face in &solid.faces {
            let rebuilt = polygon_plane(&face.vertices).unwrap();
            assert!(face.plane.normal_equivalent(&rebuilt));
            // Every vertex of a convex solid lies behind every face plane
            for other in &solid.faces {
                for v in &other.vertices {
                    assert!(face.plane.signed_distance(v) <= EPSILON);
                }
            }
        }
    }

    #[test]
    fn test_tetrahedron_yields_four_matched_faces() {
        let sides = [
            "(0 0 0) (64 0 0) (0 64 0)",
            "(0 0 0) (0 0 64) (64 0 0)",
            "(0 0 0) (0 64 0) (0 0 64)",
            "(64 0 0) (0 0 64) (0 64 0)",
        ];
        let text = format!(
            "solid\n{{\n\t\"id\" \"1\"\n{}}}\n",
            sides.map(side).join("")
        );
        let record = StructureNode::parse(&text).unwrap().remove(0);
        let mut generator = IdGenerator::new();
        let solid = decode_solid(&record, &mut generator).unwrap();
        assert_eq!(solid.faces.len(), 4);
        for face in &solid.faces {
            assert_eq!(face.vertices.len(), 3);
        }
        // Each face matched a distinct source plane
        let mut ids: Vec<i64> = solid.faces.iter().map(|f| f.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_redundant_plane_dropped_without_error() {
        // A cube plus a seventh plane far outside it
        let sides = [
            "(-64 -64 64) (-64 64 64) (64 64 64)",
            "(-64 64 -64) (-64 -64 -64) (64 -64 -64)",
            "(-64 -64 -64) (-64 64 -64) (-64 64 64)",
            "(64 64 -64) (64 -64 -64) (64 -64 64)",
            "(64 -64 -64) (-64 -64 -64) (-64 -64 64)",
            "(-64 64 -64) (64 64 -64) (64 64 64)",
            "(-64 -64 512) (-64 64 512) (64 64 512)",
        ];
        let text = format!(
            "solid\n{{\n\t\"id\" \"3\"\n{}}}\n",
            sides.map(side).join("")
        );
        let record = StructureNode::parse(&text).unwrap().remove(0);
        let mut generator = IdGenerator::new();
        let solid = decode_solid(&record, &mut generator).unwrap();
        assert_eq!(solid.faces.len(), 6);
    }

    #[test]
    fn test_too_few_planes_rejected() {
        let sides = [
            "(-64 -64 64) (-64 64 64) (64 64 64)",
            "(-64 64 -64) (-64 -64 -64) (64 -64 -64)",
            "(-64 -64 -64) (-64 64 -64) (-64 64 64)",
        ];
        let text = format!("solid\n{{\n{}}}\n", sides.map(side).join(""));
        let record = StructureNode::parse(&text).unwrap().remove(0);
        let mut generator = IdGenerator::new();
        let err = decode_solid(&record, &mut generator).unwrap_err();
        assert!(err.to_string().contains("[E3001]"));
    }

    #[test]
    fn test_collinear_plane_points_fail_face_decode() {
        let text = side("(0 0 0) (1 0 0) (2 0 0)");
        let record = StructureNode::parse(&text).unwrap().remove(0);
        let mut generator = IdGenerator::new();
        assert!(decode_face(&record, &mut generator).is_err());
    }

    #[test]
    fn test_face_ids_from_file_survive_reconstruction() {
        let record = cube_record();
        let mut generator = IdGenerator::new();
        let solid = decode_solid(&record, &mut generator).unwrap();
        // All six sides had sentinel IDs, so the generator assigned 1..=6
        let mut ids: Vec<i64> = solid.faces.iter().map(|f| f.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }
}
