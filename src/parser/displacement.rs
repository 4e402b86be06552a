//! Displacement decoding
//!
//! A `dispinfo` block stores five per-point channels as one row-keyed
//! property array per grid row (`row0` .. `rowN`). Legacy and hand-edited
//! files routinely omit whole channels; every missing channel or row
//! decodes to a zero value of the correct arity so the grid is always
//! fully populated.

use crate::model::Displacement;
use crate::parser::{parse_coordinate, parse_scalar_row, parse_vector_row};
use crate::structure::StructureNode;
use nalgebra::Vector3;

/// Decode a `dispinfo` block into a fully populated grid
///
/// The power defaults to 3 and is clamped to the supported 2..=4 range.
/// Point locations are not usable until the owning face's geometry is
/// known and [`Displacement::calculate_points`] has run.
pub(crate) fn decode_displacement(node: &StructureNode) -> Displacement {
    let mut disp = Displacement::new(node.property_i64("power", 3).max(0) as u32);
    disp.start_position = parse_coordinate(node.property_or("startposition", "[0 0 0]"))
        .unwrap_or_else(|_| Vector3::zeros());
    disp.elevation = node.property_f64("elevation", 0.0);
    disp.sub_div = node.property_i64("subdiv", 0) > 0;

    let size = disp.size();
    let normals = node.first_child("normals");
    let distances = node.first_child("distances");
    let offsets = node.first_child("offsets");
    let offset_normals = node.first_child("offset_normals");
    let alphas = node.first_child("alphas");

    for row in 0..size {
        let key = format!("row{}", row);
        fn row_value_fn<'a>(channel: Option<&'a StructureNode>, key: &str) -> Option<&'a str> {
            channel.and_then(|c| c.property(key))
        }
        let row_value = |channel| row_value_fn(channel, &key);
        let norm = parse_vector_row(row_value(normals), size);
        let dist = parse_scalar_row(row_value(distances), size);
        let offs = parse_scalar_row(row_value(offsets), size);
        let offn = parse_vector_row(row_value(offset_normals), size);
        let alph = parse_scalar_row(row_value(alphas), size);
        for col in 0..size {
            let point = disp.point_mut(row, col);
            point.normal = norm[col];
            point.distance = dist[col];
            point.offset_normal = offn[col];
            point.offset_distance = offs[col];
            point.alpha = alph[col];
        }
    }

    disp
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispinfo(body: &str) -> StructureNode {
        let text = format!("dispinfo\n{{\n{}}}\n", body);
        StructureNode::parse(&text).unwrap().remove(0)
    }

    #[test]
    fn test_decode_basic_fields() {
        let node = dispinfo(
            "\t\"power\" \"2\"\n\t\"startposition\" \"[0 64 8]\"\n\t\"elevation\" \"4.5\"\n\t\"subdiv\" \"1\"\n",
        );
        let disp = decode_displacement(&node);
        assert_eq!(disp.power(), 2);
        assert_eq!(disp.size(), 5);
        assert_eq!(disp.start_position, Vector3::new(0.0, 64.0, 8.0));
        assert!((disp.elevation - 4.5).abs() < 1e-12);
        assert!(disp.sub_div);
    }

    #[test]
    fn test_invalid_power_defaults_and_clamps() {
        let disp = decode_displacement(&dispinfo("\t\"power\" \"notanumber\"\n"));
        assert_eq!(disp.power(), 3);
        let disp = decode_displacement(&dispinfo("\t\"power\" \"7\"\n"));
        assert_eq!(disp.power(), 4);
    }

    #[test]
    fn test_channel_rows_populate_grid() {
        let node = dispinfo(
            "\t\"power\" \"2\"\n\tnormals\n\t{\n\t\t\"row0\" \"0 0 1 0 0 1 0 0 1 0 0 1 0 0 1\"\n\t}\n\tdistances\n\t{\n\t\t\"row0\" \"10 20 30 40 50\"\n\t}\n",
        );
        let disp = decode_displacement(&node);
        assert_eq!(disp.point(0, 0).normal, Vector3::z());
        assert_eq!(disp.point(0, 2).distance, 30.0);
        // Rows beyond the supplied data stay at the zero identity
        assert_eq!(disp.point(1, 0).distance, 0.0);
        assert_eq!(disp.point(1, 0).normal, Vector3::zeros());
    }

    #[test]
    fn test_missing_alphas_yield_zero_not_failure() {
        let node = dispinfo("\t\"power\" \"3\"\n");
        let disp = decode_displacement(&node);
        for row in 0..disp.size() {
            for col in 0..disp.size() {
                assert_eq!(disp.point(row, col).alpha, 0.0);
            }
        }
    }

    #[test]
    fn test_short_row_padded() {
        let node = dispinfo(
            "\t\"power\" \"2\"\n\tdistances\n\t{\n\t\t\"row0\" \"1 2\"\n\t}\n",
        );
        let disp = decode_displacement(&node);
        assert_eq!(disp.point(0, 1).distance, 2.0);
        assert_eq!(disp.point(0, 4).distance, 0.0);
    }
}
