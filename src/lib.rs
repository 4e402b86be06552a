//! # libvmf
//!
//! A pure Rust implementation for parsing and writing VMF (Valve Map
//! Format) files.
//!
//! VMF is the plain-text level format used by the Hammer editor: a tree of
//! named key-value blocks describing convex solids (as unordered sets of
//! bounding planes), entities, organizational groups and visibility
//! groups. This library converts between that text and an in-memory scene
//! graph, reconstructing solid geometry by plane intersection on load.
//!
//! ## Features
//!
//! - Pure Rust implementation with no unsafe code
//! - Generic key-value block grammar parsing and stable writing
//! - Convex solid reconstruction from bounding planes
//! - Displacement (height-mapped) surface decoding and encoding
//! - Group/visgroup hierarchy assembly from flat, ID-referenced records
//! - Copy/paste streams with collision-free identifier reindexing
//!
//! ## Example
//!
//! ```no_run
//! use libvmf::Map;
//! use std::fs::File;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = File::open("level.vmf")?;
//! let map = Map::from_reader(file)?;
//!
//! println!("Map contains {} top-level objects", map.world.children.len());
//! for warning in &map.warnings {
//!     eprintln!("warning: {}", warning);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clipboard;
pub mod error;
pub mod geometry;
pub mod model;
pub mod parser;
pub mod structure;
mod writer;

pub use clipboard::{create_copy_stream, extract_copy_stream};
pub use error::{Error, Result};
pub use geometry::{BoundingBox, EPSILON, Plane, Point};
pub use model::{
    Color, Displacement, DisplacementPoint, Entity, EntityData, Face, Group, IdGenerator,
    LoadWarning, Map, MapObject, Solid, Texture, Visgroup, World,
};
pub use structure::StructureNode;

use std::io::{Read, Write};

/// Whether a file name looks like a VMF document (by suffix)
pub fn is_valid_filename(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".vmf")
}

impl Map {
    /// Parse a VMF document from a reader
    ///
    /// The whole stream is read up front; nothing is held open afterward.
    /// A malformed stream is a fatal parse error, but individual solids
    /// that cannot be reconstructed are dropped with a recorded
    /// [`LoadWarning`] rather than failing the load.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use libvmf::Map;
    /// use std::fs::File;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let file = File::open("level.vmf")?;
    /// let map = Map::from_reader(file)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        parser::parse_map(reader)
    }

    /// Parse a VMF document from a string
    pub fn parse(text: &str) -> Result<Self> {
        let nodes = StructureNode::parse(text)?;
        parser::assemble_map(&nodes)
    }

    /// Write this map as a VMF document
    ///
    /// Block order, coordinate formatting and editor metadata follow the
    /// conventions Hammer uses, so other tools reload the output cleanly.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        writer::write_map(self, writer)
    }

    /// Write this map to a file path
    ///
    /// This is a convenience method that creates the file and writes the
    /// document to it.
    pub fn write_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.to_writer(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_filename() {
        assert!(is_valid_filename("de_dust2.vmf"));
        assert!(is_valid_filename("UPPER.VMF"));
        assert!(!is_valid_filename("level.rmf"));
        assert!(!is_valid_filename("vmf"));
    }
}
