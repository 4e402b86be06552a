//! Identifier allocation
//!
//! Every map object and every face carries a numeric ID unique within its
//! document. IDs are allocated from a per-document generator; nothing in
//! this crate holds process-wide counters, so concurrent loads never
//! interfere.

/// Monotonic object-ID and face-ID counters, one instance per document
///
/// A stored ID of 0 is the "unassigned" sentinel; [`IdGenerator::object_id_or_next`]
/// resolves it to a fresh value. The generator performs no collision
/// detection: callers loading a document must report every ID they see via
/// [`IdGenerator::seen_object_id`] / [`IdGenerator::seen_face_id`] so later
/// allocations start above the highest stored ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdGenerator {
    next_object: i64,
    next_face: i64,
}

impl IdGenerator {
    /// Create a generator for a fresh document; the first IDs issued are 1
    pub fn new() -> Self {
        Self {
            next_object: 1,
            next_face: 1,
        }
    }

    /// Allocate the next object ID
    pub fn next_object_id(&mut self) -> i64 {
        let id = self.next_object;
        self.next_object += 1;
        id
    }

    /// Allocate the next face ID
    pub fn next_face_id(&mut self) -> i64 {
        let id = self.next_face;
        self.next_face += 1;
        id
    }

    /// Resolve a stored object ID: 0 means unassigned and draws a fresh ID,
    /// any other value is used verbatim
    pub fn object_id_or_next(&mut self, stored: i64) -> i64 {
        if stored == 0 {
            self.next_object_id()
        } else {
            self.seen_object_id(stored);
            stored
        }
    }

    /// Resolve a stored face ID with the same sentinel rule
    pub fn face_id_or_next(&mut self, stored: i64) -> i64 {
        if stored == 0 {
            self.next_face_id()
        } else {
            self.seen_face_id(stored);
            stored
        }
    }

    /// Raise the object counter above an ID observed in loaded data
    pub fn seen_object_id(&mut self, id: i64) {
        if id >= self.next_object {
            self.next_object = id + 1;
        }
    }

    /// Raise the face counter above an ID observed in loaded data
    pub fn seen_face_id(&mut self, id: i64) {
        if id >= self.next_face {
            self.next_face = id + 1;
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_one() {
        let mut generator = IdGenerator::new();
        assert_eq!(generator.next_object_id(), 1);
        assert_eq!(generator.next_face_id(), 1);
    }

    #[test]
    fn test_ids_strictly_increase() {
        let mut generator = IdGenerator::new();
        let a = generator.next_object_id();
        let f1 = generator.next_face_id();
        let b = generator.next_object_id();
        let f2 = generator.next_face_id();
        assert!(b > a);
        assert!(f2 > f1);
    }

    #[test]
    fn test_sentinel_zero_draws_fresh_id() {
        let mut generator = IdGenerator::new();
        assert_eq!(generator.object_id_or_next(0), 1);
        assert_eq!(generator.object_id_or_next(0), 2);
    }

    #[test]
    fn test_stored_id_used_verbatim_and_raises_floor() {
        let mut generator = IdGenerator::new();
        assert_eq!(generator.object_id_or_next(40), 40);
        assert_eq!(generator.next_object_id(), 41);
    }

    #[test]
    fn test_object_and_face_counters_independent() {
        let mut generator = IdGenerator::new();
        generator.seen_object_id(100);
        assert_eq!(generator.next_face_id(), 1);
        assert_eq!(generator.next_object_id(), 101);
    }
}
