//! Value object trait: equality by value, not identity.
//!
//! Value objects are immutable domain objects defined entirely by their
//! attribute values (e.g. a tender line or a bidder's contact card). Two value
//! objects with the same values are equal; to "modify" one, build a new one.

/// Marker trait for value objects.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
