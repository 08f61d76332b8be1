//! Deterministic point identifiers
//!
//! Qdrant only accepts UUIDs or unsigned integers as point ids, so each
//! `(document_id, chunk_index)` pair is hashed into a UUID-shaped string.
//! The same chunk always maps to the same point, so re-upserting overwrites
//! instead of duplicating.

use md5::{Digest, Md5};
use uuid::Uuid;

/// Derive the point id for a chunk.
///
/// MD5 over `"{document_id}_{chunk_index}"`, with the version nibble forced
/// to 5 and the RFC 4122 variant bits set, rendered as 8-4-4-4-12 hex.
pub fn derive_point_id(document_id: &str, chunk_index: u32) -> String {
    let digest = Md5::digest(format!("{document_id}_{chunk_index}").as_bytes());

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    bytes[6] = (bytes[6] & 0x0f) | 0x50;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes).hyphenated().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(
            derive_point_id("doc1", 0),
            "5666beb5-3012-5d44-bd56-d0734dfe4eb6"
        );
        assert_eq!(
            derive_point_id("doc1", 1),
            "535b5eb3-4080-54b6-bd8c-0e4553f319d5"
        );
        assert_eq!(
            derive_point_id("readme.md", 42),
            "af5ea63e-f421-5b67-aae4-60c60781ff55"
        );
    }

    #[test]
    fn test_deterministic_and_distinct() {
        assert_eq!(derive_point_id("a", 7), derive_point_id("a", 7));
        assert_ne!(derive_point_id("a", 7), derive_point_id("a", 8));
        assert_ne!(derive_point_id("a", 7), derive_point_id("b", 7));
    }

    #[test]
    fn test_version_and_variant_bits() {
        let id = Uuid::parse_str(&derive_point_id("any-document", 3)).unwrap();
        assert_eq!(id.get_version_num(), 5);
        assert_eq!(id.get_variant(), uuid::Variant::RFC4122);
    }
}
