use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of a byte slice.
pub fn sha_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    format!("{:x}", h.finalize())
}

/// Stable chunk id from source name, ordinal within the source, and content.
pub fn chunk_id(source: &str, ordinal: u64, text: &str) -> String {
    let mut h = Sha256::new();
    h.update(source.as_bytes());
    h.update([0u8]);
    h.update(ordinal.to_le_bytes());
    h.update(text.as_bytes());
    format!("{:x}", h.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha_hex_known_vector() {
        assert_eq!(
            sha_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn chunk_id_depends_on_position() {
        let a = chunk_id("recipes.pdf", 0, "rice");
        assert_eq!(a.len(), 64);
        assert_eq!(a, chunk_id("recipes.pdf", 0, "rice"));
        assert_ne!(a, chunk_id("recipes.pdf", 1, "rice"));
        assert_ne!(a, chunk_id("menu.pdf", 0, "rice"));
    }
}
