use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

/// Calculates the hash of the provided data
///
/// # Arguments
///
/// * `data` - The bytes (or string) to hash
///
/// # Returns
///
/// The SHA-256 digest of `data` as a lowercase hexadecimal string
pub fn calculate_hash<T: AsRef<[u8]>>(data: T) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}

/// Hashes `left` immediately followed by `right`, with no separator
pub fn hash_concat(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_hash_known_vector() {
        assert_eq!(
            calculate_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_calculate_hash_empty_input() {
        assert_eq!(
            calculate_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_calculate_hash_is_deterministic() {
        let first = calculate_hash("Hello, world!");
        let second = calculate_hash(b"Hello, world!");

        assert_eq!(first, second);
        assert_eq!(first.len(), HASH_HEX_LEN);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hash_concat_matches_joined_input() {
        let left = calculate_hash("left");
        let right = calculate_hash("right");

        assert_eq!(hash_concat(&left, &right), calculate_hash(format!("{}{}", left, right)));
        assert_ne!(hash_concat(&left, &right), hash_concat(&right, &left));
    }
}
