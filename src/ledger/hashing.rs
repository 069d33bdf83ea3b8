use tiny_keccak::{Hasher, Keccak};
use uuid::Uuid;

//Keccak-256 hash function
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    let mut output = [0u8; 32];
    keccak.update(data);
    keccak.finalize(&mut output);
    output
}

/// Fixed-width on-chain identifier for an agreement. The digest is taken
/// over the canonical hyphenated lowercase UUID string, so the same row
/// always derives the same chain key and the mapping needs no storage.
pub fn agreement_id_hash(agreement_id: Uuid) -> String {
    let canonical = agreement_id.to_string();
    let digest = keccak256(canonical.as_bytes());
    format!("0x{}", hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak256_empty_input_known_vector() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn id_hash_is_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(agreement_id_hash(id), agreement_id_hash(id));
    }

    #[test]
    fn id_hash_shape() {
        let hash = agreement_id_hash(Uuid::new_v4());
        assert!(hash.starts_with("0x"));
        assert_eq!(hash.len(), 66);
        assert!(hash[2..]
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn distinct_ids_hash_differently() {
        assert_ne!(
            agreement_id_hash(Uuid::new_v4()),
            agreement_id_hash(Uuid::new_v4())
        );
    }

    #[test]
    fn uuid_case_does_not_change_the_hash() {
        let lower = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let upper = Uuid::parse_str("67E55044-10B1-426F-9247-BB680E5FE0C8").unwrap();
        assert_eq!(agreement_id_hash(lower), agreement_id_hash(upper));
    }
}
