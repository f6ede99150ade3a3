//! Deterministic event identifier derivation.
//!
//! Remote event ids are restricted to the RFC 2938 base-32 alphabet
//! (lowercase letters a-v and digits 0-9). Source UIDs are arbitrary
//! strings, so they are base-32 encoded with that table, unpadded.

use std::sync::OnceLock;

use data_encoding::{Encoding, Specification};

const ID_ALPHABET: &str = "abcdefghijklmnopqrstuv0123456789";

fn encoding() -> &'static Encoding {
    static ENCODING: OnceLock<Encoding> = OnceLock::new();
    ENCODING.get_or_init(|| {
        let mut spec = Specification::new();
        spec.symbols.push_str(ID_ALPHABET);
        // 32 distinct symbols, no padding: always a valid specification.
        spec.encoding().expect("base-32 specification")
    })
}

/// Derive the remote event id for a source UID.
///
/// Pure and stable: the same UID yields the same id in every run and every
/// process. Distinct UIDs encoding to the same id is not guarded against.
pub fn derive_event_id(uid: &str) -> String {
    encoding().encode(uid.as_bytes())
}
