//! Session code generation.
//!
//! Codes are four characters from an alphabet with the visually confusable
//! glyphs (`0`/`O`, `1`/`I`) removed, so players can read them off a phone
//! held up across the room.

use rand::Rng;

/// Characters a code may contain.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Fixed code length.
pub const CODE_LENGTH: usize = 4;

/// Draw codes from `rng` until one is not `taken`.
///
/// The retry loop is what guarantees uniqueness; the alphabet gives about a
/// million codes so it rarely spins more than once.
pub fn generate_code<R, F>(rng: &mut R, taken: F) -> String
where
    R: Rng,
    F: Fn(&str) -> bool,
{
    loop {
        let code = random_code(rng);
        if !taken(&code) {
            return code;
        }
        tracing::trace!(code = %code, "session code collision, retrying");
    }
}

fn random_code<R: Rng>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect()
}

/// Canonical form of a user-typed code: trimmed and upper-cased.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Whether `code` has the right length and only alphabet characters.
pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}
