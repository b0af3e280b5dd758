//! Short-code identifier generation.
//!
//! Player codes are two digits followed by two uppercase letters (`01JS`),
//! member codes carry an `M` prefix (`M01JK`), match codes are `MAT` plus
//! three digits. Codes are random; callers re-roll on collision.

use rand::Rng;

const LETTERS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ"; // no I/O, easy to read aloud

/// Generate a player code like `01JS`.
pub fn player_code<R: Rng>(rng: &mut R) -> String {
    let digits = rng.gen_range(1..=99_u8);
    format!("{digits:02}{}{}", random_letter(rng), random_letter(rng))
}

/// Generate a member code like `M01JK`.
pub fn member_code<R: Rng>(rng: &mut R) -> String {
    format!("M{}", player_code(rng))
}

/// Generate a match code like `MAT042`.
pub fn match_code<R: Rng>(rng: &mut R) -> String {
    format!("MAT{:03}", rng.gen_range(1..=999_u16))
}

fn random_letter<R: Rng>(rng: &mut R) -> char {
    let idx = rng.gen_range(0..LETTERS.len());
    char::from(LETTERS[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_code_shape() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let code = player_code(&mut rng);
            assert_eq!(code.len(), 4);
            let (digits, letters) = code.split_at(2);
            assert!(digits.chars().all(|c| c.is_ascii_digit()), "{code}");
            assert!(letters.chars().all(|c| c.is_ascii_uppercase()), "{code}");
        }
    }

    #[test]
    fn member_code_shape() {
        let mut rng = rand::thread_rng();
        let code = member_code(&mut rng);
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('M'));
    }

    #[test]
    fn match_code_shape() {
        let mut rng = rand::thread_rng();
        let code = match_code(&mut rng);
        assert_eq!(code.len(), 6);
        assert!(code.starts_with("MAT"));
    }

    #[test]
    fn ambiguous_letters_excluded() {
        assert!(!LETTERS.contains(&b'I'));
        assert!(!LETTERS.contains(&b'O'));
    }
}
