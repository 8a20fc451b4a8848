//! Property tests for profile name normalization.
//!
//! Random names drawn from a mixed alphabet (ASCII, punctuation, Unicode letters
//! and whitespace) must always normalize to a bounded, identifier-safe fragment.

use db_context_mux::mux::slug::{MAX_SLUG_LEN, normalize};
use rand::Rng;
use rand::seq::SliceRandom;

const ALPHABET: &[char] = &[
    'a', 'B', 'z', 'Q', '0', '7', '9', ' ', ' ', '\t', '\n', '-', '_', '!', '?', '.', '/', '\'',
    'é', 'Ö', 'ß', 'İ', 'Σ', '日', '\u{3000}', '\u{a0}', '🚀',
];

fn random_name(rng: &mut impl Rng) -> String {
    let len = rng.gen_range(0..120);
    (0..len)
        .map(|_| *ALPHABET.choose(rng).unwrap())
        .collect()
}

#[test]
fn test_known_names() {
    assert_eq!(normalize("Tenant  ONE!!"), "tenant-one");
    assert_eq!(normalize(""), "");
    assert_eq!(normalize("tenant two"), "tenant-two");
    assert_eq!(normalize("Tenant!"), normalize("Tenant?"));
}

#[test]
fn test_random_names_stay_bounded_and_safe() {
    let mut rng = rand::thread_rng();
    for _ in 0..2000 {
        let name = random_name(&mut rng);
        let slug = normalize(&name);

        assert!(
            slug.len() <= MAX_SLUG_LEN,
            "slug too long for {:?}: {:?}",
            name,
            slug
        );
        assert!(
            slug.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'),
            "unexpected character in {:?} (from {:?})",
            slug,
            name
        );
    }
}

#[test]
fn test_normalize_is_idempotent() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let slug = normalize(&random_name(&mut rng));
        assert_eq!(normalize(&slug), slug);
    }
}

#[test]
fn test_whitespace_only_names_are_empty() {
    let mut rng = rand::thread_rng();
    let blanks = [' ', '\t', '\n', '\r', '\u{3000}', '\u{a0}'];
    for _ in 0..100 {
        let len = rng.gen_range(0..20);
        let name: String = (0..len).map(|_| *blanks.choose(&mut rng).unwrap()).collect();
        assert_eq!(normalize(&name), "");
    }
}
