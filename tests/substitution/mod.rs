use craes::{aes, ecb};
use proptest::prelude::*;
use rand::{Rng, RngCore};

use ctf_toolkit::language::UnigramRank;
use ctf_toolkit::substitution::{self, recover_structure, Error, FLAG_ALPHABET};

use crate::common::seeded_rng;

const SALT_LEN: usize = aes::BLOCK_LEN - 1;

// covers every symbol of the flag alphabet
const PANGRAM: &str = "THE QUICK BROWN FOX JUMPS OVER THE LAZY DOG {SYNCHRONIZED}";

// encrypt each symbol || salt as its own AES-128-ECB block
fn ecb_oracle(text: &str, key: &[u8; aes::KEY_LEN_128], salt: &[u8]) -> Vec<Vec<u8>> {
    text.bytes()
        .map(|b| {
            let mut block = vec![b];
            block.extend_from_slice(salt);
            ecb::encrypt(&block, key).unwrap()
        })
        .collect()
}

fn random_key_salt(seed: u64) -> ([u8; aes::KEY_LEN_128], [u8; SALT_LEN]) {
    let mut rng = seeded_rng(seed);
    let mut key = [0_u8; aes::KEY_LEN_128];
    let mut salt = [0_u8; SALT_LEN];

    rng.fill_bytes(&mut key);
    rng.fill_bytes(&mut salt);

    (key, salt)
}

// true mapping from first-seen order of the plaintext symbols
fn first_seen(text: &str) -> Vec<char> {
    let mut res: Vec<char> = Vec::new();
    for c in text.chars() {
        if !res.contains(&c) {
            res.push(c);
        }
    }
    res
}

#[test]
fn recover_ecb_structure() {
    let (key, salt) = random_key_salt(0x5eed);
    let blocks = ecb_oracle(PANGRAM, &key, &salt);
    let alphabet: Vec<char> = FLAG_ALPHABET.chars().collect();

    let structure = recover_structure(&blocks, aes::BLOCK_LEN).unwrap();
    structure.verify(alphabet.len()).unwrap();

    assert_eq!(structure.distinct_count(), alphabet.len());

    // the naive guess keeps the equality structure of the plaintext
    let naive: Vec<char> = structure.naive_text(&alphabet).unwrap().chars().collect();
    let plain: Vec<char> = PANGRAM.chars().collect();
    for i in 0..plain.len() {
        for j in 0..plain.len() {
            assert_eq!(plain[i] == plain[j], naive[i] == naive[j]);
        }
    }

    // the correct permutation restores the plaintext
    assert_eq!(structure.materialize(&first_seen(PANGRAM)).unwrap(), PANGRAM);
}

#[test]
fn recover_from_hex_lines() {
    let (key, salt) = random_key_salt(42);
    let blocks = ecb_oracle(PANGRAM, &key, &salt);

    let lines: String = blocks.iter().map(|b| format!("{}\n", hex::encode(b))).collect();
    let parsed = substitution::parse_hex_blocks(&lines).unwrap();

    assert_eq!(parsed, blocks);
    assert_eq!(
        recover_structure(&parsed, aes::BLOCK_LEN).unwrap(),
        recover_structure(&blocks, aes::BLOCK_LEN).unwrap()
    );
}

#[test]
fn insufficient_coverage() {
    let (key, salt) = random_key_salt(7);
    let blocks = ecb_oracle("HELLO WORLD", &key, &salt);

    let structure = recover_structure(&blocks, aes::BLOCK_LEN).unwrap();

    assert_eq!(
        structure.verify(FLAG_ALPHABET.len()),
        Err(Error::InsufficientCoverage {
            expected: 29,
            found: 8
        })
    );
}

#[test]
fn non_leaking_mode_overflows() {
    let mut rng = seeded_rng(99);
    let (key, _) = random_key_salt(99);
    let text = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    // fresh salt per block hides equal symbols, like a randomized mode would
    let blocks: Vec<Vec<u8>> = text
        .bytes()
        .map(|b| {
            let mut block = vec![b];
            block.extend((0..SALT_LEN).map(|_| rng.gen::<u8>()));
            ecb::encrypt(&block, &key).unwrap()
        })
        .collect();

    let structure = recover_structure(&blocks, aes::BLOCK_LEN).unwrap();

    assert_eq!(structure.distinct_count(), text.len());
    assert_eq!(
        structure.verify(FLAG_ALPHABET.len()),
        Err(Error::AlphabetOverflow {
            expected: 29,
            found: 40
        })
    );
}

#[test]
fn frequency_proposal() {
    let (key, salt) = random_key_salt(1337);
    let text = format!(
        "{} {}",
        PANGRAM,
        "IT IS A TRUTH UNIVERSALLY ACKNOWLEDGED THAT A SINGLE MAN IN POSSESSION OF A GOOD FORTUNE MUST BE IN WANT OF A WIFE"
    );
    let blocks = ecb_oracle(&text, &key, &salt);
    let alphabet: Vec<char> = FLAG_ALPHABET.chars().collect();

    let (structure, proposal) =
        substitution::recover(&blocks, aes::BLOCK_LEN, &alphabet, &UnigramRank).unwrap();

    assert_eq!(proposal.permutation.len(), alphabet.len());

    // space is by far the most common symbol, the solver must place it first
    let space_id = structure.ids()[text.find(' ').unwrap()];
    assert_eq!(proposal.permutation[space_id], ' ');

    let guess = structure.materialize(&proposal.permutation).unwrap();
    assert_eq!(guess.len(), text.len());
}

fn fingerprint(symbol: usize) -> Vec<u8> {
    // odd multiplier is a bijection on u32
    ((symbol as u32).wrapping_mul(2_654_435_761)).to_be_bytes().to_vec()
}

proptest! {
    #[test]
    fn ids_follow_fingerprints(n in 1_usize..40, tail in proptest::collection::vec(0_usize..40, 0..200)) {
        let symbols: Vec<usize> = (0..n).chain(tail.into_iter().map(|s| s % n)).collect();
        let blocks: Vec<Vec<u8>> = symbols.iter().map(|&s| fingerprint(s)).collect();

        let structure = recover_structure(&blocks, 4).unwrap();
        prop_assert_eq!(structure.distinct_count(), n);

        for i in 0..symbols.len() {
            for j in 0..symbols.len() {
                prop_assert_eq!(symbols[i] == symbols[j], structure.ids()[i] == structure.ids()[j]);
            }
        }
    }
}
