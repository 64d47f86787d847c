use hashbrown::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

use crate::language::{FrequencySolver, Proposal};

/// Upper-case letters plus the punctuation of the usual flag format
pub const FLAG_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ{ }";

/// Errors for structural substitution recovery
#[derive(Debug, PartialEq, Error)]
pub enum Error {
    #[error("no ciphertext blocks supplied")]
    EmptyInput,
    #[error("fingerprint prefix length must be non-zero")]
    ZeroPrefix,
    #[error("block {index} has {len} bytes, fingerprint needs {prefix_len}")]
    ShortBlock {
        index: usize,
        len: usize,
        prefix_len: usize,
    },
    #[error("invalid hex on line {line}: {source}")]
    Hex {
        line: usize,
        source: hex::FromHexError,
    },
    #[error("line {line} decodes to {found} bytes, expected {expected}")]
    RaggedBlocks {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("only {found} distinct fingerprints for an alphabet of {expected}, supply more ciphertext")]
    InsufficientCoverage { expected: usize, found: usize },
    #[error("{found} distinct fingerprints exceed the alphabet of {expected}, wrong alphabet or non-leaking mode")]
    AlphabetOverflow { expected: usize, found: usize },
    #[error("invalid permutation: {0}")]
    InvalidPermutation(&'static str),
}

/// Structure recovered from a codebook-mode ciphertext
///
/// Equal fingerprints always share an id, ids are assigned in first-seen order.
/// Which real symbol an id stands for is unknown until a permutation is supplied.
#[derive(Clone, Debug, PartialEq)]
pub struct Structure {
    ids: Vec<usize>,
    fingerprints: Vec<Vec<u8>>,
}

impl Structure {
    /// Placeholder id of every input block, in input order
    pub fn ids(&self) -> &[usize] {
        &self.ids
    }

    /// Distinct fingerprints, indexed by id
    pub fn fingerprints(&self) -> &[Vec<u8>] {
        &self.fingerprints
    }

    /// Number of distinct fingerprints seen
    pub fn distinct_count(&self) -> usize {
        self.fingerprints.len()
    }

    /// Check that the fingerprints biject onto an alphabet of `alphabet_len` symbols
    pub fn verify(&self, alphabet_len: usize) -> Result<(), Error> {
        let found = self.distinct_count();

        if found < alphabet_len {
            Err(Error::InsufficientCoverage {
                expected: alphabet_len,
                found,
            })
        } else if found > alphabet_len {
            Err(Error::AlphabetOverflow {
                expected: alphabet_len,
                found,
            })
        } else {
            Ok(())
        }
    }

    /// Materialize text with `permutation[id]` standing in for each placeholder
    pub fn materialize(&self, permutation: &[char]) -> Result<String, Error> {
        if permutation.len() != self.distinct_count() {
            return Err(Error::InvalidPermutation("length differs from the distinct count"));
        }

        let mut seen = HashSet::with_capacity(permutation.len());
        if !permutation.iter().all(|c| seen.insert(*c)) {
            return Err(Error::InvalidPermutation("symbol assigned to more than one id"));
        }

        Ok(self.ids.iter().map(|&id| permutation[id]).collect())
    }

    /// First-stage text: id i is rendered as the i-th alphabet symbol
    ///
    /// Structurally correct, but the correspondence is arbitrary
    pub fn naive_text(&self, alphabet: &[char]) -> Result<String, Error> {
        self.verify(alphabet.len())?;
        self.materialize(alphabet)
    }
}

/// Assign a placeholder id to every block by its `prefix_len`-byte fingerprint
pub fn recover_structure<B: AsRef<[u8]>>(blocks: &[B], prefix_len: usize) -> Result<Structure, Error> {
    if blocks.is_empty() {
        return Err(Error::EmptyInput);
    }

    if prefix_len == 0 {
        return Err(Error::ZeroPrefix);
    }

    let mut index: HashMap<&[u8], usize> = HashMap::new();
    let mut fingerprints: Vec<Vec<u8>> = Vec::new();
    let mut ids = Vec::with_capacity(blocks.len());

    for (i, block) in blocks.iter().enumerate() {
        let block = block.as_ref();

        if block.len() < prefix_len {
            return Err(Error::ShortBlock {
                index: i,
                len: block.len(),
                prefix_len,
            });
        }

        let fingerprint = &block[..prefix_len];
        let next = fingerprints.len();
        let id = *index.entry(fingerprint).or_insert(next);

        if id == next {
            fingerprints.push(fingerprint.to_vec());
        }

        ids.push(id);
    }

    debug!(blocks = ids.len(), distinct = fingerprints.len(), "recovered structure");

    Ok(Structure { ids, fingerprints })
}

/// Full two-stage pipeline: structural pass, coverage check, then a solver proposal
pub fn recover<B, S>(
    blocks: &[B],
    prefix_len: usize,
    alphabet: &[char],
    solver: &S,
) -> Result<(Structure, Proposal), Error>
where
    B: AsRef<[u8]>,
    S: FrequencySolver,
{
    let structure = recover_structure(blocks, prefix_len)?;
    structure.verify(alphabet.len())?;

    let proposal = solver
        .propose(structure.ids(), alphabet)
        .ok_or(Error::AlphabetOverflow {
            expected: alphabet.len(),
            found: structure.distinct_count(),
        })?;

    Ok((structure, proposal))
}

/// Parse one hex-encoded block per line, skipping blank lines
///
/// All blocks must decode to the same length
pub fn parse_hex_blocks(text: &str) -> Result<Vec<Vec<u8>>, Error> {
    let mut blocks: Vec<Vec<u8>> = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let block = hex::decode(line).map_err(|e| Error::Hex {
            line: i + 1,
            source: e,
        })?;

        if let Some(first) = blocks.first() {
            if first.len() != block.len() {
                return Err(Error::RaggedBlocks {
                    line: i + 1,
                    expected: first.len(),
                    found: block.len(),
                });
            }
        }

        blocks.push(block);
    }

    if blocks.is_empty() {
        return Err(Error::EmptyInput);
    }

    Ok(blocks)
}
