use num::bigint::{BigInt, BigUint};
use num::{Integer, Zero};
use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::arith::{egcd, to_biguint};

/// Smallest usable chunk size, anything lower never shrinks a round
pub const MIN_CHUNK_SIZE: usize = 2;

#[derive(Debug, PartialEq, Error)]
pub enum Error {
    #[error("no common solution for x = {left} and x = {right}")]
    InfeasibleSystem { left: Congruence, right: Congruence },
    #[error("at least two congruences are required, got {0}")]
    TooFewCongruences(usize),
    #[error("chunk size must be at least 2, got {0}")]
    ChunkSize(usize),
    #[error("worker count must be at least one")]
    WorkerCount,
    #[error("congruence has a zero modulus")]
    ZeroModulus,
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

/// A single congruence x = residue (mod modulus)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Congruence {
    pub residue: BigUint,
    pub modulus: BigUint,
}

impl Congruence {
    /// Create a congruence, reducing the residue into [0, modulus)
    pub fn new(residue: BigUint, modulus: BigUint) -> Result<Self, Error> {
        if modulus.is_zero() {
            return Err(Error::ZeroModulus);
        }

        Ok(Self {
            residue: residue.mod_floor(&modulus),
            modulus,
        })
    }

    /// Check whether x satisfies the congruence
    pub fn holds(&self, x: &BigUint) -> bool {
        x.mod_floor(&self.modulus) == self.residue
    }
}

impl core::fmt::Display for Congruence {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} (mod {})", self.residue, self.modulus)
    }
}

/// Batched solver configuration
#[derive(Clone, Debug, PartialEq)]
pub struct SolverConfig {
    /// Congruences folded together by one unit of work
    pub chunk_size: usize,
    /// Threads in the worker pool
    pub workers: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            chunk_size: MIN_CHUNK_SIZE,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// Merge two congruences into one modulo lcm(m, n)
///
/// Moduli need not be coprime, but the residues must agree modulo gcd(m, n)
pub fn combine(left: &Congruence, right: &Congruence) -> Result<Congruence, Error> {
    let a = BigInt::from(left.residue.clone());
    let m = BigInt::from(left.modulus.clone());
    let b = BigInt::from(right.residue.clone());
    let n = BigInt::from(right.modulus.clone());

    // x*m + y*n = g
    let (g, x, _) = egcd(&m, &n);
    let (k, rem) = (&b - &a).div_mod_floor(&g);

    if !rem.is_zero() {
        return Err(Error::InfeasibleSystem {
            left: left.clone(),
            right: right.clone(),
        });
    }

    let n_g = &n / &g;
    let lcm = &m * &n_g;

    // a + m * ((b - a) / g * x mod n/g)
    let t = (k * x).mod_floor(&n_g);
    let res = (a + m * t).mod_floor(&lcm);

    Ok(Congruence {
        residue: to_biguint(&res),
        modulus: to_biguint(&lcm),
    })
}

/// Fold a chunk of congruences left-to-right into a single congruence
pub fn combine_all(chunk: &[Congruence]) -> Result<Congruence, Error> {
    let (first, rest) = chunk.split_first().ok_or(Error::TooFewCongruences(0))?;

    rest.iter()
        .try_fold(first.clone(), |acc, next| combine(&acc, next))
}

/// Solve a system of congruences with divide-and-conquer rounds on a worker pool
///
/// Every round splits the current system into `chunk_size` chunks, folds each chunk
/// on the pool, and waits for all of them before the next round starts.
/// A trailing single-element chunk is carried into the next round as is.
pub fn solve(congruences: &[Congruence], config: &SolverConfig) -> Result<Congruence, Error> {
    solve_counting_rounds(congruences, config).map(|(res, _)| res)
}

/// Same as `solve`, also returning the number of barrier rounds performed
pub fn solve_counting_rounds(
    congruences: &[Congruence],
    config: &SolverConfig,
) -> Result<(Congruence, usize), Error> {
    if congruences.len() < 2 {
        return Err(Error::TooFewCongruences(congruences.len()));
    }

    if config.chunk_size < MIN_CHUNK_SIZE {
        return Err(Error::ChunkSize(config.chunk_size));
    }

    if config.workers == 0 {
        return Err(Error::WorkerCount);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .map_err(|e| Error::WorkerPool(e.to_string()))?;

    let mut current = congruences.to_vec();
    let mut round = 0_usize;

    while current.len() > 1 {
        debug!(round, congruences = current.len(), "crt round");

        let chunk_size = config.chunk_size;
        current = pool.install(|| {
            current
                .par_chunks(chunk_size)
                .map(combine_all)
                .collect::<Result<Vec<Congruence>, Error>>()
        })?;

        round += 1;
    }

    debug!(rounds = round, "crt solved");

    let res = current.pop().ok_or(Error::TooFewCongruences(0))?;

    Ok((res, round))
}

/// Number of rounds `solve` performs for `count` congruences
pub fn rounds(count: usize, chunk_size: usize) -> usize {
    let mut len = count;
    let mut res = 0;

    if chunk_size < MIN_CHUNK_SIZE {
        return 0;
    }

    while len > 1 {
        len = (len + chunk_size - 1) / chunk_size;
        res += 1;
    }

    res
}
