use num::bigint::BigUint;
use thiserror::Error;

use crate::arith;
use crate::crt::{self, Congruence, SolverConfig};

#[derive(Debug, PartialEq, Error)]
pub enum Error {
    #[error("{ciphertexts} ciphertexts given for {moduli} moduli")]
    Mismatch { ciphertexts: usize, moduli: usize },
    #[error("combined residue is not an exact {0}-th power, more ciphertexts are needed")]
    NotExactPower(u32),
    #[error(transparent)]
    Crt(#[from] crt::Error),
}

/// Hastad broadcast attack
///
/// Recover m from c_i = m^e mod n_i for at least e pairwise coprime moduli.
/// The congruences are merged with the batched CRT solver, then the e-th root is taken
/// over the integers.
pub fn hastad(
    ciphertexts: &[BigUint],
    moduli: &[BigUint],
    e: u32,
    config: &SolverConfig,
) -> Result<BigUint, Error> {
    if ciphertexts.len() != moduli.len() {
        return Err(Error::Mismatch {
            ciphertexts: ciphertexts.len(),
            moduli: moduli.len(),
        });
    }

    let congruences = ciphertexts
        .iter()
        .zip(moduli.iter())
        .map(|(c, n)| Congruence::new(c.clone(), n.clone()))
        .collect::<Result<Vec<Congruence>, crt::Error>>()?;

    let combined = crt::solve(&congruences, config)?;

    arith::exact_root(&combined.residue, e).ok_or(Error::NotExactPower(e))
}
