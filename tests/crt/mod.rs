use num::bigint::{BigUint, RandBigInt};
use num::One;
use proptest::prelude::*;

use ctf_toolkit::crt::{self, Congruence, Error, SolverConfig};

use crate::common::{big, primes_from, seeded_rng};

fn system(x: &BigUint, moduli: &[u64]) -> Vec<Congruence> {
    moduli
        .iter()
        .map(|&m| Congruence::new(x % big(m), big(m)).unwrap())
        .collect()
}

fn product(moduli: &[u64]) -> BigUint {
    moduli.iter().fold(BigUint::one(), |acc, &m| acc * big(m))
}

#[test]
fn solve_small_system() {
    let congruences = system(&big(23), &[3, 5, 7]);

    for &(chunk_size, workers) in [(2, 1), (2, 4), (3, 2), (10, 8)].iter() {
        let res = crt::solve(&congruences, &SolverConfig { chunk_size, workers }).unwrap();
        assert_eq!(res, Congruence::new(big(23), big(105)).unwrap());
    }
}

#[test]
fn solve_non_coprime_consistent() {
    // gcd(4, 6) = 2 and 3 - 1 is even
    let congruences = [
        Congruence::new(big(1), big(4)).unwrap(),
        Congruence::new(big(3), big(6)).unwrap(),
    ];
    let res = crt::solve(&congruences, &SolverConfig::default()).unwrap();

    assert_eq!(res.modulus, big(12));
    assert!(congruences.iter().all(|c| c.holds(&res.residue)));
}

#[test]
fn solve_infeasible() {
    let congruences = [
        Congruence::new(big(1), big(4)).unwrap(),
        Congruence::new(big(0), big(6)).unwrap(),
    ];

    assert!(matches!(
        crt::solve(&congruences, &SolverConfig::default()),
        Err(Error::InfeasibleSystem { .. })
    ));
}

#[test]
fn infeasible_chunk_aborts_large_solve() {
    let primes = primes_from(1 << 20, 300);
    let x = big(0xdead_beef_cafe);
    let mut congruences = system(&x, &primes);

    // same modulus twice with different residues
    let bad = primes[150];
    congruences.push(Congruence::new((&x + 1_u8) % big(bad), big(bad)).unwrap());

    for &chunk_size in [2, 5, 64].iter() {
        let res = crt::solve(&congruences, &SolverConfig { chunk_size, workers: 4 });
        assert!(matches!(res, Err(Error::InfeasibleSystem { .. })));
    }
}

#[test]
fn chunk_size_does_not_change_result() {
    let primes = primes_from(1 << 30, 1000);
    let modulus = product(&primes);
    let x = seeded_rng(2023).gen_biguint_below(&modulus);
    let congruences = system(&x, &primes);

    let two = crt::solve(&congruences, &SolverConfig { chunk_size: 2, workers: 4 }).unwrap();
    let ten = crt::solve(&congruences, &SolverConfig { chunk_size: 10, workers: 4 }).unwrap();
    let single = crt::solve(&congruences, &SolverConfig { chunk_size: 7, workers: 1 }).unwrap();

    for &chunk_size in [2, 10, 7, 1000].iter() {
        let (_, performed) =
            crt::solve_counting_rounds(&congruences, &SolverConfig { chunk_size, workers: 4 }).unwrap();
        assert_eq!(performed, crt::rounds(1000, chunk_size));
    }
    assert_eq!(crt::rounds(1000, 2), 10);
    assert_eq!(crt::rounds(1000, 10), 3);

    assert_eq!(two, ten);
    assert_eq!(two, single);
    assert_eq!(two, Congruence::new(x, modulus).unwrap());
}

proptest! {
    #[test]
    fn solve_round_trip(
        x in any::<u64>(),
        picks in proptest::sample::subsequence((0..40).collect::<Vec<usize>>(), 2..12),
        chunk_size in 2_usize..6,
    ) {
        let primes = primes_from(1 << 16, 40);
        let moduli: Vec<u64> = picks.iter().map(|&i| primes[i]).collect();
        let congruences = system(&big(x), &moduli);

        let res = crt::solve(&congruences, &SolverConfig { chunk_size, workers: 2 }).unwrap();
        let modulus = product(&moduli);

        prop_assert_eq!(res.residue, big(x) % &modulus);
        prop_assert_eq!(res.modulus, modulus);
    }
}
