use num::bigint::{BigInt, BigUint, Sign};
use num::{Integer, One, Zero};
use thiserror::Error;

#[derive(Debug, PartialEq, Error)]
pub enum Error {
    #[error("value is not invertible modulo the given modulus")]
    NotInvertible,
    #[error("modulus must be non-zero")]
    ZeroModulus,
    #[error("factorization did not finish within the step budget")]
    FactorizationFailed,
}

/// Extended Euclidean algorithm
///
/// Returns (g, x, y) such that a*x + b*y == g == gcd(a, b)
pub fn egcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let ext = a.extended_gcd(b);
    (ext.gcd, ext.x, ext.y)
}

/// Compute a^-1 mod m
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Result<BigUint, Error> {
    if m.is_zero() {
        return Err(Error::ZeroModulus);
    }

    let ai = BigInt::from(a.clone());
    let mi = BigInt::from(m.clone());
    let (g, x, _) = egcd(&ai, &mi);

    if !g.is_one() {
        return Err(Error::NotInvertible);
    }

    Ok(to_biguint(&x.mod_floor(&mi)))
}

/// Convert a non-negative BigInt to BigUint
///
/// Callers are expected to reduce into [0, m) first, negative values map to zero
pub(crate) fn to_biguint(x: &BigInt) -> BigUint {
    match x.sign() {
        Sign::Minus => BigUint::zero(),
        _ => x.magnitude().clone(),
    }
}

/// Factor n by trial division with primes up to `bound`
///
/// Returns (prime, exponent) pairs in ascending order, and the unfactored cofactor
/// (one when n is fully bound-smooth)
pub fn trial_factor(n: &BigUint, bound: u64) -> (Vec<(BigUint, u32)>, BigUint) {
    let mut rest = n.clone();
    let mut factors = Vec::new();

    if rest.is_zero() {
        return (factors, rest);
    }

    let mut d = 2_u64;
    while d <= bound {
        let bd = BigUint::from(d);
        if &bd * &bd > rest {
            break;
        }

        let mut exp = 0_u32;
        while (&rest % &bd).is_zero() {
            rest /= &bd;
            exp += 1;
        }

        if exp > 0 {
            factors.push((bd, exp));
        }

        // 2, then odd candidates only
        d += if d == 2 { 1 } else { 2 };
    }

    // whatever survives with no factor <= sqrt(rest) below the bound is prime
    if rest > BigUint::one() && BigUint::from(d) * BigUint::from(d) > rest {
        factors.push((rest, 1));
        return (factors, BigUint::one());
    }

    (factors, rest)
}

/// Fermat factorization for moduli whose two factors are close together
///
/// Walks a = ceil(sqrt(n)) upward looking for a^2 - n to be a perfect square
pub fn fermat_factor(n: &BigUint, max_steps: u64) -> Result<(BigUint, BigUint), Error> {
    if n.is_zero() {
        return Err(Error::ZeroModulus);
    }

    if n.is_even() {
        let two = BigUint::from(2_u8);
        return Ok((two.clone(), n / two));
    }

    let mut a = n.sqrt();
    if &a * &a < *n {
        a += 1_u8;
    }

    for _ in 0..max_steps {
        let b2 = &a * &a - n;
        let b = b2.sqrt();

        if &b * &b == b2 {
            return Ok((&a - &b, &a + &b));
        }

        a += 1_u8;
    }

    Err(Error::FactorizationFailed)
}

/// Exact integer n-th root
///
/// Returns None when x is not a perfect n-th power
pub fn exact_root(x: &BigUint, n: u32) -> Option<BigUint> {
    if n == 0 {
        return None;
    }

    let root = x.nth_root(n);

    if root.pow(n) == *x {
        Some(root)
    } else {
        None
    }
}
