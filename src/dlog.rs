use hashbrown::HashMap;
use num::bigint::BigUint;
use num::traits::ToPrimitive;
use num::{Integer, One, Zero};
use thiserror::Error;

use crate::{arith, crt};

/// Default trial division bound used to factor the group order
pub const DEFAULT_FACTOR_BOUND: u64 = 1 << 20;

/// Default limit on baby steps per prime-order subgroup
pub const DEFAULT_STEP_LIMIT: u64 = 1 << 24;

#[derive(Debug, PartialEq, Error)]
pub enum Error {
    #[error("no discrete logarithm found within the configured bounds")]
    DiscreteLogUnavailable,
    #[error("modulus must be a prime greater than two")]
    InvalidModulus,
    #[error(transparent)]
    Arith(#[from] arith::Error),
    #[error(transparent)]
    Crt(#[from] crt::Error),
}

/// Resource bounds for discrete log computation
#[derive(Clone, Debug, PartialEq)]
pub struct DlogConfig {
    /// Largest trial divisor used when factoring p - 1
    pub factor_bound: u64,
    /// Largest baby-step table allowed for a single subgroup
    pub step_limit: u64,
}

impl Default for DlogConfig {
    fn default() -> Self {
        Self {
            factor_bound: DEFAULT_FACTOR_BOUND,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }
}

/// Factor the order of Z_p^*
///
/// A cofactor surviving trial division is kept as a single factor
pub fn group_order_factors(p: &BigUint, bound: u64) -> Vec<(BigUint, u32)> {
    let order = p - BigUint::one();
    let (mut factors, rest) = arith::trial_factor(&order, bound);

    if rest > BigUint::one() {
        factors.push((rest, 1));
    }

    factors
}

/// Multiplicative order of g mod p, with its factorization
///
/// `factors` must factor p - 1
pub fn multiplicative_order(
    g: &BigUint,
    p: &BigUint,
    factors: &[(BigUint, u32)],
) -> (BigUint, Vec<(BigUint, u32)>) {
    let mut order = p - BigUint::one();
    let mut order_factors = Vec::with_capacity(factors.len());

    for (q, e) in factors.iter() {
        let mut exp = *e;

        while exp > 0 {
            let reduced = &order / q;
            if g.modpow(&reduced, p).is_one() {
                order = reduced;
                exp -= 1;
            } else {
                break;
            }
        }

        if exp > 0 {
            order_factors.push((q.clone(), exp));
        }
    }

    (order, order_factors)
}

/// Baby-step giant-step search for x in [0, order) with base^x = target mod p
pub fn baby_step_giant_step(
    base: &BigUint,
    target: &BigUint,
    order: &BigUint,
    p: &BigUint,
    step_limit: u64,
) -> Result<BigUint, Error> {
    let mut m = order.sqrt();
    if &m * &m < *order {
        m += 1_u8;
    }

    let steps = m.to_u64().ok_or(Error::DiscreteLogUnavailable)?;
    if steps > step_limit {
        return Err(Error::DiscreteLogUnavailable);
    }

    let mut table: HashMap<BigUint, u64> = HashMap::with_capacity(steps as usize);
    let mut cur = BigUint::one();
    for j in 0..steps {
        table.entry(cur.clone()).or_insert(j);
        cur = (cur * base).mod_floor(p);
    }

    // base^-m
    let giant = arith::mod_inverse(base, p)?.modpow(&m, p);

    let mut gamma = target.mod_floor(p);
    for i in 0..steps {
        if let Some(j) = table.get(&gamma) {
            let x = BigUint::from(i) * &m + BigUint::from(*j);
            if x < *order {
                return Ok(x);
            }
        }
        gamma = (gamma * &giant).mod_floor(p);
    }

    Err(Error::DiscreteLogUnavailable)
}

/// Cyclic subgroup generated by g mod p, with its order factored once
///
/// Logs taken in the same group reuse the factorization of p - 1
#[derive(Clone, Debug, PartialEq)]
pub struct Subgroup {
    p: BigUint,
    g: BigUint,
    order: BigUint,
    order_factors: Vec<(BigUint, u32)>,
}

impl Subgroup {
    /// Factor p - 1 and compute the order of g
    pub fn new(g: &BigUint, p: &BigUint, config: &DlogConfig) -> Result<Self, Error> {
        if *p <= BigUint::from(2_u8) {
            return Err(Error::InvalidModulus);
        }

        let g = g.mod_floor(p);
        if g.is_zero() {
            return Err(Error::DiscreteLogUnavailable);
        }

        let factors = group_order_factors(p, config.factor_bound);
        let (order, order_factors) = multiplicative_order(&g, p, &factors);

        Ok(Self {
            p: p.clone(),
            g,
            order,
            order_factors,
        })
    }

    pub fn order(&self) -> &BigUint {
        &self.order
    }

    pub fn generator(&self) -> &BigUint {
        &self.g
    }

    /// Whether h lies in <g>, i.e. h^ord(g) = 1 mod p
    pub fn contains(&self, h: &BigUint) -> bool {
        let h = h.mod_floor(&self.p);
        !h.is_zero() && h.modpow(&self.order, &self.p).is_one()
    }

    /// Discrete log of h to the base g (Pohlig-Hellman)
    ///
    /// Returns w in [0, ord(g)) with g^w = h mod p
    pub fn log(&self, h: &BigUint, step_limit: u64) -> Result<BigUint, Error> {
        let p = &self.p;
        let g = &self.g;
        let h = h.mod_floor(p);

        if h.is_zero() {
            return Err(Error::DiscreteLogUnavailable);
        }

        if self.order.is_one() {
            return if h.is_one() {
                Ok(BigUint::zero())
            } else {
                Err(Error::DiscreteLogUnavailable)
            };
        }

        let mut congruences = Vec::with_capacity(self.order_factors.len());

        for (q, e) in self.order_factors.iter() {
            let qe = q.pow(*e);
            let cofactor = &self.order / &qe;

            // project into the subgroup of order q^e
            let g_i = g.modpow(&cofactor, p);
            let h_i = h.modpow(&cofactor, p);
            let g_i_inv = arith::mod_inverse(&g_i, p)?;

            // generator of the order q subgroup
            let gamma = g_i.modpow(&q.pow(e - 1), p);

            let mut x = BigUint::zero();
            let mut q_k = BigUint::one();

            for k in 0..*e {
                let h_k = (g_i_inv.modpow(&x, p) * &h_i)
                    .mod_floor(p)
                    .modpow(&q.pow(e - 1 - k), p);
                let d = baby_step_giant_step(&gamma, &h_k, q, p, step_limit)?;

                x += d * &q_k;
                q_k *= q;
            }

            congruences.push(crt::Congruence::new(x, qe)?);
        }

        let w = crt::combine_all(&congruences)?.residue;

        if g.modpow(&w, p) != h {
            return Err(Error::DiscreteLogUnavailable);
        }

        Ok(w)
    }
}

/// Discrete log of h to the base g modulo the prime p
///
/// Factors p - 1 on every call, use `Subgroup` for repeated logs in one group
pub fn discrete_log(
    h: &BigUint,
    g: &BigUint,
    p: &BigUint,
    config: &DlogConfig,
) -> Result<BigUint, Error> {
    Subgroup::new(g, p, config)?.log(h, config.step_limit)
}
