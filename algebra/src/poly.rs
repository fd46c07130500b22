use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use std::ops::{Add, Mul, Neg, Sub};

use itertools::Itertools;
use num::{BigInt, One, Signed, Zero};
use serde::{Deserialize, Serialize};

/// A term of a [`Polynomial`]: an integer coefficient times a multiset of
/// variables. The multiset is kept as a sorted `Vec`, one entry per
/// multiplicity.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Monomial<V> {
    coeff: BigInt,
    vars: Vec<V>,
}

impl<V: Clone + Ord> Monomial<V> {
    pub fn new(coeff: impl Into<BigInt>, mut vars: Vec<V>) -> Self {
        vars.sort();
        Self {
            coeff: coeff.into(),
            vars,
        }
    }

    pub fn constant(coeff: impl Into<BigInt>) -> Self {
        Self {
            coeff: coeff.into(),
            vars: Vec::new(),
        }
    }

    pub fn coeff(&self) -> &BigInt {
        &self.coeff
    }

    /// The variables of this monomial, sorted, with multiplicity.
    pub fn vars(&self) -> &[V] {
        &self.vars
    }

    pub fn degree(&self) -> usize {
        self.vars.len()
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self {
            coeff: &self.coeff * &other.coeff,
            vars: self
                .vars
                .iter()
                .merge(other.vars.iter())
                .cloned()
                .collect(),
        }
    }
}

/// A multivariate polynomial with integer coefficients, kept in canonical
/// form: terms sorted by their variable multiset, like terms combined, zero
/// coefficients dropped.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Polynomial<V> {
    terms: Vec<Monomial<V>>,
}

impl<V: Clone + Ord> Polynomial<V> {
    pub fn zero() -> Self {
        Self { terms: Vec::new() }
    }

    pub fn constant(c: impl Into<BigInt>) -> Self {
        Self::from_terms(vec![Monomial::constant(c)])
    }

    pub fn var(v: V) -> Self {
        Self::monomial(1, vec![v])
    }

    pub fn monomial(coeff: impl Into<BigInt>, vars: Vec<V>) -> Self {
        Self::from_terms(vec![Monomial::new(coeff, vars)])
    }

    /// Builds the canonical form of an arbitrary sum of monomials.
    pub fn from_terms(terms: Vec<Monomial<V>>) -> Self {
        let mut combined: BTreeMap<Vec<V>, BigInt> = BTreeMap::new();
        for t in terms {
            let mut vars = t.vars;
            vars.sort();
            *combined.entry(vars).or_default() += t.coeff;
        }
        Self {
            terms: combined
                .into_iter()
                .filter(|(_, coeff)| !coeff.is_zero())
                .map(|(vars, coeff)| Monomial { coeff, vars })
                .collect(),
        }
    }

    pub fn terms(&self) -> &[Monomial<V>] {
        &self.terms
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn add(&self, other: &Self) -> Self {
        Self::from_terms(
            self.terms
                .iter()
                .chain(other.terms.iter())
                .cloned()
                .collect(),
        )
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    pub fn neg(&self) -> Self {
        Self {
            terms: self
                .terms
                .iter()
                .map(|t| Monomial {
                    coeff: -&t.coeff,
                    vars: t.vars.clone(),
                })
                .collect(),
        }
    }

    pub fn mul(&self, other: &Self) -> Self {
        let products = self
            .terms
            .iter()
            .cartesian_product(other.terms.iter())
            .map(|(a, b)| a.mul(b))
            .collect();
        Self::from_terms(products)
    }

    pub fn add_scalar(&self, c: impl Into<BigInt>) -> Self {
        self.add(&Self::constant(c))
    }

    /// Splits off the negative-coefficient terms, returning
    /// `(nonnegative part, negated negative part)`. Both results have only
    /// nonnegative coefficients and `self = pos - neg`.
    pub fn split_signs(&self) -> (Self, Self) {
        let (neg, pos): (Vec<_>, Vec<_>) =
            self.terms.iter().cloned().partition(|t| t.coeff.is_negative());
        (
            Self { terms: pos },
            Self {
                terms: neg
                    .into_iter()
                    .map(|t| Monomial {
                        coeff: -t.coeff,
                        vars: t.vars,
                    })
                    .collect(),
            },
        )
    }

    /// Divides every coefficient by `2^n`, splitting the polynomial into
    /// `(quotient, remainder)` with the formal identity
    /// `self = 2^n * quotient + remainder`.
    ///
    /// Division truncates toward zero, so a negative coefficient leaves a
    /// small negative remainder rather than a large positive one. Variables
    /// are preserved verbatim.
    pub fn shr(&self, n: usize) -> (Self, Self) {
        let divisor = BigInt::one() << n;
        let mut quotient = Vec::new();
        let mut remainder = Vec::new();
        for t in &self.terms {
            let q = &t.coeff / &divisor;
            let r = &t.coeff - &q * &divisor;
            if !q.is_zero() {
                quotient.push(Monomial {
                    coeff: q,
                    vars: t.vars.clone(),
                });
            }
            if !r.is_zero() {
                remainder.push(Monomial {
                    coeff: r,
                    vars: t.vars.clone(),
                });
            }
        }
        // Terms keep their distinct sorted multisets, so both halves are
        // already canonical.
        (Self { terms: quotient }, Self { terms: remainder })
    }

    /// Replaces every occurrence of `var` by `rep`. A monomial containing
    /// `var` with multiplicity `m` is re-expanded with `rep^m`.
    pub fn substitute(&self, var: &V, rep: &Self) -> Self {
        let mut acc = Self::zero();
        for t in &self.terms {
            let multiplicity = t.vars.iter().filter(|v| *v == var).count();
            if multiplicity == 0 {
                acc = acc.add(&Self {
                    terms: vec![t.clone()],
                });
                continue;
            }
            let rest = t
                .vars
                .iter()
                .filter(|v| *v != var)
                .cloned()
                .collect();
            let mut expanded = Self::monomial(t.coeff.clone(), rest);
            for _ in 0..multiplicity {
                expanded = expanded.mul(rep);
            }
            acc = acc.add(&expanded);
        }
        acc
    }

    /// Simultaneously replaces every variable by `f(v)`, possibly into a
    /// different variable space. Unlike chained [`Self::substitute`] calls,
    /// replacement polynomials are never re-substituted.
    pub fn substitute_all<W: Clone + Ord>(
        &self,
        f: impl Fn(&V) -> Polynomial<W>,
    ) -> Polynomial<W> {
        let mut acc = Polynomial::zero();
        for t in &self.terms {
            let mut expanded = Polynomial::constant(t.coeff.clone());
            for v in &t.vars {
                expanded = expanded.mul(&f(v));
            }
            acc = acc.add(&expanded);
        }
        acc
    }

    /// The set of variables appearing in any term.
    pub fn vars(&self) -> BTreeSet<V> {
        self.terms
            .iter()
            .flat_map(|t| t.vars.iter().cloned())
            .collect()
    }

    pub fn eval(&self, f: impl Fn(&V) -> BigInt) -> BigInt {
        self.terms
            .iter()
            .map(|t| {
                t.vars
                    .iter()
                    .fold(t.coeff.clone(), |acc, v| acc * f(v))
            })
            .sum()
    }
}

impl<V: Clone + Ord> From<Monomial<V>> for Polynomial<V> {
    fn from(m: Monomial<V>) -> Self {
        Self::from_terms(vec![m])
    }
}

impl<V: Clone + Ord> Add for &Polynomial<V> {
    type Output = Polynomial<V>;

    fn add(self, rhs: Self) -> Polynomial<V> {
        Polynomial::add(self, rhs)
    }
}

impl<V: Clone + Ord> Sub for &Polynomial<V> {
    type Output = Polynomial<V>;

    fn sub(self, rhs: Self) -> Polynomial<V> {
        Polynomial::sub(self, rhs)
    }
}

impl<V: Clone + Ord> Mul for &Polynomial<V> {
    type Output = Polynomial<V>;

    fn mul(self, rhs: Self) -> Polynomial<V> {
        Polynomial::mul(self, rhs)
    }
}

impl<V: Clone + Ord> Neg for &Polynomial<V> {
    type Output = Polynomial<V>;

    fn neg(self) -> Polynomial<V> {
        Polynomial::neg(self)
    }
}

impl<V: Display> Display for Monomial<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.coeff.abs();
        if self.vars.is_empty() {
            return write!(f, "{magnitude}");
        }
        if !magnitude.is_one() {
            write!(f, "{magnitude}*")?;
        }
        write!(f, "{}", self.vars.iter().join("*"))
    }
}

impl<V: Display> Display for Polynomial<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, t) in self.terms.iter().enumerate() {
            if i == 0 {
                if t.coeff.is_negative() {
                    write!(f, "-")?;
                }
            } else if t.coeff.is_negative() {
                write!(f, " - ")?;
            } else {
                write!(f, " + ")?;
            }
            write!(f, "{t}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::OsRng;
    use rand::Rng;

    use super::*;

    fn x() -> Polynomial<char> {
        Polynomial::var('x')
    }

    fn y() -> Polynomial<char> {
        Polynomial::var('y')
    }

    /// A random polynomial over `{x, y}` with small signed coefficients.
    fn random_poly() -> Polynomial<char> {
        let mut rng = OsRng;
        let mut terms = Vec::new();
        for _ in 0..rng.gen_range(0..6) {
            let coeff = rng.gen_range(-1000i64..1000);
            let vars = (0..rng.gen_range(0..3))
                .map(|_| if rng.gen() { 'x' } else { 'y' })
                .collect();
            terms.push(Monomial::new(coeff, vars));
        }
        Polynomial::from_terms(terms)
    }

    #[test]
    fn test_canonical_form() {
        // x*y + y*x combines; 2 - 2 vanishes.
        let p = Polynomial::from_terms(vec![
            Monomial::new(1, vec!['x', 'y']),
            Monomial::new(1, vec!['y', 'x']),
            Monomial::constant(2),
            Monomial::constant(-2),
        ]);
        assert_eq!(p, Polynomial::monomial(2, vec!['x', 'y']));
    }

    #[test]
    fn test_algebra() {
        let p = x().add(&y());
        let q = x().sub(&y());
        // (x + y)(x - y) = x^2 - y^2
        let expected = Polynomial::monomial(1, vec!['x', 'x'])
            .sub(&Polynomial::monomial(1, vec!['y', 'y']));
        assert_eq!(p.mul(&q), expected);
        assert_eq!(p.sub(&p), Polynomial::zero());
        assert_eq!((&p + &q), x().mul(&Polynomial::constant(2)));
    }

    #[test]
    fn test_shr_splits_coefficients() {
        // 257*x + 3 = 2^8 * (x) + (x + 3)
        let p = Polynomial::monomial(257, vec!['x']).add_scalar(3);
        let (q, r) = p.shr(8);
        assert_eq!(q, x());
        assert_eq!(r, x().add_scalar(3));
    }

    #[test]
    fn test_shr_negative_coefficient() {
        // -x = 2^8 * 0 + (-x): truncation keeps the remainder small.
        let p = x().neg();
        let (q, r) = p.shr(8);
        assert!(q.is_zero());
        assert_eq!(r, x().neg());
    }

    #[test]
    fn test_shr_identity() {
        for _ in 0..100 {
            let p = random_poly();
            let n = OsRng.gen_range(0..12);
            let (q, r) = p.shr(n);
            let recomposed = q
                .mul(&Polynomial::constant(BigInt::one() << n))
                .add(&r);
            assert_eq!(recomposed, p, "2^{n}*q + r != p for p = {p}");
        }
    }

    #[test]
    fn test_substitute_expands_powers() {
        // x^2 with x := y + 1 gives y^2 + 2y + 1.
        let p = Polynomial::monomial(1, vec!['x', 'x']);
        let s = y().add_scalar(1);
        let expected = Polynomial::from_terms(vec![
            Monomial::new(1, vec!['y', 'y']),
            Monomial::new(2, vec!['y']),
            Monomial::constant(1),
        ]);
        assert_eq!(p.substitute(&'x', &s), expected);
    }

    #[test]
    fn test_substitute_preserves_evaluation() {
        for _ in 0..100 {
            let p = random_poly();
            let s = random_poly();
            let q = p.substitute(&'x', &s);
            let yv = BigInt::from(OsRng.gen_range(-50i64..50));
            // A consistent trace: x takes the value of s.
            let xv = s.eval(|_| yv.clone());
            let env = |v: &char| if *v == 'x' { xv.clone() } else { yv.clone() };
            assert_eq!(q.eval(&env), p.eval(&env));
        }
    }

    #[test]
    fn test_substitute_all_is_simultaneous() {
        // x + y with x := y and y := x swaps the variables; sequential
        // substitution would collapse them instead.
        let p = x().add(&y());
        let swapped = p.substitute_all(|v| match v {
            'x' => y(),
            _ => x(),
        });
        assert_eq!(swapped, p);
        let collapsed = p.substitute(&'x', &y()).substitute(&'y', &x());
        assert_eq!(collapsed, x().mul(&Polynomial::constant(2)));
    }

    #[test]
    fn test_split_signs() {
        let p = x().sub(&y()).add_scalar(-7);
        let (pos, neg) = p.split_signs();
        assert_eq!(pos, x());
        assert_eq!(neg, y().add_scalar(7));
        assert_eq!(pos.sub(&neg), p);
    }

    #[test]
    fn test_vars() {
        let p = Polynomial::<char>::monomial(3, vec!['x', 'x']).add_scalar(1);
        assert_eq!(p.vars().into_iter().collect::<Vec<_>>(), vec!['x']);
        assert!(Polynomial::<char>::zero().vars().is_empty());
    }

    #[test]
    fn test_display() {
        let p = Polynomial::monomial(16, vec!['x', 'y'])
            .sub(&y())
            .add_scalar(3);
        assert_eq!(p.to_string(), "3 + 16*x*y - y");
        assert_eq!(Polynomial::<char>::zero().to_string(), "0");
    }
}
