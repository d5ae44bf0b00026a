#![forbid(unsafe_code)]

//! Integer semantics of the contract types: ranges, defaults and
//! wrapping arithmetic.

use horn_ast::TypeName;
use horn_smt::Term;
use num_bigint::BigInt;

fn modulus(ty: TypeName) -> Option<BigInt> {
    ty.bits().map(|b| BigInt::from(1) << usize::from(b))
}

/// Inclusive `(min, max)` of an integer-like type.
pub fn bounds(ty: TypeName) -> Option<(BigInt, BigInt)> {
    let m = modulus(ty)?;
    if ty.is_signed() {
        let half: BigInt = m >> 1usize;
        Some((-half.clone(), half - 1))
    } else {
        Some((BigInt::from(0), m - 1))
    }
}

pub fn range_constraint(ty: TypeName, t: &Term) -> Term {
    match bounds(ty) {
        Some((lo, hi)) => Term::and([
            Term::ge(t.clone(), Term::Int(lo)),
            Term::le(t.clone(), Term::Int(hi)),
        ]),
        None => Term::truth(),
    }
}

pub fn default_value(ty: TypeName) -> Term {
    if ty.is_bool() {
        Term::Bool(false)
    } else {
        Term::int(0)
    }
}

/// Brings `r` back into range when it overflowed by less than one modulus.
fn wrap_once(ty: TypeName, r: Term) -> Term {
    let (Some((lo, hi)), Some(m)) = (bounds(ty), modulus(ty)) else {
        return r;
    };
    Term::ite(
        Term::gt(r.clone(), Term::Int(hi)),
        Term::sub(r.clone(), Term::Int(m.clone())),
        Term::ite(
            Term::lt(r.clone(), Term::Int(lo)),
            Term::add(r.clone(), Term::Int(m)),
            r,
        ),
    )
}

fn wrap_mod(ty: TypeName, r: Term) -> Term {
    let (Some((lo, _)), Some(m)) = (bounds(ty), modulus(ty)) else {
        return r;
    };
    if ty.is_signed() {
        Term::add(
            Term::modulo(Term::sub(r, Term::Int(lo.clone())), Term::Int(m)),
            Term::Int(lo),
        )
    } else {
        Term::modulo(r, Term::Int(m))
    }
}

fn abs(t: Term) -> Term {
    Term::ite(Term::ge(t.clone(), Term::int(0)), t.clone(), Term::neg(t))
}

pub fn add(ty: TypeName, a: Term, b: Term) -> Term {
    wrap_once(ty, Term::add(a, b))
}

pub fn sub(ty: TypeName, a: Term, b: Term) -> Term {
    wrap_once(ty, Term::sub(a, b))
}

pub fn mul(ty: TypeName, a: Term, b: Term) -> Term {
    wrap_mod(ty, Term::mul(a, b))
}

pub fn neg(ty: TypeName, a: Term) -> Term {
    wrap_once(ty, Term::neg(a))
}

/// Truncating division; the caller assumes `b != 0`.
pub fn div(ty: TypeName, a: Term, b: Term) -> Term {
    if !ty.is_signed() {
        return Term::div(a, b);
    }
    let q = Term::div(abs(a.clone()), abs(b.clone()));
    let same_sign = Term::eq(
        Term::ge(a, Term::int(0)),
        Term::ge(b, Term::int(0)),
    );
    wrap_once(ty, Term::ite(same_sign, q.clone(), Term::neg(q)))
}

/// Remainder with the sign of the dividend; the caller assumes `b != 0`.
pub fn modulo(ty: TypeName, a: Term, b: Term) -> Term {
    if !ty.is_signed() {
        return Term::modulo(a, b);
    }
    let r = Term::modulo(abs(a.clone()), abs(b));
    Term::ite(Term::ge(a, Term::int(0)), r.clone(), Term::neg(r))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_of_common_types() {
        assert_eq!(bounds(TypeName::Uint(8)), Some((BigInt::from(0), BigInt::from(255))));
        assert_eq!(bounds(TypeName::Int(8)), Some((BigInt::from(-128), BigInt::from(127))));
        let (_, max) = bounds(TypeName::Address).expect("address");
        assert_eq!(max, (BigInt::from(1) << 160usize) - 1);
        assert_eq!(bounds(TypeName::Bool), None);
    }

    #[test]
    fn range_constraint_renders_bounds() {
        let x = Term::var("x", horn_smt::Sort::Int);
        assert_eq!(
            range_constraint(TypeName::Uint(8), &x).to_string(),
            "(and (>= x 0) (<= x 255))"
        );
        assert_eq!(
            range_constraint(TypeName::Int(8), &x).to_string(),
            "(and (>= x (- 128)) (<= x 127))"
        );
        assert_eq!(range_constraint(TypeName::Bool, &x), Term::truth());
    }

    #[test]
    fn unsigned_multiplication_wraps_by_modulus() {
        let x = Term::var("x", horn_smt::Sort::Int);
        assert_eq!(
            mul(TypeName::Uint(8), x.clone(), Term::int(2)).to_string(),
            "(mod (* x 2) 256)"
        );
        assert_eq!(div(TypeName::Uint(8), x.clone(), Term::int(2)).to_string(), "(div x 2)");
    }
}
