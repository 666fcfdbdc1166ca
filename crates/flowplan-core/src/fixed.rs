use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Every rate, capacity and cost in the planner uses this type so that
/// saturation checks are exact and evaluations are bit-reproducible.
pub type Fixed64 = I32F32;

/// Convert an f64 to Fixed64. Use only at construction/loading boundaries.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and reporting.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Checked division for Fixed64 that returns None on zero divisor.
#[inline]
pub fn checked_div_64(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    a.checked_div(b)
}

/// Divide `amount` evenly among `parts`. Returns None when `parts` is zero.
#[inline]
pub fn share_of(amount: Fixed64, parts: usize) -> Option<Fixed64> {
    checked_div_64(amount, Fixed64::from_num(parts))
}

/// True when `a` and `b` differ by at most `tolerance`.
#[inline]
pub fn within(a: Fixed64, b: Fixed64, tolerance: Fixed64) -> bool {
    (a - b).abs() <= tolerance.abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_round_trip_is_exact_for_binary_fractions() {
        let a = f64_to_fixed64(12.375);
        assert_eq!(fixed64_to_f64(a), 12.375);
    }

    #[test]
    fn checked_div_by_zero() {
        let a = f64_to_fixed64(1.0);
        assert!(checked_div_64(a, Fixed64::ZERO).is_none());
    }

    #[test]
    fn share_of_splits_evenly() {
        let share = share_of(f64_to_fixed64(30.0), 3).unwrap();
        assert_eq!(share, f64_to_fixed64(10.0));
        assert!(share_of(f64_to_fixed64(30.0), 0).is_none());
    }

    #[test]
    fn share_of_truncates_never_exceeds_amount() {
        let amount = f64_to_fixed64(10.0);
        let share = share_of(amount, 3).unwrap();
        assert!(share * Fixed64::from_num(3) <= amount);
    }

    #[test]
    fn within_tolerance() {
        let tol = f64_to_fixed64(0.001);
        assert!(within(f64_to_fixed64(1.0), f64_to_fixed64(1.0005), tol));
        assert!(!within(f64_to_fixed64(1.0), f64_to_fixed64(1.01), tol));
    }

    #[test]
    fn determinism() {
        let a = f64_to_fixed64(1.0 / 3.0);
        let b = f64_to_fixed64(1.0 / 3.0);
        assert_eq!(a * Fixed64::from_num(3), b * Fixed64::from_num(3));
    }
}
