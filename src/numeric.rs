//! Floating point comparison helpers built on the `approx` crate.

use approx::AbsDiffEq;

/// Default absolute tolerance for comparing derived rates and weights.
pub const ACC: f64 = 1e-10;

/// Compares two floats using a maximum absolute difference of `acc`. Equal infinities compare
/// equal.
#[must_use]
pub fn almost_eq(a: f64, b: f64, acc: f64) -> bool {
    if a.is_infinite() && b.is_infinite() {
        return a == b;
    }
    a.abs_diff_eq(&b, acc)
}

#[macro_export]
macro_rules! assert_almost_eq {
    ($a:expr, $b:expr, $prec:expr $(,)?) => {
        if !$crate::numeric::almost_eq($a, $b, $prec) {
            panic!(
                "assertion failed: `abs(left - right) < {:e}`, (left: `{}`, right: `{}`)",
                $prec, $a, $b
            );
        }
    };
}
