//! Polynomial curve fits for converting RTD resistance to temperature.

use num_traits::Float;

/// Degree-5 fit of temperature (°C) as a function of PT100 resistance (Ω).
///
/// Accurate over -200°C to 660°C, noticeably better near both ends of the
/// range than the linear conversion done by the card firmware. Resistances
/// outside that range are extrapolated, not rejected.
///
/// At 100 Ω the fit gives about -0.065°C.
pub const PT100_POLY5: Polynomial<f64, 6> = Polynomial::new([
    -2.42522E+02,
    2.24745E+00,
    2.38589E-03,
    -8.20888E-06,
    2.27311E-08,
    -2.10678E-11,
]);

/// Polynomial with coefficients in ascending order, `c0 + c1*x + ... + cN*x^N`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Polynomial<T, const N: usize> {
    coefficients: [T; N],
}

impl<T: Float, const N: usize> Polynomial<T, N> {
    pub const fn new(coefficients: [T; N]) -> Self {
        Polynomial { coefficients }
    }

    pub fn coefficients(&self) -> &[T; N] {
        &self.coefficients
    }

    pub fn degree(&self) -> usize {
        N.saturating_sub(1)
    }

    /// Evaluate at `x` using Horner's method.
    pub fn eval(&self, x: T) -> T {
        self.coefficients
            .iter()
            .rev()
            .fold(T::zero(), |acc, &c| acc * x + c)
    }
}
