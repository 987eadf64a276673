//! numerical_stability::polynomial — stability test and projection for
//! lag polynomials.
//!
//! Purpose
//! -------
//! Decide whether a lag polynomial `P(z) = 1 + c₁z + … + c_p z^p` has all of
//! its roots strictly outside the unit circle, and, when it does not,
//! produce the stable polynomial with the same spectrum obtained by
//! reflecting the offending roots through the unit circle.
//!
//! Key behaviors
//! -------------
//! - [`is_stable`] uses `|c₁| < 1` for degree 1, the stationarity triangle
//!   `|c₂| < 1 ∧ |c₁| < 1 + c₂` for degree 2, and companion-matrix
//!   eigenvalues otherwise.
//! - [`stabilize`] returns `None` for stable input and `Some(projected)`
//!   otherwise. Degree 1 is handled in closed form (`c → 1/c`), so the
//!   projection of a real root is exact.
//!
//! Invariants & assumptions
//! ------------------------
//! - Coefficients exclude the leading unit constant term.
//! - The rebuilt polynomial keeps a unit constant term; imaginary parts
//!   left over from conjugate pairs are discarded.
//! - Roots that land on the unit circle are pulled inside by `(1 − ε)`
//!   in the inverse-root (eigenvalue) parameterization.
//! - Non-finite input, coefficients above [`MAX_COEFFICIENT`] in magnitude
//!   and companion matrices whose Schur iteration does not converge within
//!   [`MAX_SCHUR_ITER`] sweeps are unstable, and project to the zero
//!   polynomial (white noise). Reflecting roots of such polynomials loses
//!   all precision, so no attempt is made.
//!
//! Conventions
//! -----------
//! - Internally the code works with inverse roots `λ = 1/z`, the
//!   eigenvalues of the companion matrix of `λ^p + c₁λ^{p−1} + … + c_p`.
//!   Stability means `|λ| < 1` for every `λ`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the closed-form branches, the eigenvalue branch on a
//!   degree-3 polynomial with a known unstable factor, and idempotence.
use nalgebra::{Complex, DMatrix, linalg::Schur};
use ndarray::{Array1, ArrayView1};

/// Largest coefficient magnitude handed to the eigenvalue solver.
pub const MAX_COEFFICIENT: f64 = 1e12;

/// Sweep cap of the Schur decomposition behind the eigenvalue branch.
pub const MAX_SCHUR_ITER: usize = 500;

/// Return `true` when every root of `1 + Σ cᵢ zⁱ` lies strictly outside
/// the unit circle. The empty polynomial is stable.
pub fn is_stable(coeffs: ArrayView1<f64>) -> bool {
    match coeffs.len() {
        0 => true,
        1 => coeffs[0].abs() < 1.0,
        2 => {
            let (c1, c2) = (coeffs[0], coeffs[1]);
            c2.abs() < 1.0 && c1.abs() < 1.0 + c2
        }
        _ => inverse_roots(coeffs).is_some_and(|roots| roots.iter().all(|lambda| lambda.norm() < 1.0)),
    }
}

/// Project `coeffs` onto the stability region.
///
/// Parameters
/// ----------
/// - `coeffs`: non-leading coefficients `(c₁, …, c_p)`.
/// - `eps`: margin used when a root sits on the unit circle.
///
/// Returns
/// -------
/// `None` if the polynomial is already stable, otherwise the reflected
/// coefficients.
pub fn stabilize(coeffs: ArrayView1<f64>, eps: f64) -> Option<Array1<f64>> {
    if is_stable(coeffs) {
        return None;
    }
    if coeffs.iter().any(|c| !c.is_finite()) {
        return Some(Array1::zeros(coeffs.len()));
    }
    if coeffs.len() == 1 {
        let c = coeffs[0];
        let projected = if c.abs() == 1.0 { c * (1.0 - eps) } else { 1.0 / c };
        return Some(Array1::from_elem(1, projected));
    }
    let Some(roots) = inverse_roots(coeffs) else {
        return Some(Array1::zeros(coeffs.len()));
    };
    let reflected: Vec<Complex<f64>> = roots
        .into_iter()
        .map(|lambda| {
            let mut lambda = if lambda.norm() > 1.0 { lambda.inv() } else { lambda };
            let modulus = lambda.norm();
            if modulus >= 1.0 - eps {
                lambda *= (1.0 - eps) / modulus;
            }
            lambda
        })
        .collect();
    Some(coefficients_from_inverse_roots(&reflected))
}

// ---- Helper methods ----

/// Eigenvalues of the companion matrix of `λ^p + c₁λ^{p−1} + … + c_p`;
/// `None` for non-finite or oversized coefficients, or when the Schur
/// iteration does not converge.
fn inverse_roots(coeffs: ArrayView1<f64>) -> Option<Vec<Complex<f64>>> {
    if coeffs.iter().any(|c| !c.is_finite() || c.abs() > MAX_COEFFICIENT) {
        return None;
    }
    let p = coeffs.len();
    let mut companion = DMatrix::<f64>::zeros(p, p);
    for (j, &c) in coeffs.iter().enumerate() {
        companion[(0, j)] = -c;
    }
    for i in 1..p {
        companion[(i, i - 1)] = 1.0;
    }
    let schur = Schur::try_new(companion, f64::EPSILON, MAX_SCHUR_ITER)?;
    let roots: Vec<Complex<f64>> = schur.complex_eigenvalues().iter().copied().collect();
    roots.iter().all(|lambda| lambda.re.is_finite() && lambda.im.is_finite()).then_some(roots)
}

/// Expand `Π (λ − λᵢ)` and return its non-leading coefficients.
fn coefficients_from_inverse_roots(lambdas: &[Complex<f64>]) -> Array1<f64> {
    let mut poly = vec![Complex::new(1.0, 0.0)];
    for &lambda in lambdas {
        let mut next = poly.clone();
        next.push(Complex::new(0.0, 0.0));
        for k in 1..next.len() {
            next[k] -= lambda * poly[k - 1];
        }
        poly = next;
    }
    poly.iter().skip(1).map(|c| c.re).collect()
}
