//! Polynomial equation solving (linear and quadratic).
//!
//! Anything of higher degree is an honest [`SolveError::Unsupported`] — the
//! solving stage reports the gap instead of guessing. Roots are cleaned of
//! float noise and deduplicated, so a double root such as `x^2 + 2x + 1 = 0`
//! yields exactly one distinct value.

use super::simplify::{poly_coefficients, round_clean};
use super::Expr;
use crate::error::SolveError;

const EPS: f64 = 1e-10;

/// Solve `lhs = rhs` for `var`.
pub fn solve_equation(lhs: &Expr, rhs: &Expr, var: &str) -> Result<Vec<f64>, SolveError> {
    let standard = Expr::sub(lhs.clone(), rhs.clone());
    let coeffs = poly_coefficients(&standard, var).ok_or_else(|| SolveError::Unsupported {
        detail: format!("equation is not polynomial in {var}"),
    })?;
    solve_polynomial(&coeffs)
}

/// Real roots of a polynomial given by coefficients, lowest degree first.
///
/// Returns an empty vector when the polynomial has no real roots; roots are
/// sorted ascending and deduplicated within [`EPS`].
pub fn solve_polynomial(coeffs: &[f64]) -> Result<Vec<f64>, SolveError> {
    let mut coeffs = coeffs.to_vec();
    while coeffs.len() > 1 && coeffs.last().is_some_and(|c| c.abs() < EPS) {
        coeffs.pop();
    }

    let roots = match coeffs.len() {
        // degenerate: the variable cancelled out entirely
        0 | 1 => {
            let constant = coeffs.first().copied().unwrap_or(0.0);
            if constant.abs() > EPS {
                return Err(SolveError::Unsupported {
                    detail: "equation reduces to a false constant".to_string(),
                });
            }
            return Err(SolveError::NoVariable);
        }
        2 => vec![-coeffs[0] / coeffs[1]],
        3 => {
            let (c, b, a) = (coeffs[0], coeffs[1], coeffs[2]);
            let disc = b * b - 4.0 * a * c;
            if disc < -EPS {
                Vec::new()
            } else if disc.abs() <= EPS {
                vec![-b / (2.0 * a)]
            } else {
                let sq = disc.sqrt();
                vec![(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)]
            }
        }
        n => {
            return Err(SolveError::Unsupported {
                detail: format!("degree {} polynomial", n - 1),
            })
        }
    };

    let mut roots: Vec<f64> = roots.into_iter().map(round_clean).collect();
    roots.sort_by(|a, b| a.partial_cmp(b).expect("roots are finite"));
    roots.dedup_by(|a, b| (*a - *b).abs() < EPS);
    Ok(roots)
}
