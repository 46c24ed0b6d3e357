//! Dense tableau simplex for small allocation problems.
//!
//! Solves `maximize c·x` subject to `A x <= b` and `0 <= x <= u`, starting from
//! the all-slack basis. That start requires the origin to be feasible, so every
//! `b_i` must be non-negative. A negative `b_i` on a row whose coefficients are
//! all non-negative is reported as infeasible. Bland's rule keeps degenerate
//! problems (zero budget, zero-cost columns) from cycling.
//!
//! Upper bounds are handled in the ratio test rather than as extra rows: a
//! variable that reaches its bound is substituted by `u - x`, so the tableau
//! only grows with the real constraints.

use thiserror::Error;

const EPS: f64 = 1e-9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimplexError {
    #[error("constraint row {row} cannot be satisfied")]
    Infeasible { row: usize },

    #[error("constraint row {row} needs a phase-one start (negative bound, mixed signs)")]
    NeedsPhaseOne { row: usize },

    #[error("objective is unbounded")]
    Unbounded,

    #[error("iteration limit of {0} reached")]
    IterationLimit(usize),

    #[error("dimension mismatch: {0}")]
    Dimension(String),

    #[error("non-finite coefficient in {0}")]
    NonFinite(&'static str),

    #[error("upper bound of variable {var} must be non-negative")]
    NegativeBound { var: usize },
}

/// `maximize objective·x` s.t. each `(row, bound)` gives `row·x <= bound`.
#[derive(Debug, Clone, Default)]
pub struct LinearProgram {
    objective: Vec<f64>,
    constraints: Vec<(Vec<f64>, f64)>,
    /// Empty means every variable is unbounded above.
    upper: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub values: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
}

/// What limits the entering variable's step.
#[derive(Debug, Clone, Copy)]
enum Step {
    /// The entering variable reaches its own upper bound.
    Bound,
    /// The basic variable of this row drops to zero.
    Lower(usize),
    /// The basic variable of this row rises to its upper bound.
    Upper(usize),
}

impl LinearProgram {
    pub fn maximize(objective: Vec<f64>) -> Self {
        LinearProgram {
            objective,
            constraints: Vec::new(),
            upper: Vec::new(),
        }
    }

    pub fn less_or_equal(mut self, row: Vec<f64>, bound: f64) -> Self {
        self.constraints.push((row, bound));
        self
    }

    /// Per-variable upper bounds. `f64::INFINITY` leaves a variable uncapped.
    pub fn with_upper_bounds(mut self, upper: Vec<f64>) -> Self {
        self.upper = upper;
        self
    }

    pub fn variables(&self) -> usize {
        self.objective.len()
    }

    fn validate(&self) -> Result<(), SimplexError> {
        let n = self.variables();
        if self.objective.iter().any(|c| !c.is_finite()) {
            return Err(SimplexError::NonFinite("objective"));
        }
        if !self.upper.is_empty() && self.upper.len() != n {
            return Err(SimplexError::Dimension(format!(
                "{} upper bounds, expected {n}",
                self.upper.len()
            )));
        }
        if let Some(var) = self.upper.iter().position(|u| u.is_nan() || *u < 0.0) {
            return Err(SimplexError::NegativeBound { var });
        }
        for (i, (row, bound)) in self.constraints.iter().enumerate() {
            if row.len() != n {
                return Err(SimplexError::Dimension(format!(
                    "row {i} has {} coefficients, expected {n}",
                    row.len()
                )));
            }
            if !bound.is_finite() || row.iter().any(|a| !a.is_finite()) {
                return Err(SimplexError::NonFinite("constraints"));
            }
            if *bound < 0.0 {
                if row.iter().all(|a| *a >= 0.0) {
                    return Err(SimplexError::Infeasible { row: i });
                }
                return Err(SimplexError::NeedsPhaseOne { row: i });
            }
        }
        Ok(())
    }

    pub fn solve(&self) -> Result<Solution, SimplexError> {
        self.validate()?;

        let n = self.variables();
        let m = self.constraints.len();
        let width = n + m + 1;
        let rhs = n + m;

        // Row 0 holds reduced costs, rows 1..=m the constraints with slacks.
        let mut tableau = vec![vec![0.0; width]; m + 1];
        for (j, c) in self.objective.iter().enumerate() {
            tableau[0][j] = -c;
        }
        for (i, (row, bound)) in self.constraints.iter().enumerate() {
            tableau[i + 1][..n].copy_from_slice(row);
            tableau[i + 1][n + i] = 1.0;
            tableau[i + 1][rhs] = *bound;
        }
        let mut basis: Vec<usize> = (n..n + m).collect();

        // Slacks are never capped.
        let mut upper = vec![f64::INFINITY; n + m];
        if !self.upper.is_empty() {
            upper[..n].copy_from_slice(&self.upper);
        }
        // Columns currently standing for `upper - x` instead of `x`.
        let mut flipped = vec![false; n + m];

        let limit = 50 * (n + m + 1);
        let mut iterations = 0;
        loop {
            // Bland: lowest-index improving column.
            let Some(entering) = (0..n + m).find(|&j| tableau[0][j] < -EPS) else {
                break;
            };

            // Smallest step wins; ties go to the lowest variable index.
            let mut best: Option<(f64, usize, Step)> = None;
            let mut consider = |step: f64, var: usize, kind: Step| {
                let replace = match best {
                    None => true,
                    Some((t, v, _)) => step < t - EPS || (step <= t + EPS && var < v),
                };
                if replace {
                    best = Some((step, var, kind));
                }
            };
            if upper[entering].is_finite() {
                consider(upper[entering], entering, Step::Bound);
            }
            for i in 1..=m {
                let a = tableau[i][entering];
                let var = basis[i - 1];
                if a > EPS {
                    consider(tableau[i][rhs] / a, var, Step::Lower(i));
                } else if a < -EPS && upper[var].is_finite() {
                    consider((upper[var] - tableau[i][rhs]) / -a, var, Step::Upper(i));
                }
            }

            match best {
                None => return Err(SimplexError::Unbounded),
                Some((_, _, Step::Bound)) => {
                    flip(&mut tableau, entering, upper[entering], rhs);
                    flipped[entering] = !flipped[entering];
                }
                Some((_, _, Step::Lower(row))) => {
                    pivot(&mut tableau, row, entering);
                    basis[row - 1] = entering;
                }
                Some((_, _, Step::Upper(row))) => {
                    let leaving = basis[row - 1];
                    flip(&mut tableau, leaving, upper[leaving], rhs);
                    flipped[leaving] = !flipped[leaving];
                    for v in tableau[row].iter_mut() {
                        *v = -*v;
                    }
                    pivot(&mut tableau, row, entering);
                    basis[row - 1] = entering;
                }
            }

            iterations += 1;
            if iterations >= limit {
                return Err(SimplexError::IterationLimit(limit));
            }
        }

        let mut values = vec![0.0; n];
        for (i, &var) in basis.iter().enumerate() {
            if var < n {
                values[var] = tableau[i + 1][rhs];
            }
        }
        for (j, value) in values.iter_mut().enumerate() {
            if flipped[j] {
                *value = upper[j] - *value;
            }
            *value = value.clamp(0.0, upper[j]);
        }
        let objective = self
            .objective
            .iter()
            .zip(&values)
            .map(|(c, x)| c * x)
            .sum();

        Ok(Solution {
            values,
            objective,
            iterations,
        })
    }
}

/// Substitute `x_col = bound - x_col'` in every row.
fn flip(tableau: &mut [Vec<f64>], col: usize, bound: f64, rhs: usize) {
    for row in tableau.iter_mut() {
        let a = row[col];
        if a != 0.0 {
            row[rhs] -= a * bound;
            row[col] = -a;
        }
    }
}

fn pivot(tableau: &mut [Vec<f64>], row: usize, col: usize) {
    let factor = tableau[row][col];
    for v in tableau[row].iter_mut() {
        *v /= factor;
    }
    let pivot_row = tableau[row].clone();
    for (i, current) in tableau.iter_mut().enumerate() {
        if i == row {
            continue;
        }
        let scale = current[col];
        if scale.abs() <= f64::EPSILON {
            continue;
        }
        for (v, p) in current.iter_mut().zip(&pivot_row) {
            *v -= scale * p;
        }
    }
}
