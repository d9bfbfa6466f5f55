//! Natural cubic spline interpolation
//!
//! Piecewise cubic `y(t) = a + b*dt + c*dt^2 + d*dt^3` through the knots with
//! zero curvature at both ends. The coefficients `c` come from the usual
//! tridiagonal system, solved with nalgebra. Outside the knot range the curve
//! continues linearly along the end tangent.

use nalgebra::{DMatrix, DVector};

use crate::common::{PlannerError, PlannerResult};

#[derive(Debug, Clone)]
pub struct CubicSpline {
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
    x: Vec<f64>,
}

impl CubicSpline {
    /// Fit a spline through `(x[i], y[i])`. `x` must be strictly increasing.
    pub fn new(x: &[f64], y: &[f64]) -> PlannerResult<CubicSpline> {
        if x.len() != y.len() {
            return Err(PlannerError::InvalidParameter(format!(
                "spline knots: {} x values but {} y values",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(PlannerError::NumericalError(format!(
                "spline needs at least 2 knots, got {}",
                x.len()
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(PlannerError::NumericalError(
                "spline knots contain non-finite values".to_string(),
            ));
        }
        if let Some(i) = (0..x.len() - 1).find(|&i| x[i + 1] <= x[i]) {
            return Err(PlannerError::NumericalError(format!(
                "spline knots not strictly increasing: x[{}] = {} then x[{}] = {}",
                i,
                x[i],
                i + 1,
                x[i + 1]
            )));
        }

        let nx = x.len();
        let h: Vec<f64> = (0..nx - 1).map(|i| x[i + 1] - x[i]).collect();
        let a = y.to_vec();

        let a_mat = Self::calc_a(&h);
        let b_vec = Self::calc_b(&h, &a);
        let c_na = a_mat.lu().solve(&b_vec).ok_or_else(|| {
            PlannerError::NumericalError("singular spline system".to_string())
        })?;
        let c: Vec<f64> = c_na.iter().copied().collect();

        let mut b: Vec<f64> = Vec::with_capacity(nx - 1);
        let mut d: Vec<f64> = Vec::with_capacity(nx - 1);
        for i in 0..nx - 1 {
            d.push((c[i + 1] - c[i]) / (3.0 * h[i]));
            b.push((a[i + 1] - a[i]) / h[i] - h[i] * (c[i + 1] + 2.0 * c[i]) / 3.0);
        }

        Ok(CubicSpline { a, b, c, d, x: x.to_vec() })
    }

    /// Interpolated value at `t`
    pub fn calc(&self, t: f64) -> f64 {
        let n = self.x.len();
        if t < self.x[0] {
            return self.a[0] + self.calc_d(self.x[0]) * (t - self.x[0]);
        }
        if t > self.x[n - 1] {
            return self.a[n - 1] + self.calc_d(self.x[n - 1]) * (t - self.x[n - 1]);
        }
        let i = self.search_index(t);
        let dx = t - self.x[i];
        self.a[i] + self.b[i] * dx + self.c[i] * dx.powi(2) + self.d[i] * dx.powi(3)
    }

    /// First derivative at `t`
    pub fn calc_d(&self, t: f64) -> f64 {
        let n = self.x.len();
        let t = t.clamp(self.x[0], self.x[n - 1]);
        let i = self.search_index(t);
        let dx = t - self.x[i];
        self.b[i] + 2.0 * self.c[i] * dx + 3.0 * self.d[i] * dx.powi(2)
    }

    /// Second derivative at `t` (zero outside the knot range)
    pub fn calc_dd(&self, t: f64) -> f64 {
        let n = self.x.len();
        if t < self.x[0] || t > self.x[n - 1] {
            return 0.0;
        }
        let i = self.search_index(t);
        let dx = t - self.x[i];
        2.0 * self.c[i] + 6.0 * self.d[i] * dx
    }

    /// Index of the segment containing `t`, clamped to the valid segments
    fn search_index(&self, t: f64) -> usize {
        let segments = self.x.len() - 1;
        self.x.partition_point(|&xi| xi <= t).saturating_sub(1).min(segments - 1)
    }

    fn calc_a(h: &[f64]) -> DMatrix<f64> {
        let nx = h.len() + 1;
        let mut a = DMatrix::zeros(nx, nx);
        a[(0, 0)] = 1.0;
        for i in 0..nx - 1 {
            if i != nx - 2 {
                a[(i + 1, i + 1)] = 2.0 * (h[i] + h[i + 1]);
            }
            a[(i + 1, i)] = h[i];
            a[(i, i + 1)] = h[i];
        }
        a[(0, 1)] = 0.0;
        a[(nx - 1, nx - 2)] = 0.0;
        a[(nx - 1, nx - 1)] = 1.0;
        a
    }

    fn calc_b(h: &[f64], a: &[f64]) -> DVector<f64> {
        let nx = h.len() + 1;
        let mut b = DVector::zeros(nx);
        for i in 0..nx - 2 {
            b[i + 1] = 3.0 * (a[i + 2] - a[i + 1]) / h[i + 1] - 3.0 * (a[i + 1] - a[i]) / h[i];
        }
        b
    }
}
