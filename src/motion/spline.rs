//! Smooth trajectory fitting through control points.
//!
//! Four or more control points get a chord-length parameterized natural
//! cubic spline per axis, resampled uniformly; fewer points, or a
//! degenerate parameterization, fall back to linear interpolation. A fit
//! failure is never fatal to the caller.

use super::Point;

/// Fit a smooth trajectory through `control` and resample it into
/// `samples` points. The first and last control points are preserved
/// exactly.
pub(super) fn fit_trajectory(control: &[Point], samples: usize) -> Vec<Point> {
    if control.len() < 2 {
        return control.to_vec();
    }
    if control.len() < 4 {
        return linear_resample(control, samples);
    }
    match cubic_resample(control, samples) {
        Some(path) => path,
        None => linear_resample(control, samples),
    }
}

/// Piecewise-linear resampling over an evenly spaced parameter.
fn linear_resample(control: &[Point], samples: usize) -> Vec<Point> {
    let n = control.len();
    if samples <= 1 || n < 2 {
        return vec![*control.last().unwrap_or(&Point::new(0.0, 0.0))];
    }

    (0..samples)
        .map(|i| {
            let t = i as f64 / (samples - 1) as f64;
            // Position of t on the control-point parameter grid [0, n-1].
            let scaled = t * (n - 1) as f64;
            let idx = (scaled.floor() as usize).min(n - 2);
            let frac = scaled - idx as f64;
            let a = control[idx];
            let b = control[idx + 1];
            Point::new(a.x + (b.x - a.x) * frac, a.y + (b.y - a.y) * frac)
        })
        .collect()
}

/// Natural cubic spline through the control points, parameterized by
/// cumulative chord length. Returns `None` when the parameterization is
/// degenerate (coincident control points).
fn cubic_resample(control: &[Point], samples: usize) -> Option<Vec<Point>> {
    let n = control.len();
    if samples <= 1 {
        return Some(vec![control[n - 1]]);
    }

    // Chord-length parameter, normalized to [0, 1].
    let mut u = Vec::with_capacity(n);
    let mut running = 0.0;
    u.push(0.0);
    for w in control.windows(2) {
        running += w[0].distance(w[1]);
        u.push(running);
    }
    let total = running;
    if total <= f64::EPSILON {
        return None;
    }
    for value in u.iter_mut() {
        *value /= total;
    }
    // Coincident control points collapse parameter intervals and make the
    // tridiagonal system singular.
    if u.windows(2).any(|w| w[1] - w[0] <= 1e-12) {
        return None;
    }

    let xs: Vec<f64> = control.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = control.iter().map(|p| p.y).collect();
    let mx = second_derivatives(&u, &xs)?;
    let my = second_derivatives(&u, &ys)?;

    let mut path = Vec::with_capacity(samples);
    for i in 0..samples {
        let t = i as f64 / (samples - 1) as f64;
        path.push(Point::new(
            eval_spline(&u, &xs, &mx, t),
            eval_spline(&u, &ys, &my, t),
        ));
    }
    // Resampling at t = 0 and t = 1 reproduces the endpoints, but pin them
    // against rounding anyway.
    path[0] = control[0];
    if let Some(last) = path.last_mut() {
        *last = control[n - 1];
    }
    Some(path)
}

/// Second derivatives of the natural cubic spline at each knot, via the
/// Thomas algorithm on the interior tridiagonal system.
fn second_derivatives(u: &[f64], y: &[f64]) -> Option<Vec<f64>> {
    let n = u.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return Some(m);
    }

    let h: Vec<f64> = u.windows(2).map(|w| w[1] - w[0]).collect();
    let mut diag = vec![0.0; n];
    let mut sup = vec![0.0; n];
    let mut rhs = vec![0.0; n];
    for i in 1..n - 1 {
        diag[i] = 2.0 * (h[i - 1] + h[i]);
        sup[i] = h[i];
        rhs[i] = 6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
    }

    for i in 2..n - 1 {
        if diag[i - 1].abs() <= f64::EPSILON {
            return None;
        }
        let w = h[i - 1] / diag[i - 1];
        diag[i] -= w * sup[i - 1];
        rhs[i] -= w * rhs[i - 1];
    }

    if diag[n - 2].abs() <= f64::EPSILON {
        return None;
    }
    m[n - 2] = rhs[n - 2] / diag[n - 2];
    for i in (1..n - 2).rev() {
        m[i] = (rhs[i] - sup[i] * m[i + 1]) / diag[i];
    }
    Some(m)
}

/// Evaluate the spline with knots `u`, values `y`, second derivatives `m`
/// at parameter `t`.
fn eval_spline(u: &[f64], y: &[f64], m: &[f64], t: f64) -> f64 {
    let n = u.len();
    let i = u.partition_point(|knot| *knot <= t).clamp(1, n - 1) - 1;
    let dt = u[i + 1] - u[i];
    let a = (u[i + 1] - t) / dt;
    let b = (t - u[i]) / dt;
    a * y[i]
        + b * y[i + 1]
        + ((a.powi(3) - a) * m[i] + (b.powi(3) - b) * m[i + 1]) * dt * dt / 6.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_resample_preserves_endpoints() {
        let control = vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0), Point::new(10.0, 0.0)];
        let path = linear_resample(&control, 50);
        assert_eq!(path.len(), 50);
        assert_eq!(path[0], control[0]);
        assert_eq!(*path.last().unwrap(), control[2]);
    }

    #[test]
    fn cubic_fit_interpolates_control_points() {
        let control = vec![
            Point::new(0.0, 0.0),
            Point::new(30.0, 40.0),
            Point::new(70.0, 20.0),
            Point::new(100.0, 90.0),
            Point::new(150.0, 100.0),
        ];
        let path = fit_trajectory(&control, 101);
        assert_eq!(path.len(), 101);
        assert_eq!(path[0], control[0]);
        assert_eq!(*path.last().unwrap(), *control.last().unwrap());
        // The resampled curve should pass close to every interior control
        // point (it interpolates them at their chord parameter).
        for target in &control[1..4] {
            let closest = path
                .iter()
                .map(|p| p.distance(*target))
                .fold(f64::INFINITY, f64::min);
            assert!(closest < 2.5, "curve misses control point by {closest}");
        }
    }

    #[test]
    fn coincident_points_fall_back_to_linear() {
        let control = vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(20.0, 20.0),
        ];
        let path = fit_trajectory(&control, 10);
        assert_eq!(path.len(), 10);
        assert_eq!(*path.last().unwrap(), Point::new(20.0, 20.0));
    }
}
