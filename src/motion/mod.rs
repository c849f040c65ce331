//! Humanlike cursor motion synthesis.
//!
//! Turns a start/end point pair into a timed trajectory: jittered control
//! points (zigzag or curved), a smooth spline fit through them, and a
//! per-segment delay profile with non-uniform pacing. This is the core
//! anti-detection primitive - a constant-velocity straight line is
//! trivially distinguishable from a human hand.

mod spline;

use rand::Rng;

/// A cursor position in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// Tuning knobs for path synthesis.
///
/// Invariants: `min_nodes <= max_nodes`, all factors non-negative,
/// `zigzag_probability` in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct MotionConfig {
    /// Scales the overall movement duration.
    pub speed_factor: f64,
    /// Probability of a sharp zigzag path instead of a smooth curve.
    pub zigzag_probability: f64,
    pub min_nodes: usize,
    pub max_nodes: usize,
    /// Perturbation amplitude as a fraction of the travel distance.
    pub variance_factor: f64,
    /// Upper bound on the perturbation amplitude, in page units.
    pub max_variance: f64,
    /// Number of resampled points in a synthesized path.
    pub samples_per_path: usize,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            speed_factor: 0.5,
            zigzag_probability: 0.75,
            min_nodes: 2,
            max_nodes: 15,
            variance_factor: 0.15,
            max_variance: 100.0,
            samples_per_path: 100,
        }
    }
}

/// Stateless path generator; the only state across calls is the
/// thread-local random source.
#[derive(Debug, Clone, Default)]
pub struct MotionSynthesizer {
    config: MotionConfig,
}

impl MotionSynthesizer {
    pub fn new(config: MotionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Generate a humanlike path from `start` to `end`.
    ///
    /// The returned path ends exactly at `end`. Sub-unit movements skip
    /// synthesis and collapse to a single-point path.
    pub fn generate_path(&self, start: Point, end: Point) -> Vec<Point> {
        let distance = start.distance(end);
        if distance < 1.0 {
            return vec![end];
        }

        let mut rng = rand::rng();
        let num_nodes = rng.random_range(self.config.min_nodes..=self.config.max_nodes);
        let variance = (distance * self.config.variance_factor).min(self.config.max_variance);

        let control_points = if rng.random_bool(self.config.zigzag_probability.clamp(0.0, 1.0)) {
            self.zigzag_points(&mut rng, start, end, num_nodes, variance)
        } else {
            self.curved_points(&mut rng, start, end, num_nodes, variance)
        };

        spline::fit_trajectory(&control_points, self.config.samples_per_path)
    }

    /// Per-segment delays (milliseconds) for a generated path.
    ///
    /// Total duration scales sub-linearly with distance and is clamped to
    /// `[100, 2000]` ms; each segment gets a share proportional to its
    /// length with independent jitter.
    pub fn calculate_delays(&self, path: &[Point]) -> Vec<f64> {
        if path.len() < 2 {
            return vec![0.0];
        }

        let mut rng = rand::rng();
        let total_distance: f64 = path.windows(2).map(|w| w[0].distance(w[1])).sum();

        let exponent = rng.random_range(1.1..=1.75);
        let adjustment = rng.random_range(1.1..=1.75);
        let base_duration = (total_distance.powf(exponent) / adjustment * self.config.speed_factor)
            .clamp(100.0, 2000.0);

        path.windows(2)
            .map(|w| {
                let segment = w[0].distance(w[1]);
                let proportion = if total_distance > 0.0 {
                    segment / total_distance
                } else {
                    1.0 / path.len() as f64
                };
                base_duration * proportion * rng.random_range(0.8..=1.2)
            })
            .collect()
    }

    /// Linear interpolation with every interior point perturbed by uniform
    /// noise; endpoints stay exact.
    fn zigzag_points(
        &self,
        rng: &mut impl Rng,
        start: Point,
        end: Point,
        num_nodes: usize,
        variance: f64,
    ) -> Vec<Point> {
        let mut points = lerp_points(start, end, num_nodes);
        for point in points.iter_mut().take(num_nodes.saturating_sub(1)).skip(1) {
            point.x += rng.random_range(-variance..=variance);
            point.y += rng.random_range(-variance..=variance);
        }
        points
    }

    /// Linear interpolation with Gaussian offsets on every point; the
    /// first and last offsets are forced back to zero so the endpoints
    /// stay exact.
    fn curved_points(
        &self,
        rng: &mut impl Rng,
        start: Point,
        end: Point,
        num_nodes: usize,
        variance: f64,
    ) -> Vec<Point> {
        let std_dev = variance * 0.5;
        let mut points = lerp_points(start, end, num_nodes);
        let last = points.len().saturating_sub(1);
        for (i, point) in points.iter_mut().enumerate() {
            if i == 0 || i == last {
                continue;
            }
            point.x += sample_normal(rng, std_dev);
            point.y += sample_normal(rng, std_dev);
        }
        points
    }
}

/// `num` evenly spaced points from `start` to `end` inclusive.
fn lerp_points(start: Point, end: Point, num: usize) -> Vec<Point> {
    if num <= 1 {
        return vec![end];
    }
    (0..num)
        .map(|i| {
            let t = i as f64 / (num - 1) as f64;
            Point::new(start.x + (end.x - start.x) * t, start.y + (end.y - start.y) * t)
        })
        .collect()
}

/// Box-Muller sample from N(0, std_dev).
fn sample_normal(rng: &mut impl Rng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos() * std_dev
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn path_ends_exactly_at_target() {
        let synth = MotionSynthesizer::default();
        let start = Point::new(10.0, 20.0);
        let end = Point::new(640.0, 410.0);
        // Covers both the zigzag and curved branches over repeated draws.
        for _ in 0..25 {
            let path = synth.generate_path(start, end);
            assert_eq!(path.len(), synth.config().samples_per_path);
            let last = *path.last().unwrap();
            assert!((last.x - end.x).abs() < EPS, "x off by {}", last.x - end.x);
            assert!((last.y - end.y).abs() < EPS, "y off by {}", last.y - end.y);
        }
    }

    #[test]
    fn sub_unit_distance_collapses_to_single_point() {
        let synth = MotionSynthesizer::default();
        let start = Point::new(100.0, 100.0);
        let end = Point::new(100.4, 100.3);
        let path = synth.generate_path(start, end);
        assert_eq!(path, vec![end]);
    }

    #[test]
    fn delays_match_segment_count_and_bounds() {
        let synth = MotionSynthesizer::default();
        let path = synth.generate_path(Point::new(0.0, 0.0), Point::new(500.0, 300.0));
        let delays = synth.calculate_delays(&path);
        assert_eq!(delays.len(), path.len() - 1);
        assert!(delays.iter().all(|d| *d >= 0.0));
        // Base duration is clamped to [100, 2000] ms, jitter to [0.8, 1.2].
        let total: f64 = delays.iter().sum();
        assert!(total >= 100.0 * 0.8, "total {total} below jittered floor");
        assert!(total <= 2000.0 * 1.2, "total {total} above jittered ceiling");
    }

    #[test]
    fn short_path_gets_sentinel_delay() {
        let synth = MotionSynthesizer::default();
        assert_eq!(synth.calculate_delays(&[]), vec![0.0]);
        assert_eq!(synth.calculate_delays(&[Point::new(1.0, 1.0)]), vec![0.0]);
    }

    #[test]
    fn lerp_endpoints_are_exact() {
        let points = lerp_points(Point::new(0.0, 0.0), Point::new(10.0, 5.0), 7);
        assert_eq!(points.len(), 7);
        assert_eq!(points[0], Point::new(0.0, 0.0));
        assert_eq!(points[6], Point::new(10.0, 5.0));
    }
}
