//! Non-parametric cubic Bezier segments.
//!
//! A keyframe segment is a cubic Bezier whose abscissa runs from 0 to 1 with
//! control abscissas `0, t1, t2, 1`. Evaluating it at a normalized time `t`
//! means inverting the abscissa polynomial for the curve parameter `u`, then
//! evaluating the value polynomial at `u`.
//!
//! The abscissa is
//!
//! ```text
//! x(u) = a·u³ + 3b·u² + 3c·u,   a = 1 + 3(t1 − t2),  b = t2 − 2·t1,  c = t1
//! ```
//!
//! and the root of `x(u) − t` is found in closed form. A bisection pass backs
//! up the closed form whenever it produces a non-finite or inaccurate root.

use strata_core::Value;

const EPSILON: f64 = 1e-12;
const ROOT_TOLERANCE: f64 = 1e-9;

/// Abscissa of the time curve at `u`.
fn abscissa(t1: f64, t2: f64, u: f64) -> f64 {
    let v = 1.0 - u;
    3.0 * v * v * u * t1 + 3.0 * v * u * u * t2 + u * u * u
}

fn pick_root(roots: &[f64]) -> Option<f64> {
    roots
        .iter()
        .copied()
        .find(|u| u.is_finite() && *u >= -ROOT_TOLERANCE && *u <= 1.0 + ROOT_TOLERANCE)
        .map(|u| u.clamp(0.0, 1.0))
}

/// Solve `a·u³ + 3b·u² + 3c·u − t = 0` for a root in `[0, 1]`.
///
/// Candidate roots are tested in order and the first one inside the unit
/// interval wins. Returns None when no candidate lands there.
pub fn solve_cubic_time(a: f64, b: f64, c: f64, t: f64) -> Option<f64> {
    if a.abs() < EPSILON {
        if b.abs() < EPSILON {
            // Straight time curve.
            if c.abs() < EPSILON {
                return Some(0.0);
            }
            return pick_root(&[t / (3.0 * c)]);
        }
        let disc = 9.0 * c * c + 12.0 * b * t;
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        return pick_root(&[(-3.0 * c + sq) / (6.0 * b), (-3.0 * c - sq) / (6.0 * b)]);
    }

    // Normalize to u³ + B·u² + C·u + D and depress with u = s − B/3.
    let bn = 3.0 * b / a;
    let cn = 3.0 * c / a;
    let dn = -t / a;
    let shift = -bn / 3.0;
    let p = cn - bn * bn / 3.0;
    let q = 2.0 * bn * bn * bn / 27.0 - bn * cn / 3.0 + dn;

    if p.abs() < EPSILON {
        return pick_root(&[(-q).cbrt() + shift]);
    }

    let disc = (q / 2.0) * (q / 2.0) + (p / 3.0) * (p / 3.0) * (p / 3.0);
    if disc.abs() < EPSILON * EPSILON {
        return pick_root(&[3.0 * q / p + shift, -3.0 * q / (2.0 * p) + shift]);
    }
    if disc > 0.0 {
        let sq = disc.sqrt();
        let s = (-q / 2.0 + sq).cbrt() + (-q / 2.0 - sq).cbrt();
        return pick_root(&[s + shift]);
    }

    // Three real roots.
    let r = 2.0 * (-p / 3.0).sqrt();
    let phi = ((3.0 * q / (2.0 * p)) * (-3.0 / p).sqrt())
        .clamp(-1.0, 1.0)
        .acos()
        / 3.0;
    let tau = 2.0 * std::f64::consts::PI / 3.0;
    pick_root(&[
        r * phi.cos() + shift,
        r * (phi - tau).cos() + shift,
        r * (phi - 2.0 * tau).cos() + shift,
    ])
}

fn bisect(t1: f64, t2: f64, t: f64) -> f64 {
    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    for _ in 0..64 {
        let mid = 0.5 * (lo + hi);
        if abscissa(t1, t2, mid) < t {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Curve parameter `u` at which the time curve with tangent abscissas
/// `t1`, `t2` reaches normalized time `t`.
pub fn bezier_time_parameter(t1: f64, t2: f64, t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    let t1 = t1.clamp(0.0, 1.0);
    let t2 = t2.clamp(0.0, 1.0);
    let a = 1.0 + 3.0 * (t1 - t2);
    let b = t2 - 2.0 * t1;
    match solve_cubic_time(a, b, t1, t) {
        Some(u) if (abscissa(t1, t2, u) - t).abs() <= ROOT_TOLERANCE => u,
        _ => bisect(t1, t2, t),
    }
}

/// Evaluate a segment between `y0` and `y3` with control values `y1`, `y2`
/// placed at abscissas `t1`, `t2`. Exact endpoint values at `t = 0` and `t = 1`.
pub fn evaluate_segment(
    y0: &Value,
    y1: &Value,
    y2: &Value,
    y3: &Value,
    t1: f64,
    t2: f64,
    t: f64,
) -> Value {
    if t <= 0.0 {
        return *y0;
    }
    if t >= 1.0 {
        return *y3;
    }
    let u = bezier_time_parameter(t1, t2, t);
    Value::bezier(y0, y1, y2, y3, u)
}
