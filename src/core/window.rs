//! Analysis window functions and the constant overlap-add (COLA) check.

use std::f64::consts::PI;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::types::Sample;
use crate::error::OlaError;

/// Blackman-Harris window coefficients (4-term).
const BH_A0: f64 = 0.35875;
const BH_A1: f64 = 0.48829;
const BH_A2: f64 = 0.14128;
const BH_A3: f64 = 0.01168;

/// Window kind names accepted by [`WindowKind::from_str`].
pub const KNOWN_WINDOWS: &[&str] = &["hann", "triang", "boxcar", "blackmanharris"];

/// Analysis/synthesis window function kinds.
///
/// Only window/hop combinations that satisfy the COLA constant-sum property
/// are usable by the streaming engine; [`check_cola`] is the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Hann,
    Triang,
    Boxcar,
    BlackmanHarris,
}

impl WindowKind {
    /// Canonical lowercase name, as used in error messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            WindowKind::Hann => "hann",
            WindowKind::Triang => "triang",
            WindowKind::Boxcar => "boxcar",
            WindowKind::BlackmanHarris => "blackmanharris",
        }
    }
}

impl FromStr for WindowKind {
    type Err = OlaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hann" => Ok(WindowKind::Hann),
            "triang" => Ok(WindowKind::Triang),
            "boxcar" => Ok(WindowKind::Boxcar),
            "blackmanharris" => Ok(WindowKind::BlackmanHarris),
            other => Err(OlaError::UnknownKind {
                kind: other.to_string(),
                known: KNOWN_WINDOWS,
            }),
        }
    }
}

/// Generates a window of the given kind and size.
///
/// `periodic` selects the DFT-even (fftbins) variant, computed by evaluating
/// the symmetric window one sample longer and dropping the last sample. The
/// engine requests a periodic window when the window length is even and a
/// symmetric one when it is odd.
pub fn generate_window(kind: WindowKind, size: usize, periodic: bool) -> Vec<Sample> {
    if periodic && kind != WindowKind::Boxcar {
        let mut w = generate_window(kind, size + 1, false);
        w.truncate(size);
        return w;
    }
    match kind {
        WindowKind::Hann => hann_window(size),
        WindowKind::Triang => triang_window(size),
        WindowKind::Boxcar => vec![1.0; size],
        WindowKind::BlackmanHarris => blackman_harris_window(size),
    }
}

/// Returns `Some(trivial_window)` for degenerate sizes (0 or 1), or `None`
/// to indicate the caller should compute the full window.
#[inline]
fn trivial_window(size: usize) -> Option<Vec<Sample>> {
    match size {
        0 => Some(vec![]),
        1 => Some(vec![1.0]),
        _ => None,
    }
}

#[inline]
fn hann_window(size: usize) -> Vec<Sample> {
    if let Some(w) = trivial_window(size) {
        return w;
    }
    let n = (size - 1) as f64;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / n).cos()))
        .collect()
}

#[inline]
fn triang_window(size: usize) -> Vec<Sample> {
    if let Some(w) = trivial_window(size) {
        return w;
    }
    let m = size as f64;
    let half = size.div_ceil(2);
    let mut w = Vec::with_capacity(size);
    if size % 2 == 0 {
        for k in 1..=half {
            w.push((2.0 * k as f64 - 1.0) / m);
        }
        for k in (1..=half).rev() {
            w.push((2.0 * k as f64 - 1.0) / m);
        }
    } else {
        for k in 1..=half {
            w.push(2.0 * k as f64 / (m + 1.0));
        }
        for k in (1..half).rev() {
            w.push(2.0 * k as f64 / (m + 1.0));
        }
    }
    w
}

#[inline]
fn blackman_harris_window(size: usize) -> Vec<Sample> {
    if let Some(w) = trivial_window(size) {
        return w;
    }
    let n = (size - 1) as f64;
    (0..size)
        .map(|i| {
            let x = i as f64 / n;
            BH_A0 - BH_A1 * (2.0 * PI * x).cos() + BH_A2 * (4.0 * PI * x).cos()
                - BH_A3 * (6.0 * PI * x).cos()
        })
        .collect()
}

/// Median of a slice, numpy-style (mean of the two middle order statistics
/// when the length is even).
fn median(values: &[Sample]) -> Sample {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Checks the Constant OverLap Add constraint and returns the COLA constant.
///
/// The window is folded into `win.len() / step` consecutive blocks of `step`
/// samples which are summed elementwise; when the length is not a multiple of
/// the step, the leftover tail is folded into the start of the sum. All bin
/// sums must agree within `tol`; the median bin sum is returned as the
/// normalization constant. Callers divide the window by this constant so that
/// fully-overlapped regions reconstruct at unit gain.
pub fn check_cola(
    win: &[Sample],
    step: usize,
    window_name: &str,
    tol: f64,
) -> Result<f64, OlaError> {
    let n_samples = win.len();
    if n_samples == 0 {
        return Err(OlaError::InvalidWindowLength(0));
    }
    if step == 0 || step > n_samples {
        return Err(OlaError::InvalidStep { step, n_samples });
    }

    let mut binsums = vec![0.0; step];
    for block in 0..n_samples / step {
        for (b, &w) in binsums.iter_mut().zip(win[block * step..].iter()) {
            *b += w;
        }
    }
    let rem = n_samples % step;
    if rem != 0 {
        for (b, &w) in binsums.iter_mut().zip(win[n_samples - rem..].iter()) {
            *b += w;
        }
    }

    let constant = median(&binsums);
    let deviation = binsums
        .iter()
        .map(|b| (b - constant).abs())
        .fold(0.0, f64::max);
    if deviation > tol {
        return Err(OlaError::ColaViolation {
            window: window_name.to_string(),
            n_samples,
            step,
            deviation_pct: 100.0 * deviation / constant,
        });
    }
    Ok(constant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn hann_symmetric_properties() {
        let w = hann_window(101);
        assert_eq!(w.len(), 101);
        assert!(w[0].abs() < 1e-12);
        assert!(w[100].abs() < 1e-12);
        assert_abs_diff_eq!(w[50], 1.0, epsilon = 1e-12);
        for i in 0..50 {
            assert_abs_diff_eq!(w[i], w[100 - i], epsilon = 1e-12);
        }
    }

    #[test]
    fn hann_periodic_half_overlap_sums_to_one() {
        let w = generate_window(WindowKind::Hann, 10, true);
        for i in 0..5 {
            assert_abs_diff_eq!(w[i] + w[i + 5], 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn triang_matches_scipy_values() {
        // scipy.signal.windows.triang(4) and triang(5)
        let even = triang_window(4);
        for (a, b) in even.iter().zip([0.25, 0.75, 0.75, 0.25]) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-12);
        }
        let odd = triang_window(5);
        for (a, b) in odd.iter().zip([1.0 / 3.0, 2.0 / 3.0, 1.0, 2.0 / 3.0, 1.0 / 3.0]) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn trivial_sizes() {
        assert!(generate_window(WindowKind::Hann, 0, false).is_empty());
        assert_eq!(generate_window(WindowKind::Triang, 1, false), vec![1.0]);
        assert_eq!(generate_window(WindowKind::Boxcar, 3, true), vec![1.0; 3]);
    }

    #[test]
    fn cola_accepts_hann_half_overlap() {
        let w = generate_window(WindowKind::Hann, 10, true);
        let c = check_cola(&w, 5, "hann", 1e-10).unwrap();
        assert_abs_diff_eq!(c, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn cola_accepts_triang_half_overlap() {
        // The n_total=27 worked example uses this window: the periodic
        // 10-sample triangle at hop 5 sums to 7/6 in every bin.
        let w = generate_window(WindowKind::Triang, 10, true);
        let c = check_cola(&w, 5, "triang", 1e-10).unwrap();
        assert_abs_diff_eq!(c, 7.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn cola_accepts_blackman_harris_quarter_hop() {
        let w = generate_window(WindowKind::BlackmanHarris, 16, true);
        let c = check_cola(&w, 4, "blackmanharris", 1e-10).unwrap();
        assert_abs_diff_eq!(c, 4.0 * BH_A0, epsilon = 1e-10);
    }

    #[test]
    fn cola_accepts_boxcar_zero_overlap() {
        let w = generate_window(WindowKind::Boxcar, 8, true);
        let c = check_cola(&w, 8, "boxcar", 1e-10).unwrap();
        assert_abs_diff_eq!(c, 1.0, epsilon = 1e-15);
    }

    #[test]
    fn cola_rejects_bad_hop() {
        // Boxcar with a hop that does not divide the length leaves the folded
        // tail bins higher than the rest.
        let w = generate_window(WindowKind::Boxcar, 10, true);
        let err = check_cola(&w, 3, "boxcar", 1e-10).unwrap_err();
        assert!(matches!(err, OlaError::ColaViolation { .. }));

        // Hann at 90% hop is nowhere near constant.
        let w = generate_window(WindowKind::Hann, 10, true);
        assert!(check_cola(&w, 9, "hann", 1e-10).is_err());
    }

    #[test]
    fn cola_rejects_degenerate_inputs() {
        assert!(matches!(
            check_cola(&[], 1, "boxcar", 1e-10),
            Err(OlaError::InvalidWindowLength(0))
        ));
        let w = vec![1.0; 4];
        assert!(matches!(
            check_cola(&w, 0, "boxcar", 1e-10),
            Err(OlaError::InvalidStep { .. })
        ));
        assert!(matches!(
            check_cola(&w, 5, "boxcar", 1e-10),
            Err(OlaError::InvalidStep { .. })
        ));
    }

    #[test]
    fn window_kind_from_str() {
        assert_eq!("hann".parse::<WindowKind>().unwrap(), WindowKind::Hann);
        assert_eq!(
            "blackmanharris".parse::<WindowKind>().unwrap(),
            WindowKind::BlackmanHarris
        );
        assert!(matches!(
            "hamming".parse::<WindowKind>(),
            Err(OlaError::UnknownKind { .. })
        ));
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }
}
