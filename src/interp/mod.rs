//! Two-control-point interpolation between values attached to stream positions.
//!
//! [`Interp2`] owns an ordered set of control positions and a value lookup,
//! and produces smoothly blended value sequences for successive spans of
//! output positions. Before the first control point the first value is held
//! constant, between adjacent control points the left and right values are
//! blended by a decaying weight curve, and after the last control point the
//! last value is held. The blend from a value of 1 down to 0 over a span of
//! 6 and then 17 positions looks like:
//!
//! ```text
//!     1 _     _
//!       |\   / '-.           .-'
//!       | \ /     '-.     .-'
//!       |  x         |-.-|
//!       | / \     .-'     '-.
//!       |/   \_.-'           '-.
//!     0 +----|----|----|----|---
//!       0    5   10   15   20   25
//! ```
//!
//! The cursor only moves forward: each [`Interp2::advance`] call continues
//! from wherever the previous one stopped.

use std::ops::Range;
use std::rc::Rc;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::types::Sample;
use crate::error::OlaError;

/// Interpolation kind names accepted by [`InterpKind::from_str`].
pub const KNOWN_INTERP: &[&str] = &["zero", "linear", "cos2", "hann"];

/// How values are blended between two adjacent control points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpKind {
    /// Zero-order hold: the left value is used as a step, no blending.
    Zero,
    /// Linear decay of the left weight from 1 to 0 across the span.
    Linear,
    /// Raised-cosine decay, `cos²(π/2 · t/span)`.
    RaisedCosine,
}

impl InterpKind {
    /// Left-value weight curve over `span` positions, sampled at
    /// `t = 0..span` (the right endpoint is excluded so the curve of the
    /// next bracket starts exactly at 1). `None` for the step kind.
    fn curve(&self, span: usize) -> Option<Vec<Sample>> {
        match self {
            InterpKind::Zero => None,
            InterpKind::Linear => Some(
                (0..span)
                    .map(|t| 1.0 - t as f64 / span as f64)
                    .collect(),
            ),
            InterpKind::RaisedCosine => Some(
                (0..span)
                    .map(|t| {
                        let c = (std::f64::consts::FRAC_PI_2 * t as f64 / span as f64).cos();
                        c * c
                    })
                    .collect(),
            ),
        }
    }
}

impl FromStr for InterpKind {
    type Err = OlaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zero" => Ok(InterpKind::Zero),
            "linear" => Ok(InterpKind::Linear),
            // "hann" is the historical alias for the raised-cosine blend.
            "cos2" | "hann" => Ok(InterpKind::RaisedCosine),
            other => Err(OlaError::UnknownKind {
                kind: other.to_string(),
                known: KNOWN_INTERP,
            }),
        }
    }
}

/// One snapshot of values at a control point: one optional flat array per
/// value stream. `None` streams are carried through untouched.
pub type Values = Vec<Option<Vec<Sample>>>;

/// One weighted segment produced by [`Interp2::advance`].
///
/// Concatenating the segments of one `advance(n)` call in order covers
/// exactly `n` output positions with no gap or overlap. Reconstruction per
/// position is `left * w + right * (1 - w)` when `weights` is present, and
/// plain `left` otherwise.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Output positions covered, relative to the start of the `advance` call.
    pub range: Range<usize>,
    /// Value snapshot at the left bracket point.
    pub left: Rc<Values>,
    /// Value snapshot at the right bracket point, absent in hold regions.
    pub right: Option<Rc<Values>>,
    /// Left-value weights for each covered position, absent for holds and
    /// for the `Zero` blend kind.
    pub weights: Option<Vec<Sample>>,
}

/// Interpolates between values pinned to ordered stream positions.
///
/// The value lookup is called lazily, once per control point, as the cursor
/// first reaches the bracket needing it; snapshots are cached while the
/// bracket is active and the weight curve is recomputed only when the
/// bracket changes.
pub struct Interp2 {
    control_points: Vec<usize>,
    values: Box<dyn FnMut(usize) -> Values>,
    kind: InterpKind,
    // Cursor state, shared by the lazy and dense paths. Monotone.
    position: usize,
    left_idx: usize,
    left: Option<Rc<Values>>,
    right: Option<Rc<Values>>,
    right_stale: bool,
    curve: Option<Rc<Vec<Sample>>>,
    n_last: usize,
}

impl std::fmt::Debug for Interp2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interp2")
            .field("control_points", &self.control_points)
            .field("kind", &self.kind)
            .field("position", &self.position)
            .field("left_idx", &self.left_idx)
            .finish_non_exhaustive()
    }
}

impl Interp2 {
    /// Creates an interpolator over sorted, unique control positions with a
    /// position-to-values lookup.
    ///
    /// The lookup is called with a control position and must return one
    /// entry per value stream; within a stream, every control point must
    /// yield arrays of the same length.
    ///
    /// # Errors
    /// `NoControlPoints` when `control_points` is empty and
    /// `UnsortedControlPoints` when positions are not strictly increasing.
    pub fn new(
        control_points: Vec<usize>,
        values: impl FnMut(usize) -> Values + 'static,
        kind: InterpKind,
    ) -> Result<Self, OlaError> {
        if control_points.is_empty() {
            return Err(OlaError::NoControlPoints);
        }
        if control_points.windows(2).any(|w| w[0] >= w[1]) {
            return Err(OlaError::UnsortedControlPoints);
        }
        Ok(Self {
            control_points,
            values: Box::new(values),
            kind,
            position: 0,
            left_idx: 0,
            left: None,
            right: None,
            right_stale: false,
            curve: None,
            n_last: 0,
        })
    }

    /// Creates an interpolator from dense per-stream value arrays, one row
    /// per control point.
    ///
    /// # Errors
    /// In addition to the [`Interp2::new`] errors: `ValueLengthMismatch`
    /// when a stream's row count differs from the number of control points,
    /// and `ShapeMismatch` when rows within a stream have ragged lengths.
    pub fn from_arrays(
        control_points: Vec<usize>,
        arrays: Vec<Option<Vec<Vec<Sample>>>>,
        kind: InterpKind,
    ) -> Result<Self, OlaError> {
        let n_points = control_points.len();
        for rows in arrays.iter().flatten() {
            if rows.len() != n_points {
                return Err(OlaError::ValueLengthMismatch {
                    expected: n_points,
                    got: rows.len(),
                });
            }
            let width = rows.first().map_or(0, Vec::len);
            if rows.iter().any(|r| r.len() != width) {
                return Err(OlaError::ShapeMismatch(
                    "value rows within one stream must share a length".to_string(),
                ));
            }
        }
        let points = control_points.clone();
        let lookup = move |pt: usize| -> Values {
            let idx = points
                .binary_search(&pt)
                .expect("lookup called with a non-control position");
            arrays
                .iter()
                .map(|a| a.as_ref().map(|rows| rows[idx].clone()))
                .collect()
        };
        Self::new(control_points, lookup, kind)
    }

    /// The control positions, sorted and unique.
    pub fn control_points(&self) -> &[usize] {
        &self.control_points
    }

    /// Current absolute cursor position (next output position to produce).
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of segments produced by the most recent `advance` call.
    pub fn segments_in_last_advance(&self) -> usize {
        self.n_last
    }

    /// Produces the weighted segments for the next `n_pts` output positions.
    ///
    /// The returned iterator is finite and non-restartable; consuming it
    /// advances the cursor, and value lookups happen lazily as segments are
    /// pulled. Dropping it early leaves the cursor wherever consumption
    /// stopped.
    pub fn advance(&mut self, n_pts: usize) -> Segments<'_> {
        self.n_last = 0;
        debug!(
            "interp: advance {} ({}-{})",
            n_pts,
            self.position,
            self.position + n_pts
        );
        Segments {
            stop: self.position + n_pts,
            n_pts,
            emitted: 0,
            interp: self,
        }
    }

    /// Materializes `advance(n_pts)` into one dense array per value stream.
    ///
    /// Each `Some` stream yields a value-major array of length
    /// `value_len * n_pts`: element `v * n_pts + t` is the blended `v`-th
    /// value at relative position `t`. Returns an empty vector when
    /// `n_pts == 0`.
    pub fn interpolate(&mut self, n_pts: usize) -> Values {
        let segments: Vec<Segment> = self.advance(n_pts).collect();
        let mut outs: Option<Values> = None;
        for seg in &segments {
            let outs = outs.get_or_insert_with(|| {
                seg.left
                    .iter()
                    .map(|v| v.as_ref().map(|lv| vec![0.0; lv.len() * n_pts]))
                    .collect()
            });
            for (k, out) in outs.iter_mut().enumerate() {
                let (Some(out), Some(lv)) = (out.as_mut(), seg.left[k].as_ref()) else {
                    continue;
                };
                let rv = seg.right.as_ref().and_then(|r| r[k].as_ref());
                let width = lv.len();
                match (&seg.weights, rv) {
                    (Some(w), Some(rv)) => {
                        for v in 0..width {
                            for (j, t) in seg.range.clone().enumerate() {
                                out[v * n_pts + t] = lv[v] * w[j] + rv[v] * (1.0 - w[j]);
                            }
                        }
                    }
                    _ => {
                        for v in 0..width {
                            for t in seg.range.clone() {
                                out[v * n_pts + t] = lv[v];
                            }
                        }
                    }
                }
            }
        }
        outs.unwrap_or_default()
    }
}

/// Finite, non-restartable segment sequence for one `advance` call.
pub struct Segments<'a> {
    interp: &'a mut Interp2,
    stop: usize,
    n_pts: usize,
    emitted: usize,
}

impl Segments<'_> {
    fn emit(&mut self, n_use: usize, left: Rc<Values>, right: Option<Rc<Values>>, weights: Option<Vec<Sample>>) -> Segment {
        let range = self.emitted..self.emitted + n_use;
        self.interp.position += n_use;
        self.emitted += n_use;
        self.interp.n_last += 1;
        Segment {
            range,
            left,
            right,
            weights,
        }
    }
}

impl Iterator for Segments<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.emitted == self.n_pts {
            return None;
        }
        if self.interp.left.is_none() {
            // First use of this interpolator: evaluate the first point.
            let first = self.interp.control_points[0];
            debug!("interp: eval @ 0 ({})", first);
            let v = Rc::new((self.interp.values)(first));
            if self.interp.control_points.len() == 1 {
                self.interp.right = Some(Rc::clone(&v));
            }
            self.interp.left = Some(v);
        }
        loop {
            let pos = self.interp.position;
            let left_point = self.interp.control_points[self.interp.left_idx];
            let n_points = self.interp.control_points.len();

            // Hold before the first control point.
            if pos < left_point {
                let n_use = (left_point - pos).min(self.n_pts - self.emitted);
                debug!("interp: left hold {}", n_use);
                let left = Rc::clone(self.interp.left.as_ref().expect("left initialized"));
                return Some(self.emit(n_use, left, None, None));
            }

            if self.interp.left_idx + 1 < n_points {
                let right_point = self.interp.control_points[self.interp.left_idx + 1];
                if pos >= right_point {
                    // The cursor has crossed into the next bracket: the old
                    // right snapshot becomes the new left.
                    let right = self
                        .interp
                        .right
                        .clone()
                        .expect("bracket exhausted before evaluation");
                    self.interp.left = Some(right);
                    self.interp.left_idx += 1;
                    self.interp.curve = None;
                    self.interp.right_stale = true;
                    continue;
                }
                if self.interp.right_stale || self.interp.right.is_none() {
                    debug!(
                        "interp: eval @ {} ({})",
                        self.interp.left_idx + 1,
                        right_point
                    );
                    self.interp.right = Some(Rc::new((self.interp.values)(right_point)));
                    self.interp.right_stale = false;
                }
                if self.interp.curve.is_none() {
                    let span = right_point - left_point;
                    self.interp.curve = self.interp.kind.curve(span).map(Rc::new);
                }
                let n_use = right_point.min(self.stop) - pos;
                let weights = self.interp.curve.as_ref().map(|c| {
                    let start = pos - left_point;
                    c[start..start + n_use].to_vec()
                });
                debug!(
                    "interp: blend {} ({}-{})",
                    n_use, left_point, right_point
                );
                let left = Rc::clone(self.interp.left.as_ref().expect("left initialized"));
                let right = Some(Rc::clone(self.interp.right.as_ref().expect("right evaluated")));
                return Some(self.emit(n_use, left, right, weights));
            }

            // Hold after the last control point.
            let n_use = self.stop - pos;
            debug!("interp: right hold {}", n_use);
            let last = Rc::clone(self.interp.right.as_ref().expect("right initialized"));
            return Some(self.emit(n_use, last, None, None));
        }
    }
}
