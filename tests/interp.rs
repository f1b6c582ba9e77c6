//! Interpolator behavior over realistic schedules, including driving a
//! time-varying gain from an output sink.

use approx::assert_abs_diff_eq;
use cola_stream::{
    ColaParams, ColaProcessor, Interp2, InterpKind, OlaError, OutputSink, SignalBlock,
};

#[test]
fn raised_cosine_matches_closed_form_across_brackets() {
    // Two brackets with different spans: 1 -> 0 over 6 points, 0 -> 1 over
    // 17, then a hold.
    let mut interp = Interp2::from_arrays(
        vec![0, 6, 23],
        vec![Some(vec![vec![1.0], vec![0.0], vec![1.0]])],
        InterpKind::RaisedCosine,
    )
    .unwrap();
    let out = interp.interpolate(30);
    let vals = out[0].as_ref().unwrap();
    for t in 0..6 {
        let w = (std::f64::consts::FRAC_PI_2 * t as f64 / 6.0).cos().powi(2);
        assert_abs_diff_eq!(vals[t], w, epsilon = 1e-12);
    }
    for t in 6..23 {
        let w = (std::f64::consts::FRAC_PI_2 * (t - 6) as f64 / 17.0)
            .cos()
            .powi(2);
        assert_abs_diff_eq!(vals[t], 1.0 - w, epsilon = 1e-12);
    }
    for t in 23..30 {
        assert_abs_diff_eq!(vals[t], 1.0, epsilon = 1e-12);
    }
}

#[test]
fn empty_request_leaves_the_cursor_alone() {
    let mut interp = Interp2::from_arrays(
        vec![0, 10],
        vec![Some(vec![vec![1.0], vec![2.0]])],
        InterpKind::Linear,
    )
    .unwrap();
    assert!(interp.interpolate(0).is_empty());
    assert_eq!(interp.position(), 0);
    let out = interp.interpolate(1);
    assert_abs_diff_eq!(out[0].as_ref().unwrap()[0], 1.0, epsilon = 1e-12);
}

#[test]
fn streams_of_different_widths_share_one_cursor() {
    let mut interp = Interp2::from_arrays(
        vec![0, 4],
        vec![
            Some(vec![vec![0.0, 10.0], vec![4.0, 10.0]]),
            Some(vec![vec![1.0, 1.0, 1.0], vec![1.0, 5.0, 9.0]]),
        ],
        InterpKind::Linear,
    )
    .unwrap();
    let out = interp.interpolate(4);
    // Value-major layout: stream 0 is 2 values x 4 positions.
    let s0 = out[0].as_ref().unwrap();
    assert_eq!(s0.len(), 8);
    for t in 0..4 {
        assert_abs_diff_eq!(s0[t], t as f64, epsilon = 1e-12);
        assert_abs_diff_eq!(s0[4 + t], 10.0, epsilon = 1e-12);
    }
    let s1 = out[1].as_ref().unwrap();
    assert_eq!(s1.len(), 12);
    for t in 0..4 {
        assert_abs_diff_eq!(s1[t], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s1[4 + t], 1.0 + t as f64, epsilon = 1e-12);
        assert_abs_diff_eq!(s1[8 + t], 1.0 + 2.0 * t as f64, epsilon = 1e-12);
    }
}

/// Sink that scales every flushed sample by a gain schedule. The engine
/// flushes non-overlapping chunks in causal order, which matches the
/// interpolator's forward-only cursor one-to-one.
struct GainSink {
    interp: Interp2,
    out: Vec<f64>,
}

impl OutputSink for GainSink {
    fn write(&mut self, chunks: &[SignalBlock]) -> Result<(), OlaError> {
        let n = chunks[0].n_samples();
        let gains = self.interp.interpolate(n);
        let gains = gains[0].as_ref().expect("gain stream is dense");
        for (t, &v) in chunks[0].channel(0).iter().enumerate() {
            self.out.push(v * gains[t]);
        }
        Ok(())
    }
}

#[test]
fn gain_schedule_applied_at_flush_time() {
    // Unit input through an identity engine, scaled on the way out by a
    // linear 1 -> 3 ramp over the first 20 samples.
    let n_total = 40;
    let params = ColaParams::new(n_total, 10, 5);
    let interp = Interp2::from_arrays(
        vec![0, 20],
        vec![Some(vec![vec![1.0], vec![3.0]])],
        InterpKind::Linear,
    )
    .unwrap();
    let sink = GainSink {
        interp,
        out: Vec::new(),
    };
    let identity = |wins: &[SignalBlock], _s: usize, _e: usize| Ok(wins.to_vec());
    let mut engine = ColaProcessor::new(identity, sink, &params).unwrap();
    engine
        .feed(&[SignalBlock::from_mono(vec![1.0; n_total])])
        .unwrap();
    assert!(engine.is_finished());
    let out = &engine.sink().out;
    assert_eq!(out.len(), n_total);
    for t in 0..n_total {
        let expected = if t < 20 {
            1.0 + 2.0 * t as f64 / 20.0
        } else {
            3.0
        };
        assert_abs_diff_eq!(out[t], expected, epsilon = 1e-9);
    }
}
