#![forbid(unsafe_code)]
//! Bounded-memory constant overlap-add (COLA) stream processing.
//!
//! This crate slices an incrementally fed multi-channel signal into
//! overlapping windows, applies a caller-supplied processing step to each
//! window, and reassembles the results by overlap-add with a window that is
//! checked and normalized so the summed gain is exactly constant. Input can
//! arrive in chunks of any size, down to a single sample at a time, and the
//! engine buffers at most one window plus one hop regardless of how long
//! the stream is.
//!
//! A companion two-point interpolator ([`Interp2`]) ramps processing
//! parameters smoothly between sparse control points, for callbacks whose
//! settings change over the course of the stream.
//!
//! # Quick start
//!
//! ```
//! use cola_stream::{process_chunked, ColaParams, SignalBlock, WindowKind};
//!
//! let signal = SignalBlock::from_mono((0..100).map(|i| (i as f64 * 0.1).sin()).collect());
//! let params = ColaParams::new(100, 16, 8).with_window(WindowKind::Hann);
//!
//! // Identity processing reconstructs the input exactly.
//! let out = process_chunked(&[signal.clone()], &params, |wins, _start, _stop| {
//!     Ok(wins.to_vec())
//! })?;
//! for (y, x) in out[0].channel(0).iter().zip(signal.channel(0)) {
//!     assert!((y - x).abs() < 1e-9);
//! }
//! # Ok::<(), cola_stream::OlaError>(())
//! ```
//!
//! For true streaming, drive a [`ColaProcessor`] directly and point it at
//! your own [`OutputSink`].

pub mod core;
pub mod error;
pub mod interp;
pub mod stream;

pub use crate::core::{check_cola, generate_window, RingBuffer, Sample, SignalBlock, WindowKind, KNOWN_WINDOWS};
pub use crate::error::OlaError;
pub use crate::interp::{Interp2, InterpKind, Segment, KNOWN_INTERP};
pub use crate::stream::{ArrayStore, ColaParams, ColaProcessor, CollectSink, OutputSink};

/// Runs a full in-memory signal through a [`ColaProcessor`] and collects
/// the processed output.
///
/// `inputs` holds one [`SignalBlock`] per stream, each carrying exactly
/// `params.n_total` samples. This is a convenience for offline use; for
/// incremental input, drive [`ColaProcessor::feed`] directly.
///
/// # Errors
/// Propagates configuration and contract errors from the engine, plus a
/// shape error when an input block does not carry `n_total` samples.
pub fn process_chunked<F>(
    inputs: &[SignalBlock],
    params: &ColaParams,
    process: F,
) -> Result<Vec<SignalBlock>, OlaError>
where
    F: FnMut(&[SignalBlock], usize, usize) -> Result<Vec<SignalBlock>, OlaError>,
{
    for (si, block) in inputs.iter().enumerate() {
        if block.n_samples() != params.n_total {
            return Err(OlaError::ShapeMismatch(format!(
                "stream {} carries {} samples, n_total is {}",
                si,
                block.n_samples(),
                params.n_total
            )));
        }
    }
    let mut engine = ColaProcessor::new(process, CollectSink::new(), params)?;
    engine.feed(inputs)?;
    Ok(engine.into_sink().into_blocks())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn process_chunked_applies_gain() {
        let signal = SignalBlock::from_mono(vec![2.0; 50]);
        let params = ColaParams::new(50, 10, 5);
        let out = process_chunked(&[signal], &params, |wins, _s, _e| {
            let mut outs = wins.to_vec();
            for o in &mut outs {
                for v in o.channel_mut(0) {
                    *v *= 3.0;
                }
            }
            Ok(outs)
        })
        .unwrap();
        for &v in out[0].channel(0) {
            assert_abs_diff_eq!(v, 6.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn process_chunked_rejects_short_input() {
        let signal = SignalBlock::from_mono(vec![0.0; 40]);
        let params = ColaParams::new(50, 10, 5);
        let err = process_chunked(&[signal], &params, |wins, _s, _e| Ok(wins.to_vec()))
            .unwrap_err();
        assert!(matches!(err, OlaError::ShapeMismatch(_)));
    }
}
