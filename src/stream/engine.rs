//! Constant overlap-add streaming engine.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::ring_buffer::RingBuffer;
use crate::core::types::{Sample, SignalBlock};
use crate::core::window::{check_cola, generate_window, WindowKind};
use crate::error::OlaError;
use crate::stream::sink::OutputSink;

/// Geometry and window configuration for a [`ColaProcessor`] run.
///
/// `n_total` is the declared stream length in samples, `n_samples` the
/// window length, and `n_overlap` the overlap between consecutive windows
/// (so the hop is `n_samples - n_overlap`). The sample rate is used only
/// for the human-readable plan log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColaParams {
    pub n_total: usize,
    pub n_samples: usize,
    pub n_overlap: usize,
    pub sample_rate: f64,
    pub window: WindowKind,
    pub tol: f64,
}

impl ColaParams {
    /// Creates parameters with a hann window, `tol = 1e-10`, and a sample
    /// rate of 1 Hz.
    pub fn new(n_total: usize, n_samples: usize, n_overlap: usize) -> Self {
        Self {
            n_total,
            n_samples,
            n_overlap,
            sample_rate: 1.0,
            window: WindowKind::Hann,
            tol: 1e-10,
        }
    }

    /// Sets the sample rate in Hz.
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Sets the analysis/synthesis window kind.
    pub fn with_window(mut self, window: WindowKind) -> Self {
        self.window = window;
        self
    }

    /// Sets the COLA check tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Hop between consecutive window starts.
    pub fn step(&self) -> usize {
        self.n_samples.saturating_sub(self.n_overlap)
    }

    /// Validates the window geometry.
    pub fn validate(&self) -> Result<(), OlaError> {
        if self.n_samples == 0 {
            return Err(OlaError::InvalidWindowLength(self.n_samples));
        }
        if self.n_overlap >= self.n_samples {
            return Err(OlaError::InvalidStep {
                step: self.step(),
                n_samples: self.n_samples,
            });
        }
        if self.n_total < self.n_samples {
            return Err(OlaError::WindowLongerThanTotal {
                n_samples: self.n_samples,
                n_total: self.n_total,
            });
        }
        Ok(())
    }
}

/// Streaming constant overlap-add processor.
///
/// Slices an incrementally fed multi-channel time series into overlapping
/// windows, runs a caller-supplied processing step on each window, weights
/// the result by a COLA-normalized window, and overlap-adds the weighted
/// contributions into an accumulator that is flushed to an [`OutputSink`]
/// in causal order. With `n_total = 27`, `n_samples = 10`, `n_overlap = 5`
/// and a triangular window the analysis weighting looks like:
///
/// ```text
///     1 _____               _______
///       |    \   /\   /\   /
///       |     \ /  \ /  \ /
///       |      x    x    x
///       |     / \  / \  / \
///       |    /   \/   \/   \
///     0 +----|----|----|----|----|-
///       0    5   10   15   20   25
/// ```
///
/// Four windows: the first three are the requested length (10 samples) and
/// the last absorbs the remainder (12 samples). The first and last window
/// are edge-corrected so the summed gain is constant from the very first
/// sample to the very last.
///
/// Memory is bounded by the window geometry, never by `n_total`: the input
/// side buffers at most one window plus one hop per channel, and the output
/// side holds one window's worth of partially-summed contributions.
pub struct ColaProcessor<F, S> {
    process: F,
    sink: S,
    n_samples: usize,
    step: usize,
    n_total: usize,
    /// COLA-normalized analysis window.
    window: Vec<Sample>,
    starts: Vec<usize>,
    stops: Vec<usize>,
    idx: usize,
    max_win: usize,
    /// Per stream, per channel bounded input rings. Geometry is fixed by
    /// the first `feed` call.
    in_bufs: Option<Vec<Vec<RingBuffer>>>,
    /// Per output stream overlap accumulators, sized to the longest
    /// planned window. Allocated when the first window is processed.
    out_bufs: Option<Vec<SignalBlock>>,
}

impl<F, S> std::fmt::Debug for ColaProcessor<F, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColaProcessor")
            .field("n_samples", &self.n_samples)
            .field("step", &self.step)
            .field("n_total", &self.n_total)
            .field("window", &self.window)
            .field("starts", &self.starts)
            .field("stops", &self.stops)
            .field("idx", &self.idx)
            .field("max_win", &self.max_win)
            .field("in_bufs", &self.in_bufs)
            .field("out_bufs", &self.out_bufs)
            .finish_non_exhaustive()
    }
}

impl<F, S> ColaProcessor<F, S>
where
    F: FnMut(&[SignalBlock], usize, usize) -> Result<Vec<SignalBlock>, OlaError>,
    S: OutputSink,
{
    /// Builds the window plan, validates the window against the COLA
    /// property, and prepares an engine ready for [`feed`](Self::feed).
    ///
    /// # Errors
    /// Configuration errors for bad geometry or a window/hop pair that
    /// fails the COLA check.
    pub fn new(process: F, sink: S, params: &ColaParams) -> Result<Self, OlaError> {
        params.validate()?;
        let n_samples = params.n_samples;
        let step = params.step();

        // DFT-even window for even lengths, symmetric for odd.
        let periodic = (n_samples - 1) % 2 == 1;
        let mut window = generate_window(params.window, n_samples, periodic);
        let constant = check_cola(&window, step, params.window.name(), params.tol)?;
        for w in &mut window {
            *w /= constant;
        }

        let mut starts = Vec::new();
        let mut start = 0;
        while start + n_samples <= params.n_total {
            starts.push(start);
            start += step;
        }
        let mut stops: Vec<usize> = starts.iter().map(|s| s + n_samples).collect();
        // The geometry checks guarantee at least one window.
        let remainder = params.n_total - *stops.last().expect("plan is non-empty");
        *stops.last_mut().expect("plan is non-empty") = params.n_total;
        let max_win = params.n_total - *starts.last().expect("plan is non-empty");

        let sfreq = params.sample_rate;
        info!(
            "processing {} data chunk(s) of (at least) {:.1} s with {:.1} s overlap and {} windowing",
            starts.len(),
            n_samples as f64 / sfreq,
            params.n_overlap as f64 / sfreq,
            params.window.name()
        );
        if remainder > 0 {
            info!(
                "the final {} s will be lumped into the final window",
                remainder as f64 / sfreq
            );
        }

        Ok(Self {
            process,
            sink,
            n_samples,
            step,
            n_total: params.n_total,
            window,
            starts,
            stops,
            idx: 0,
            max_win,
            in_bufs: None,
            out_bufs: None,
        })
    }

    /// Planned window start offsets.
    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    /// Planned window stop offsets (the last one equals `n_total`).
    pub fn stops(&self) -> &[usize] {
        &self.stops
    }

    /// Number of planned windows.
    pub fn n_windows(&self) -> usize {
        self.starts.len()
    }

    /// Number of windows processed so far.
    pub fn windows_processed(&self) -> usize {
        self.idx
    }

    /// True once every planned window has been processed and flushed.
    pub fn is_finished(&self) -> bool {
        self.idx == self.starts.len()
    }

    /// Borrows the output sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consumes the engine and returns the output sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Feeds one chunk per input stream, processing every window the new
    /// data completes.
    ///
    /// All streams must advance in lockstep: every call supplies the same
    /// number of chunks, with per-stream channel counts fixed by the first
    /// call and one shared trailing length per call. The processing
    /// callback runs inline, zero or more times, before this returns.
    ///
    /// # Errors
    /// Contract violations for geometry changes mid-run, for feeding past
    /// the declared total (checked before any buffer is touched), and for
    /// callback output of the wrong shape. After a contract violation the
    /// engine must be discarded.
    pub fn feed(&mut self, chunks: &[SignalBlock]) -> Result<(), OlaError> {
        if self.in_bufs.is_none() {
            let cap = self.max_win + self.step;
            self.in_bufs = Some(
                chunks
                    .iter()
                    .map(|c| {
                        (0..c.n_channels())
                            .map(|_| RingBuffer::with_capacity(cap))
                            .collect()
                    })
                    .collect(),
            );
        }
        let n_streams = self.in_bufs.as_ref().map_or(0, |b| b.len());
        if chunks.len() != n_streams {
            return Err(OlaError::StreamCountMismatch {
                expected: n_streams,
                got: chunks.len(),
            });
        }
        let len = chunks.first().map_or(0, |c| c.n_samples());
        for (si, chunk) in chunks.iter().enumerate() {
            if chunk.n_samples() != len {
                return Err(OlaError::ShapeMismatch(format!(
                    "stream {} fed {} samples, stream 0 fed {}",
                    si,
                    chunk.n_samples(),
                    len
                )));
            }
            let n_channels = self.in_bufs.as_ref().expect("initialized above")[si].len();
            if chunk.n_channels() != n_channels {
                return Err(OlaError::ShapeMismatch(format!(
                    "stream {} fed {} channels, expected {}",
                    si,
                    chunk.n_channels(),
                    n_channels
                )));
            }
        }

        // Reject overruns before touching any buffer.
        let consumed = self.starts.get(self.idx).copied().unwrap_or(self.n_total);
        let buffered = self
            .in_bufs
            .as_ref()
            .and_then(|b| b.first())
            .and_then(|chs| chs.first())
            .map_or(0, |r| r.len());
        let in_offset = consumed + buffered;
        if in_offset + len > self.n_total {
            return Err(OlaError::Overrun {
                offset: in_offset + len,
                n_total: self.n_total,
            });
        }
        debug!("appending {}:{}", in_offset, in_offset + len);

        // Large chunks are absorbed by alternating bounded pushes with
        // window processing, so the rings never need to grow.
        let mut offset = 0;
        while offset < len {
            self.process_ready()?;
            let in_bufs = self.in_bufs.as_mut().expect("initialized above");
            let room = in_bufs
                .first()
                .and_then(|chs| chs.first())
                .map_or(0, |r| r.available());
            let n_push = (len - offset).min(room);
            if n_push == 0 {
                // Sized to max window + hop, a full ring always completes a
                // window, so process_ready must have made room.
                return Err(OlaError::ShapeMismatch(
                    "internal indexing error: input ring stalled".to_string(),
                ));
            }
            for (chs, chunk) in in_bufs.iter_mut().zip(chunks.iter()) {
                for (ci, ring) in chs.iter_mut().enumerate() {
                    let pushed = ring.push_slice(&chunk.channel(ci)[offset..offset + n_push]);
                    debug_assert_eq!(pushed, n_push);
                }
            }
            offset += n_push;
        }
        self.process_ready()
    }

    /// Processes every window the buffered input can complete.
    fn process_ready(&mut self) -> Result<(), OlaError> {
        loop {
            if self.idx >= self.starts.len() {
                return Ok(());
            }
            let start = self.starts[self.idx];
            let stop = self.stops[self.idx];
            let this_len = stop - start;

            let wins = {
                let in_bufs = match self.in_bufs.as_ref() {
                    Some(b) => b,
                    None => return Ok(()),
                };
                let buffered = in_bufs
                    .first()
                    .and_then(|chs| chs.first())
                    .map_or(0, |r| r.len());
                if buffered < this_len {
                    return Ok(());
                }
                let mut wins = Vec::with_capacity(in_bufs.len());
                for chs in in_bufs {
                    let mut block = SignalBlock::zeros(chs.len(), this_len);
                    for (ci, ring) in chs.iter().enumerate() {
                        let copied = ring.peek_slice(block.channel_mut(ci));
                        debug_assert_eq!(copied, this_len);
                    }
                    wins.push(block);
                }
                wins
            };

            let this_window = self.edge_corrected_window(this_len);
            debug!("processing window {} ({}:{})", self.idx, start, stop);
            let outs = (self.process)(&wins, start, stop)?;

            for out in &outs {
                if out.n_samples() != this_len {
                    return Err(OlaError::BadProcessOutput {
                        expected: this_len,
                        got: out.n_samples(),
                    });
                }
            }
            if self.out_bufs.is_none() {
                self.out_bufs = Some(
                    outs.iter()
                        .map(|o| SignalBlock::zeros(o.n_channels(), self.max_win))
                        .collect(),
                );
            }
            let out_bufs = self.out_bufs.as_mut().expect("allocated above");
            if outs.len() != out_bufs.len() {
                return Err(OlaError::StreamCountMismatch {
                    expected: out_bufs.len(),
                    got: outs.len(),
                });
            }

            for (ob, mut out) in out_bufs.iter_mut().zip(outs.into_iter()) {
                if out.n_channels() != ob.n_channels() {
                    return Err(OlaError::ShapeMismatch(format!(
                        "callback output has {} channels, previous windows had {}",
                        out.n_channels(),
                        ob.n_channels()
                    )));
                }
                out.scale_by(&this_window);
                for c in 0..out.n_channels() {
                    for (acc, v) in ob.channel_mut(c)[..this_len]
                        .iter_mut()
                        .zip(out.channel(c).iter())
                    {
                        *acc += v;
                    }
                }
            }

            self.idx += 1;
            let delta = match self.starts.get(self.idx) {
                Some(next_start) => next_start - start,
                None => this_len,
            };
            debug!(
                "shifting buffers by {} samples (storing {}:{})",
                delta,
                start,
                start + delta
            );
            let flush: Vec<SignalBlock> = out_bufs
                .iter()
                .map(|ob| ob.slice_samples(0..delta))
                .collect();
            self.sink.write(&flush)?;
            for ob in out_bufs.iter_mut() {
                ob.shift_left(delta);
            }
            for chs in self.in_bufs.as_mut().expect("checked above") {
                for ring in chs.iter_mut() {
                    ring.discard(delta);
                }
            }
        }
    }

    /// Builds the analysis window for the current plan index, folding the
    /// overlap of the missing neighbors into the first and last windows so
    /// the summed gain is constant across the stream edges.
    fn edge_corrected_window(&self, this_len: usize) -> Vec<Sample> {
        let mut this_window = vec![0.0; this_len];
        this_window[..self.n_samples].copy_from_slice(&self.window);
        if self.idx == 0 {
            // Fold the trailing overlap of the missing left neighbors into
            // the leading edge.
            let mut offset = self.n_samples.saturating_sub(self.step);
            while offset > 0 {
                for i in 0..offset {
                    this_window[i] += self.window[self.n_samples - offset + i];
                }
                offset = offset.saturating_sub(self.step);
            }
        }
        if self.idx == self.starts.len() - 1 {
            // The final window is zero-padded to absorb the remainder; the
            // copies its missing right neighbors would have contributed are
            // folded forward.
            let mut offset = self.step;
            while offset < this_len {
                let n_use = this_len - offset;
                for i in 0..n_use {
                    this_window[offset + i] += self.window[i];
                }
                offset += self.step;
            }
        }
        this_window
    }
}
