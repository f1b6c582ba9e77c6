use crate::error::OlaError;

/// A single sample (64-bit float).
pub type Sample = f64;

/// Owned channel-major block of multi-channel samples.
///
/// Channel `c` occupies the contiguous range `[c * n_samples, (c + 1) *
/// n_samples)` of the backing vector, so per-channel rows are plain slices.
/// The trailing (sample) dimension is the one all streaming operations
/// advance along.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBlock {
    data: Vec<Sample>,
    n_channels: usize,
    n_samples: usize,
}

impl SignalBlock {
    /// Creates a zero-filled block.
    pub fn zeros(n_channels: usize, n_samples: usize) -> Self {
        Self {
            data: vec![0.0; n_channels * n_samples],
            n_channels,
            n_samples,
        }
    }

    /// Creates a block from per-channel rows.
    ///
    /// # Errors
    /// Returns `OlaError::ShapeMismatch` if the rows have different lengths.
    pub fn from_channels(channels: Vec<Vec<Sample>>) -> Result<Self, OlaError> {
        let n_channels = channels.len();
        let n_samples = channels.first().map_or(0, |c| c.len());
        for (ci, ch) in channels.iter().enumerate() {
            if ch.len() != n_samples {
                return Err(OlaError::ShapeMismatch(format!(
                    "channel {} has {} samples, channel 0 has {}",
                    ci,
                    ch.len(),
                    n_samples
                )));
            }
        }
        let mut data = Vec::with_capacity(n_channels * n_samples);
        for ch in channels {
            data.extend_from_slice(&ch);
        }
        Ok(Self {
            data,
            n_channels,
            n_samples,
        })
    }

    /// Creates a single-channel block.
    pub fn from_mono(samples: Vec<Sample>) -> Self {
        let n_samples = samples.len();
        Self {
            data: samples,
            n_channels: 1,
            n_samples,
        }
    }

    /// Number of channels (rows).
    #[inline]
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// Number of samples per channel (trailing dimension).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Returns true when the block holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// One channel's samples.
    #[inline]
    pub fn channel(&self, c: usize) -> &[Sample] {
        &self.data[c * self.n_samples..(c + 1) * self.n_samples]
    }

    /// One channel's samples, mutably.
    #[inline]
    pub fn channel_mut(&mut self, c: usize) -> &mut [Sample] {
        &mut self.data[c * self.n_samples..(c + 1) * self.n_samples]
    }

    /// Iterates over channel rows.
    pub fn channels(&self) -> impl Iterator<Item = &[Sample]> {
        (0..self.n_channels).map(move |c| self.channel(c))
    }

    /// Copies a sample range out of every channel into a new block.
    ///
    /// The range is clamped to the block; an empty or inverted range yields a
    /// zero-sample block.
    pub fn slice_samples(&self, range: std::ops::Range<usize>) -> SignalBlock {
        let start = range.start.min(self.n_samples);
        let stop = range.end.min(self.n_samples).max(start);
        let len = stop - start;
        let mut out = SignalBlock::zeros(self.n_channels, len);
        for c in 0..self.n_channels {
            out.channel_mut(c).copy_from_slice(&self.channel(c)[start..stop]);
        }
        out
    }

    /// Multiplies every channel elementwise by `weights`.
    ///
    /// `weights` must have the block's trailing length.
    pub fn scale_by(&mut self, weights: &[Sample]) {
        debug_assert_eq!(weights.len(), self.n_samples);
        for c in 0..self.n_channels {
            for (s, &w) in self.channel_mut(c).iter_mut().zip(weights.iter()) {
                *s *= w;
            }
        }
    }

    /// Shifts every channel left by `delta` samples, zeroing the exposed tail.
    pub fn shift_left(&mut self, delta: usize) {
        let delta = delta.min(self.n_samples);
        if delta == 0 {
            return;
        }
        for c in 0..self.n_channels {
            let row = self.channel_mut(c);
            row.copy_within(delta.., 0);
            let keep = row.len() - delta;
            for s in &mut row[keep..] {
                *s = 0.0;
            }
        }
    }
}
