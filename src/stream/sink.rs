//! Destinations for finished output chunks.

use crate::core::types::SignalBlock;
use crate::error::OlaError;

/// Receives finished, non-overlapping output chunks in causal order.
///
/// The engine delivers one chunk per output stream per call; across a full
/// run the chunks exactly tile the declared total length with no gaps or
/// overlaps, in strictly increasing offset order. Implementations may write
/// into pre-allocated arrays ([`ArrayStore`]), grow buffers on the fly
/// ([`CollectSink`]), or stream to an external writer.
pub trait OutputSink {
    /// Stores one batch of chunks, one per output stream.
    ///
    /// All chunks in a batch share the same trailing length.
    fn write(&mut self, chunks: &[SignalBlock]) -> Result<(), OlaError>;
}

/// Writes chunks into caller-owned destination blocks at a monotone cursor.
///
/// An optional row selection scatters each chunk into a subset of the
/// destination's channels, leaving the other rows untouched.
#[derive(Debug)]
pub struct ArrayStore {
    outs: Vec<SignalBlock>,
    picks: Option<Vec<usize>>,
    idx: usize,
}

impl ArrayStore {
    /// Creates a store over destination blocks.
    pub fn new(outs: Vec<SignalBlock>) -> Self {
        Self {
            outs,
            picks: None,
            idx: 0,
        }
    }

    /// Creates a store that scatters chunk row `i` into destination row
    /// `picks[i]` of every destination block.
    pub fn with_picks(outs: Vec<SignalBlock>, picks: Vec<usize>) -> Self {
        Self {
            outs,
            picks: Some(picks),
            idx: 0,
        }
    }

    /// Current write cursor (total samples stored so far).
    pub fn position(&self) -> usize {
        self.idx
    }

    /// Consumes the store and returns the destination blocks.
    pub fn into_inner(self) -> Vec<SignalBlock> {
        self.outs
    }
}

impl OutputSink for ArrayStore {
    fn write(&mut self, chunks: &[SignalBlock]) -> Result<(), OlaError> {
        if chunks.len() != self.outs.len() {
            return Err(OlaError::BadStoreChunks(format!(
                "got {} chunk(s), have {} destination(s)",
                chunks.len(),
                self.outs.len()
            )));
        }
        let len = chunks.first().map_or(0, |c| c.n_samples());
        if chunks.iter().any(|c| c.n_samples() != len) {
            return Err(OlaError::BadStoreChunks(
                "chunks in one write must share a trailing length".to_string(),
            ));
        }
        let stop = self.idx + len;
        for (out, chunk) in self.outs.iter_mut().zip(chunks.iter()) {
            if stop > out.n_samples() {
                return Err(OlaError::BadStoreChunks(format!(
                    "write {}..{} exceeds destination length {}",
                    self.idx,
                    stop,
                    out.n_samples()
                )));
            }
            for (ci, row) in chunk.channels().enumerate() {
                let dest_row = match &self.picks {
                    Some(picks) => *picks.get(ci).ok_or_else(|| {
                        OlaError::BadStoreChunks(format!(
                            "chunk has {} channels but only {} picks",
                            chunk.n_channels(),
                            picks.len()
                        ))
                    })?,
                    None => ci,
                };
                if dest_row >= out.n_channels() {
                    return Err(OlaError::BadStoreChunks(format!(
                        "row {} out of range for destination with {} channels",
                        dest_row,
                        out.n_channels()
                    )));
                }
                out.channel_mut(dest_row)[self.idx..stop].copy_from_slice(row);
            }
        }
        self.idx = stop;
        Ok(())
    }
}

/// Accumulates chunks into growing blocks, discovering shapes from the
/// first write. Convenient when the output length per stream is not known
/// up front, or for one-shot in-memory runs.
#[derive(Debug, Default)]
pub struct CollectSink {
    outs: Option<Vec<Vec<Vec<f64>>>>,
}

impl CollectSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the sink and returns one block per output stream.
    ///
    /// Empty when nothing was ever written.
    pub fn into_blocks(self) -> Vec<SignalBlock> {
        self.outs
            .unwrap_or_default()
            .into_iter()
            .map(|chans| SignalBlock::from_channels(chans).expect("rows grown in lockstep"))
            .collect()
    }
}

impl OutputSink for CollectSink {
    fn write(&mut self, chunks: &[SignalBlock]) -> Result<(), OlaError> {
        let outs = self.outs.get_or_insert_with(|| {
            chunks
                .iter()
                .map(|c| vec![Vec::new(); c.n_channels()])
                .collect()
        });
        if chunks.len() != outs.len() {
            return Err(OlaError::BadStoreChunks(format!(
                "got {} chunk(s), previous writes had {}",
                chunks.len(),
                outs.len()
            )));
        }
        let len = chunks.first().map_or(0, |c| c.n_samples());
        for (acc, chunk) in outs.iter_mut().zip(chunks.iter()) {
            if chunk.n_samples() != len {
                return Err(OlaError::BadStoreChunks(
                    "chunks in one write must share a trailing length".to_string(),
                ));
            }
            if chunk.n_channels() != acc.len() {
                return Err(OlaError::BadStoreChunks(format!(
                    "chunk has {} channels, previous writes had {}",
                    chunk.n_channels(),
                    acc.len()
                )));
            }
            for (row, data) in acc.iter_mut().zip(chunk.channels()) {
                row.extend_from_slice(data);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_store_tiles_contiguously() {
        let mut store = ArrayStore::new(vec![SignalBlock::zeros(1, 6)]);
        store
            .write(&[SignalBlock::from_mono(vec![1.0, 2.0])])
            .unwrap();
        store
            .write(&[SignalBlock::from_mono(vec![3.0, 4.0, 5.0, 6.0])])
            .unwrap();
        assert_eq!(store.position(), 6);
        let outs = store.into_inner();
        assert_eq!(outs[0].channel(0), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn array_store_rejects_overflow() {
        let mut store = ArrayStore::new(vec![SignalBlock::zeros(1, 3)]);
        store
            .write(&[SignalBlock::from_mono(vec![1.0, 2.0])])
            .unwrap();
        let err = store
            .write(&[SignalBlock::from_mono(vec![3.0, 4.0])])
            .unwrap_err();
        assert!(matches!(err, OlaError::BadStoreChunks(_)));
    }

    #[test]
    fn array_store_rejects_bad_batches() {
        let mut store = ArrayStore::new(vec![SignalBlock::zeros(1, 4)]);
        // Wrong chunk count.
        assert!(store
            .write(&[
                SignalBlock::from_mono(vec![1.0]),
                SignalBlock::from_mono(vec![1.0])
            ])
            .is_err());
        // Ragged trailing lengths.
        let mut store2 = ArrayStore::new(vec![SignalBlock::zeros(1, 4), SignalBlock::zeros(1, 4)]);
        assert!(store2
            .write(&[
                SignalBlock::from_mono(vec![1.0]),
                SignalBlock::from_mono(vec![1.0, 2.0])
            ])
            .is_err());
    }

    #[test]
    fn array_store_scatters_through_picks() {
        let dest = SignalBlock::zeros(3, 4);
        let mut store = ArrayStore::with_picks(vec![dest], vec![2, 0]);
        let chunk =
            SignalBlock::from_channels(vec![vec![1.0, 1.0], vec![2.0, 2.0]]).unwrap();
        store.write(&[chunk]).unwrap();
        let outs = store.into_inner();
        assert_eq!(outs[0].channel(0)[..2], [2.0, 2.0]);
        assert_eq!(outs[0].channel(1), &[0.0; 4]);
        assert_eq!(outs[0].channel(2)[..2], [1.0, 1.0]);
    }

    #[test]
    fn collect_sink_grows_in_lockstep() {
        let mut sink = CollectSink::new();
        sink.write(&[SignalBlock::from_channels(vec![vec![1.0], vec![2.0]]).unwrap()])
            .unwrap();
        sink.write(&[SignalBlock::from_channels(vec![vec![3.0], vec![4.0]]).unwrap()])
            .unwrap();
        let blocks = sink.into_blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].channel(0), &[1.0, 3.0]);
        assert_eq!(blocks[0].channel(1), &[2.0, 4.0]);
    }

    #[test]
    fn collect_sink_rejects_shape_changes() {
        let mut sink = CollectSink::new();
        sink.write(&[SignalBlock::from_mono(vec![1.0])]).unwrap();
        assert!(sink.write(&[SignalBlock::zeros(2, 1)]).is_err());
        assert!(sink
            .write(&[SignalBlock::from_mono(vec![1.0]), SignalBlock::from_mono(vec![1.0])])
            .is_err());
    }
}
