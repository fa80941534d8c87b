//! Positional framing of the tracker byte stream.
//!
//! TCP delivers bytes, not records: a single read may carry several records
//! back-to-back, or a record split anywhere, including through its start
//! marker. [`FrameScanner`] accumulates raw bytes and drains every complete
//! frame on each append, so extraction is independent of how the stream was
//! chunked.
//!
//! Framing is positional: a record begins at a literal start marker and is
//! always exactly `record_len` bytes long, as agreed out-of-band with the
//! device's configured output format. The scanner does not validate record
//! content beyond position: if the upstream ever emitted the marker inside
//! noise, the frame would be mis-cut. Known fragility, inherited from the
//! device protocol; field extraction downstream drops frames that decode to
//! nothing.

use serde::Deserialize;

/// How to locate a record in the byte stream: a literal start marker and the
/// fixed total record length in bytes. Immutable once constructed.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FrameSpec {
    /// Literal substring marking the start of a record, e.g. `<REC`.
    pub start_marker: String,
    /// Total length of a record in bytes, counted from the marker.
    pub record_len: usize,
}

impl Default for FrameSpec {
    fn default() -> Self {
        Self {
            start_marker: "<REC".to_string(),
            record_len: 134,
        }
    }
}

/// Accumulates stream bytes and extracts complete fixed-length frames.
///
/// Owned by exactly one reader; not itself synchronized.
#[derive(Debug)]
pub struct FrameScanner {
    spec: FrameSpec,
    buf: Vec<u8>,
}

impl FrameScanner {
    /// Create a scanner for the given frame layout.
    pub fn new(spec: FrameSpec) -> Self {
        Self {
            spec,
            buf: Vec::new(),
        }
    }

    /// Append a chunk and drain every complete frame now in the buffer.
    ///
    /// Bytes before a pending marker are retained, so a marker split across
    /// two reads is found after the next append. After this returns, the
    /// buffer is empty, holds no complete frame, or holds a partial frame
    /// awaiting more bytes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let marker = self.spec.start_marker.as_bytes();
        // A record is never shorter than its own marker; config validation
        // rejects such specs, and this keeps the drain below making progress
        // even for a hand-built one.
        let record_len = self.spec.record_len.max(marker.len());
        let mut frames = Vec::new();
        loop {
            let Some(start) = find(&self.buf, marker) else {
                break;
            };
            if self.buf.len() < start + record_len {
                break;
            }
            let record = &self.buf[start..start + record_len];
            frames.push(String::from_utf8_lossy(record).into_owned());
            self.buf.drain(..start + record_len);
        }
        frames
    }

    /// Number of bytes currently buffered.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// First occurrence of `needle` in `haystack`, if any.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(marker: &str, len: usize) -> FrameSpec {
        FrameSpec {
            start_marker: marker.to_string(),
            record_len: len,
        }
    }

    #[test]
    fn extracts_single_frame_with_leading_noise() {
        let mut scanner = FrameScanner::new(spec("<REC", 20));
        assert!(scanner.push(b"noise<REC aaaa").is_empty());
        let frames = scanner.push(b"bbbbbbbbbbbtrailing");
        assert_eq!(frames, vec!["<REC aaaabbbbbbbbbbb".to_string()]);
        assert_eq!(frames[0].len(), 20);
        // Only the bytes after the frame remain buffered.
        assert_eq!(scanner.pending(), "trailing".len());
    }

    #[test]
    fn drains_back_to_back_frames_in_one_push() {
        let mut scanner = FrameScanner::new(spec("<REC", 10));
        let frames = scanner.push(b"<REC 1111/<REC 2222/<REC 33");
        assert_eq!(frames, vec!["<REC 1111/".to_string(), "<REC 2222/".to_string()]);
        // Partial third frame stays buffered.
        assert_eq!(scanner.pending(), 7);
        let frames = scanner.push(b"33/");
        assert_eq!(frames, vec!["<REC 3333/".to_string()]);
        assert_eq!(scanner.pending(), 0);
    }

    #[test]
    fn marker_split_across_reads_is_found() {
        let mut scanner = FrameScanner::new(spec("<REC", 8));
        assert!(scanner.push(b"xx<R").is_empty());
        assert!(scanner.push(b"EC").is_empty());
        let frames = scanner.push(b"abcd");
        assert_eq!(frames, vec!["<RECabcd".to_string()]);
    }

    #[test]
    fn chunking_does_not_affect_output() {
        let stream = b"junk<REC aaaa11/garbage<REC bbbb22/<REC cccc33/tail";
        let frame_spec = spec("<REC", 10);

        let mut whole = FrameScanner::new(frame_spec.clone());
        let expected = whole.push(stream);
        assert_eq!(expected.len(), 3);

        // Byte at a time.
        let mut bytewise = FrameScanner::new(frame_spec.clone());
        let mut got = Vec::new();
        for byte in stream.iter() {
            got.extend(bytewise.push(std::slice::from_ref(byte)));
        }
        assert_eq!(got, expected);
        assert_eq!(bytewise.pending(), whole.pending());

        // Every split point of the stream into two chunks.
        for cut in 0..=stream.len() {
            let mut split = FrameScanner::new(frame_spec.clone());
            let mut got = split.push(&stream[..cut]);
            got.extend(split.push(&stream[cut..]));
            assert_eq!(got, expected, "split at {}", cut);
        }
    }

    #[test]
    fn no_marker_keeps_accumulating() {
        let mut scanner = FrameScanner::new(spec("<REC", 10));
        assert!(scanner.push(b"no records here").is_empty());
        assert!(scanner.push(b" still none").is_empty());
        assert_eq!(scanner.pending(), b"no records here still none".len());
    }

    #[test]
    fn clear_discards_partial_frame() {
        let mut scanner = FrameScanner::new(spec("<REC", 10));
        scanner.push(b"<REC par");
        scanner.clear();
        assert_eq!(scanner.pending(), 0);
        // A frame begun before clear() is gone for good.
        assert!(scanner.push(b"tial/").is_empty());
    }
}
