/// Upper bound for a single JPEG frame from the detection feed
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Incremental splitter for `multipart/x-mixed-replace` JPEG bodies.
///
/// Part headers and boundaries are skipped by scanning for the JPEG
/// start/end markers, so the boundary string does not need to be known.
#[derive(Debug, Default)]
pub struct MjpegDecoder {
    buffer: Vec<u8>,
}

impl MjpegDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    /// Feed a body chunk; returns every frame completed by it, oldest first.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
            frames.push(self.buffer[start..end].to_vec());
            self.buffer.drain(..end);
        }

        if frames.is_empty() && self.buffer.len() > MAX_FRAME_BYTES * 2 {
            // Keep the tail in case it holds half of a start marker
            let drain_len = self.buffer.len() - 2;
            self.buffer.drain(..drain_len);
        }

        frames
    }

    /// Bytes held waiting for a frame to complete
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Locate the first complete JPEG (SOI `FF D8` .. EOI `FF D9`).
fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])?;
    Some((start, start + 2 + end + 2))
}
