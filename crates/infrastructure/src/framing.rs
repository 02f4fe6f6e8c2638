use bytes::BytesMut;

/// Splits the inbound byte stream into newline-terminated frames.
///
/// `\n` ends a frame and a `\r` right before it is dropped with it. The unterminated tail
/// stays buffered until a later `append` completes it. Nothing bounds the tail: scales
/// terminate every transmission.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    window: BytesMut,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and returns every frame completed by them, in arrival order.
    pub fn append(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut frames = Vec::new();
        // Only the new bytes can contain a terminator the window has not seen
        let mut search_from = self.window.len();
        self.window.extend_from_slice(bytes);

        while let Some(offset) = self.window[search_from..].iter().position(|b| *b == b'\n') {
            let newline = search_from + offset;
            let mut frame = self.window.split_to(newline + 1);
            frame.truncate(newline);
            if frame.last() == Some(&b'\r') {
                frame.truncate(newline - 1);
            }
            frames.push(String::from_utf8_lossy(&frame).into_owned());
            search_from = 0;
        }

        frames
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn pending_len(&self) -> usize {
        self.window.len()
    }
}
