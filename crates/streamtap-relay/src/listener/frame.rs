//! Bounded newline framing over raw bytes.
//!
//! Lines are read as bytes so that a line which is not UTF-8 is a per-line
//! decode failure, not a read error that ends the connection. The cap is
//! enforced while reading: an overlong line is discarded up to its newline
//! without being buffered.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Outcome of reading one frame.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Frame {
    /// A complete line is in the buffer, without its `\n`.
    Line,
    /// The line exceeded the cap and was skipped.
    Oversized { len: usize },
    /// The peer closed the stream.
    Eof,
}

/// Reads newline-terminated frames of at most `max_len` bytes.
///
/// A trailing `\r` does not count towards the cap.
pub(super) struct LineFramer<R> {
    reader: R,
    max_len: usize,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> LineFramer<R> {
    pub(super) const fn new(reader: R, max_len: usize) -> Self {
        Self {
            reader,
            max_len,
            buf: Vec::new(),
        }
    }

    /// Bytes of the last [`Frame::Line`].
    pub(super) fn line(&self) -> &[u8] {
        &self.buf
    }

    /// Read the next frame. A final line without a newline is still a line.
    ///
    /// Not cancel safe: a partially read line is lost if the future is
    /// dropped.
    pub(super) async fn next_frame(&mut self) -> std::io::Result<Frame> {
        self.buf.clear();
        let limit = self.max_len.saturating_add(1);
        let mut skipped: Option<usize> = None;

        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(match skipped {
                    Some(len) => Frame::Oversized { len },
                    None if self.buf.is_empty() => Frame::Eof,
                    None => self.finish_line(),
                });
            }

            let newline = available.iter().position(|b| *b == b'\n');
            let chunk = newline.map_or(available, |i| &available[..i]);
            let used = newline.map_or(available.len(), |i| i + 1);

            if let Some(len) = skipped.as_mut() {
                *len += chunk.len();
            } else if self.buf.len() + chunk.len() > limit {
                skipped = Some(self.buf.len() + chunk.len());
                self.buf.clear();
            } else {
                self.buf.extend_from_slice(chunk);
            }
            self.reader.consume(used);

            if newline.is_some() {
                return Ok(match skipped {
                    Some(len) => Frame::Oversized { len },
                    None => self.finish_line(),
                });
            }
        }
    }

    fn finish_line(&mut self) -> Frame {
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        if self.buf.len() > self.max_len {
            let len = self.buf.len();
            self.buf.clear();
            return Frame::Oversized { len };
        }
        Frame::Line
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    fn framer(data: &[u8], max_len: usize) -> LineFramer<BufReader<&[u8]>> {
        // Tiny buffer so lines straddle several reads.
        LineFramer::new(BufReader::with_capacity(4, data), max_len)
    }

    #[tokio::test]
    async fn splits_lines_and_strips_carriage_return() {
        let mut f = framer(b"one\r\ntwo\n\nlast", 16);

        assert_eq!(f.next_frame().await.unwrap(), Frame::Line);
        assert_eq!(f.line(), b"one");
        assert_eq!(f.next_frame().await.unwrap(), Frame::Line);
        assert_eq!(f.line(), b"two");
        assert_eq!(f.next_frame().await.unwrap(), Frame::Line);
        assert_eq!(f.line(), b"");
        assert_eq!(f.next_frame().await.unwrap(), Frame::Line);
        assert_eq!(f.line(), b"last");
        assert_eq!(f.next_frame().await.unwrap(), Frame::Eof);
    }

    #[tokio::test]
    async fn invalid_utf8_is_just_bytes() {
        let mut f = framer(b"\xff\xfe\nok\n", 16);
        assert_eq!(f.next_frame().await.unwrap(), Frame::Line);
        assert_eq!(f.line(), b"\xff\xfe");
        assert_eq!(f.next_frame().await.unwrap(), Frame::Line);
        assert_eq!(f.line(), b"ok");
    }

    #[tokio::test]
    async fn overlong_line_skipped_without_buffering() {
        let mut data = vec![b'x'; 10_000];
        data.extend_from_slice(b"\nshort\n");
        let mut f = framer(&data, 8);

        assert_eq!(
            f.next_frame().await.unwrap(),
            Frame::Oversized { len: 10_000 }
        );
        assert!(f.buf.capacity() <= 16);
        assert_eq!(f.next_frame().await.unwrap(), Frame::Line);
        assert_eq!(f.line(), b"short");
    }

    #[tokio::test]
    async fn exact_cap_is_accepted() {
        let mut f = framer(b"12345678\r\n123456789\n", 8);
        assert_eq!(f.next_frame().await.unwrap(), Frame::Line);
        assert_eq!(f.line(), b"12345678");
        assert_eq!(
            f.next_frame().await.unwrap(),
            Frame::Oversized { len: 9 }
        );
        assert_eq!(f.next_frame().await.unwrap(), Frame::Eof);
    }

    #[tokio::test]
    async fn unterminated_overlong_tail_reported_at_eof() {
        let data = [b'y'; 64];
        let mut f = framer(&data, 8);
        assert_eq!(
            f.next_frame().await.unwrap(),
            Frame::Oversized { len: 64 }
        );
        assert_eq!(f.next_frame().await.unwrap(), Frame::Eof);
    }
}
