//! StdioFramer: reads/writes length-prefixed ("header-framed")
//! or newline-delimited JSON-RPC frames, detecting which format a peer uses
//! and mirroring it on output. Generic over `AsyncRead`/`AsyncWrite` rather
//! than tied to `Stdin`/`Stdout` so it can be driven with `tokio::io::duplex`
//! in tests.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    HeaderFramed,
    NewlineDelimited,
}

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("unexpected end of stream mid-frame")]
    UnexpectedEndOfStream,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

const CONTENT_LENGTH_PREFIX: &[u8] = b"content-length";

/// Reads frames off a single byte stream, owning its read buffer across
/// calls.
pub struct StdioFramer<R> {
    reader: R,
    buf: Vec<u8>,
    format: Option<FrameFormat>,
}

impl<R: AsyncRead + Unpin> StdioFramer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            format: None,
        }
    }

    /// The format detected from the first frame read so far, if any.
    pub fn detected_format(&self) -> Option<FrameFormat> {
        self.format
    }

    /// Returns one complete JSON body, or `None` on clean EOF before any byte
    /// has been consumed.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, FramingError> {
        loop {
            if let Some(frame) = self.try_take_frame()? {
                return Ok(Some(frame));
            }
            let mut chunk = [0u8; 4096];
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(FramingError::UnexpectedEndOfStream);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn try_take_frame(&mut self) -> Result<Option<Vec<u8>>, FramingError> {
        match self.format {
            None => self.try_detect_then_take(),
            Some(FrameFormat::NewlineDelimited) => Ok(self.try_take_newline()),
            Some(FrameFormat::HeaderFramed) => self.try_take_header(),
        }
    }

    /// Detection rule: if the prefix matches "Content-Length"
    /// case-insensitively, the frame is header-framed; a bare newline seen
    /// before that prefix could possibly match means newline-delimited.
    fn try_detect_then_take(&mut self) -> Result<Option<Vec<u8>>, FramingError> {
        if self.buf.len() >= CONTENT_LENGTH_PREFIX.len() {
            let lower: Vec<u8> = self.buf[..CONTENT_LENGTH_PREFIX.len()]
                .iter()
                .map(|b| b.to_ascii_lowercase())
                .collect();
            if lower == CONTENT_LENGTH_PREFIX {
                self.format = Some(FrameFormat::HeaderFramed);
                return self.try_take_header();
            }
            self.format = Some(FrameFormat::NewlineDelimited);
            return Ok(self.try_take_newline());
        }
        if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            if pos < CONTENT_LENGTH_PREFIX.len() {
                self.format = Some(FrameFormat::NewlineDelimited);
                return Ok(self.try_take_newline());
            }
        }
        Ok(None)
    }

    fn try_take_newline(&mut self) -> Option<Vec<u8>> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop(); // drop '\n'
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }

    fn try_take_header(&mut self) -> Result<Option<Vec<u8>>, FramingError> {
        let Some(header_end) = find_subslice(&self.buf, b"\r\n\r\n") else {
            return Ok(None);
        };
        let header_text = std::str::from_utf8(&self.buf[..header_end])
            .map_err(|e| FramingError::InvalidHeader(e.to_string()))?;

        let mut content_length: Option<usize> = None;
        for line in header_text.split("\r\n") {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = Some(
                    value
                        .trim()
                        .parse::<usize>()
                        .map_err(|e| FramingError::InvalidHeader(e.to_string()))?,
                );
            }
        }
        let Some(len) = content_length else {
            return Err(FramingError::InvalidHeader(
                "missing Content-Length header".to_string(),
            ));
        };

        let body_start = header_end + 4;
        if self.buf.len() < body_start + len {
            return Ok(None);
        }
        let body = self.buf[body_start..body_start + len].to_vec();
        self.buf.drain(..body_start + len);
        Ok(Some(body))
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Writes one frame atomically in the requested format, flushing before
/// returning. A free function (not a method) because the writer side never
/// needs to accumulate state across calls the way the reader does.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    bytes: &[u8],
    format: FrameFormat,
) -> Result<(), FramingError> {
    match format {
        FrameFormat::NewlineDelimited => {
            writer.write_all(bytes).await?;
            writer.write_all(b"\n").await?;
        }
        FrameFormat::HeaderFramed => {
            let header = format!("Content-Length: {}\r\n\r\n", bytes.len());
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(bytes).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn round_trip(body: &[u8], format: FrameFormat) -> Vec<u8> {
        let (mut client, server) = tokio::io::duplex(4096);
        write_frame(&mut client, body, format).await.unwrap();
        drop(client);
        let mut framer = StdioFramer::new(server);
        framer.read_frame().await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn newline_delimited_round_trips() {
        let body = br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
        let got = round_trip(body, FrameFormat::NewlineDelimited).await;
        assert_eq!(got, body);
    }

    #[tokio::test]
    async fn header_framed_round_trips() {
        let body = br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
        let got = round_trip(body, FrameFormat::HeaderFramed).await;
        assert_eq!(got, body);
    }

    #[tokio::test]
    async fn detects_format_and_records_it() {
        let (mut client, server) = tokio::io::duplex(4096);
        client
            .write_all(b"Content-Length: 2\r\n\r\n{}")
            .await
            .unwrap();
        drop(client);
        let mut framer = StdioFramer::new(server);
        let frame = framer.read_frame().await.unwrap().unwrap();
        assert_eq!(frame, b"{}");
        assert_eq!(framer.detected_format(), Some(FrameFormat::HeaderFramed));
    }

    #[tokio::test]
    async fn header_name_is_case_insensitive() {
        for header in ["Content-Length", "content-length", "CONTENT-LENGTH"] {
            let (mut client, server) = tokio::io::duplex(4096);
            client
                .write_all(format!("{header}: 2\r\n\r\n{{}}").as_bytes())
                .await
                .unwrap();
            drop(client);
            let mut framer = StdioFramer::new(server);
            let frame = framer.read_frame().await.unwrap().unwrap();
            assert_eq!(frame, b"{}");
        }
    }

    #[tokio::test]
    async fn clean_eof_before_any_byte_returns_none() {
        let (client, server) = tokio::io::duplex(4096);
        drop(client);
        let mut framer = StdioFramer::new(server);
        assert!(framer.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_mid_frame_is_an_error() {
        let (mut client, server) = tokio::io::duplex(4096);
        client.write_all(b"Content-Length: 10\r\n\r\n{\"a\":1}").await.unwrap();
        drop(client);
        let mut framer = StdioFramer::new(server);
        assert!(matches!(
            framer.read_frame().await,
            Err(FramingError::UnexpectedEndOfStream)
        ));
    }

    #[tokio::test]
    async fn pipelined_newline_frames_parse_in_order() {
        let (mut client, server) = tokio::io::duplex(4096);
        client.write_all(b"{\"a\":1}\n{\"a\":2}\n").await.unwrap();
        drop(client);
        let mut framer = StdioFramer::new(server);
        assert_eq!(framer.read_frame().await.unwrap().unwrap(), b"{\"a\":1}");
        assert_eq!(framer.read_frame().await.unwrap().unwrap(), b"{\"a\":2}");
        assert!(framer.read_frame().await.unwrap().is_none());
    }
}
