//! Length-prefixed JSON framing for RPC traffic over TCP.
//!
//! Each frame is `Content-Length: N\r\n\r\n` followed by exactly `N` bytes of
//! JSON. [`FrameReader`] and [`FrameWriter`] wrap the two halves of a socket.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Maximum frame size (4 MiB). A large arena snapshot is a few hundred KiB.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Longest header line accepted, terminator included. Bounds what a peer can
/// make us buffer before the body limit applies.
pub const MAX_HEADER_LINE_BYTES: usize = 8 * 1024;

const CONTENT_LENGTH: &str = "Content-Length";

pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read and decode the next frame.
    ///
    /// Returns `Ok(None)` when the peer closed the stream between frames.
    /// A truncated frame, bad header, oversized body or undecodable body is an error.
    pub async fn read_frame<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        let Some(content_length) = self.read_headers().await? else {
            return Ok(None);
        };

        if content_length > MAX_FRAME_BYTES {
            bail!("{CONTENT_LENGTH} {content_length} exceeds maximum {MAX_FRAME_BYTES}");
        }

        let mut body = vec![0u8; content_length];
        self.reader
            .read_exact(&mut body)
            .await
            .context("reading frame body")?;

        let value = serde_json::from_slice(&body).context("decoding frame body")?;
        Ok(Some(value))
    }

    async fn read_headers(&mut self) -> Result<Option<usize>> {
        let mut content_length = None;
        let mut line = String::new();
        let mut started = false;

        loop {
            line.clear();
            let n = (&mut self.reader)
                .take(MAX_HEADER_LINE_BYTES as u64)
                .read_line(&mut line)
                .await
                .context("reading header line")?;
            if n == MAX_HEADER_LINE_BYTES && !line.ends_with('\n') {
                bail!("header line exceeds {MAX_HEADER_LINE_BYTES} bytes");
            }

            if n == 0 {
                if !started {
                    return Ok(None);
                }
                bail!("unexpected EOF while reading headers");
            }
            started = true;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }

            if let Some((key, value)) = trimmed.split_once(':')
                && key.trim().eq_ignore_ascii_case(CONTENT_LENGTH)
            {
                let len: usize = value
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid {CONTENT_LENGTH} value {value:?}"))?;
                content_length = Some(len);
            }
        }

        match content_length {
            Some(len) => Ok(Some(len)),
            None => bail!("missing {CONTENT_LENGTH} header"),
        }
    }
}

pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Encode `msg` and write it as one frame, then flush.
    pub async fn write_frame<T: Serialize + ?Sized>(&mut self, msg: &T) -> Result<()> {
        let body = serde_json::to_vec(msg).context("encoding frame body")?;
        if body.len() > MAX_FRAME_BYTES {
            bail!(
                "frame of {} bytes exceeds maximum {MAX_FRAME_BYTES}",
                body.len()
            );
        }
        let header = format!("{CONTENT_LENGTH}: {}\r\n\r\n", body.len());

        self.writer
            .write_all(header.as_bytes())
            .await
            .context("writing frame header")?;
        self.writer
            .write_all(&body)
            .await
            .context("writing frame body")?;
        self.writer.flush().await.context("flushing frame")?;
        Ok(())
    }
}
