//! Sentinel-framed turn protocol.
//!
//! A turn is one prompt written to the worker's stdin followed by every
//! line it prints until a line containing the sentinel. The sentinel line
//! itself is not part of the response. End of stream also ends the turn,
//! leaving whatever was read so far.

use crate::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// The response lines of one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Trimmed lines joined by single spaces.
    pub text: String,

    /// Whether the sentinel was seen. `false` means the stream ended first.
    pub terminated: bool,
}

/// Write `prompt` and read back one framed response.
pub async fn send_turn<W, R>(
    writer: &mut W,
    reader: &mut R,
    prompt: &str,
    sentinel: &str,
) -> Result<Frame, Error>
where
    W: AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
{
    write_prompt(writer, prompt).await?;
    read_frame(reader, sentinel).await
}

/// Write the prompt with a single trailing newline and flush it.
pub async fn write_prompt<W>(writer: &mut W, prompt: &str) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(prompt.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Read lines until the sentinel or end of stream.
pub async fn read_frame<R>(reader: &mut R, sentinel: &str) -> Result<Frame, Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    let mut line = String::new();

    let terminated = loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break false;
        }
        if line.contains(sentinel) {
            break true;
        }
        lines.push(line.trim().to_string());
    };

    Ok(Frame {
        text: lines.join(" ").trim().to_string(),
        terminated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn frame_of(output: &str) -> Frame {
        let mut reader = BufReader::new(output.as_bytes());
        read_frame(&mut reader, "User:").await.unwrap()
    }

    #[tokio::test]
    async fn test_sentinel_line_is_excluded() {
        let frame = frame_of("Hello\nthere.\nUser:\n").await;
        assert_eq!(frame.text, "Hello there.");
        assert!(frame.terminated);
    }

    #[tokio::test]
    async fn test_sentinel_anywhere_in_line_ends_turn() {
        let frame = frame_of("Aye.\n> User: \nnot read\n").await;
        assert_eq!(frame.text, "Aye.");
        assert!(frame.terminated);
    }

    #[tokio::test]
    async fn test_end_of_stream_keeps_partial_text() {
        let frame = frame_of("  I was about to say  \nsomething").await;
        assert_eq!(frame.text, "I was about to say something");
        assert!(!frame.terminated);
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let frame = frame_of("").await;
        assert_eq!(frame.text, "");
        assert!(!frame.terminated);
    }

    #[tokio::test]
    async fn test_lines_after_sentinel_stay_buffered() {
        let mut reader = BufReader::new("one\nUser:\ntwo\nUser:\n".as_bytes());
        assert_eq!(read_frame(&mut reader, "User:").await.unwrap().text, "one");
        assert_eq!(read_frame(&mut reader, "User:").await.unwrap().text, "two");
    }

    #[tokio::test]
    async fn test_prompt_is_written_verbatim_with_one_newline() {
        let mut written = Vec::new();
        let mut reader = BufReader::new("ok\nUser:\n".as_bytes());

        let frame = send_turn(&mut written, &mut reader, "line one\nline two", "User:")
            .await
            .unwrap();

        assert_eq!(written, b"line one\nline two\n");
        assert_eq!(frame.text, "ok");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_pipe_failure() {
        let bytes: &[u8] = &[0xff, 0xfe, b'\n'];
        let mut reader = BufReader::new(bytes);
        let err = read_frame(&mut reader, "User:").await.unwrap_err();
        assert!(matches!(err, Error::PipeBroken(_)));
    }
}
