//! Command sources feeding the control channel

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;

/// Produces the commands pushed to connected agents
#[async_trait]
pub trait CommandSource: Send + 'static {
    /// Wait for the next command. `Ok(None)` means the source is exhausted.
    async fn next_command(&mut self) -> io::Result<Option<String>>;
}

/// One command per input line, surrounding whitespace trimmed
pub struct LineSource<R> {
    lines: Lines<R>,
}

/// Operator input from the terminal
pub type StdinSource = LineSource<BufReader<Stdin>>;

impl<R: AsyncBufRead + Unpin> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl StdinSource {
    /// Read commands from standard input
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R> CommandSource for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn next_command(&mut self) -> io::Result<Option<String>> {
        let line = self.lines.next_line().await?;
        Ok(line.map(|line| line.trim().to_owned()))
    }
}

/// Commands fed programmatically through an mpsc channel
pub struct ChannelSource {
    rx: mpsc::Receiver<String>,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it
    pub fn new(capacity: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl CommandSource for ChannelSource {
    async fn next_command(&mut self) -> io::Result<Option<String>> {
        Ok(self.rx.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lines_are_trimmed() {
        let mut source = LineSource::new(&b"  ls -la  \n\necho hi\r\n"[..]);

        assert_eq!(source.next_command().await.unwrap(), Some("ls -la".into()));
        assert_eq!(source.next_command().await.unwrap(), Some(String::new()));
        assert_eq!(source.next_command().await.unwrap(), Some("echo hi".into()));
        assert_eq!(source.next_command().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_channel_source_ends_when_sender_drops() {
        let (tx, mut source) = ChannelSource::new(4);
        tx.send("uname".into()).await.unwrap();
        drop(tx);

        assert_eq!(source.next_command().await.unwrap(), Some("uname".into()));
        assert_eq!(source.next_command().await.unwrap(), None);
    }
}
