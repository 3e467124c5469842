//! Terminal speech channel: prompts go to stdout, answers come from stdin.
//!
//! One line of input is one answer; invalid UTF-8 is replaced, not rejected.
//! End of input, a read error, `/quit` or `/end` hang up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use consult_core::error::ConsultError;
use consult_session::{CaptureEvent, SpeechIo};

const HANGUP_COMMANDS: &[&str] = &["/quit", "/end"];

pub struct ConsoleSpeech<R, W> {
    input: Arc<Mutex<R>>,
    output: Arc<Mutex<W>>,
    capturing: AtomicBool,
}

impl ConsoleSpeech<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleSpeech<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: Arc::new(Mutex::new(input)),
            output: Arc::new(Mutex::new(output)),
            capturing: AtomicBool::new(false),
        }
    }
}

impl<R, W> ConsoleSpeech<R, W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&self, text: &str) -> Result<(), ConsultError> {
        let mut out = self.output.lock().await;
        out.write_all(text.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }
}

impl<R, W> SpeechIo for ConsoleSpeech<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn speak(&self, text: &str) -> Result<(), ConsultError> {
        if self.capturing.load(Ordering::SeqCst) {
            return Err(ConsultError::Speech(
                "cannot speak while capturing".to_string(),
            ));
        }
        self.write(&format!("AI: {text}\n")).await
    }

    async fn start_capture(&self) -> Result<mpsc::Receiver<CaptureEvent>, ConsultError> {
        self.capturing.store(true, Ordering::SeqCst);
        self.write("You: ").await?;

        let mut raw = Vec::new();
        let read = match self.input.lock().await.read_until(b'\n', &mut raw).await {
            Ok(read) => read,
            Err(e) => {
                warn!(error = %e, "Failed to read from the terminal, hanging up");
                0
            }
        };
        let line = String::from_utf8_lossy(&raw);

        let (tx, rx) = mpsc::channel(2);
        let answer = line.trim();
        let events = if read == 0 || HANGUP_COMMANDS.contains(&answer) {
            vec![CaptureEvent::Hangup]
        } else {
            vec![
                CaptureEvent::Transcript(answer.to_string()),
                CaptureEvent::EndOfTurn,
            ]
        };
        for event in events {
            // Capacity covers both events.
            let _ = tx.try_send(event);
        }
        Ok(rx)
    }

    async fn stop_capture(&self) -> Result<(), ConsultError> {
        self.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }
}
