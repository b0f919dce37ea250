//! Operator-visible output.
//!
//! Chat lines and error notices are the client's stdout contract and never go
//! through the `log` facade.  Tests swap stdout for a channel.

use std::io::Write;

use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum Console {
    Stdout,
    Capture(mpsc::UnboundedSender<String>),
}

impl Console {
    /// A console whose lines are delivered to the returned receiver.
    pub fn capture() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::Capture(tx), rx)
    }

    pub fn line(&self, text: impl Into<String>) {
        let text = text.into();
        match self {
            Self::Stdout => {
                let mut out = std::io::stdout().lock();
                let _ = writeln!(out, "{text}");
                let _ = out.flush();
            }
            Self::Capture(tx) => {
                let _ = tx.send(text);
            }
        }
    }

    pub fn error(&self, text: impl std::fmt::Display) {
        self.line(format!("ERROR: {text}"));
    }

    pub fn warning(&self, text: impl std::fmt::Display) {
        self.line(format!("WARNING: {text}"));
    }
}
