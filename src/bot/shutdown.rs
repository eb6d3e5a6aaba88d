//! Kill switch: an operator signal polled once per tick

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Engaged either programmatically (ctrl-c handler) or by the presence of a
/// file on disk. Once engaged it stays engaged.
#[derive(Debug, Clone)]
pub struct KillSwitch {
    tx: Arc<watch::Sender<bool>>,
    file: Option<PathBuf>,
}

impl KillSwitch {
    pub fn new(file: Option<PathBuf>) -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx), file }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Returns where the kill came from, if it has been engaged.
    pub fn poll(&self) -> Option<&'static str> {
        if *self.tx.borrow() {
            return Some("signal");
        }
        match &self.file {
            Some(path) if path.exists() => {
                self.tx.send_replace(true);
                Some("file")
            }
            _ => None,
        }
    }

    pub fn is_engaged(&self) -> bool {
        self.poll().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
