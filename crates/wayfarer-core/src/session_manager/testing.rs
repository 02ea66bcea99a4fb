//! Recording connection for session tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::Connection;
use crate::envelope::ResponseEnvelope;
use crate::error::{Error, Result};

#[derive(Default)]
pub(crate) struct RecordingConnection {
    closed: AtomicBool,
    fail_writes: AtomicBool,
    frames: Mutex<Vec<String>>,
    close_frame: Mutex<Option<(u16, String)>>,
}

impl RecordingConnection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn envelopes(&self) -> Vec<ResponseEnvelope> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    pub(crate) fn for_request(&self, request_id: &str) -> Vec<ResponseEnvelope> {
        self.envelopes()
            .into_iter()
            .filter(|e| e.request_id.as_deref() == Some(request_id))
            .collect()
    }

    pub(crate) fn close_frame(&self) -> Option<(u16, String)> {
        self.close_frame.lock().unwrap().clone()
    }

    pub(crate) fn drop_transport(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn id(&self) -> &str {
        "recording"
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn send_text(&self, text: String) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Transport("broken pipe".to_string()));
        }
        self.frames.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&self, code: u16, reason: &str) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        *self.close_frame.lock().unwrap() = Some((code, reason.to_string()));
        Ok(())
    }
}
