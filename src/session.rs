//! 記録セッション: `Idle → Recording → Analyzing → Idle`

use std::cell::RefCell;
use std::fmt;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::connection::FrameSubscriber;
use crate::error::BackendError;
use crate::pose::LandmarkFrame;
use crate::protocol::{AnalysisReport, SequenceSubmission, StreamFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Recording,
    Analyzing,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Analyzing => "analyzing",
        })
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("enter an exercise label before recording")]
    EmptyLabel,

    #[error("a session is already {0}")]
    Busy(SessionStatus),

    #[error("analysis failed: {0}")]
    Analysis(#[source] BackendError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    pub label: String,
    pub buffer: Vec<LandmarkFrame>,
}

/// 記録セッションを1つだけ持つ。記録中は届いたフレームを
/// 空のランドマークも含めてそのまま追加する
#[derive(Debug)]
pub struct SessionRecorder {
    status: SessionStatus,
    session: Option<RecordingSession>,
}

impl Default for SessionRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self {
            status: SessionStatus::Idle,
            session: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn label(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.label.as_str())
    }

    pub fn buffered(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.buffer.len())
    }

    pub fn start(&mut self, label: &str) -> Result<(), SessionError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(SessionError::EmptyLabel);
        }
        if self.status != SessionStatus::Idle {
            return Err(SessionError::Busy(self.status));
        }
        self.session = Some(RecordingSession {
            label: label.to_string(),
            buffer: Vec::new(),
        });
        self.status = SessionStatus::Recording;
        info!(label, "[record] started");
        Ok(())
    }

    /// `Recording → Analyzing` に遷移して送信内容を返す
    /// それ以外の状態では `None` で、状態は変えない
    pub fn begin_analysis(&mut self) -> Option<SequenceSubmission> {
        if self.status != SessionStatus::Recording {
            return None;
        }
        let session = self.session.take()?;
        self.status = SessionStatus::Analyzing;
        info!(label = %session.label, frames = session.buffer.len(), "[record] stopped, analyzing");
        Some(SequenceSubmission {
            label: session.label,
            sequence: session.buffer,
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
        })
    }

    /// 結果に関係なく `Analyzing → Idle`
    pub fn finish_analysis(&mut self) {
        if self.status == SessionStatus::Analyzing {
            self.status = SessionStatus::Idle;
        }
    }
}

impl FrameSubscriber for SessionRecorder {
    fn on_frame(&mut self, frame: &StreamFrame) {
        if self.status != SessionStatus::Recording {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.buffer.push(frame.landmarks.clone().unwrap_or_default());
        }
    }
}

/// 記録を止めて分析に送る
///
/// 記録中でなければ `Ok(None)` で、リクエストは送らない
/// 戻った時点で成否に関係なく `Idle`
pub async fn stop_and_analyze<B: Backend>(
    recorder: &RefCell<SessionRecorder>,
    backend: &B,
) -> Result<Option<AnalysisReport>, SessionError> {
    let Some(submission) = recorder.borrow_mut().begin_analysis() else {
        return Ok(None);
    };
    let result = backend.submit_sequence(&submission).await;
    recorder.borrow_mut().finish_analysis();

    match result {
        Ok(response) => {
            info!(label = %submission.label, path = ?response.path, "[record] analysis received");
            Ok(Some(response.report))
        }
        Err(e) => {
            warn!(label = %submission.label, "[record] analysis failed: {e}");
            Err(SessionError::Analysis(e))
        }
    }
}
