//! フレームごとのジェスチャー認識リクエストと認識履歴

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::connection::FrameSubscriber;
use crate::error::BackendError;
use crate::protocol::{ActionResult, RecognizeRequest, RecognizeResponse, StreamFrame};

pub const HISTORY_CAPACITY: usize = 50;

/// 送信順と異なる順で届いたレスポンスの扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOrdering {
    /// 適用済みの最新より古いレスポンスは捨てる
    #[default]
    LatestOnly,
    /// 届いた順にすべて適用する
    Arrival,
}

impl FromStr for ResponseOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest_only" => Ok(Self::LatestOnly),
            "arrival" => Ok(Self::Arrival),
            other => Err(format!("unknown response ordering: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStyle {
    Success,
    Info,
    Warning,
}

/// 動作結果のうちライブ表示に使う部分
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub status: String,
    pub text: String,
    pub style: ActionStyle,
}

impl ActionOutcome {
    pub fn from_result(result: Option<&ActionResult>) -> Self {
        let Some(result) = result else {
            return Self {
                status: String::new(),
                text: "no action".to_string(),
                style: ActionStyle::Warning,
            };
        };
        let (text, style) = match result.status.as_str() {
            "logged" => (result.message.clone().unwrap_or_default(), ActionStyle::Success),
            "callback_sent" => (
                match result.code {
                    Some(code) => format!("callback sent (HTTP {code})"),
                    None => "callback sent".to_string(),
                },
                ActionStyle::Info,
            ),
            other => (
                result
                    .message
                    .clone()
                    .or_else(|| result.error.clone())
                    .unwrap_or_else(|| other.to_string()),
                ActionStyle::Warning,
            ),
        };
        Self {
            status: result.status.clone(),
            text,
            style,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiveDisplay {
    Waiting,
    Recognized { gesture: String, action: ActionOutcome },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionEvent {
    pub gesture: String,
    pub timestamp: DateTime<Local>,
    pub action: ActionOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Recognized,
    Waiting,
    /// 適用済みレスポンスより古いため無視
    Stale,
}

/// 表示状態と上限付き履歴。リクエストの連番は送信順に払い出す
#[derive(Debug)]
pub struct RecognitionState {
    display: LiveDisplay,
    history: VecDeque<RecognitionEvent>,
    capacity: usize,
    ordering: ResponseOrdering,
    next_seq: u64,
    latest_applied: Option<u64>,
    failures: u64,
}

impl RecognitionState {
    pub fn new(ordering: ResponseOrdering) -> Self {
        Self::with_capacity(ordering, HISTORY_CAPACITY)
    }

    pub fn with_capacity(ordering: ResponseOrdering, capacity: usize) -> Self {
        Self {
            display: LiveDisplay::Waiting,
            history: VecDeque::with_capacity(capacity),
            capacity,
            ordering,
            next_seq: 0,
            latest_applied: None,
            failures: 0,
        }
    }

    pub fn display(&self) -> &LiveDisplay {
        &self.display
    }

    /// 古い順
    pub fn history(&self) -> impl DoubleEndedIterator<Item = &RecognitionEvent> + ExactSizeIterator {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn begin_request(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn apply(&mut self, seq: u64, response: &RecognizeResponse) -> Applied {
        if self.ordering == ResponseOrdering::LatestOnly {
            if let Some(latest) = self.latest_applied {
                if seq < latest {
                    debug!(seq, latest, "[recognize] stale response discarded");
                    return Applied::Stale;
                }
            }
        }
        self.latest_applied = Some(self.latest_applied.map_or(seq, |l| l.max(seq)));

        match response.recognized() {
            Some(gesture) => {
                let action = ActionOutcome::from_result(response.action.as_ref());
                info!(gesture, status = %action.status, "[recognize] {}", action.text);
                self.push_event(RecognitionEvent {
                    gesture: gesture.to_string(),
                    timestamp: Local::now(),
                    action: action.clone(),
                });
                self.display = LiveDisplay::Recognized {
                    gesture: gesture.to_string(),
                    action,
                };
                Applied::Recognized
            }
            None => {
                self.display = LiveDisplay::Waiting;
                Applied::Waiting
            }
        }
    }

    /// 失敗はログに出すだけで状態は変えない
    pub fn fail(&mut self, seq: u64, error: &BackendError) {
        self.failures += 1;
        warn!(seq, failures = self.failures, "[recognize] request failed: {error}");
    }

    fn push_event(&mut self, event: RecognitionEvent) {
        if self.capacity == 0 {
            return;
        }
        while self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }
}

/// ランドマーク付きフレームごとに認識リクエストを1件送る
/// キューもキャンセルもせず、LocalSet 上で完了を待つ
pub struct RecognitionClient<B: Backend + 'static> {
    state: Rc<RefCell<RecognitionState>>,
    backend: Rc<B>,
}

impl<B: Backend + 'static> RecognitionClient<B> {
    pub fn new(state: Rc<RefCell<RecognitionState>>, backend: Rc<B>) -> Self {
        Self { state, backend }
    }

    pub fn state(&self) -> Rc<RefCell<RecognitionState>> {
        Rc::clone(&self.state)
    }
}

impl<B: Backend + 'static> FrameSubscriber for RecognitionClient<B> {
    fn on_frame(&mut self, frame: &StreamFrame) {
        let Some(landmarks) = frame.non_empty_landmarks() else {
            return;
        };
        let request = RecognizeRequest {
            landmarks: landmarks.clone(),
            timestamp: frame.timestamp,
        };
        let seq = self.state.borrow_mut().begin_request();
        let state = Rc::clone(&self.state);
        let backend = Rc::clone(&self.backend);

        tokio::task::spawn_local(async move {
            let result = backend.recognize(&request).await;
            let mut state = state.borrow_mut();
            match result {
                Ok(response) => {
                    state.apply(seq, &response);
                }
                Err(e) => state.fail(seq, &e),
            }
        });
    }
}
