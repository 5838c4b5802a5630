//! ジェスチャー → 動作のルール表。バックエンドからキャッシュする

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::error::BackendError;
use crate::protocol::{MappingRecord, MappingRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Log,
    Callback,
    Keyboard,
    Mouse,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [Self::Log, Self::Callback, Self::Keyboard, Self::Mouse];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Callback => "callback",
            Self::Keyboard => "keyboard",
            Self::Mouse => "mouse",
        }
    }

    /// この種類が必要とするペイロードのフィールド名
    pub fn payload_field(&self) -> &'static str {
        match self {
            Self::Log => "message",
            Self::Callback => "url",
            Self::Keyboard => "key",
            Self::Mouse => "action",
        }
    }
}

impl FromStr for ActionKind {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| RuleError::UnknownActionType(s.to_string()))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ジェスチャーに割り当てる動作。種類ごとに必要なペイロードだけを持つ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Log { message: String },
    Callback { url: String },
    Keyboard { key: String },
    Mouse { action: String },
    /// バックエンドに保存済みだが検証を通らないもの（未知の種類、ペイロード欠落）
    Unrecognized { action_type: String, payload: Option<String> },
}

impl Action {
    /// `Unrecognized` のうち種類名が未知のものは `None`
    pub fn kind(&self) -> Option<ActionKind> {
        match self {
            Self::Log { .. } => Some(ActionKind::Log),
            Self::Callback { .. } => Some(ActionKind::Callback),
            Self::Keyboard { .. } => Some(ActionKind::Keyboard),
            Self::Mouse { .. } => Some(ActionKind::Mouse),
            Self::Unrecognized { action_type, .. } => action_type.parse().ok(),
        }
    }

    /// 種類名（ワイヤ上の `type`）
    pub fn type_name(&self) -> &str {
        match self {
            Self::Unrecognized { action_type, .. } => action_type,
            other => other.kind().map_or("", |k| k.as_str()),
        }
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::Log { message } => Some(message),
            Self::Callback { url } => Some(url),
            Self::Keyboard { key } => Some(key),
            Self::Mouse { action } => Some(action),
            Self::Unrecognized { payload, .. } => payload.as_deref(),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized { .. })
    }

    /// 種類とペイロードから作る。空のペイロードは欠落扱い
    pub fn new(kind: ActionKind, payload: Option<String>) -> Result<Self, RuleError> {
        let payload = payload
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or(RuleError::MissingField {
                kind,
                field: kind.payload_field(),
            })?;
        Ok(match kind {
            ActionKind::Log => Self::Log { message: payload },
            ActionKind::Callback => Self::Callback { url: payload },
            ActionKind::Keyboard => Self::Keyboard { key: payload },
            ActionKind::Mouse => Self::Mouse { action: payload },
        })
    }
}

/// 作成・編集用の入力。検証前
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingDraft {
    pub gesture: String,
    pub action_type: String,
    pub message: Option<String>,
    pub url: Option<String>,
    pub key: Option<String>,
    pub mouse_action: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GestureMapping {
    gesture: String,
    action: Action,
    description: Option<String>,
}

impl GestureMapping {
    pub fn new(gesture: impl Into<String>, action: Action, description: Option<String>) -> Result<Self, RuleError> {
        let gesture = gesture.into();
        if gesture.trim().is_empty() {
            return Err(RuleError::EmptyGesture);
        }
        Ok(Self {
            gesture,
            action,
            description: description.filter(|d| !d.trim().is_empty()),
        })
    }

    pub fn from_draft(draft: MappingDraft) -> Result<Self, RuleError> {
        if draft.gesture.trim().is_empty() {
            return Err(RuleError::EmptyGesture);
        }
        let kind: ActionKind = draft.action_type.trim().parse()?;
        let payload = match kind {
            ActionKind::Log => draft.message,
            ActionKind::Callback => draft.url,
            ActionKind::Keyboard => draft.key,
            ActionKind::Mouse => draft.mouse_action,
        };
        Self::new(draft.gesture.trim(), Action::new(kind, payload)?, draft.description)
    }

    /// 保存済みレコードから復元する。検証は行わず、作成時の検証を
    /// 通らないものは `Action::Unrecognized` になる
    pub fn from_record(gesture: &str, record: MappingRecord) -> Self {
        let action = match record.action_type.parse::<ActionKind>() {
            Ok(kind) => {
                let payload = match kind {
                    ActionKind::Log => record.message,
                    ActionKind::Callback => record.url,
                    ActionKind::Keyboard => record.key,
                    ActionKind::Mouse => record.action,
                };
                Action::new(kind, payload.clone()).unwrap_or(Action::Unrecognized {
                    action_type: record.action_type,
                    payload,
                })
            }
            Err(_) => Action::Unrecognized {
                action_type: record.action_type,
                payload: record.message.or(record.url).or(record.key).or(record.action),
            },
        };
        Self {
            gesture: gesture.to_string(),
            action,
            description: record.description.filter(|d| !d.trim().is_empty()),
        }
    }

    pub fn gesture(&self) -> &str {
        &self.gesture
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn to_request(&self) -> MappingRequest {
        let mut request = MappingRequest {
            gesture: self.gesture.clone(),
            action_type: self.action.type_name().to_string(),
            description: self.description.clone(),
            ..Default::default()
        };
        match &self.action {
            Action::Log { message } => request.message = Some(message.clone()),
            Action::Callback { url } => request.url = Some(url.clone()),
            Action::Keyboard { key } => request.key = Some(key.clone()),
            Action::Mouse { action } => request.action = Some(action.clone()),
            Action::Unrecognized { payload, .. } => match self.action.kind() {
                Some(ActionKind::Log) => request.message = payload.clone(),
                Some(ActionKind::Callback) => request.url = payload.clone(),
                Some(ActionKind::Keyboard) => request.key = payload.clone(),
                Some(ActionKind::Mouse) => request.action = payload.clone(),
                None => {}
            },
        }
        request
    }
}

impl fmt::Display for GestureMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}: {}", self.gesture, self.action.type_name(), self.action.payload().unwrap_or("-"))?;
        if !self.action.is_recognized() {
            write!(f, " [invalid]")?;
        }
        if let Some(desc) = &self.description {
            write!(f, " ({desc})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("gesture name must not be empty")]
    EmptyGesture,

    #[error("unknown action type '{0}' (expected log, callback, keyboard or mouse)")]
    UnknownActionType(String),

    #[error("{kind} action requires '{field}'")]
    MissingField { kind: ActionKind, field: &'static str },

    #[error("{0}")]
    Rejected(String),

    #[error("could not load mappings: {0}")]
    Load(#[source] BackendError),
}

/// 破壊的な変更の前にユーザーに確認する
#[allow(async_fn_in_trait)]
pub trait Confirm {
    async fn confirm(&mut self, prompt: &str) -> bool;
}

/// 固定の回答
impl Confirm for bool {
    async fn confirm(&mut self, _prompt: &str) -> bool {
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
}

/// バックエンドのルール表のローカルキャッシュ
///
/// 変更はバックエンドに直接送り、キャッシュには触れない
/// 成功後の再読込は呼び出し側で行う
pub struct RuleStore<B: Backend> {
    backend: Rc<B>,
    mappings: Vec<GestureMapping>,
}

impl<B: Backend> RuleStore<B> {
    pub fn new(backend: Rc<B>) -> Self {
        Self {
            backend,
            mappings: Vec::new(),
        }
    }

    /// バックエンドの順序
    pub fn mappings(&self) -> &[GestureMapping] {
        &self.mappings
    }

    pub fn gestures(&self) -> impl Iterator<Item = &str> {
        self.mappings.iter().map(|m| m.gesture())
    }

    pub fn get(&self, gesture: &str) -> Option<&GestureMapping> {
        self.mappings.iter().find(|m| m.gesture == gesture)
    }

    /// バックエンドの一覧でキャッシュを丸ごと置き換える（順序もそのまま）
    pub async fn load_mappings(&mut self) -> Result<usize, RuleError> {
        let response = self.backend.list_mappings().await.map_err(RuleError::Load)?;
        self.mappings = response
            .mappings
            .into_iter()
            .map(|(gesture, value)| parse_entry(&gesture, value))
            .collect();
        info!(count = self.mappings.len(), "[rules] mappings loaded");
        Ok(self.mappings.len())
    }

    pub async fn create_mapping(&self, mapping: &GestureMapping) -> Result<(), RuleError> {
        ensure_valid(mapping)?;
        self.backend
            .create_mapping(&mapping.to_request())
            .await
            .map_err(|e| rejected(e, "failed to create mapping"))?;
        info!(gesture = mapping.gesture(), "[rules] mapping created");
        Ok(())
    }

    /// ローカルで検証してから作成する。検証に失敗したら何も送らない
    pub async fn create_from_draft(&self, draft: MappingDraft) -> Result<GestureMapping, RuleError> {
        let mapping = GestureMapping::from_draft(draft)?;
        self.create_mapping(&mapping).await?;
        Ok(mapping)
    }

    pub async fn update_mapping(&self, mapping: &GestureMapping) -> Result<(), RuleError> {
        ensure_valid(mapping)?;
        self.backend
            .update_mapping(&mapping.to_request())
            .await
            .map_err(|e| rejected(e, "failed to update mapping"))?;
        info!(gesture = mapping.gesture(), "[rules] mapping updated");
        Ok(())
    }

    /// 作成と同じ検証を通してから更新する
    pub async fn update_from_draft(&self, draft: MappingDraft) -> Result<GestureMapping, RuleError> {
        let mapping = GestureMapping::from_draft(draft)?;
        self.update_mapping(&mapping).await?;
        Ok(mapping)
    }

    /// バックエンドから1件を直接取得
    pub async fn fetch_mapping(&self, gesture: &str) -> Result<GestureMapping, RuleError> {
        let response = self
            .backend
            .get_mapping(gesture)
            .await
            .map_err(|e| rejected(e, "failed to fetch mapping"))?;
        Ok(GestureMapping::from_record(&response.gesture, response.mapping))
    }

    /// ユーザーの確認後に削除
    pub async fn delete_mapping(
        &self,
        gesture: &str,
        confirm: &mut impl Confirm,
    ) -> Result<DeleteOutcome, RuleError> {
        let prompt = format!("Delete mapping for gesture '{gesture}'?");
        if !confirm.confirm(&prompt).await {
            return Ok(DeleteOutcome::Cancelled);
        }
        self.backend
            .delete_mapping(gesture)
            .await
            .map_err(|e| rejected(e, "failed to delete mapping"))?;
        info!(gesture, "[rules] mapping deleted");
        Ok(DeleteOutcome::Deleted)
    }
}

/// 送信前の検証。`Unrecognized` も種類とペイロードが揃っていれば通す
fn ensure_valid(mapping: &GestureMapping) -> Result<(), RuleError> {
    match mapping.action() {
        Action::Unrecognized { action_type, payload } => {
            let kind: ActionKind = action_type.parse()?;
            Action::new(kind, payload.clone()).map(|_| ())
        }
        _ => Ok(()),
    }
}

fn parse_entry(gesture: &str, value: Value) -> GestureMapping {
    let mapping = match serde_json::from_value::<MappingRecord>(value) {
        Ok(record) => GestureMapping::from_record(gesture, record),
        Err(e) => {
            warn!(%gesture, "[rules] unreadable stored mapping: {e}");
            GestureMapping::from_record(gesture, MappingRecord::default())
        }
    };
    if !mapping.action().is_recognized() {
        warn!(%gesture, action_type = mapping.action().type_name(), "[rules] stored mapping does not validate");
    }
    mapping
}

fn rejected(error: BackendError, generic: &str) -> RuleError {
    warn!("[rules] {generic}: {error}");
    RuleError::Rejected(
        error
            .server_detail()
            .map(str::to_string)
            .unwrap_or_else(|| generic.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendResult;
    use crate::protocol::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeBackend {
        listing: RefCell<String>,
        fail_with: RefCell<Option<BackendError>>,
        sent: RefCell<Vec<(String, String)>>,
    }

    impl FakeBackend {
        fn with_listing(json: &str) -> Rc<Self> {
            let b = Self::default();
            *b.listing.borrow_mut() = json.to_string();
            Rc::new(b)
        }

        fn record(&self, method: &str, target: &str) -> BackendResult<MappingChangeResponse> {
            self.sent.borrow_mut().push((method.to_string(), target.to_string()));
            match self.fail_with.borrow_mut().take() {
                Some(e) => Err(e),
                None => Ok(MappingChangeResponse::default()),
            }
        }
    }

    impl Backend for FakeBackend {
        async fn recognize(&self, _: &RecognizeRequest) -> BackendResult<RecognizeResponse> {
            unimplemented!()
        }
        async fn list_mappings(&self) -> BackendResult<MappingsResponse> {
            if let Some(e) = self.fail_with.borrow_mut().take() {
                return Err(e);
            }
            Ok(serde_json::from_str(&self.listing.borrow()).unwrap())
        }
        async fn get_mapping(&self, gesture: &str) -> BackendResult<MappingLookupResponse> {
            Ok(MappingLookupResponse {
                gesture: gesture.to_string(),
                mapping: MappingRecord {
                    action_type: "keyboard".into(),
                    key: Some("space".into()),
                    ..Default::default()
                },
            })
        }
        async fn create_mapping(&self, r: &MappingRequest) -> BackendResult<MappingChangeResponse> {
            self.record("POST", &r.gesture)
        }
        async fn update_mapping(&self, r: &MappingRequest) -> BackendResult<MappingChangeResponse> {
            self.record("PUT", &r.gesture)
        }
        async fn delete_mapping(&self, gesture: &str) -> BackendResult<MappingChangeResponse> {
            self.record("DELETE", gesture)
        }
        async fn submit_sequence(&self, _: &SequenceSubmission) -> BackendResult<SequenceResponse> {
            unimplemented!()
        }
        async fn list_sequences(&self, _: &str) -> BackendResult<SequenceListing> {
            unimplemented!()
        }
        async fn health(&self) -> BackendResult<HealthStatus> {
            unimplemented!()
        }
    }

    fn draft(gesture: &str, action_type: &str) -> MappingDraft {
        MappingDraft {
            gesture: gesture.into(),
            action_type: action_type.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_draft_requires_payload_for_kind() {
        let cases = [
            ("log", "message"),
            ("callback", "url"),
            ("keyboard", "key"),
            ("mouse", "action"),
        ];
        for (kind, field) in cases {
            match GestureMapping::from_draft(draft("wave", kind)) {
                Err(RuleError::MissingField { field: f, .. }) => assert_eq!(f, field),
                other => panic!("{kind}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_draft_rejects_empty_gesture_and_unknown_type() {
        let mut d = draft("  ", "log");
        d.message = Some("hi".into());
        assert!(matches!(GestureMapping::from_draft(d), Err(RuleError::EmptyGesture)));

        let mut d = draft("wave", "voice");
        d.message = Some("hi".into());
        assert!(matches!(
            GestureMapping::from_draft(d),
            Err(RuleError::UnknownActionType(t)) if t == "voice"
        ));
    }

    #[test]
    fn test_draft_ignores_fields_of_other_kinds() {
        let mut d = draft("wave", "callback");
        d.url = Some("http://example.com/hook".into());
        d.message = Some("ignored".into());
        let m = GestureMapping::from_draft(d).unwrap();
        assert_eq!(
            m.action(),
            &Action::Callback {
                url: "http://example.com/hook".into()
            }
        );
        let req = m.to_request();
        assert_eq!(req.action_type, "callback");
        assert_eq!(req.message, None);
    }

    #[test]
    fn test_gesture_names_case_sensitive() {
        let a = GestureMapping::new("Wave", Action::Log { message: "a".into() }, None).unwrap();
        let b = GestureMapping::new("wave", Action::Log { message: "a".into() }, None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_mouse_request_uses_action_field() {
        let m = GestureMapping::new("fist", Action::Mouse { action: "click".into() }, Some("select".into())).unwrap();
        let value = serde_json::to_value(m.to_request()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "gesture": "fist", "action_type": "mouse", "action": "click", "description": "select"
            })
        );
    }

    #[tokio::test]
    async fn test_load_replaces_cache_in_backend_order() {
        let backend = FakeBackend::with_listing(
            r#"{"mappings": {
                "wave_right": {"type": "callback", "url": "http://example.com/wave"},
                "clap": {"type": "log", "message": "pause", "description": "media"},
                "broken": {"type": "callback"},
                "raise_left_hand": {"type": "log", "message": "back"}
            }}"#,
        );
        let mut store = RuleStore::new(Rc::clone(&backend));
        assert_eq!(store.load_mappings().await.unwrap(), 4);
        let names: Vec<&str> = store.gestures().collect();
        assert_eq!(names, vec!["wave_right", "clap", "broken", "raise_left_hand"]);
        assert_eq!(store.get("clap").unwrap().description(), Some("media"));
        assert_eq!(
            store.get("broken").unwrap().action(),
            &Action::Unrecognized {
                action_type: "callback".into(),
                payload: None
            }
        );

        *backend.listing.borrow_mut() = r#"{"mappings": {"bow": {"type": "keyboard", "key": "b"}}}"#.into();
        store.load_mappings().await.unwrap();
        let names: Vec<&str> = store.gestures().collect();
        assert_eq!(names, vec!["bow"]);
    }

    #[tokio::test]
    async fn test_load_lists_entries_the_client_cannot_validate() {
        let backend = FakeBackend::with_listing(
            r#"{"mappings": {
                "nod": {"type": "log"},
                "spin": {"type": "voice", "message": "hello"},
                "odd": "not an object",
                "clap": {"type": "log", "message": "pause"}
            }}"#,
        );
        let mut store = RuleStore::new(Rc::clone(&backend));
        assert_eq!(store.load_mappings().await.unwrap(), 4);

        let nod = store.get("nod").unwrap();
        assert!(!nod.action().is_recognized());
        assert_eq!(nod.action().kind(), Some(ActionKind::Log));
        assert_eq!(nod.to_string(), "nod → log: - [invalid]");

        let spin = store.get("spin").unwrap();
        assert_eq!(spin.action().kind(), None);
        assert_eq!(spin.action().payload(), Some("hello"));
        assert_eq!(spin.to_request().action_type, "voice");

        assert_eq!(store.get("odd").unwrap().action().type_name(), "");
        assert!(store.get("clap").unwrap().action().is_recognized());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_cache() {
        let backend = FakeBackend::with_listing(r#"{"mappings": {"clap": {"type": "log", "message": "x"}}}"#);
        let mut store = RuleStore::new(Rc::clone(&backend));
        store.load_mappings().await.unwrap();
        *backend.fail_with.borrow_mut() = Some(BackendError::Transport("down".into()));
        assert!(store.load_mappings().await.is_err());
        assert_eq!(store.mappings().len(), 1);
    }

    #[tokio::test]
    async fn test_callback_without_url_rejected_before_request() {
        let backend = FakeBackend::with_listing(r#"{"mappings": {}}"#);
        let store = RuleStore::new(Rc::clone(&backend));
        let result = store.create_from_draft(draft("wave", "callback")).await;
        assert!(matches!(result, Err(RuleError::MissingField { kind: ActionKind::Callback, .. })));
        assert!(backend.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_create_surfaces_server_message() {
        let backend = FakeBackend::with_listing(r#"{"mappings": {}}"#);
        *backend.fail_with.borrow_mut() = Some(BackendError::Status {
            code: 500,
            detail: Some("could not save mapping".into()),
        });
        let store = RuleStore::new(Rc::clone(&backend));
        let mut d = draft("wave", "log");
        d.message = Some("hello".into());
        match store.create_from_draft(d).await {
            Err(RuleError::Rejected(msg)) => assert_eq!(msg, "could not save mapping"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(store.mappings().is_empty());
    }

    #[tokio::test]
    async fn test_create_generic_message_without_detail() {
        let backend = FakeBackend::with_listing(r#"{"mappings": {}}"#);
        *backend.fail_with.borrow_mut() = Some(BackendError::Transport("refused".into()));
        let store = RuleStore::new(Rc::clone(&backend));
        let m = GestureMapping::new("wave", Action::Keyboard { key: "n".into() }, None).unwrap();
        match store.create_mapping(&m).await {
            Err(RuleError::Rejected(msg)) => assert_eq!(msg, "failed to create mapping"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_success_sends_once() {
        let backend = FakeBackend::with_listing(r#"{"mappings": {}}"#);
        let store = RuleStore::new(Rc::clone(&backend));
        let mut d = draft("wave", "log");
        d.message = Some("hello".into());
        store.create_from_draft(d).await.unwrap();
        assert_eq!(*backend.sent.borrow(), vec![("POST".to_string(), "wave".to_string())]);
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let backend = FakeBackend::with_listing(r#"{"mappings": {}}"#);
        let store = RuleStore::new(Rc::clone(&backend));

        let outcome = store.delete_mapping("clap", &mut false).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Cancelled);
        assert!(backend.sent.borrow().is_empty());

        let outcome = store.delete_mapping("clap", &mut true).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert_eq!(*backend.sent.borrow(), vec![("DELETE".to_string(), "clap".to_string())]);
    }

    #[tokio::test]
    async fn test_repeated_delete_follows_backend() {
        let backend = FakeBackend::with_listing(r#"{"mappings": {}}"#);
        let store = RuleStore::new(Rc::clone(&backend));
        store.delete_mapping("clap", &mut true).await.unwrap();
        *backend.fail_with.borrow_mut() = Some(BackendError::Status {
            code: 404,
            detail: Some("gesture 'clap' not found".into()),
        });
        match store.delete_mapping("clap", &mut true).await {
            Err(RuleError::Rejected(msg)) => assert_eq!(msg, "gesture 'clap' not found"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(backend.sent.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_stored_invalid_mapping_not_resent() {
        let backend = FakeBackend::with_listing(r#"{"mappings": {"nod": {"type": "log"}}}"#);
        let mut store = RuleStore::new(Rc::clone(&backend));
        store.load_mappings().await.unwrap();
        let nod = store.get("nod").unwrap().clone();
        assert!(matches!(
            store.update_mapping(&nod).await,
            Err(RuleError::MissingField { kind: ActionKind::Log, .. })
        ));
        assert!(backend.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_update_from_draft_validates_first() {
        let backend = FakeBackend::with_listing(r#"{"mappings": {}}"#);
        let store = RuleStore::new(Rc::clone(&backend));
        assert!(store.update_from_draft(draft("clap", "keyboard")).await.is_err());
        assert!(backend.sent.borrow().is_empty());

        let mut d = draft("clap", "keyboard");
        d.key = Some("space".into());
        store.update_from_draft(d).await.unwrap();
        assert_eq!(*backend.sent.borrow(), vec![("PUT".to_string(), "clap".to_string())]);
    }

    #[tokio::test]
    async fn test_update_and_fetch() {
        let backend = FakeBackend::with_listing(r#"{"mappings": {}}"#);
        let store = RuleStore::new(Rc::clone(&backend));
        let m = GestureMapping::new("clap", Action::Log { message: "pause".into() }, None).unwrap();
        store.update_mapping(&m).await.unwrap();
        assert_eq!(*backend.sent.borrow(), vec![("PUT".to_string(), "clap".to_string())]);

        let fetched = store.fetch_mapping("jump").await.unwrap();
        assert_eq!(fetched.action(), &Action::Keyboard { key: "space".into() });
    }
}
