//! 認識バックエンドへのリクエスト/レスポンス呼び出し
//!
//! 各コンポーネントは [`Backend`] を通して呼び出す。[`HttpBackend`] は `ureq` による
//! HTTP 実装で、呼び出しはブロッキングプールで実行し、イベントループは
//! JoinHandle を待つだけ

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::BackendError;
use crate::protocol::{
    ErrorBody, HealthStatus, MappingChangeResponse, MappingLookupResponse, MappingRequest,
    MappingsResponse, RecognizeRequest, RecognizeResponse, SequenceListing, SequenceResponse,
    SequenceSubmission,
};

pub type BackendResult<T> = Result<T, BackendError>;

/// クライアントがバックエンドに要求する操作
#[allow(async_fn_in_trait)]
pub trait Backend {
    /// `POST /recognize`
    async fn recognize(&self, request: &RecognizeRequest) -> BackendResult<RecognizeResponse>;

    /// `GET /settings/gestures`
    async fn list_mappings(&self) -> BackendResult<MappingsResponse>;

    /// `GET /settings/gestures/{gesture}`
    async fn get_mapping(&self, gesture: &str) -> BackendResult<MappingLookupResponse>;

    /// `POST /settings/gestures`
    async fn create_mapping(&self, request: &MappingRequest) -> BackendResult<MappingChangeResponse>;

    /// `PUT /settings/gestures/{gesture}`
    async fn update_mapping(&self, request: &MappingRequest) -> BackendResult<MappingChangeResponse>;

    /// `DELETE /settings/gestures/{gesture}`
    async fn delete_mapping(&self, gesture: &str) -> BackendResult<MappingChangeResponse>;

    /// `POST /record/sequence`
    async fn submit_sequence(&self, submission: &SequenceSubmission) -> BackendResult<SequenceResponse>;

    /// `GET /record/sequences/{label}`
    async fn list_sequences(&self, label: &str) -> BackendResult<SequenceListing>;

    /// `GET /health`
    async fn health(&self) -> BackendResult<HealthStatus>;
}

/// [`Backend`] の HTTP 実装
#[derive(Clone)]
pub struct HttpBackend {
    base: Url,
    agent: ureq::Agent,
}

impl HttpBackend {
    pub fn new(api_url: &str, timeout: Duration) -> BackendResult<Self> {
        let base = Url::parse(api_url).map_err(|e| BackendError::Endpoint(format!("{api_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(BackendError::Endpoint(api_url.to_string()));
        }
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self { base, agent })
    }

    /// パスセグメントをそれぞれパーセントエンコードした絶対 URL
    pub fn endpoint(&self, segments: &[&str]) -> BackendResult<String> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| BackendError::Endpoint(self.base.to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url.to_string())
    }

    async fn call<R>(&self, method: &'static str, segments: &[&str], body: Option<Value>) -> BackendResult<R>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let url = self.endpoint(segments)?;
        let agent = self.agent.clone();
        debug!(method, %url, "backend request");

        tokio::task::spawn_blocking(move || {
            let request = agent.request(method, &url);
            let response = match body {
                Some(body) => request.send_json(body),
                None => request.call(),
            };
            match response {
                Ok(resp) => resp
                    .into_json::<R>()
                    .map_err(|e| BackendError::Decode(e.to_string())),
                Err(ureq::Error::Status(code, resp)) => {
                    let detail = resp.into_json::<ErrorBody>().ok().and_then(|b| b.message());
                    Err(BackendError::Status { code, detail })
                }
                Err(e) => Err(BackendError::Transport(e.to_string())),
            }
        })
        .await
        .map_err(|e| BackendError::Transport(format!("request task failed: {e}")))?
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> BackendResult<Value> {
    serde_json::to_value(value).map_err(|e| BackendError::Decode(e.to_string()))
}

impl Backend for HttpBackend {
    async fn recognize(&self, request: &RecognizeRequest) -> BackendResult<RecognizeResponse> {
        self.call("POST", &["recognize"], Some(to_body(request)?)).await
    }

    async fn list_mappings(&self) -> BackendResult<MappingsResponse> {
        self.call("GET", &["settings", "gestures"], None).await
    }

    async fn get_mapping(&self, gesture: &str) -> BackendResult<MappingLookupResponse> {
        self.call("GET", &["settings", "gestures", gesture], None).await
    }

    async fn create_mapping(&self, request: &MappingRequest) -> BackendResult<MappingChangeResponse> {
        self.call("POST", &["settings", "gestures"], Some(to_body(request)?)).await
    }

    async fn update_mapping(&self, request: &MappingRequest) -> BackendResult<MappingChangeResponse> {
        let body = to_body(request)?;
        self.call("PUT", &["settings", "gestures", &request.gesture], Some(body)).await
    }

    async fn delete_mapping(&self, gesture: &str) -> BackendResult<MappingChangeResponse> {
        self.call("DELETE", &["settings", "gestures", gesture], None).await
    }

    async fn submit_sequence(&self, submission: &SequenceSubmission) -> BackendResult<SequenceResponse> {
        self.call("POST", &["record", "sequence"], Some(to_body(submission)?)).await
    }

    async fn list_sequences(&self, label: &str) -> BackendResult<SequenceListing> {
        self.call("GET", &["record", "sequences", label], None).await
    }

    async fn health(&self) -> BackendResult<HealthStatus> {
        self.call("GET", &["health"], None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(url: &str) -> HttpBackend {
        HttpBackend::new(url, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let b = backend("http://127.0.0.1:8000");
        assert_eq!(
            b.endpoint(&["settings", "gestures"]).unwrap(),
            "http://127.0.0.1:8000/settings/gestures"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let b = backend("http://host/api/");
        assert_eq!(b.endpoint(&["recognize"]).unwrap(), "http://host/api/recognize");
    }

    #[test]
    fn test_endpoint_encodes_gesture_name() {
        let b = backend("http://host");
        assert_eq!(
            b.endpoint(&["settings", "gestures", "wave left/right"]).unwrap(),
            "http://host/settings/gestures/wave%20left%2Fright"
        );
    }

    #[test]
    fn test_rejects_invalid_base() {
        assert!(HttpBackend::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpBackend::new("mailto:someone@example.com", Duration::from_secs(1)).is_err());
    }
}
