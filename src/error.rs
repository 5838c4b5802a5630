use thiserror::Error;

/// バックエンド呼び出しの失敗
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {code}{}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Status { code: u16, detail: Option<String> },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

impl BackendError {
    /// サーバーが拒否時に付けたメッセージ
    pub fn server_detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = BackendError::Status {
            code: 404,
            detail: Some("gesture not found".into()),
        };
        assert_eq!(err.to_string(), "HTTP 404: gesture not found");
        let bare = BackendError::Status { code: 500, detail: None };
        assert_eq!(bare.to_string(), "HTTP 500");
    }

    #[test]
    fn test_server_detail() {
        let err = BackendError::Status {
            code: 400,
            detail: Some("bad".into()),
        };
        assert_eq!(err.server_detail(), Some("bad"));
        assert_eq!(BackendError::Transport("x".into()).server_detail(), None);
    }
}
