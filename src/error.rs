use thiserror::Error;

pub type PreflightResult<T> = Result<T, PreflightError>;

/// 调用方可见的错误
///
/// 审核服务和视频解码的失败在各自模块内降级处理，不会以错误形式出现。
#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("Please provide either a Video or a Landing Page URL.")]
    MissingInput,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl PreflightError {
    /// 是否由请求内容引起（对应 HTTP 400）
    pub fn is_client_error(&self) -> bool {
        matches!(self, PreflightError::MissingInput | PreflightError::InvalidInput(_))
    }
}
