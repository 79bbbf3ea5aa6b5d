use axum::{
    extract::{DefaultBodyLimit, Json, Multipart, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::campaign::CampaignContext;
use crate::config::AppConfig;
use crate::error::{PreflightError, PreflightResult};
use crate::evaluator::{AnalysisReport, Evaluator, VideoInput};

type HandlerError = (StatusCode, String);

/// 路由共享状态
#[derive(Debug, Clone)]
pub struct AppState {
    pub evaluator: Arc<Evaluator>,
    /// 对外地址，不带结尾的 `/`
    pub public_base_url: String,
    /// 请求体大小上限（字节）
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> PreflightResult<Self> {
        Ok(Self {
            evaluator: Arc::new(Evaluator::from_config(config)?),
            public_base_url: config.server.public_base_url.clone(),
            max_body_bytes: config.server.max_upload_mb * 1024 * 1024,
        })
    }

    fn upload_url(&self, file_name: &str) -> String {
        format!("{}/static/uploads/{}", self.public_base_url, file_name)
    }
}

/// 构建全部路由
pub fn router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.evaluator.upload_dir());
    let body_limit = state.max_body_bytes;

    Router::new()
        .route("/", get(health_check))
        .route("/api/health", get(health_check))
        .route("/api/analyze", post(handle_analyze_form))
        .route("/api/analyze/json", post(handle_analyze_json))
        .route("/api/webhook/callback", post(handle_webhook_callback))
        .nest_service("/static/uploads", uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn reject(e: PreflightError) -> HandlerError {
    if e.is_client_error() {
        warn!("请求无效: {}", e);
        (StatusCode::BAD_REQUEST, e.to_string())
    } else {
        error!("处理请求失败: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

/// 健康检查
pub async fn health_check(State(state): State<AppState>) -> ResponseJson<Value> {
    ResponseJson(json!({
        "status": "ok",
        "service": "ad-preflight",
        "upload_dir": state.evaluator.upload_dir().display().to_string(),
    }))
}

/// 上传的视频文件，URL 优先时不落盘
struct UploadedVideo {
    file_name: Option<String>,
    bytes: Vec<u8>,
}

/// 表单提交：投放参数 + 视频文件或视频地址
pub async fn handle_analyze_form(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<ResponseJson<AnalysisReport>, HandlerError> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut upload: Option<UploadedVideo> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("表单解析失败: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "video_file" {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, format!("读取上传文件失败: {}", e)))?;
            if !bytes.is_empty() {
                upload = Some(UploadedVideo {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, format!("读取表单字段失败: {}", e)))?;
            fields.insert(name, value);
        }
    }

    let campaign = campaign_from_form(&fields).map_err(reject)?;

    let video_url = fields
        .get("video_url_input")
        .map(|v| v.trim())
        .filter(|v| !v.is_empty());

    let video = match (video_url, upload) {
        (Some(url), _) => {
            info!("使用视频地址: {}", url);
            Some(state.evaluator.resolve_remote_video(url).await)
        }
        (None, Some(upload)) => {
            let path = save_upload(state.evaluator.upload_dir(), &upload)
                .await
                .map_err(reject)?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            info!("已保存上传视频: {}", path.display());
            Some(VideoInput::new(state.upload_url(&file_name), Some(path)))
        }
        (None, None) => None,
    };

    let report = state.evaluator.evaluate(campaign, video).await.map_err(reject)?;
    Ok(ResponseJson(report))
}

fn campaign_from_form(fields: &HashMap<String, String>) -> PreflightResult<CampaignContext> {
    let required = |key: &str| {
        fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PreflightError::InvalidInput(format!("missing field: {}", key)))
    };
    let number = |key: &str| {
        required(key)?
            .parse::<f64>()
            .map_err(|_| PreflightError::InvalidInput(format!("{} must be a number", key)))
    };
    let optional = |key: &str| fields.get(key).cloned();

    Ok(CampaignContext {
        industry: required("industry_id")?.parse()?,
        target_cpa: number("target_cpa")?,
        country: required("country")?.to_string(),
        budget: number("budget")?,
        landing_page_url: optional("landing_page_url"),
        audience_age: optional("audience_age"),
        audience_gender: optional("audience_gender"),
    })
}

/// 保存为 `<uuid>.<ext>`，扩展名不可用时为 mp4
async fn save_upload(upload_dir: &Path, upload: &UploadedVideo) -> PreflightResult<PathBuf> {
    let ext = upload
        .file_name
        .as_deref()
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_lowercase)
        .unwrap_or_else(|| "mp4".to_string());

    tokio::fs::create_dir_all(upload_dir).await?;
    let path = upload_dir.join(format!("{}.{}", Uuid::new_v4(), ext));
    tokio::fs::write(&path, &upload.bytes).await?;
    Ok(path)
}

/// JSON 提交
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub campaign: CampaignContext,
    /// 审核服务可访问的视频地址
    #[serde(default)]
    pub video_url: Option<String>,
    /// 上传目录中的视频，绝对路径或相对上传目录的路径
    #[serde(default)]
    pub video_path: Option<PathBuf>,
}

pub async fn handle_analyze_json(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<ResponseJson<AnalysisReport>, HandlerError> {
    let video_url = request
        .video_url
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let video = match (request.video_path, video_url) {
        (Some(path), url) => {
            let upload = state.evaluator.resolve_upload(&path).await.map_err(reject)?;
            let public_url = url.unwrap_or_else(|| state.upload_url(&upload.relative));
            Some(VideoInput::new(public_url, Some(upload.path)))
        }
        (None, Some(url)) => Some(state.evaluator.resolve_remote_video(&url).await),
        (None, None) => None,
    };

    let report = state
        .evaluator
        .evaluate(request.campaign, video)
        .await
        .map_err(reject)?;
    Ok(ResponseJson(report))
}

/// 审核服务的异步回调，只记录日志
pub async fn handle_webhook_callback(Json(payload): Json<Value>) -> ResponseJson<Value> {
    info!("收到审核回调: {}", payload);
    ResponseJson(json!({ "status": "received" }))
}
