use percent_encoding::percent_decode_str;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::benchmark::Industry;
use crate::campaign::CampaignContext;
use crate::error::PreflightResult;
use crate::policy::PolicyVerdict;

pub const INVALID_FORMAT_REASON: &str = "Invalid response format from Policy Check";

/// 审核服务配置
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewerConfig {
    /// 视频审核 webhook
    pub video_webhook_url: Option<String>,
    /// 落地页审核 webhook
    pub lp_webhook_url: Option<String>,
    /// 视频审核超时
    pub video_timeout: Duration,
    /// 落地页审核超时
    pub lp_timeout: Duration,
    /// 未配置 webhook 时返回模拟的通过结论（仅用于本地联调）
    pub allow_mock: bool,
}

impl Default for ReviewerConfig {
    fn default() -> Self {
        Self {
            video_webhook_url: None,
            lp_webhook_url: None,
            video_timeout: Duration::from_secs(60),
            lp_timeout: Duration::from_secs(30),
            allow_mock: false,
        }
    }
}

/// 单次审核调用的失败原因
#[derive(Debug, Error)]
enum ReviewError {
    #[error("reviewer endpoint not configured")]
    NotConfigured,

    #[error("{0}")]
    Network(#[from] reqwest::Error),

    #[error("reviewer returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed response body: {0}")]
    Json(#[from] serde_json::Error),
}

/// 审核的对象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Surface {
    Video,
    LandingPage,
}

impl Surface {
    fn failure_prefix(&self) -> &'static str {
        match self {
            Surface::Video => "Video Analysis Failed",
            Surface::LandingPage => "LP Analysis Failed",
        }
    }

    fn mock_verdict(&self) -> PolicyVerdict {
        match self {
            Surface::Video => PolicyVerdict::safe("[MOCK-VIDEO] Policy Check Passed"),
            Surface::LandingPage => PolicyVerdict::safe("[MOCK-LP] Landing Page Safe"),
        }
    }

    fn failed(&self, error: ReviewError) -> PolicyVerdict {
        PolicyVerdict::unsafe_because(format!("{}: {}", self.failure_prefix(), error))
    }
}

#[derive(Debug, Serialize)]
struct CreativeVideo<'a> {
    video_preview_url: &'a str,
    video_id: &'a str,
}

/// 视频审核请求体
#[derive(Debug, Serialize)]
struct VideoReviewRequest<'a> {
    creative_videos: Vec<CreativeVideo<'a>>,
    video_ids: Vec<&'a str>,
    landing_page_url: &'a str,
    country: Vec<&'a str>,
    age_groups: Vec<String>,
    industry: Industry,
    target_cpa: f64,
    budget: f64,
    create_time: String,
}

/// 落地页审核请求体
#[derive(Debug, Serialize)]
struct LandingPageReviewRequest<'a> {
    #[serde(rename = "landingPages")]
    landing_pages: Vec<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoReview {
    #[serde(rename = "TextAnalysisResult")]
    text_analysis_result: Option<String>,
    #[serde(rename = "Recommendation")]
    recommendation: Option<String>,
    #[serde(rename = "ViolationDetails")]
    violation_details: Option<String>,
    #[serde(rename = "TextViolationDetails")]
    text_violation_details: Option<String>,
    #[serde(rename = "ViolationType")]
    violation_type: Option<String>,
    #[serde(rename = "TextViolationType")]
    text_violation_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LandingPageReview {
    #[serde(rename = "AnalysisResult")]
    analysis_result: Option<String>,
    #[serde(rename = "ViolationDetails")]
    violation_details: Option<String>,
    #[serde(rename = "Recommendation")]
    recommendation: Option<String>,
}

/// 视频审核响应：按顺序匹配，都不匹配时落入 Unrecognized
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VideoReviewBody {
    Reviews { creative_videos_review: Vec<VideoReview> },
    Direct { policy: PolicyVerdict },
    Unrecognized(serde_json::Value),
}

/// 落地页审核响应
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LandingPageReviewBody {
    Reviews { landing_pages_review: Vec<LandingPageReview> },
    Direct { policy: PolicyVerdict },
    Unrecognized(serde_json::Value),
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn video_verdict(body: VideoReviewBody) -> PolicyVerdict {
    let review = match body {
        VideoReviewBody::Direct { policy } => return policy,
        VideoReviewBody::Reviews { creative_videos_review } => creative_videos_review.into_iter().next(),
        VideoReviewBody::Unrecognized(_) => None,
    };
    let Some(review) = review else {
        return PolicyVerdict::unsafe_because(INVALID_FORMAT_REASON);
    };

    let analysis_result = review.text_analysis_result.as_deref().unwrap_or("Unknown");
    let recommendation = review.recommendation.as_deref().unwrap_or_default();

    if analysis_result == "Non-Compliant" || recommendation.contains("Reject") {
        let violation_type = non_empty(&review.violation_type)
            .or(non_empty(&review.text_violation_type))
            .unwrap_or("Policy Violation");
        let reason = match non_empty(&review.violation_details).or(non_empty(&review.text_violation_details)) {
            Some(details) => format!("{}: {}", violation_type, details),
            None => violation_type.to_string(),
        };
        PolicyVerdict::unsafe_because(reason)
    } else if analysis_result == "Flagged for Review" {
        PolicyVerdict::unsafe_because("Flagged for Manual Review")
    } else {
        PolicyVerdict::safe("Policy Check Passed")
    }
}

fn landing_page_verdict(body: LandingPageReviewBody) -> PolicyVerdict {
    let review = match body {
        LandingPageReviewBody::Direct { policy } => return policy,
        LandingPageReviewBody::Reviews { landing_pages_review } => landing_pages_review.into_iter().next(),
        LandingPageReviewBody::Unrecognized(_) => None,
    };
    let Some(review) = review else {
        return PolicyVerdict::unsafe_because(INVALID_FORMAT_REASON);
    };

    let status = review.analysis_result.as_deref().unwrap_or("Unknown");
    if status.trim().eq_ignore_ascii_case("compliant") {
        PolicyVerdict::safe("Landing Page Compliant")
    } else {
        let reason = non_empty(&review.violation_details)
            .or(non_empty(&review.recommendation))
            .unwrap_or("Policy Violation");
        PolicyVerdict::unsafe_because(reason)
    }
}

/// 从视频地址提取视频 ID
///
/// 优先使用 `vid` 查询参数，其次是路径最后一段（去掉扩展名）。
pub fn extract_video_id(video_url: &str) -> String {
    const UNKNOWN: &str = "unknown_video_id";

    let Ok(url) = Url::parse(video_url) else {
        return UNKNOWN.to_string();
    };

    if let Some((_, vid)) = url.query_pairs().find(|(k, _)| k == "vid") {
        if !vid.is_empty() {
            return vid.into_owned();
        }
    }

    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|last| percent_decode_str(last).decode_utf8_lossy().into_owned())
        .and_then(|name| name.split('.').next().map(str::to_string))
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// 两个外部审核服务的 HTTP 客户端
///
/// 每次调用单独计时、不重试；任何失败都转换为不通过的结论，不向调用方返回错误。
#[derive(Debug, Clone)]
pub struct PolicyClient {
    http: Client,
    config: ReviewerConfig,
}

impl PolicyClient {
    pub fn new(config: ReviewerConfig) -> PreflightResult<Self> {
        let http = Client::builder().build()?;
        Ok(Self { http, config })
    }

    /// 审核视频素材
    pub async fn review_video(&self, video_url: &str, campaign: &CampaignContext) -> PolicyVerdict {
        let surface = Surface::Video;
        let Some(endpoint) = self.config.video_webhook_url.as_deref() else {
            return self.unconfigured(surface);
        };

        let video_id = extract_video_id(video_url);
        let payload = VideoReviewRequest {
            creative_videos: vec![CreativeVideo {
                video_preview_url: video_url,
                video_id: &video_id,
            }],
            video_ids: vec![&video_id],
            landing_page_url: campaign.landing_page_url.as_deref().unwrap_or_default(),
            country: vec![&campaign.country],
            age_groups: campaign.age_groups(),
            industry: campaign.industry,
            target_cpa: campaign.target_cpa,
            budget: campaign.budget,
            create_time: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };

        info!("[视频审核] 提交视频: {} (id={})", video_url, video_id);
        match self.post_json(endpoint, &payload, self.config.video_timeout).await {
            Ok(value) => {
                let body = serde_json::from_value::<VideoReviewBody>(value)
                    .unwrap_or_else(|e| VideoReviewBody::Unrecognized(serde_json::Value::String(e.to_string())));
                let verdict = video_verdict(body);
                info!("[视频审核] 结论: safe={}, reason={}", verdict.is_safe, verdict.reason);
                verdict
            }
            Err(e) => {
                warn!("[视频审核] 调用失败: {}", e);
                surface.failed(e)
            }
        }
    }

    /// 审核落地页
    pub async fn review_landing_page(&self, landing_page_url: &str) -> PolicyVerdict {
        let surface = Surface::LandingPage;
        let Some(endpoint) = self.config.lp_webhook_url.as_deref() else {
            return self.unconfigured(surface);
        };

        let payload = LandingPageReviewRequest {
            landing_pages: vec![landing_page_url],
        };

        info!("[落地页审核] 提交落地页: {}", landing_page_url);
        match self.post_json(endpoint, &payload, self.config.lp_timeout).await {
            Ok(value) => {
                let body = serde_json::from_value::<LandingPageReviewBody>(value)
                    .unwrap_or_else(|e| LandingPageReviewBody::Unrecognized(serde_json::Value::String(e.to_string())));
                let verdict = landing_page_verdict(body);
                info!("[落地页审核] 结论: safe={}, reason={}", verdict.is_safe, verdict.reason);
                verdict
            }
            Err(e) => {
                warn!("[落地页审核] 调用失败: {}", e);
                surface.failed(e)
            }
        }
    }

    fn unconfigured(&self, surface: Surface) -> PolicyVerdict {
        if self.config.allow_mock {
            warn!("{:?} 审核 webhook 未配置，使用模拟结论", surface);
            surface.mock_verdict()
        } else {
            surface.failed(ReviewError::NotConfigured)
        }
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        payload: &T,
        timeout: Duration,
    ) -> Result<serde_json::Value, ReviewError> {
        let response = self
            .http
            .post(endpoint)
            .json(payload)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ReviewError::Status { status, body: text });
        }

        debug!("审核服务原始响应: {}", text);
        Ok(serde_json::from_str(&text)?)
    }
}
