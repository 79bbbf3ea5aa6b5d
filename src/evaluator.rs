use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::benchmark::BenchmarkTable;
use crate::campaign::CampaignContext;
use crate::config::{AppConfig, DEFAULT_MAX_UPLOAD_MB};
use crate::downloader::{default_download_dir, download_video};
use crate::error::{PreflightError, PreflightResult};
use crate::metadata::{CreativeAnalysis, CreativeDetails, CreativeMetrics};
use crate::policy::{combine_verdicts, PolicyVerdict};
use crate::policy_client::PolicyClient;
use crate::processor::{analyze_video_file, AnalysisConfig};
use crate::scoring::{self, Rating};

/// 待评估的视频
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInput {
    /// 审核服务能访问的地址
    pub public_url: String,
    /// 本地副本，存在时才做创意分析
    pub local_path: Option<PathBuf>,
    /// 本地副本是为分析临时下载的，评估结束后删除
    downloaded: bool,
}

impl VideoInput {
    pub fn new(public_url: impl Into<String>, local_path: Option<PathBuf>) -> Self {
        Self {
            public_url: public_url.into(),
            local_path,
            downloaded: false,
        }
    }

    /// 只有本地文件时，用 file:// 地址提交审核（仅命令行使用）
    pub async fn from_local(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let absolute = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf());
        let public_url = Url::from_file_path(&absolute)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| absolute.display().to_string());
        Self::new(public_url, Some(path.to_path_buf()))
    }
}

/// 上传目录中的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// 规范化后的绝对路径
    pub path: PathBuf,
    /// 相对上传目录的路径，使用 `/` 分隔
    pub relative: String,
}

/// 一次评估的完整报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub benchmark_score: f64,
    pub policy_check: PolicyVerdict,
    pub creative_metrics: CreativeMetrics,
    pub dna_score: f64,
    pub predictive_score: f64,
    pub final_rating: Rating,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creative_details: Option<CreativeDetails>,
}

/// 预检评估器：并发调用两个审核服务和本地创意分析，再合并打分
#[derive(Debug, Clone)]
pub struct Evaluator {
    analysis: AnalysisConfig,
    benchmarks: Arc<BenchmarkTable>,
    reviewer: PolicyClient,
    http: Client,
    upload_dir: PathBuf,
    download_dir: PathBuf,
    max_download_bytes: u64,
}

impl Evaluator {
    pub fn new(
        analysis: AnalysisConfig,
        benchmarks: BenchmarkTable,
        reviewer: PolicyClient,
        upload_dir: impl Into<PathBuf>,
    ) -> PreflightResult<Self> {
        Ok(Self {
            analysis,
            benchmarks: Arc::new(benchmarks),
            reviewer,
            http: Client::builder().build()?,
            upload_dir: upload_dir.into(),
            download_dir: default_download_dir(),
            max_download_bytes: DEFAULT_MAX_UPLOAD_MB as u64 * 1024 * 1024,
        })
    }

    /// 远程视频的临时下载目录
    pub fn with_download_dir(mut self, download_dir: impl Into<PathBuf>) -> Self {
        self.download_dir = download_dir.into();
        self
    }

    /// 远程视频的大小上限（字节）
    pub fn with_download_limit(mut self, max_bytes: u64) -> Self {
        self.max_download_bytes = max_bytes;
        self
    }

    pub fn from_config(config: &AppConfig) -> PreflightResult<Self> {
        Ok(Self::new(
            config.analysis.clone(),
            config.benchmark_table(),
            PolicyClient::new(config.reviewers.clone())?,
            config.server.upload_dir.clone(),
        )?
        .with_download_limit(config.server.max_upload_mb as u64 * 1024 * 1024))
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// 把调用方给出的路径限定在上传目录内的普通文件
    ///
    /// 相对路径按上传目录解析；目录外的路径、不存在的路径和 ffmpeg 协议串都视为无效输入。
    pub async fn resolve_upload(&self, path: &Path) -> PreflightResult<UploadedFile> {
        let invalid = || PreflightError::InvalidInput(format!("video_path must name an uploaded file: {}", path.display()));

        let root = tokio::fs::canonicalize(&self.upload_dir).await.map_err(|_| invalid())?;
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        let resolved = tokio::fs::canonicalize(&candidate).await.map_err(|_| invalid())?;

        let is_file = tokio::fs::metadata(&resolved)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        let relative = match resolved.strip_prefix(&root) {
            Ok(relative) if is_file => relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            _ => return Err(invalid()),
        };

        Ok(UploadedFile { path: resolved, relative })
    }

    /// 远程视频：下载到临时目录供本地分析，失败时只做审核
    pub async fn resolve_remote_video(&self, video_url: &str) -> VideoInput {
        match download_video(&self.http, video_url, &self.download_dir, self.max_download_bytes).await {
            Ok(path) => VideoInput {
                public_url: video_url.to_string(),
                local_path: Some(path),
                downloaded: true,
            },
            Err(e) => {
                warn!("⚠️ 视频下载失败，跳过本地创意分析: {:#}", e);
                VideoInput::new(video_url, None)
            }
        }
    }

    /// 评估一次投放
    pub async fn evaluate(&self, campaign: CampaignContext, video: Option<VideoInput>) -> PreflightResult<AnalysisReport> {
        let total_start = Instant::now();
        let campaign = campaign.validate()?;

        if video.is_none() && campaign.landing_page_url.is_none() {
            return Err(PreflightError::MissingInput);
        }

        info!(
            "🚀 [预检] 行业: {}, 目标 CPA: {}, 国家: {}, 视频: {}, 落地页: {}",
            campaign.industry,
            campaign.target_cpa,
            campaign.country,
            video.as_ref().map(|v| v.public_url.as_str()).unwrap_or("-"),
            campaign.landing_page_url.as_deref().unwrap_or("-")
        );

        let benchmark_score = self.benchmarks.score(campaign.target_cpa, campaign.industry);

        let video_review = async {
            match &video {
                Some(v) => Some(self.reviewer.review_video(&v.public_url, &campaign).await),
                None => None,
            }
        };
        let lp_review = async {
            match campaign.landing_page_url.as_deref() {
                Some(url) => Some(self.reviewer.review_landing_page(url).await),
                None => None,
            }
        };
        let local_analysis = self.analyze_local(video.as_ref().and_then(|v| v.local_path.clone()));

        let (video_verdict, lp_verdict, creative) = tokio::join!(video_review, lp_review, local_analysis);

        // 临时下载的视频分析完即删除
        if let Some(VideoInput { local_path: Some(path), downloaded: true, .. }) = &video {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!("删除临时视频失败: {}: {}", path.display(), e);
            }
        }

        let policy = combine_verdicts(video_verdict.as_ref(), lp_verdict.as_ref());
        let metrics = creative.as_ref().map(|c| c.metrics);
        let result = scoring::score(metrics.as_ref(), benchmark_score, &policy);

        info!(
            "✅ [预检] 完成，耗时 {:.2}s: 基准 {:.2}, DNA {:.2}, 预测 {:.2}, 评级 {}",
            total_start.elapsed().as_secs_f64(),
            result.benchmark_score,
            result.dna_score,
            result.predictive_score,
            result.rating
        );

        Ok(AnalysisReport {
            benchmark_score: result.benchmark_score,
            message: format!("Analysis Complete. {}", policy.reason),
            policy_check: policy,
            creative_metrics: metrics.unwrap_or_default(),
            dna_score: result.dna_score,
            predictive_score: result.predictive_score,
            final_rating: result.rating,
            creative_details: creative.map(|c| c.details),
        })
    }

    /// 在阻塞线程池上解码视频
    async fn analyze_local(&self, path: Option<PathBuf>) -> Option<CreativeAnalysis> {
        let path = path?;
        let config = self.analysis.clone();

        match tokio::task::spawn_blocking(move || analyze_video_file(&path, &config)).await {
            Ok(Ok(analysis)) => Some(analysis),
            Ok(Err(e)) => {
                warn!("⚠️ 本地创意分析失败，按无指标处理: {:#}", e);
                None
            }
            Err(e) => {
                error!("❌ 创意分析任务异常退出: {}", e);
                None
            }
        }
    }
}
