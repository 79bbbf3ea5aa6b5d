use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::benchmark::{BenchmarkTable, Industry};
use crate::policy_client::ReviewerConfig;
use crate::processor::AnalysisConfig;

pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 200;

/// HTTP 服务配置
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// 上传和下载的视频保存目录
    pub upload_dir: PathBuf,
    /// 对外地址，用于拼接上传文件的公网链接
    pub public_base_url: String,
    /// 单次上传大小上限（MB）
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
        }
    }
}

fn default_upload_dir() -> PathBuf {
    env::temp_dir().join("ad-preflight").join("uploads")
}

/// 完整的应用配置
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub reviewers: ReviewerConfig,
    pub server: ServerConfig,
    /// 覆盖默认行业平均 CPA 的条目
    pub benchmark_overrides: HashMap<Industry, f64>,
    /// 日志级别（trace, debug, info, warn, error）
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            reviewers: ReviewerConfig::default(),
            server: ServerConfig::default(),
            benchmark_overrides: HashMap::new(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn benchmark_table(&self) -> BenchmarkTable {
        BenchmarkTable::with_overrides(&self.benchmark_overrides)
    }
}

/// 命令行覆盖项
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub scene_threshold: Option<f64>,
    pub frame_step: Option<u64>,
}

/// INI 文件中读到的值，未出现的键为 None
#[derive(Debug, Clone, Default)]
struct FileConfig {
    scene_threshold: Option<f64>,
    frame_step: Option<u64>,
    thumbnail_size: Option<u32>,
    video_webhook_url: Option<String>,
    lp_webhook_url: Option<String>,
    video_timeout_secs: Option<u64>,
    lp_timeout_secs: Option<u64>,
    allow_mock: Option<bool>,
    upload_dir: Option<PathBuf>,
    public_base_url: Option<String>,
    max_upload_mb: Option<usize>,
    log_level: Option<String>,
    benchmarks: HashMap<Industry, f64>,
}

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从多个源加载配置，优先级：命令行参数 > 环境变量 > 配置文件 > 默认值
    pub fn load(config_file: Option<&Path>, overrides: &CliOverrides) -> Result<AppConfig> {
        Self::load_with_env(config_file, overrides, |key| env::var(key).ok())
    }

    /// 同 [`ConfigLoader::load`]，环境变量通过 `lookup` 读取
    pub fn load_with_env<F>(config_file: Option<&Path>, overrides: &CliOverrides, lookup: F) -> Result<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 1. 配置文件：显式指定时必须存在，否则尝试默认位置
        let file = match config_file {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_from_default_locations().unwrap_or_default(),
        };

        // 2. 环境变量
        let env_str = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let env_parse = |key: &str| env_str(key).and_then(|v| v.parse::<f64>().ok());
        let env_u64 = |key: &str| env_str(key).and_then(|v| v.parse::<u64>().ok());

        // 3. 合并
        let defaults = AppConfig::default();

        let analysis = AnalysisConfig {
            scene_threshold: overrides
                .scene_threshold
                .or(env_parse("PREFLIGHT_SCENE_THRESHOLD"))
                .or(file.scene_threshold)
                .unwrap_or(defaults.analysis.scene_threshold),
            frame_step: overrides
                .frame_step
                .or(env_u64("PREFLIGHT_FRAME_STEP"))
                .or(file.frame_step)
                .unwrap_or(defaults.analysis.frame_step),
            thumbnail_size: env_str("PREFLIGHT_THUMBNAIL_SIZE")
                .and_then(|v| v.parse().ok())
                .or(file.thumbnail_size)
                .unwrap_or(defaults.analysis.thumbnail_size),
        };

        let reviewers = ReviewerConfig {
            video_webhook_url: env_str("N8N_VIDEO_WEBHOOK_URL").or(file.video_webhook_url),
            lp_webhook_url: env_str("N8N_LP_WEBHOOK_URL").or(file.lp_webhook_url),
            video_timeout: env_u64("PREFLIGHT_VIDEO_TIMEOUT_SECS")
                .or(file.video_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.reviewers.video_timeout),
            lp_timeout: env_u64("PREFLIGHT_LP_TIMEOUT_SECS")
                .or(file.lp_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.reviewers.lp_timeout),
            allow_mock: env_str("PREFLIGHT_ALLOW_MOCK_REVIEWERS")
                .map(|v| parse_bool(&v))
                .or(file.allow_mock)
                .unwrap_or(defaults.reviewers.allow_mock),
        };

        let server = ServerConfig {
            upload_dir: env_str("PREFLIGHT_UPLOAD_DIR")
                .map(PathBuf::from)
                .or(file.upload_dir)
                .unwrap_or(defaults.server.upload_dir),
            public_base_url: env_str("PREFLIGHT_PUBLIC_BASE_URL")
                .or(file.public_base_url)
                .unwrap_or(defaults.server.public_base_url)
                .trim_end_matches('/')
                .to_string(),
            max_upload_mb: env_str("PREFLIGHT_MAX_UPLOAD_MB")
                .and_then(|v| v.parse().ok())
                .or(file.max_upload_mb)
                .unwrap_or(defaults.server.max_upload_mb),
        };

        let log_level = env_str("LOG_LEVEL")
            .or(file.log_level)
            .unwrap_or(defaults.log_level);

        Ok(AppConfig {
            analysis,
            reviewers,
            server,
            benchmark_overrides: file.benchmarks,
            log_level,
        })
    }

    /// 从INI配置文件加载配置
    fn load_from_file(config_path: &Path) -> Result<FileConfig> {
        if !config_path.exists() {
            return Err(anyhow::anyhow!("配置文件不存在: {}", config_path.display()));
        }

        let mut config_parser = configparser::ini::Ini::new();
        config_parser
            .load(config_path)
            .map_err(|e| anyhow::anyhow!("读取配置文件失败: {}: {}", config_path.display(), e))?;

        let get = |section: &str, key: &str| {
            config_parser
                .get(section, key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        // [benchmarks] 节：行业代码 = 平均 CPA
        let mut benchmarks = HashMap::new();
        if let Some(section) = config_parser.get_map_ref().get("benchmarks") {
            for (key, value) in section {
                let industry = Industry::from_str(key)
                    .with_context(|| format!("配置文件中的行业代码无效: {}", key))?;
                let average = value
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default()
                    .parse::<f64>()
                    .with_context(|| format!("行业 {} 的平均 CPA 不是数字", key))?;
                benchmarks.insert(industry, average);
            }
        }

        Ok(FileConfig {
            scene_threshold: get("analysis", "scene_threshold").and_then(|v| v.parse().ok()),
            frame_step: get("analysis", "frame_step").and_then(|v| v.parse().ok()),
            thumbnail_size: get("analysis", "thumbnail_size").and_then(|v| v.parse().ok()),
            video_webhook_url: get("reviewers", "video_webhook_url"),
            lp_webhook_url: get("reviewers", "lp_webhook_url"),
            video_timeout_secs: get("reviewers", "video_timeout_secs").and_then(|v| v.parse().ok()),
            lp_timeout_secs: get("reviewers", "lp_timeout_secs").and_then(|v| v.parse().ok()),
            allow_mock: get("reviewers", "allow_mock").map(|v| parse_bool(&v)),
            upload_dir: get("server", "upload_dir").map(PathBuf::from),
            public_base_url: get("server", "public_base_url"),
            max_upload_mb: get("server", "max_upload_mb").and_then(|v| v.parse().ok()),
            log_level: get("logging", "level"),
            benchmarks,
        })
    }

    /// 从默认位置加载配置文件
    fn load_from_default_locations() -> Result<FileConfig> {
        let mut candidates = vec![PathBuf::from("preflight.ini"), PathBuf::from(".preflight.ini")];
        if let Some(home) = env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join(".preflight.ini"));
        }
        candidates.push(PathBuf::from("/etc/preflight.ini"));

        match candidates.iter().find(|p| p.exists()) {
            Some(path) => Self::load_from_file(path),
            None => Err(anyhow::anyhow!("未找到配置文件")),
        }
    }

    /// 创建默认配置文件
    pub fn create_default_config(config_path: &Path) -> Result<()> {
        let defaults = AppConfig::default();
        let mut config_parser = configparser::ini::Ini::new();

        config_parser.set("analysis", "scene_threshold", Some(defaults.analysis.scene_threshold.to_string()));
        config_parser.set("analysis", "frame_step", Some(defaults.analysis.frame_step.to_string()));
        config_parser.set("analysis", "thumbnail_size", Some(defaults.analysis.thumbnail_size.to_string()));
        config_parser.set("reviewers", "video_webhook_url", Some(String::new()));
        config_parser.set("reviewers", "lp_webhook_url", Some(String::new()));
        config_parser.set(
            "reviewers",
            "video_timeout_secs",
            Some(defaults.reviewers.video_timeout.as_secs().to_string()),
        );
        config_parser.set(
            "reviewers",
            "lp_timeout_secs",
            Some(defaults.reviewers.lp_timeout.as_secs().to_string()),
        );
        config_parser.set("reviewers", "allow_mock", Some("false".to_string()));
        config_parser.set("server", "upload_dir", Some(String::new()));
        config_parser.set("server", "public_base_url", Some(defaults.server.public_base_url.clone()));
        config_parser.set("server", "max_upload_mb", Some(defaults.server.max_upload_mb.to_string()));
        config_parser.set("logging", "level", Some(defaults.log_level.clone()));

        let table = BenchmarkTable::default();
        for industry in Industry::ALL {
            config_parser.set(
                "benchmarks",
                &industry.code().to_lowercase(),
                Some(table.average_cpa(industry).to_string()),
            );
        }

        config_parser
            .write(config_path)
            .map_err(|e| anyhow::anyhow!("写入配置文件失败: {}: {}", config_path.display(), e))?;

        Ok(())
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
