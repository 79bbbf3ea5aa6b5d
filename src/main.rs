use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

use ad_preflight::config::{AppConfig, CliOverrides, ConfigLoader};
use ad_preflight::{handler, AppState, CampaignContext, Evaluator, Industry, VideoInput};

/// 广告投放预检工具 - 在投放前评估视频创意、落地页合规和目标 CPA
#[derive(Parser, Debug)]
#[command(name = "ad-preflight")]
#[command(about = "广告预检：创意分析、合规审核、综合评分", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// CLI 模式：评估一次投放，输出 JSON 报告
    Analyze {
        /// 行业代码（FIN, ECOMM, BEAUTY, FNB, TECH, TRAVEL, OTHER）
        #[arg(long)]
        industry: String,

        /// 目标 CPA
        #[arg(long)]
        target_cpa: f64,

        /// 投放国家
        #[arg(long)]
        country: String,

        /// 预算
        #[arg(long)]
        budget: f64,

        /// 本地视频文件
        #[arg(long)]
        video: Option<PathBuf>,

        /// 视频公网地址（提交审核；未指定 --video 时会下载到本地分析）
        #[arg(long)]
        video_url: Option<String>,

        /// 落地页地址
        #[arg(long)]
        landing_page: Option<String>,

        /// 受众年龄段，例如 "18-24,25-34"
        #[arg(long)]
        audience_age: Option<String>,

        /// 受众性别
        #[arg(long)]
        audience_gender: Option<String>,

        /// 配置文件路径（可选，支持 .ini 格式）
        /// 优先级：命令行参数 > 环境变量 > 配置文件 > 默认值
        #[arg(long)]
        config: Option<PathBuf>,

        /// 场景切换的相关系数阈值，低于该值记为切换
        /// 可通过环境变量 PREFLIGHT_SCENE_THRESHOLD 或配置文件设置
        #[arg(long)]
        scene_threshold: Option<f64>,

        /// 采样步长（每 N 帧分析一帧）
        /// 可通过环境变量 PREFLIGHT_FRAME_STEP 或配置文件设置
        #[arg(long)]
        frame_step: Option<u64>,
    },
    /// Web 服务模式：启动 HTTP 服务器
    Serve {
        /// 监听地址（默认从环境变量 PORT 读取，如果不存在则使用 0.0.0.0:8000）
        #[arg(short, long)]
        bind: Option<String>,

        /// 配置文件路径
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// 生成默认配置文件
    InitConfig {
        /// 输出路径
        path: PathBuf,
    },
}

fn init_logging(level: &str) {
    let level = tracing::Level::from_str(level).unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Analyze {
            industry,
            target_cpa,
            country,
            budget,
            video,
            video_url,
            landing_page,
            audience_age,
            audience_gender,
            config: config_file,
            scene_threshold,
            frame_step,
        } => {
            let overrides = CliOverrides {
                scene_threshold,
                frame_step,
            };
            let config = ConfigLoader::load(config_file.as_deref(), &overrides).context("加载配置失败")?;
            init_logging(&config.log_level);

            tracing::info!(
                "使用配置: scene_threshold={:.2}, frame_step={}, thumbnail_size={}",
                config.analysis.scene_threshold,
                config.analysis.frame_step,
                config.analysis.thumbnail_size
            );

            let campaign = CampaignContext {
                industry: Industry::from_str(&industry)?,
                target_cpa,
                country,
                budget,
                landing_page_url: landing_page,
                audience_age,
                audience_gender,
            };

            let evaluator = Evaluator::from_config(&config)?;
            let video_input = match (video, video_url) {
                (Some(path), Some(url)) => Some(VideoInput::new(url, Some(path))),
                (Some(path), None) => Some(VideoInput::from_local(path).await),
                (None, Some(url)) => Some(evaluator.resolve_remote_video(&url).await),
                (None, None) => None,
            };

            let report = evaluator.evaluate(campaign, video_input).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Serve { bind, config: config_file } => {
            let config = ConfigLoader::load(config_file.as_deref(), &CliOverrides::default())
                .context("加载配置失败")?;
            init_logging(&config.log_level);

            // 优先使用命令行参数，其次使用环境变量 PORT，最后使用默认值 8000
            let bind_addr = bind.unwrap_or_else(|| {
                std::env::var("PORT")
                    .map(|port| format!("0.0.0.0:{}", port))
                    .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
            });
            start_web_server(&bind_addr, &config).await?;
        }
        Commands::InitConfig { path } => {
            ConfigLoader::create_default_config(&path)?;
            println!("已生成配置文件: {}", path.display());
        }
    }

    Ok(())
}

async fn start_web_server(bind: &str, config: &AppConfig) -> Result<()> {
    std::fs::create_dir_all(&config.server.upload_dir)
        .with_context(|| format!("创建上传目录失败: {}", config.server.upload_dir.display()))?;

    if config.reviewers.video_webhook_url.is_none() || config.reviewers.lp_webhook_url.is_none() {
        tracing::warn!(
            "审核 webhook 未完整配置，未配置的一侧将{}",
            if config.reviewers.allow_mock { "返回模拟结论" } else { "判定为不通过" }
        );
    }

    let state = AppState::from_config(config)?;
    let app = handler::router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .context(format!("绑定地址失败: {}", bind))?;

    tracing::info!("Web 服务器启动在: http://{}", bind);
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("可用端点:");
    tracing::info!("  • 健康检查: GET  http://{}/api/health", bind);
    tracing::info!("  • 表单评估: POST http://{}/api/analyze", bind);
    tracing::info!("  • JSON 评估: POST http://{}/api/analyze/json", bind);
    tracing::info!("  • 审核回调: POST http://{}/api/webhook/callback", bind);
    tracing::info!("  • 上传文件: GET  http://{}/static/uploads/<file>", bind);
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    axum::serve(listener, app)
        .await
        .context("启动服务器失败")?;

    Ok(())
}
