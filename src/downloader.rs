use anyhow::{bail, Context, Result};
use reqwest::{Client, Response};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// 远程视频下载超时
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// 远程视频的临时目录，不在静态文件服务下
pub fn default_download_dir() -> PathBuf {
    std::env::temp_dir().join("ad-preflight").join("downloads")
}

/// 下载远程视频到 `download_dir`，文件名为 `<uuid>.mp4`
///
/// 超过 `max_bytes` 时返回错误，不留下部分文件。
/// 只用于本地创意分析；失败时调用方跳过分析，审核照常进行。
pub async fn download_video(
    client: &Client,
    video_url: &str,
    download_dir: impl AsRef<Path>,
    max_bytes: u64,
) -> Result<PathBuf> {
    let download_dir = download_dir.as_ref();

    // 确保目录存在
    fs::create_dir_all(download_dir)
        .await
        .with_context(|| format!("创建下载目录失败: {}", download_dir.display()))?;

    tracing::info!("正在下载视频: {}", video_url);

    let mut response = client
        .get(video_url)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await
        .context("请求视频失败")?
        .error_for_status()
        .context("视频地址返回错误状态")?;

    if let Some(length) = response.content_length() {
        if length > max_bytes {
            bail!("视频大小 {} 字节超过上限 {} 字节", length, max_bytes);
        }
    }

    let output_path = download_dir.join(format!("{}.mp4", Uuid::new_v4()));
    let mut file = fs::File::create(&output_path)
        .await
        .with_context(|| format!("创建视频文件失败: {}", output_path.display()))?;

    let written = match copy_limited(&mut response, &mut file, max_bytes).await {
        Ok(written) => written,
        Err(e) => {
            drop(file);
            if let Err(remove_err) = fs::remove_file(&output_path).await {
                tracing::warn!("删除未完成的下载失败: {}: {}", output_path.display(), remove_err);
            }
            return Err(e);
        }
    };

    tracing::info!("视频已下载到: {} ({} 字节)", output_path.display(), written);

    Ok(output_path)
}

/// 按块写入文件，累计超过上限即中止
async fn copy_limited(response: &mut Response, file: &mut fs::File, max_bytes: u64) -> Result<u64> {
    let mut written: u64 = 0;
    while let Some(chunk) = response.chunk().await.context("读取视频内容失败")? {
        written += chunk.len() as u64;
        if written > max_bytes {
            bail!("视频超过大小上限 {} 字节", max_bytes);
        }
        file.write_all(&chunk).await.context("写入视频文件失败")?;
    }
    file.flush().await.context("写入视频文件失败")?;
    Ok(written)
}
