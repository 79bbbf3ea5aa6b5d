use serde::{Deserialize, Serialize};

/// 两个面都通过时的合并原因
pub const POLICY_SAFE_REASON: &str = "Policy Safe";

/// 审核结论
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub is_safe: bool,
    /// 仅供展示，下游不解析
    #[serde(default)]
    pub reason: String,
}

impl PolicyVerdict {
    pub fn safe(reason: impl Into<String>) -> Self {
        Self {
            is_safe: true,
            reason: reason.into(),
        }
    }

    pub fn unsafe_because(reason: impl Into<String>) -> Self {
        Self {
            is_safe: false,
            reason: reason.into(),
        }
    }
}

/// 合并视频和落地页两个审核结论
///
/// 缺失的一面视为通过；任一面不通过则整体不通过，
/// 原因按 `Video: ...` / `LP: ...` 用 `"; "` 拼接。
pub fn combine_verdicts(video: Option<&PolicyVerdict>, landing_page: Option<&PolicyVerdict>) -> PolicyVerdict {
    let mut reasons = Vec::new();

    if let Some(verdict) = video.filter(|v| !v.is_safe) {
        reasons.push(format!("Video: {}", verdict.reason));
    }
    if let Some(verdict) = landing_page.filter(|v| !v.is_safe) {
        reasons.push(format!("LP: {}", verdict.reason));
    }

    if reasons.is_empty() {
        PolicyVerdict::safe(POLICY_SAFE_REASON)
    } else {
        PolicyVerdict::unsafe_because(reasons.join("; "))
    }
}
