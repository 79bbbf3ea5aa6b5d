use serde::{Deserialize, Serialize};

use crate::benchmark::Industry;
use crate::error::{PreflightError, PreflightResult};

/// 投放活动上下文，整个请求期间只读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignContext {
    #[serde(alias = "industry_id")]
    pub industry: Industry,
    pub target_cpa: f64,
    pub country: String,
    pub budget: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landing_page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience_age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience_gender: Option<String>,
}

impl CampaignContext {
    /// 校验数值字段，并把空白的可选字段归一为 None
    pub fn validate(mut self) -> PreflightResult<Self> {
        if !self.target_cpa.is_finite() || self.target_cpa < 0.0 {
            return Err(PreflightError::InvalidInput(format!(
                "target_cpa must be a non-negative number, got {}",
                self.target_cpa
            )));
        }
        if !self.budget.is_finite() || self.budget < 0.0 {
            return Err(PreflightError::InvalidInput(format!(
                "budget must be a non-negative number, got {}",
                self.budget
            )));
        }

        self.landing_page_url = non_blank(self.landing_page_url);
        self.audience_age = non_blank(self.audience_age);
        self.audience_gender = non_blank(self.audience_gender);
        Ok(self)
    }

    /// 受众年龄段，例如 "18-24, 25-34" -> ["AGE_18_24", "AGE_25_34"]
    pub fn age_groups(&self) -> Vec<String> {
        let groups: Vec<String> = self
            .audience_age
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|a| format!("AGE_{}", a.replace('-', "_")))
            .collect();

        if groups.is_empty() {
            vec!["AGE_18_24".to_string(), "AGE_25_34".to_string()]
        } else {
            groups
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> CampaignContext {
        CampaignContext {
            industry: Industry::Finance,
            target_cpa: 150.0,
            country: "VN".to_string(),
            budget: 1000.0,
            landing_page_url: Some("  ".to_string()),
            audience_age: None,
            audience_gender: Some("FEMALE".to_string()),
        }
    }

    #[test]
    fn test_blank_landing_page_becomes_none() {
        let ctx = context().validate().unwrap();
        assert_eq!(ctx.landing_page_url, None);
        assert_eq!(ctx.audience_gender.as_deref(), Some("FEMALE"));
    }

    #[test]
    fn test_negative_cpa_rejected() {
        let mut ctx = context();
        ctx.target_cpa = -1.0;
        assert!(matches!(ctx.validate(), Err(PreflightError::InvalidInput(_))));

        let mut ctx = context();
        ctx.budget = f64::NAN;
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn test_age_groups() {
        let mut ctx = context();
        assert_eq!(ctx.age_groups(), vec!["AGE_18_24", "AGE_25_34"]);

        ctx.audience_age = Some("25-34, 35-44,".to_string());
        assert_eq!(ctx.age_groups(), vec!["AGE_25_34", "AGE_35_44"]);
    }

    #[test]
    fn test_deserialize_with_industry_id_alias() {
        let json = r#"{"industry_id":"ECOMM","target_cpa":50,"country":"US","budget":1000}"#;
        let ctx: CampaignContext = serde_json::from_str(json).unwrap();
        assert_eq!(ctx.industry, Industry::Ecommerce);
        assert_eq!(ctx.landing_page_url, None);
    }
}
