use crate::core::trust::TrustPolicy;
use crate::domain::model::Credentials;
use crate::utils::error::{ExtractorError, Result};
use crate::utils::validation::{
    validate_host, validate_non_empty_string, validate_path, validate_required_field, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub extractor: ExtractorSettings,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorSettings {
    pub base_dir: String,
    pub secure_host: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl ExtractorConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ExtractorError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ExtractorError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${WFS_ADMIN_PASSWORD})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ExtractorError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_path("extractor.base_dir", &self.extractor.base_dir)?;
        validate_host("extractor.secure_host", &self.extractor.secure_host)?;

        // 帳號密碼必須成對出現
        match (&self.extractor.admin_username, &self.extractor.admin_password) {
            (Some(username), _) => {
                validate_non_empty_string("extractor.admin_username", username)?;
                validate_required_field("extractor.admin_password", &self.extractor.admin_password)?;
            }
            (None, Some(_)) => {
                validate_required_field("extractor.admin_username", &self.extractor.admin_username)?;
            }
            (None, None) => {}
        }

        if let Some(level) = self.logging.as_ref().and_then(|l| l.level.as_deref()) {
            let valid_levels = ["trace", "debug", "info", "warn", "error"];
            if !valid_levels.contains(&level) {
                return Err(ExtractorError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: level.to_string(),
                    reason: format!("Valid levels: {}", valid_levels.join(", ")),
                });
            }
        }

        Ok(())
    }

    pub fn trust_policy(&self) -> TrustPolicy {
        TrustPolicy::new(self.extractor.secure_host.clone())
    }

    pub fn admin_credentials(&self) -> Option<Credentials> {
        match (&self.extractor.admin_username, &self.extractor.admin_password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    pub fn base_dir(&self) -> &str {
        &self.extractor.base_dir
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }

    pub fn json_logging(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }
}

impl Validate for ExtractorConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
