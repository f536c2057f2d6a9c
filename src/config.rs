use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// ionline API 基础地址，以 / 结尾
    pub api_base_url: String,
    /// 抓包请求文本文件路径
    pub capture_file: String,
    /// 缓存新鲜窗口（秒），过期后先返回旧值再后台刷新
    pub cache_fresh_secs: u64,
    /// 指定要钻取的班级，不指定时只输出班级分组
    pub class_id: Option<i64>,
    /// 指定要查看的教学周，不指定时遍历课程计划中的全部周
    pub week: Option<i64>,
    /// 指定要展开题目详情的测验
    pub test_id: Option<i64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "https://apps.ictu.edu.vn:9087/ionline/api/".to_string(),
            capture_file: "captured_request.txt".to_string(),
            cache_fresh_secs: 300,
            class_id: None,
            week: None,
            test_id: None,
        }
    }
}

impl Config {
    /// 加载配置：可选的 config.toml 打底，环境变量覆盖
    ///
    /// 配置文件路径由 CONFIG_FILE 指定，默认 config.toml；
    /// 文件不存在时直接使用默认值。
    pub async fn load() -> Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        let base = if Path::new(&path).exists() {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("读取配置文件失败: {}", path))?;
            toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path))?
        } else {
            Self::default()
        };
        Ok(base.apply_env())
    }

    /// 只用默认值加环境变量（测试和无配置文件场景）
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    fn apply_env(self) -> Self {
        Self {
            api_base_url: std::env::var("API_BASE_URL").unwrap_or(self.api_base_url),
            capture_file: std::env::var("CAPTURE_FILE").unwrap_or(self.capture_file),
            cache_fresh_secs: std::env::var("CACHE_FRESH_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.cache_fresh_secs),
            class_id: std::env::var("CLASS_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(self.class_id),
            week: std::env::var("WEEK")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(self.week),
            test_id: std::env::var("TEST_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(self.test_id),
        }
    }
}
