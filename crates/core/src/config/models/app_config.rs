use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    cache::CacheConfig,
    database::DatabaseConfig,
    message_queue::MessageQueueConfig,
    observability::ObservabilityConfig,
    scheduler_worker::{SchedulerConfig, WorkerConfig},
};

/// 系统配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub message_queue: MessageQueueConfig,
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
    pub worker: WorkerConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序：
    /// 1. 各配置段的默认值
    /// 2. 配置文件（TOML格式）
    /// 3. 环境变量覆盖（前缀 `CATALOG_`，层级分隔符 `__`，
    ///    例如 `CATALOG_SCHEDULER__MAX_CONCURRENT_JOBS=8`）
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            let default_paths = ["config/catalog.toml", "catalog.toml"];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("CATALOG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// 从TOML字符串加载配置，不读取环境变量
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = ConfigBuilder::builder()
            .add_source(File::from_str(toml_str, FileFormat::Toml))
            .build()
            .context("解析TOML配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.database.validate().context("数据库配置验证失败")?;
        self.message_queue
            .validate()
            .context("消息队列配置验证失败")?;
        self.cache.validate().context("缓存配置验证失败")?;
        self.scheduler.validate().context("调度器配置验证失败")?;
        self.worker.validate().context("Worker配置验证失败")?;
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheBackend, MessageQueueType};
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.message_queue.r#type, MessageQueueType::InMemory);
        assert_eq!(config.cache.backend, CacheBackend::Database);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [scheduler]
            max_concurrent_jobs = 8
            dispatch_via_queue = true

            [message_queue]
            type = "rabbitmq"
            url = "amqp://localhost:5672/%2f"
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.max_concurrent_jobs, 8);
        assert!(config.scheduler.dispatch_via_queue);
        assert_eq!(config.scheduler.job_timeout_seconds, 1800);
        assert!(config.message_queue.is_rabbitmq());
        assert_eq!(config.message_queue.queue_name, "catalog_sync");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [database]
            url = "postgresql://localhost/catalog"
            "#,
        );
        assert!(result.is_err());

        let result = AppConfig::from_toml(
            r#"
            [scheduler]
            job_timeout_seconds = 600
            stale_after_seconds = 300
            "#,
        );
        assert!(result.is_err());

        let result = AppConfig::from_toml(
            r#"
            [message_queue]
            type = "rabbitmq"
            url = "redis://localhost"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [cache]
            namespace = "suppliers"
            default_freshness_seconds = 60
            "#
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let config = AppConfig::load(Some(path)).unwrap();
        assert_eq!(config.cache.namespace, "suppliers");
        assert_eq!(config.cache.default_freshness_seconds, 60);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(AppConfig::load(Some("/nonexistent/catalog.toml")).is_err());
    }
}
