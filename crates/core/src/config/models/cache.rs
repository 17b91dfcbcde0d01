use serde::{Deserialize, Serialize};

/// 缓存后端
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// 与业务数据共用SQLite数据库
    #[default]
    Database,
    Redis,
}

/// Redis配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub database: i64,
    pub password: Option<String>,
    pub connection_timeout_seconds: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            database: 0,
            password: None,
            connection_timeout_seconds: 30,
        }
    }
}

impl RedisConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host.is_empty() {
            return Err(anyhow::anyhow!("Redis主机地址不能为空"));
        }

        if self.port == 0 {
            return Err(anyhow::anyhow!("Redis端口必须大于0"));
        }

        if self.database < 0 {
            return Err(anyhow::anyhow!("Redis数据库索引不能为负数"));
        }

        Ok(())
    }

    pub fn build_url(&self) -> String {
        let auth = match &self.password {
            Some(password) => format!(":{password}@"),
            None => String::new(),
        };
        format!("redis://{}{}:{}/{}", auth, self.host, self.port, self.database)
    }
}

/// 读穿缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// 键前缀，实际存储的键为 `<namespace>.<key>`
    pub namespace: String,
    /// 调用方未指定时使用的新鲜度窗口
    pub default_freshness_seconds: u64,
    pub redis: RedisConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Database,
            namespace: "catalog".to_string(),
            default_freshness_seconds: 3600,
            redis: RedisConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.namespace.is_empty() {
            return Err(anyhow::anyhow!("缓存命名空间不能为空"));
        }

        if self.backend == CacheBackend::Redis {
            self.redis.validate()?;
        }

        Ok(())
    }
}
