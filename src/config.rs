use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 状态扫描间隔（秒）
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// 周期课程延长任务间隔（秒）
    #[serde(default = "default_extension_interval")]
    pub extension_interval_secs: u64,
    /// 单次后台任务运行超时（秒），超时记日志并跳过本轮
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_extension_interval() -> u64 {
    24 * 3600
}

fn default_task_timeout() -> u64 {
    300
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            extension_interval_secs: default_extension_interval(),
            task_timeout_secs: default_task_timeout(),
        }
    }
}

impl Config {
    pub fn from_toml() -> anyhow::Result<Self> {
        use anyhow::Context;

        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 优先读取配置文件，不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => toml::from_str(&config_str).context("Failed to parse config")?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // 无配置文件时数据库 URL 必须提供
                let database_url = get_env("DATABASE_URL")
                    .context("DATABASE_URL is not set and config.toml was not found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        expires_in: get_env_parse("JWT_EXPIRES_IN", 604_800i64),
                    },
                    scheduler: SchedulerConfig {
                        sweep_interval_secs: get_env_parse(
                            "SWEEP_INTERVAL_SECS",
                            default_sweep_interval(),
                        ),
                        extension_interval_secs: get_env_parse(
                            "EXTENSION_INTERVAL_SECS",
                            default_extension_interval(),
                        ),
                        task_timeout_secs: get_env_parse(
                            "TASK_TIMEOUT_SECS",
                            default_task_timeout(),
                        ),
                    },
                }
            }
            Err(e) => {
                return Err(anyhow::anyhow!("Failed to read config file {config_path}: {e}"));
            }
        };

        // 环境变量覆盖（文件存在时同样生效）
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT") {
            if let Ok(p) = v.parse() {
                config.server.port = p;
            }
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS") {
            if let Ok(mc) = v.parse() {
                config.database.max_connections = mc;
            }
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRES_IN") {
            if let Ok(n) = v.parse() {
                config.jwt.expires_in = n;
            }
        }
        if let Ok(v) = env::var("SWEEP_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                config.scheduler.sweep_interval_secs = n;
            }
        }
        if let Ok(v) = env::var("EXTENSION_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                config.scheduler.extension_interval_secs = n;
            }
        }
        if let Ok(v) = env::var("TASK_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                config.scheduler.task_timeout_secs = n;
            }
        }

        Ok(config)
    }
}
