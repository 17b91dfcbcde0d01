use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use catalog_core::{
    config::AppConfig,
    models::{Host, JobType},
};
use catalog_sync::{AppMode, Application, ShutdownManager};
use clap::{value_parser, Arg, ArgMatches, Command};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn cli() -> Command {
    Command::new("catalog-sync")
        .version("1.0.0")
        .about("多供应商房源目录同步系统")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，默认查找 config/catalog.toml 和 catalog.toml")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"])
                .global(true),
        )
        .subcommand(
            Command::new("run").about("运行调度器和/或worker").arg(
                Arg::new("mode")
                    .short('m')
                    .long("mode")
                    .value_name("MODE")
                    .help("运行模式")
                    .value_parser(["scheduler", "worker", "all"])
                    .default_value("all"),
            ),
        )
        .subcommand(
            Command::new("resync")
                .about("为任务投递重新同步消息，不指定任务时投递全部任务")
                .arg(
                    Arg::new("job-id")
                        .long("job-id")
                        .value_name("ID")
                        .value_parser(value_parser!(i64)),
                ),
        )
        .subcommand(
            Command::new("register-host")
                .about("注册供应商账户并创建同步任务")
                .arg(Arg::new("supplier").long("supplier").required(true))
                .arg(Arg::new("identifier").long("identifier").required(true))
                .arg(
                    Arg::new("credentials")
                        .long("credentials")
                        .value_name("JSON")
                        .default_value("{}"),
                )
                .arg(
                    Arg::new("metadata-interval")
                        .long("metadata-interval")
                        .value_name("SECONDS")
                        .value_parser(value_parser!(u64))
                        .default_value("86400"),
                )
                .arg(
                    Arg::new("availabilities-interval")
                        .long("availabilities-interval")
                        .value_name("SECONDS")
                        .value_parser(value_parser!(u64))
                        .default_value("3600"),
                ),
        )
        .subcommand(
            Command::new("runs")
                .about("查看Host最近的同步运行记录")
                .arg(
                    Arg::new("host-id")
                        .long("host-id")
                        .value_name("ID")
                        .required(true)
                        .value_parser(value_parser!(i64)),
                )
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_parser(value_parser!(i64))
                        .default_value("20"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let config = AppConfig::load(config_path).context("加载配置失败")?;

    let log_level = matches
        .get_one::<String>("log-level")
        .unwrap_or(&config.observability.log_level)
        .clone();
    let log_format = matches
        .get_one::<String>("log-format")
        .unwrap_or(&config.observability.log_format)
        .clone();
    init_logging(&log_level, &log_format)?;

    match matches.subcommand() {
        Some(("run", sub)) => run(config, sub).await,
        Some(("resync", sub)) => resync(config, sub).await,
        Some(("register-host", sub)) => register_host(config, sub).await,
        Some(("runs", sub)) => show_runs(config, sub).await,
        _ => Err(anyhow::anyhow!("未知的子命令")),
    }
}

async fn run(config: AppConfig, matches: &ArgMatches) -> Result<()> {
    let mode = AppMode::parse(
        matches
            .get_one::<String>("mode")
            .map(String::as_str)
            .unwrap_or("all"),
    )?;

    if config.observability.metrics_enabled {
        init_metrics(&config.observability.metrics_bind_address)?;
    }

    info!("启动房源目录同步系统，模式: {:?}", mode);
    let app = Arc::new(Application::new(config).await?);
    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let app = Arc::clone(&app);
        let shutdown_rx = shutdown_manager.subscribe().await;
        tokio::spawn(async move {
            if let Err(e) = app.run(mode, shutdown_rx).await {
                error!("应用运行失败: {e}");
            }
        })
    };

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    Ok(())
}

async fn resync(config: AppConfig, matches: &ArgMatches) -> Result<()> {
    if !config.message_queue.is_rabbitmq() {
        warn!("当前使用内存队列，投递的消息只在本进程内有效");
    }

    let app = Application::new(config).await?;
    let trigger = app.resync_trigger();

    match matches.get_one::<i64>("job-id") {
        Some(job_id) => {
            trigger
                .resync_job(*job_id)
                .await
                .with_context(|| format!("投递任务 {job_id} 失败"))?;
            println!("已投递任务 {job_id}");
        }
        None => {
            let count = trigger.resync_all().await.context("投递全部任务失败")?;
            println!("已投递 {count} 个任务");
        }
    }
    Ok(())
}

async fn register_host(config: AppConfig, matches: &ArgMatches) -> Result<()> {
    let supplier = matches
        .get_one::<String>("supplier")
        .context("缺少 --supplier")?;
    let identifier = matches
        .get_one::<String>("identifier")
        .context("缺少 --identifier")?;
    let credentials: serde_json::Value = serde_json::from_str(
        matches
            .get_one::<String>("credentials")
            .map(String::as_str)
            .unwrap_or("{}"),
    )
    .context("--credentials 必须是合法的JSON")?;

    let interval = |name: &str| {
        matches
            .get_one::<u64>(name)
            .copied()
            .map(Duration::from_secs)
            .with_context(|| format!("缺少 --{name}"))
    };
    let schedules = [
        (JobType::Metadata, interval("metadata-interval")?),
        (JobType::Availabilities, interval("availabilities-interval")?),
    ];

    let app = Application::new(config).await?;
    let (host, jobs) = app
        .register_host(&Host::new(supplier, identifier, credentials), &schedules)
        .await?;

    println!("Host {} 已注册 ({} / {})", host.id, host.supplier, host.identifier);
    for job in jobs {
        println!(
            "  任务 {}: {} 每 {} 秒",
            job.id, job.job_type, job.interval_seconds
        );
    }
    Ok(())
}

async fn show_runs(config: AppConfig, matches: &ArgMatches) -> Result<()> {
    let host_id = *matches.get_one::<i64>("host-id").context("缺少 --host-id")?;
    let limit = matches.get_one::<i64>("limit").copied().unwrap_or(20);

    let app = Application::new(config).await?;
    let runs = app.recent_runs(host_id, limit).await?;
    if runs.is_empty() {
        println!("Host {host_id} 没有同步记录");
        return Ok(());
    }

    for run in runs {
        println!(
            "{} {:<14} {} {:>6}ms skipped={} {}",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.job_type,
            if run.successful { "ok    " } else { "failed" },
            run.duration_ms(),
            run.stats.skipped(),
            serde_json::to_string(&run.stats)?,
        );
    }
    Ok(())
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

/// 安装Prometheus导出器
fn init_metrics(bind_address: &str) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {bind_address}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("安装Prometheus导出器失败")?;

    info!("Prometheus指标导出器监听 {addr}");
    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let matches = cli()
            .try_get_matches_from(["catalog-sync", "resync", "--job-id", "7"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "resync");
        assert_eq!(sub.get_one::<i64>("job-id"), Some(&7));

        let matches = cli()
            .try_get_matches_from(["catalog-sync", "run", "--log-format", "json"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<String>("mode").unwrap(), "all");
        assert_eq!(matches.get_one::<String>("log-format").unwrap(), "json");

        assert!(cli()
            .try_get_matches_from(["catalog-sync", "run", "--mode", "api"])
            .is_err());
        assert!(cli().try_get_matches_from(["catalog-sync"]).is_err());
    }
}
