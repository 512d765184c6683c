mod cli;

use anyhow::Result;
use clap::Parser;
use pfs_client::config::ClientConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ClientConfig::resolve(&cli.overrides())?;

    // 初始化日志：RUST_LOG 优先，其次是配置的级别；stdout 只留给结果
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("数据目录: {}", config.data_dir.display());
    cli::run_cli(cli, config).await
}
