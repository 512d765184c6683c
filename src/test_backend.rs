use anyhow::Result;
use clap::Parser;
use pfs_client::stub::{StubScript, StubServer};
use tracing_subscriber::EnvFilter;

/// 本地替身后端，用于手动联调 `pfs`
#[derive(Parser, Debug)]
#[command(author, version, about = "Precision File Search 替身后端", long_about = None)]
struct Args {
    /// 监听地址
    #[arg(short, long, default_value = "127.0.0.1:8000")]
    listen: String,

    /// 每次搜索"找到"的路径
    #[arg(short, long = "found")]
    found: Vec<String>,

    /// 完成时的摘要
    #[arg(long, default_value = "scan finished")]
    summary: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let found: Vec<&str> = if args.found.is_empty() {
        vec!["/srv/docs/report.pdf", "/srv/docs/notes.txt"]
    } else {
        args.found.iter().map(String::as_str).collect()
    };

    let server = StubServer::bind(&args.listen, StubScript::demo(&found, &args.summary)).await?;
    println!("endpoint: {}", server.endpoint()?);
    server.serve().await
}
