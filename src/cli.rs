use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use pfs_client::actions::{ActionOutcome, UiAction};
use pfs_client::api::{BackendApi, OpenAction};
use pfs_client::app::load_remote_config_or_default;
use pfs_client::config::{ClientConfig, Overrides};
use pfs_client::export::ExportFormat;
use pfs_client::form::SearchForm;
use pfs_client::session::{SearchSessionController, SessionState, StartOutcome};
use pfs_client::store::JsonFileStore;
use pfs_client::transport::WsTransport;
use pfs_client::types::{SearchRequest, SearchType};
use pfs_client::view::ConsoleView;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{info, warn};

type CliSession = SearchSessionController<WsTransport, Arc<JsonFileStore>, ConsoleView>;

// 具体原因已经由 ConsoleView 输出，退出时只报状态
const START_FAILED: &str = "搜索启动失败";
const SCAN_FAILED: &str = "搜索失败";

#[derive(Parser, Debug)]
#[command(name = "pfs", author, version, about = "Precision File Search 命令行客户端", long_about = None)]
pub struct Cli {
    /// 配置文件（默认：数据目录下的 client.toml）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// WebSocket 地址
    #[arg(long, env = "PFS_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// HTTP 接口地址
    #[arg(long = "api", env = "PFS_API", global = true)]
    pub api_base: Option<String>,

    /// 数据目录（历史、保存的搜索、偏好）
    #[arg(long, env = "PFS_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// 日志级别，RUST_LOG 优先
    #[arg(long = "log", env = "PFS_LOG", global = true)]
    pub log_level: Option<String>,

    /// 完成时不响铃
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config_file: self.config.clone(),
            endpoint: self.endpoint.clone(),
            api_base: self.api_base.clone(),
            data_dir: self.data_dir.clone(),
            log_level: self.log_level.clone(),
            quiet: self.quiet,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 运行一次搜索
    Search(SearchArgs),
    /// 最近的搜索
    History {
        #[command(subcommand)]
        action: HistoryCommand,
    },
    /// 按名称保存的搜索
    Saved {
        #[command(subcommand)]
        action: SavedCommand,
    },
    /// 后端设置
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// 让后端打开文件或所在目录
    Open {
        path: String,
        #[arg(long)]
        folder: bool,
    },
    /// 查看或设置界面语言
    Lang { code: Option<String> },
    /// 数值偏好
    Prefs {
        #[command(subcommand)]
        action: PrefsCommand,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// 搜索路径
    pub path: String,

    /// 关键词，逗号分隔
    #[arg(short, long, default_value = "")]
    pub keywords: String,

    /// file_content / file_name / folder_name / file_category
    #[arg(short = 't', long = "type", default_value = "file_content")]
    pub search_type: SearchType,

    /// 排除的目录，逗号分隔
    #[arg(long, default_value = "")]
    pub exclude: String,

    /// 扩展名，逗号分隔
    #[arg(long, default_value = "")]
    pub ext: String,

    #[arg(long)]
    pub dot_folders: bool,

    #[arg(long)]
    pub case_sensitive: bool,

    #[arg(long)]
    pub regex: bool,

    #[arg(long, default_value = "")]
    pub category: String,

    /// 字节，<=0 表示不限
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub min_size: i64,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub max_size: i64,

    /// 同时以该名称保存本次搜索
    #[arg(long)]
    pub save: Option<String>,

    #[command(flatten)]
    pub output: ExportArgs,
}

impl SearchArgs {
    fn form(&self) -> SearchForm {
        SearchForm {
            search_path: self.path.clone(),
            keywords: self.keywords.clone(),
            search_type: self.search_type,
            excluded_folders: self.exclude.clone(),
            file_extensions: self.ext.clone(),
            include_dot_folders: self.dot_folders,
            case_sensitive: self.case_sensitive,
            use_regex: self.regex,
            file_category: self.category.clone(),
            min_size: self.min_size,
            max_size: self.max_size,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExportArgs {
    /// 完成后把结果导出到文件
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// html 或 json
    #[arg(long, default_value = "html")]
    pub format: ExportFormat,

    /// 导出后用系统默认程序打开
    #[arg(long)]
    pub open_export: bool,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    List,
    Remove { index: usize },
    Run {
        index: usize,
        #[command(flatten)]
        output: ExportArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum SavedCommand {
    List,
    Show { name: String },
    Delete { name: String },
    Run {
        name: String,
        #[command(flatten)]
        output: ExportArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 本地配置和后端推送的配置
    Show,
    /// 保存设置，值按 JSON 解析，失败时按字符串
    Push {
        #[arg(required = true)]
        pairs: Vec<String>,
    },
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
    List,
    Set { field: String, value: i64 },
}

pub async fn run_cli(cli: Cli, config: ClientConfig) -> Result<()> {
    let store = Arc::new(JsonFileStore::open(config.store_path()));
    let mut session: CliSession = SearchSessionController::new(
        WsTransport,
        config.endpoint.clone(),
        store.clone(),
        ConsoleView::new(config.notify_on_complete),
    );

    match cli.command {
        Command::Search(args) => {
            let request = args.form().build()?;
            let startup = load_remote_config_or_default(&WsTransport, &config.endpoint, &*store).await;
            if request.search_type == SearchType::FileCategory
                && !startup.file_categories.is_empty()
                && !startup.file_categories.contains(&request.file_category)
            {
                warn!(
                    "后端未声明分类 {:?}，可用分类: {}",
                    request.file_category,
                    startup.file_categories.join(", ")
                );
            }
            if let Some(name) = args.save.clone() {
                session
                    .dispatch(UiAction::SaveSearch {
                        name: name.clone(),
                        request: request.clone(),
                    })
                    .await?;
                info!("已保存搜索: {}", name.trim());
            }
            run_request(&mut session, request, &args.output).await
        }
        Command::History { action } => match action {
            HistoryCommand::List => {
                for (i, request) in session.history().list().iter().enumerate() {
                    println!("{:>2}  {}", i, request.label());
                }
                Ok(())
            }
            HistoryCommand::Remove { index } => {
                if let ActionOutcome::Removed(request) =
                    session.dispatch(UiAction::RemoveHistory(index)).await?
                {
                    println!("已删除: {}", request.label());
                }
                Ok(())
            }
            HistoryCommand::Run { index, output } => {
                let request = loaded(session.dispatch(UiAction::LoadHistory(index)).await?)?;
                run_request(&mut session, request, &output).await
            }
        },
        Command::Saved { action } => match action {
            SavedCommand::List => {
                for (name, request) in session.saved().all() {
                    println!("{}  {}", name, request.label());
                }
                Ok(())
            }
            SavedCommand::Show { name } => {
                let request = loaded(session.dispatch(UiAction::LoadSearch(name)).await?)?;
                println!("{}", serde_json::to_string_pretty(&request)?);
                Ok(())
            }
            SavedCommand::Delete { name } => {
                session.dispatch(UiAction::DeleteSearch(name.clone())).await?;
                println!("已删除: {}", name);
                Ok(())
            }
            SavedCommand::Run { name, output } => {
                let request = loaded(session.dispatch(UiAction::LoadSearch(name)).await?)?;
                run_request(&mut session, request, &output).await
            }
        },
        Command::Config { action } => {
            let api = BackendApi::new(&config.api_base)?;
            match action {
                ConfigCommand::Show => {
                    println!("endpoint           = {}", config.endpoint);
                    println!("api_base           = {}", config.api_base);
                    println!("data_dir           = {}", config.data_dir.display());
                    println!("log_level          = {}", config.log_level);
                    println!("notify_on_complete = {}", config.notify_on_complete);
                    let startup =
                        load_remote_config_or_default(&WsTransport, &config.endpoint, &*store).await;
                    println!("file_categories    = {}", startup.file_categories.join(", "));
                    println!("{}", serde_json::to_string_pretty(&startup.defaults)?);
                    Ok(())
                }
                ConfigCommand::Push { pairs } => {
                    let settings = parse_pairs(&pairs)?;
                    let status = api.save_config(&Value::Object(settings)).await?;
                    println!("{}", status.status);
                    Ok(())
                }
                ConfigCommand::Reset => {
                    let status = api.reset_config().await?;
                    println!("{}", status.status);
                    Ok(())
                }
            }
        }
        Command::Open { path, folder } => {
            let api = BackendApi::new(&config.api_base)?;
            let action = if folder {
                OpenAction::OpenFolder
            } else {
                OpenAction::OpenFile
            };
            // 进程即将退出，这里要等后台任务发完请求
            api.open_detached(&path, action)
                .await
                .context("打开请求任务异常退出")?;
            Ok(())
        }
        Command::Lang { code } => {
            let prefs = session.preferences();
            if let Some(code) = code {
                prefs.set_language(&code);
            }
            println!("{}", prefs.language());
            Ok(())
        }
        Command::Prefs { action } => match action {
            PrefsCommand::List => {
                let startup =
                    load_remote_config_or_default(&WsTransport, &config.endpoint, &*store).await;
                let prefs = session.preferences();
                println!("preferredLanguage = {}", prefs.language());
                for field in startup.defaults.keys() {
                    match prefs.number(field) {
                        Some(n) => println!("{} = {}", field, n),
                        None => println!("{} = -", field),
                    }
                }
                Ok(())
            }
            PrefsCommand::Set { field, value } => {
                session.preferences().set_number(&field, value);
                Ok(())
            }
        },
    }
}

fn loaded(outcome: ActionOutcome) -> Result<SearchRequest> {
    match outcome {
        ActionOutcome::Loaded(request) => Ok(request),
        other => bail!("意外的动作结果: {:?}", other),
    }
}

/// 运行一次会话，Ctrl-C 转成停止动作
async fn run_request(session: &mut CliSession, request: SearchRequest, output: &ExportArgs) -> Result<()> {
    match session.dispatch(UiAction::StartSearch(request)).await? {
        ActionOutcome::Started(StartOutcome::Started) => {}
        ActionOutcome::Started(StartOutcome::Failed) => bail!(START_FAILED),
        other => bail!("搜索未启动: {:?}", other),
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(UiAction::Stop);
        }
    });
    let state = session.run_session(&mut rx).await;
    interrupt.abort();

    match state {
        SessionState::Done => {
            if let Some(path) = &output.export {
                export_to(session, path, output).await?;
            }
            Ok(())
        }
        SessionState::Cancelled => Ok(()),
        SessionState::Failed => bail!(SCAN_FAILED),
        other => bail!("会话停在意外的状态: {:?}", other),
    }
}

async fn export_to(session: &mut CliSession, path: &Path, output: &ExportArgs) -> Result<()> {
    let document = match session.dispatch(UiAction::Export(output.format)).await {
        Ok(ActionOutcome::Exported(document)) => document,
        Ok(other) => bail!("意外的动作结果: {:?}", other),
        Err(e) => {
            warn!("跳过导出: {}", e);
            return Ok(());
        }
    };

    let path = if path.extension().is_none() {
        path.with_extension(output.format.extension())
    } else {
        path.to_path_buf()
    };
    std::fs::write(&path, document)
        .with_context(|| format!("写入导出文件失败: {}", path.display()))?;
    info!("结果已导出到 {}", path.display());

    if output.open_export {
        if let Err(e) = open::that(&path) {
            warn!("无法打开 {}: {}", path.display(), e);
        }
    }
    Ok(())
}

fn parse_pairs(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut settings = Map::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("设置项格式应为 KEY=VALUE: {}", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("设置项缺少键名: {}", pair);
        }
        let value = serde_json::from_str(raw.trim()).unwrap_or_else(|_| Value::String(raw.trim().to_string()));
        settings.insert(key.to_string(), value);
    }
    Ok(settings)
}
