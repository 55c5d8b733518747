// ==========================================
// 样品导入系统 - 命令行入口
// ==========================================
// 技术栈: Rust + SQLite + clap
// 用法:
//   sample-import init
//   sample-import seed reference.json
//   sample-import upload --client <uid> samples.csv
//   sample-import validate <id> / import <id> / cancel <id>
//   sample-import show <id> / list [--client <uid>] [--state valid]
// ==========================================

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use sample_import::app::{get_default_db_path, AppState};
use sample_import::repository::ReferenceSeed;
use sample_import::{logging, ImportState, SampleImport};

#[derive(Parser)]
#[command(name = "sample-import")]
#[command(version)]
#[command(about = "实验室样品登记文件导入: 解析 / 校验 / 建单")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 数据库文件路径（默认取 SAMPLE_IMPORT_DB_PATH 或用户数据目录）
    #[arg(long, global = true)]
    db: Option<String>,

    /// 输出格式
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    /// 日志输出为 JSON 行
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// 建表（幂等）
    Init,

    /// 从 JSON 文件写入参考数据
    Seed {
        /// 参考数据种子文件
        file: PathBuf,
    },

    /// 上传样品登记文件并解析
    Upload {
        /// 所属客户 UID
        #[arg(long)]
        client: String,
        /// CSV / XLSX / XLS 文件
        file: PathBuf,
    },

    /// 校验导入单
    Validate { id: String },

    /// 导入: 逐行创建样品申请单
    Import { id: String },

    /// 取消导入单
    Cancel { id: String },

    /// 查看导入单详情
    Show { id: String },

    /// 导入单列表
    List {
        #[arg(long)]
        client: Option<String>,
        /// draft / valid / invalid / imported / cancelled
        #[arg(long)]
        state: Option<String>,
    },

    /// 查看或修改配置
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// 打印配置快照
    Show,
    /// 覆写配置项
    Set { key: String, value: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json);

    let db_path = cli.db.clone().unwrap_or_else(get_default_db_path);
    tracing::debug!("使用数据库: {}", db_path);
    let state = AppState::new(db_path.clone()).context("无法初始化AppState")?;
    let api = &state.import_api;

    match cli.command {
        Commands::Init => {
            println!("数据库已就绪: {}", db_path);
        }
        Commands::Seed { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("无法读取种子文件: {}", file.display()))?;
            let seed: ReferenceSeed = serde_json::from_str(&raw).context("种子文件格式错误")?;
            api.seed_reference(&seed)?;
            println!("参考数据已写入");
        }
        Commands::Upload { client, file } => {
            let doc = api.upload_file(&client, &file)?;
            print_doc(&doc, cli.format)?;
        }
        Commands::Validate { id } => {
            let response = api.validate(&id)?;
            match cli.format {
                OutputFormat::Json => print_json(&response)?,
                OutputFormat::Text => {
                    println!("{} → {}", response.import_id, response.state);
                    print_errors(&response.errors);
                }
            }
        }
        Commands::Import { id } => {
            let response = api.import(&id)?;
            match cli.format {
                OutputFormat::Json => print_json(&response)?,
                OutputFormat::Text => {
                    println!(
                        "{} → {}: {} 张申请单, {} 项分析",
                        response.import_id,
                        response.state,
                        response.request_ids.len(),
                        response.analysis_count
                    );
                    for request_id in &response.request_ids {
                        println!("  {}", request_id);
                    }
                    print_errors(&response.errors);
                }
            }
        }
        Commands::Cancel { id } => {
            let doc = api.cancel(&id)?;
            print_doc(&doc, cli.format)?;
        }
        Commands::Show { id } => {
            let doc = api.get(&id)?;
            print_doc(&doc, cli.format)?;
        }
        Commands::List { client, state } => {
            let state = state.as_deref().map(ImportState::from_db_str);
            let docs = api.list(client.as_deref(), state)?;
            match cli.format {
                OutputFormat::Json => print_json(&docs)?,
                OutputFormat::Text => {
                    for doc in &docs {
                        println!(
                            "{}  {:<24} {:<10} rows={} errors={}",
                            doc.id, doc.title, doc.state, doc.rows, doc.errors
                        );
                    }
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => println!("{}", api.config_snapshot()?),
            ConfigAction::Set { key, value } => {
                api.set_config(&key, &value)?;
                println!("{} = {}", key, value);
            }
        },
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_errors(errors: &[String]) {
    for error in errors {
        println!("  ! {}", error);
    }
}

fn print_doc(doc: &SampleImport, format: OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        return print_json(doc);
    }
    println!("{}  {}  [{}]", doc.id, doc.title, doc.state);
    println!(
        "  client={} order={} reference={} samples={}",
        doc.client_id.as_deref().unwrap_or("-"),
        doc.client_order_number.as_deref().unwrap_or("-"),
        doc.client_reference.as_deref().unwrap_or("-"),
        doc.sample_data.len()
    );
    if let Some(batch_uid) = &doc.batch_uid {
        println!("  batch={}", batch_uid);
    }
    print_errors(doc.errors());
    Ok(())
}
