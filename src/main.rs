//! # Payments Proxy 主程序
//!
//! `serve`（默认）启动 HTTP 服务；`create-session` 使用服务端凭据创建一次 Klarna 支付会话。

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use payments_proxy::{
    ProxyError, Result,
    config::ConfigManager,
    lerror, linfo,
    logging::{self, LogComponent, LogStage},
    providers::klarna,
    proxy::UpstreamClient,
    server,
};

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "payments-proxy", version, about)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 日志级别
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 启动代理服务
    Serve {
        /// 覆盖监听端口
        #[arg(short, long)]
        port: Option<u16>,
        /// 覆盖监听地址
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// 使用服务端凭据创建 Klarna 支付会话
    CreateSession {
        /// 会话请求体 JSON 文件
        #[arg(long)]
        body: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.as_deref());

    if let Err(e) = run(cli).await {
        lerror!(
            "system",
            LogStage::Error,
            LogComponent::Main,
            "run_failed",
            &format!("Payments proxy failed: {e}")
        );
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let manager = match cli.config.as_deref() {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    };
    let mut config = manager.config().as_ref().clone();

    match cli.command.unwrap_or(Command::Serve {
        port: None,
        bind: None,
    }) {
        Command::Serve { port, bind } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Main,
                "service_starting",
                &format!("Starting payments proxy v{}", env!("CARGO_PKG_VERSION"))
            );
            server::serve(Arc::new(config)).await?;
            linfo!(
                "system",
                LogStage::Shutdown,
                LogComponent::Main,
                "service_shutdown",
                "Payments proxy stopped"
            );
            Ok(())
        }
        Command::CreateSession { body } => {
            let raw = tokio::fs::read_to_string(&body).await?;
            let request = serde_json::from_str(&raw).map_err(|e| {
                ProxyError::serialization(format!("Invalid JSON in {}", body.display()), e)
            })?;
            let client = UpstreamClient::new(&config.upstream)?;
            let session =
                klarna::create_session_with_server_credentials(&client, &config.klarna, &request)
                    .await?;
            println!("{}", serde_json::to_string_pretty(&session)?);
            Ok(())
        }
    }
}
