//! TLS 回显服务
//!
//! 首次运行时自动生成自签名证书，之后复用同一对文件：
//!
//! ```bash
//! rat-tls-echo --listen 127.0.0.1:8443 --key server.key --cert server.crt
//! openssl s_client -connect 127.0.0.1:8443
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rat_tlsdefaults::{ListenerConfig, TlsListener, listen_with_config};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, Parser)]
#[command(name = "rat-tls-echo", about = "使用自签名证书的 TLS 回显服务")]
struct Args {
    /// 监听地址
    #[arg(short, long, default_value = "127.0.0.1:8443")]
    listen: String,

    /// 私钥文件路径（不存在时自动生成）
    #[arg(long, default_value = "server.key")]
    key: PathBuf,

    /// 证书文件路径（不存在时自动生成）
    #[arg(long, default_value = "server.crt")]
    cert: PathBuf,

    /// TOML 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ListenerConfig::from_toml_file(path).context("加载配置失败")?,
        None => ListenerConfig::default(),
    };

    let listener = listen_with_config(&args.listen, &args.key, &args.cert, &config)
        .await
        .with_context(|| format!("无法在 {} 上启动 TLS 监听器", args.listen))?;

    println!("🚀 TLS 回显服务运行于 {}", listener.local_addr()?);
    println!("   证书: {}", args.cert.display());
    println!("   私钥: {}", args.key.display());

    tokio::select! {
        result = serve(listener) => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\n🛑 收到 Ctrl+C 信号，正在关闭...");
            Ok(())
        }
    }
}

async fn serve(listener: TlsListener) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) if e.is_per_connection() => {
                eprintln!("⚠️  {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        tokio::spawn(async move {
            let (reader, mut writer) = tokio::io::split(stream);
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if writer.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        eprintln!("❌ 读取 {} 失败: {}", peer, e);
                        break;
                    }
                }
            }
            let _ = writer.shutdown().await;
        });
    }
}
