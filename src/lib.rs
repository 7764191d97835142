//! # rat_tlsdefaults
//!
//! 开箱即用的 TLS 监听器。首次启动时为监听地址的主机名生成自签名证书并写入磁盘，
//! 之后的启动直接复用同一对文件。
//!
//! ```no_run
//! # async fn run() -> rat_tlsdefaults::TlsResult<()> {
//! let listener = rat_tlsdefaults::listen("127.0.0.1:8443", "server.key", "server.crt").await?;
//! loop {
//!     match listener.accept().await {
//!         Ok((stream, peer)) => { /* 处理 stream */ }
//!         Err(e) if e.is_per_connection() => continue,
//!         Err(e) => return Err(e),
//!     }
//! }
//! # }
//! ```

pub mod client;
pub mod error;
pub mod server;
pub mod utils;

pub use error::{TlsDefaultsError, TlsResult};
pub use server::cert_manager::{
    CertificateInfo, Credential, CredentialOrigin, KeyAlgorithm, ListenerBuilder, ListenerConfig, obtain_credential,
};
pub use server::{TlsListener, listen, listen_with_config};
