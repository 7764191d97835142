//! TLS 监听器
//!
//! 包装一个普通的 TCP 监听器，每次 accept 都完成服务端 TLS 握手后再返回。
//! 单个连接的握手失败只影响那一次 accept，监听器可以继续使用。

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use futures_util::Stream;
use rustls::server::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;

use crate::error::{TlsDefaultsError, TlsResult};
use crate::server::address::{open_and_resolve, resolve_host};
use crate::server::cert_manager::{Credential, ListenerConfig, build_server_config, obtain_credential};
use crate::utils::crypto_provider::ensure_crypto_provider_installed;
use crate::utils::logger::{debug, info};

/// 在 `bind_addr` 上打开 TLS 监听器
///
/// 如果 `key_path` 或 `cert_path` 不存在，会为监听地址的主机名生成新的自签名证书并写入这两个路径。
pub async fn listen(
    bind_addr: &str,
    key_path: impl AsRef<Path>,
    cert_path: impl AsRef<Path>,
) -> TlsResult<TlsListener> {
    listen_with_config(bind_addr, key_path, cert_path, &ListenerConfig::default()).await
}

/// 同 [`listen`]，使用自定义配置
pub async fn listen_with_config(
    bind_addr: &str,
    key_path: impl AsRef<Path>,
    cert_path: impl AsRef<Path>,
    config: &ListenerConfig,
) -> TlsResult<TlsListener> {
    let (listener, host) = open_and_resolve(bind_addr).await?;
    TlsListener::setup(listener, host, key_path.as_ref(), cert_path.as_ref(), config).await
}

/// 终止 TLS 的监听器
pub struct TlsListener {
    inner: TcpListener,
    acceptor: TlsAcceptor,
    server_config: Arc<ServerConfig>,
    host: String,
}

impl std::fmt::Debug for TlsListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsListener")
            .field("local_addr", &self.inner.local_addr().ok())
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl TlsListener {
    /// 基于已打开的监听器创建 TLS 监听器
    pub async fn new(
        listener: TcpListener,
        key_path: impl AsRef<Path>,
        cert_path: impl AsRef<Path>,
    ) -> TlsResult<Self> {
        Self::with_config(listener, key_path, cert_path, &ListenerConfig::default()).await
    }

    /// 同 [`TlsListener::new`]，使用自定义配置
    pub async fn with_config(
        listener: TcpListener,
        key_path: impl AsRef<Path>,
        cert_path: impl AsRef<Path>,
        config: &ListenerConfig,
    ) -> TlsResult<Self> {
        let host = resolve_host(&listener)?;
        Self::setup(listener, host, key_path.as_ref(), cert_path.as_ref(), config).await
    }

    /// 基于标准库监听器创建（需在 tokio 运行时中调用）
    pub async fn from_std(
        listener: std::net::TcpListener,
        key_path: impl AsRef<Path>,
        cert_path: impl AsRef<Path>,
        config: &ListenerConfig,
    ) -> TlsResult<Self> {
        let addr = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        let bind_err = |e| TlsDefaultsError::Bind { addr: addr.clone(), source: e };

        listener.set_nonblocking(true).map_err(bind_err)?;
        let listener = TcpListener::from_std(listener).map_err(bind_err)?;
        Self::with_config(listener, key_path, cert_path, config).await
    }

    /// 用已有证书包装监听器，不访问文件系统
    pub fn wrap(listener: TcpListener, credential: Credential, config: &ListenerConfig) -> TlsResult<Self> {
        let host = resolve_host(&listener)?;
        Self::from_parts(listener, host, credential, config)
    }

    async fn setup(
        listener: TcpListener,
        host: String,
        key_path: &Path,
        cert_path: &Path,
        config: &ListenerConfig,
    ) -> TlsResult<Self> {
        let credential = obtain_credential(&host, key_path, cert_path, config).await?;
        Self::from_parts(listener, host, credential, config)
    }

    fn from_parts(listener: TcpListener, host: String, credential: Credential, config: &ListenerConfig) -> TlsResult<Self> {
        ensure_crypto_provider_installed();

        let server_config = build_server_config(credential, config)?;
        let acceptor = TlsAcceptor::from(server_config.clone());

        info!("🔒 TLS 监听器就绪: {} (证书主机名: {})", describe_addr(&listener), host);
        Ok(Self {
            inner: listener,
            acceptor,
            server_config,
            host,
        })
    }

    /// 等待下一个完成 TLS 握手的连接
    ///
    /// 握手失败返回 [`TlsDefaultsError::Handshake`]，之后仍可继续调用。
    pub async fn accept(&self) -> TlsResult<(TlsStream<TcpStream>, SocketAddr)> {
        let (stream, peer) = self.inner.accept().await.map_err(TlsDefaultsError::Accept)?;
        debug!("🔗 新连接: {}，开始 TLS 握手", peer);

        match self.acceptor.accept(stream).await {
            Ok(tls_stream) => {
                debug!("✅ TLS 握手成功: {}", peer);
                Ok((tls_stream, peer))
            }
            Err(e) => {
                debug!("❌ TLS 握手失败: {}: {}", peer, e);
                Err(TlsDefaultsError::Handshake { peer, source: e })
            }
        }
    }

    /// 将监听器转为连接流，每一项都是一次 accept 的结果
    pub fn incoming(&self) -> impl Stream<Item = TlsResult<(TlsStream<TcpStream>, SocketAddr)>> + '_ {
        async_stream::stream! {
            loop {
                yield self.accept().await;
            }
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// 证书绑定的主机名
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn server_config(&self) -> Arc<ServerConfig> {
        self.server_config.clone()
    }

    pub fn acceptor(&self) -> TlsAcceptor {
        self.acceptor.clone()
    }

    /// 取回底层 TCP 监听器
    pub fn into_inner(self) -> TcpListener {
        self.inner
    }
}

fn describe_addr(listener: &TcpListener) -> String {
    listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string())
}
