//! 错误类型定义
//!
//! 建立监听器时的所有错误都会立即返回给调用方，不做任何重试。
//! 单个连接的握手错误只影响那一次 `accept`，监听器本身仍然可用。

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// rat_tlsdefaults 错误类型
#[derive(Debug, Error)]
pub enum TlsDefaultsError {
    /// 绑定或监听失败（地址格式错误、端口被占用等）
    #[error("无法在 {addr} 上监听: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// 本地地址无法拆分为 host 和 port
    #[error("无法拆分 {addr} 的主机和端口: {reason}")]
    AddressFormat { addr: String, reason: String },

    /// 证书或私钥文件存在，但无法读取或解析
    #[error("加载证书失败 ({}): {reason}", .path.display())]
    CredentialLoad { path: PathBuf, reason: String },

    /// 生成密钥、签发证书或写入文件失败
    #[error("生成证书失败 ({}): {reason}", .path.display())]
    CredentialGeneration { path: PathBuf, reason: String },

    /// 单个连接的 TLS 握手失败
    #[error("与 {peer} 的 TLS 握手失败: {source}")]
    Handshake {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// 底层 socket accept 失败
    #[error("接受连接失败: {0}")]
    Accept(#[source] io::Error),

    /// 配置文件错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 内存中的证书无法构建 rustls 服务端配置（没有对应的文件路径）
    #[error("构建 TLS 配置失败: {0}")]
    TlsConfig(String),
}

impl TlsDefaultsError {
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CredentialLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn generation(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CredentialGeneration {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// 是否为单连接级别的错误（监听器仍可继续 accept）
    pub fn is_per_connection(&self) -> bool {
        matches!(self, Self::Handshake { .. })
    }
}

/// rat_tlsdefaults 结果类型
pub type TlsResult<T> = Result<T, TlsDefaultsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = TlsDefaultsError::load("/tmp/c.pem", "未找到证书");
        let msg = err.to_string();
        assert!(msg.contains("/tmp/c.pem"));
        assert!(msg.contains("未找到证书"));
        assert!(!err.is_per_connection());
    }

    #[test]
    fn test_handshake_is_per_connection() {
        let err = TlsDefaultsError::Handshake {
            peer: "127.0.0.1:9".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::InvalidData, "bad record"),
        };
        assert!(err.is_per_connection());
        assert!(err.to_string().contains("127.0.0.1:9"));
    }
}
