//! 客户端 TLS 配置
//!
//! 自签名证书无法通过系统根证书验证，对端需要显式信任它。

pub mod tls_security;

pub use tls_security::{insecure_client_config, pinned_client_config, pinned_client_config_for};
