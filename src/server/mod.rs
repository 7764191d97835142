//! TLS 监听器服务端模块
//!
//! 地址解析 → 查找或生成证书 → TLS 包装，一次性完成。

pub mod address;
pub mod cert_manager;
pub mod listener;

pub use address::{open_and_resolve, resolve_host, split_host_port};
pub use listener::{TlsListener, listen, listen_with_config};
