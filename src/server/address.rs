//! 监听地址解析
//!
//! 打开监听 socket，并从本地地址中取出用于签发证书的主机名。

use tokio::net::TcpListener;

use crate::error::{TlsDefaultsError, TlsResult};
use crate::utils::logger::info;

/// 在 `bind_addr` 上开始监听，并返回本地地址中的主机名
pub async fn open_and_resolve(bind_addr: &str) -> TlsResult<(TcpListener, String)> {
    let listener = TcpListener::bind(bind_addr).await.map_err(|e| TlsDefaultsError::Bind {
        addr: bind_addr.to_string(),
        source: e,
    })?;
    let host = resolve_host(&listener)?;
    info!("📡 已在 {} 上监听", bind_addr);
    Ok((listener, host))
}

/// 从已打开的监听器中取出主机名（不含端口和方括号）
pub fn resolve_host(listener: &TcpListener) -> TlsResult<String> {
    let addr = listener
        .local_addr()
        .map_err(|e| TlsDefaultsError::AddressFormat {
            addr: "<unknown>".to_string(),
            reason: format!("无法获取本地地址: {}", e),
        })?
        .to_string();
    let (host, _) = split_host_port(&addr)?;
    Ok(host)
}

/// 将 `host:port` 或 `[host]:port` 拆分为主机和端口
pub fn split_host_port(addr: &str) -> TlsResult<(String, u16)> {
    let invalid = |reason: &str| TlsDefaultsError::AddressFormat {
        addr: addr.to_string(),
        reason: reason.to_string(),
    };

    let colon = addr.rfind(':').ok_or_else(|| invalid("缺少端口"))?;
    let (host, port) = (&addr[..colon], &addr[colon + 1..]);

    let host = if let Some(rest) = host.strip_prefix('[') {
        rest.strip_suffix(']').ok_or_else(|| invalid("缺少 ']'"))?
    } else {
        if host.contains(':') {
            return Err(invalid("地址中冒号过多"));
        }
        host
    };
    if host.contains('[') || host.contains(']') {
        return Err(invalid("方括号位置错误"));
    }

    let port = port.parse::<u16>().map_err(|_| invalid("端口不是合法数字"))?;
    Ok((host.to_string(), port))
}
