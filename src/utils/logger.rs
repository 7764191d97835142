//! 日志宏统一出口
//!
//! 库内部只负责输出，不初始化 logger，由使用方决定是否启用 rat_logger。

pub use rat_logger::{debug, error, info, warn};
