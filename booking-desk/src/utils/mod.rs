//! 工具模块 - 日志

pub mod logger;
