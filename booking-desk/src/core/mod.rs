//! 核心模块 - 配置、状态和错误定义
//!
//! - [`Config`] - 后台配置
//! - [`DeskState`] - 服务的共享引用
//! - [`DeskError`] - 顶层错误

pub mod config;
pub mod error;
pub mod state;

pub use config::Config;
pub use error::{DeskError, Result, classify};
pub use state::DeskState;
