//! Booking Desk - 家政预约后台
//!
//! # 架构概述
//!
//! Back-office for a home-cleaning booking service. Bookings come from an
//! external API; everything the desk changes locally lives in one redb file.
//!
//! - **预约** (`bookings`): booking store, status transitions
//! - **导出** (`export`): CSV for bookings and points history
//! - **通知** (`notify`): outbox entries and the dispatch worker
//! - **积分** (`points`): customer ledger, history, pruning
//! - **偏好** (`preferences`): typed keys, schema migration, admin check
//! - **存储** (`store`): redb tables shared by all of the above
//! - **开发** (`devrun`): the `dev-all` process runner
//!
//! # 模块结构
//!
//! ```text
//! booking-desk/src/
//! ├── core/          # 配置、状态、错误
//! ├── bookings/      # 预约存储、状态机处理
//! ├── export.rs      # CSV 导出
//! ├── notify/        # Outbox + worker
//! ├── points/        # 积分账本
//! ├── preferences/   # 偏好存储
//! ├── store/         # redb
//! ├── devrun/        # dev-all
//! └── utils/         # 日志
//! ```

pub mod bookings;
pub mod core;
pub mod devrun;
pub mod export;
pub mod notify;
pub mod points;
pub mod preferences;
pub mod store;
pub mod utils;

// Re-export 公共类型
pub use bookings::{BookingStore, BookingsManager, ManagerError};
pub use core::{Config, DeskError, DeskState};
pub use notify::{DeliveryStatus, OutboxWorker};
pub use points::{LedgerError, PointsLedger};
pub use preferences::{PreferenceError, PreferenceStore};
pub use store::{DeskStorage, StorageError};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};

/// Admin mutations, written to the `audit` target (permanent log files)
#[macro_export]
macro_rules! audit_log {
    ($action:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            target: "audit",
            action = $action,
            $($key = $value),*
        );
    };
}

pub fn print_banner() {
    println!(
        r#"
    ____              __   _
   / __ )____  ____  / /__(_)___  ____ _
  / __  / __ \/ __ \/ //_/ / __ \/ __ `/
 / /_/ / /_/ / /_/ / ,< / / / / / /_/ /
/_____/\____/\____/_/|_/_/_/ /_/\__, /
    ____             __        /____/
   / __ \___  _____/ /__
  / / / / _ \/ ___/ //_/
 / /_/ /  __(__  ) ,<
/_____/\___/____/_/|_|
    "#
    );
}
