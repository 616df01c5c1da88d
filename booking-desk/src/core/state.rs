use super::config::Config;
use super::error::Result;
use crate::bookings::{BookingStore, BookingsManager};
use crate::notify::worker::DrainReport;
use crate::notify::{DeliveryStatus, OutboxWorker, delivery_status};
use crate::points::PointsLedger;
use crate::preferences::PreferenceStore;
use crate::store::DeskStorage;
use booking_client::{BookingApi, Notifier, ZnsClient};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Pending wake-ups beyond this are coalesced
const WAKE_CHANNEL_CAPACITY: usize = 16;

/// 后台状态 - 持有所有服务的共享引用
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | storage | redb 本地存储 |
/// | store | 预约列表 (远程 + 本地) |
/// | manager | 状态流转 |
/// | ledger | 积分账本 |
/// | preferences | 偏好存储 |
/// | notifier | 模板消息客户端 |
///
/// Clones share everything.
#[derive(Clone)]
pub struct DeskState {
    pub config: Config,
    pub storage: DeskStorage,
    pub store: Arc<BookingStore>,
    pub manager: Arc<BookingsManager>,
    pub ledger: Arc<PointsLedger>,
    pub preferences: PreferenceStore,
    pub notifier: Arc<ZnsClient>,
    wake_rx: Arc<Mutex<Option<mpsc::Receiver<()>>>>,
}

impl std::fmt::Debug for DeskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeskState")
            .field("work_dir", &self.config.work_dir)
            .field("api_url", &self.config.api_url)
            .field("bookings", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl DeskState {
    /// 初始化后台状态
    ///
    /// 按顺序初始化：
    /// 1. 数据库 (work_dir/desk.redb)
    /// 2. 偏好迁移 (v1 → v2)
    /// 3. 预约列表 (先加载本地记录，不访问网络)
    /// 4. 状态流转、积分账本、模板消息客户端
    pub fn initialize(config: &Config) -> Result<Self> {
        let storage = DeskStorage::open(config.database_path())?;
        tracing::info!(path = %config.database_path().display(), "Desk storage opened");

        let preferences = PreferenceStore::new(storage.clone());
        let report = preferences.migrate()?;
        if !report.migrated.is_empty() {
            tracing::info!(keys = ?report.migrated, "Legacy preferences migrated");
        }

        let api = BookingApi::new(&config.client_config())?;
        let store = Arc::new(BookingStore::new(api, storage.clone()));
        let local = store.load_local()?;
        tracing::debug!(count = local, "Local bookings loaded");

        let (wake_tx, wake_rx) = mpsc::channel(WAKE_CHANNEL_CAPACITY);
        let context = config.template_context();
        let manager = BookingsManager::new(storage.clone(), store.clone(), context.clone())
            .with_wake(wake_tx.clone());
        let ledger = PointsLedger::open(storage.clone(), context)?
            .with_points_notifications(config.zns_template_points.is_some())
            .with_wake(wake_tx);
        let notifier = Arc::new(ZnsClient::new(config.zns_config())?);

        Ok(Self {
            config: config.clone(),
            storage,
            store,
            manager: Arc::new(manager),
            ledger: Arc::new(ledger),
            preferences,
            notifier,
            wake_rx: Arc::new(Mutex::new(Some(wake_rx))),
        })
    }

    /// Worker over this state's storage and notifier
    pub fn outbox_worker(&self) -> OutboxWorker {
        let notifier: Arc<dyn Notifier> = self.notifier.clone();
        OutboxWorker::new(self.storage.clone(), notifier)
    }

    /// 启动后台通知任务
    ///
    /// Only the first call spawns; later calls return `None`.
    pub fn start_background_tasks(&self) -> Option<JoinHandle<()>> {
        let wake_rx = self.wake_rx.lock().take()?;
        let worker = self.outbox_worker();
        tracing::info!("Starting outbox worker");
        Some(tokio::spawn(worker.run(wake_rx)))
    }

    /// One pass over the pending queue in the foreground
    pub async fn drain_outbox(&self, ignore_backoff: bool) -> DrainReport {
        let worker = self.outbox_worker();
        if ignore_backoff {
            worker.drain_now().await
        } else {
            worker.drain_due().await
        }
    }

    pub fn delivery_status(&self, booking_id: i64) -> Result<Option<DeliveryStatus>> {
        Ok(delivery_status(&self.storage, booking_id)?)
    }

    /// Fetch from the API and merge; falls back to the local copy on error
    pub async fn refresh_bookings(&self) -> Result<crate::bookings::RefreshReport> {
        Ok(self.store.refresh().await?)
    }

    /// Is the signed-in user an admin?
    pub fn check_admin(&self) -> Result<bool> {
        Ok(self.preferences.resolve_admin(&self.config.admin_phones)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::SessionProfile;
    use shared::booking::BookingStatus;

    fn config(dir: &std::path::Path) -> Config {
        Config::with_work_dir(dir.to_string_lossy().to_string())
            .with_api_url("http://127.0.0.1:9/api")
            .with_request_timeout_ms(500)
            .with_mock_fallback(true)
            .with_zns("http://127.0.0.1:9/zns", None)
            .with_environment("development")
            .with_admin_phones(&["0909123456"])
    }

    #[tokio::test]
    async fn test_initialize_and_fallback_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let state = DeskState::initialize(&config(dir.path())).unwrap();
        assert!(dir.path().join("desk.redb").exists());
        assert_eq!(state.preferences.schema_version().unwrap(), 2);

        let report = state.refresh_bookings().await.unwrap();
        assert!(report.error.is_some());
        assert_eq!(report.total, 5);
        assert_eq!(state.ledger.customers().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_confirm_then_simulated_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let state = DeskState::initialize(&config(dir.path())).unwrap();
        state.refresh_bookings().await.unwrap();

        let pending = state
            .store
            .list()
            .into_iter()
            .find(|b| b.status == BookingStatus::Pending)
            .unwrap();
        state.manager.confirm(pending.id).unwrap();
        assert!(matches!(
            state.delivery_status(pending.id).unwrap(),
            Some(DeliveryStatus::Pending { .. })
        ));

        let report = state.drain_outbox(false).await;
        assert_eq!(report.delivered, 1);
        assert!(matches!(
            state.delivery_status(pending.id).unwrap(),
            Some(DeliveryStatus::Delivered { simulated: true, .. })
        ));
    }

    #[tokio::test]
    async fn test_background_worker_starts_once() {
        let dir = tempfile::tempdir().unwrap();
        let state = DeskState::initialize(&config(dir.path())).unwrap();
        let handle = state.start_background_tasks();
        assert!(handle.is_some());
        assert!(state.start_background_tasks().is_none());
        if let Some(h) = handle {
            h.abort();
        }
    }

    #[test]
    fn test_check_admin() {
        let dir = tempfile::tempdir().unwrap();
        let state = DeskState::initialize(&config(dir.path())).unwrap();
        state
            .preferences
            .sign_in(&SessionProfile {
                phone: "84909123456".into(),
                ..Default::default()
            })
            .unwrap();
        assert!(state.check_admin().unwrap());
    }
}
