//! Sweep Worker - 定期清理过期音频

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::{SweepAudio, SweepAudioHandler};

/// Worker 配置
#[derive(Debug, Clone)]
pub struct SweepWorkerConfig {
    /// 两次清理之间的间隔
    pub interval: Duration,
    /// 超过该天数的条目被删除
    pub max_age_days: u32,
}

impl Default for SweepWorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(6 * 60 * 60),
            max_age_days: 30,
        }
    }
}

/// 清理 Worker
///
/// 启动时立即清理一次，之后按固定间隔执行，直到收到关闭信号
pub struct SweepWorker {
    config: SweepWorkerConfig,
    handler: Arc<SweepAudioHandler>,
}

impl SweepWorker {
    pub fn new(config: SweepWorkerConfig, handler: Arc<SweepAudioHandler>) -> Self {
        Self { config, handler }
    }

    /// 执行一次清理，返回删除的条目数
    pub async fn sweep_once(&self) -> usize {
        match self
            .handler
            .handle(SweepAudio {
                max_age_days: self.config.max_age_days,
            })
            .await
        {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!(error = %e, "Audio sweep failed");
                0
            }
        }
    }

    /// 启动 Worker
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            max_age_days = self.config.max_age_days,
            "SweepWorker started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }

        tracing::info!("SweepWorker stopped");
    }
}
