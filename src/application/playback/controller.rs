//! Playback Controller - 播放前校验与退避重试
//!
//! 校验失败时按例句重新获取音频：引用过期先从 Blob Store 重新解析，
//! 仍然失败则重新生成。状态通过 watch channel 对外广播

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::retry::RetryPolicy;
use super::state::{PlaybackError, PlaybackRequest, PlaybackState};
use crate::application::commands::handlers::AcquireAudioHandler;
use crate::application::commands::AcquireAudio;
use crate::application::ports::{MediaInfo, MediaProbePort, PreviewRegistryPort};
use crate::domain::{AudioPayload, AudioRef};

pub struct PlaybackController {
    acquire: Arc<AcquireAudioHandler>,
    registry: Arc<dyn PreviewRegistryPort>,
    probe: Arc<dyn MediaProbePort>,
    policy: RetryPolicy,
    state_tx: watch::Sender<PlaybackState>,
    /// 当前持有（已校验通过）的引用
    held: Mutex<Option<AudioRef>>,
    cancel: Mutex<CancellationToken>,
    retries: AtomicU32,
}

impl PlaybackController {
    pub fn new(
        acquire: Arc<AcquireAudioHandler>,
        registry: Arc<dyn PreviewRegistryPort>,
        probe: Arc<dyn MediaProbePort>,
        policy: RetryPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        Self {
            acquire,
            registry,
            probe,
            policy,
            state_tx,
            held: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
            retries: AtomicU32::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        self.state_tx.borrow().clone()
    }

    /// 当前这次加载已经进行的重试次数
    pub fn retry_count(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// 加载并校验音频，必要时按策略重试
    ///
    /// 新的加载会取消尚未结束的上一次加载。被取消的加载只释放自己的引用，
    /// 不再改动状态
    pub async fn load(&self, request: PlaybackRequest) -> Result<MediaInfo, PlaybackError> {
        let token = self.renew_token();
        self.retries.store(0, Ordering::SeqCst);

        let mut last_message: Option<String> = None;
        let mut audio_ref = match request.audio_ref.clone() {
            Some(audio_ref) => Some(audio_ref),
            None => {
                let Some((owner_id, sentence)) = request.source() else {
                    self.fail_terminal(&token, "Nothing to play.".to_string());
                    return Err(PlaybackError::NothingToPlay);
                };
                // 缓存未命中直接生成，不算一次失败
                let outcome = self.acquire.handle(AcquireAudio::new(owner_id, sentence)).await;
                last_message = outcome.message();
                outcome.audio_ref
            }
        };

        loop {
            if token.is_cancelled() {
                self.discard(audio_ref.take());
                return Err(PlaybackError::Cancelled);
            }
            self.publish(&token, PlaybackState::Validating);

            let error = match audio_ref.take() {
                Some(current) => match self.validate(&current) {
                    Ok(info) => {
                        if !self.hold(&token, current.clone()) {
                            self.discard(Some(current));
                            return Err(PlaybackError::Cancelled);
                        }
                        self.retries.store(0, Ordering::SeqCst);
                        tracing::debug!(url = %current.url, "Playback ready");
                        self.publish(
                            &token,
                            PlaybackState::Playing {
                                audio_ref: current,
                                info: info.clone(),
                            },
                        );
                        return Ok(info);
                    }
                    Err(e) => {
                        audio_ref = Some(current);
                        e
                    }
                },
                None => PlaybackError::StaleReference,
            };

            let Some((owner_id, sentence)) = request.source() else {
                self.discard(audio_ref.take());
                self.fail_terminal(&token, "This audio is no longer available.".to_string());
                return Err(error);
            };

            let attempt = self.retries.load(Ordering::SeqCst);
            if attempt >= self.policy.max_retries {
                self.discard(audio_ref.take());
                let message = match last_message {
                    Some(detail) => format!(
                        "Audio could not be played after {} retries. {}",
                        attempt, detail
                    ),
                    None => format!(
                        "Audio could not be played after {} retries. Try regenerating it.",
                        attempt
                    ),
                };
                tracing::warn!(owner_id = %owner_id, error = %error, "Playback failed, giving up");
                self.fail_terminal(&token, message);
                return Err(error);
            }

            let attempt = attempt + 1;
            self.retries.store(attempt, Ordering::SeqCst);
            let delay = self.policy.delay_for(attempt);

            tracing::debug!(
                owner_id = %owner_id,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Playback validation failed, retrying"
            );
            self.publish(
                &token,
                PlaybackState::Failed {
                    terminal: false,
                    message: last_message
                        .clone()
                        .unwrap_or_else(|| error.user_message().to_string()),
                },
            );
            self.publish(&token, PlaybackState::Retrying { attempt, delay });

            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    self.discard(audio_ref.take());
                    return Err(PlaybackError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }

            // 重新获取不会被中途打断，取消在下一轮开头处理
            let (next_ref, message) = self.rederive(&error, owner_id, sentence).await;
            last_message = message;

            // 被替换的引用立即撤销
            if let Some(old) = audio_ref.take() {
                if next_ref.as_ref() != Some(&old) {
                    self.registry.revoke(&old);
                }
            }
            audio_ref = next_ref;
        }
    }

    /// 返回当前已校验的音频
    pub fn play(&self) -> Result<AudioPayload, PlaybackError> {
        let PlaybackState::Playing { audio_ref, .. } = self.state() else {
            return Err(PlaybackError::NotPlaying);
        };
        self.registry
            .resolve(&audio_ref)
            .ok_or(PlaybackError::StaleReference)
    }

    /// 取消等待中的重试并释放持有的引用
    pub fn cancel(&self) {
        if let Ok(token) = self.cancel.lock() {
            token.cancel();
        }
        self.release();
        self.set_state(PlaybackState::Idle);
    }

    fn validate(&self, audio_ref: &AudioRef) -> Result<MediaInfo, PlaybackError> {
        let payload = self
            .registry
            .resolve(audio_ref)
            .ok_or(PlaybackError::StaleReference)?;
        self.probe
            .probe(&payload)
            .map_err(|e| PlaybackError::InvalidMedia(e.to_string()))
    }

    /// 重新获取引用；返回新引用以及获取失败时的说明
    async fn rederive(
        &self,
        error: &PlaybackError,
        owner_id: &str,
        sentence: &str,
    ) -> (Option<AudioRef>, Option<String>) {
        if *error == PlaybackError::StaleReference {
            let outcome = self
                .acquire
                .handle(AcquireAudio::new(owner_id, sentence).cache_only())
                .await;
            if outcome.success {
                return (outcome.audio_ref, None);
            }
        }

        let outcome = self
            .acquire
            .handle(AcquireAudio::new(owner_id, sentence).regenerate())
            .await;
        let message = outcome.message();
        (outcome.audio_ref, message)
    }

    fn renew_token(&self) -> CancellationToken {
        let fresh = CancellationToken::new();
        match self.cancel.lock() {
            Ok(mut token) => {
                token.cancel();
                *token = fresh.clone();
            }
            Err(poisoned) => {
                let mut token = poisoned.into_inner();
                token.cancel();
                *token = fresh.clone();
            }
        }
        fresh
    }

    /// 持有已校验的引用；加载已被取消时拒绝
    ///
    /// 在 `held` 锁内检查取消，`cancel()` 先取消令牌再加锁释放
    fn hold(&self, token: &CancellationToken, audio_ref: AudioRef) -> bool {
        let previous = {
            let mut held = match self.held.lock() {
                Ok(held) => held,
                Err(poisoned) => poisoned.into_inner(),
            };
            if token.is_cancelled() {
                return false;
            }
            held.replace(audio_ref.clone())
        };
        if let Some(previous) = previous {
            if previous != audio_ref {
                self.registry.revoke(&previous);
            }
        }
        true
    }

    fn release(&self) {
        let held = match self.held.lock() {
            Ok(mut held) => held.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(held) = held {
            self.registry.revoke(&held);
        }
    }

    /// 撤销未被持有的引用
    fn discard(&self, audio_ref: Option<AudioRef>) {
        let Some(audio_ref) = audio_ref else {
            return;
        };
        let held = match self.held.lock() {
            Ok(held) => held.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if held.as_ref() != Some(&audio_ref) {
            self.registry.revoke(&audio_ref);
        }
    }

    fn fail_terminal(&self, token: &CancellationToken, message: String) {
        self.publish(
            token,
            PlaybackState::Failed {
                terminal: true,
                message,
            },
        );
    }

    /// 只有未被取消的加载可以改动状态
    fn publish(&self, token: &CancellationToken, state: PlaybackState) {
        self.state_tx.send_if_modified(|current| {
            if token.is_cancelled() {
                return false;
            }
            *current = state;
            true
        });
    }

    fn set_state(&self, state: PlaybackState) {
        self.state_tx.send_replace(state);
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if let Ok(token) = self.cancel.lock() {
            token.cancel();
        }
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::metadata_store::{MetadataStore, DEFAULT_METADATA_PREFIX};
    use crate::application::ports::{NoopMediaImport, ProbeError};
    use crate::infrastructure::adapters::probe::SymphoniaProbe;
    use crate::infrastructure::adapters::tts::{FakeTtsClient, FakeTtsClientConfig};
    use crate::infrastructure::memory::{InMemoryPreviewRegistry, SystemClock};
    use crate::infrastructure::persistence::flat::InMemoryFlatStore;
    use crate::infrastructure::persistence::sled::SledBlobStore;
    use std::time::Duration;
    use tokio::time::Instant;

    const SENTENCE: &str = "I read about the new discoveries in quantum physics.";

    struct RejectingProbe;

    impl MediaProbePort for RejectingProbe {
        fn probe(&self, _payload: &AudioPayload) -> Result<MediaInfo, ProbeError> {
            Err(ProbeError::Malformed("truncated frame".to_string()))
        }
    }

    struct Fixture {
        acquire: Arc<AcquireAudioHandler>,
        registry: Arc<InMemoryPreviewRegistry>,
        tts: Arc<FakeTtsClient>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_tts(FakeTtsClient::with_defaults())
        }

        fn with_tts(tts: FakeTtsClient) -> Self {
            let clock = Arc::new(SystemClock);
            let registry = Arc::new(InMemoryPreviewRegistry::new("http://localhost", 64));
            let tts = Arc::new(tts);
            let acquire = Arc::new(AcquireAudioHandler::new(
                Arc::new(SledBlobStore::temporary(clock.clone()).unwrap()),
                Arc::new(MetadataStore::new(
                    Arc::new(InMemoryFlatStore::new()),
                    DEFAULT_METADATA_PREFIX,
                    clock.clone(),
                )),
                registry.clone(),
                tts.clone(),
                Arc::new(NoopMediaImport),
                clock,
            ));
            Self {
                acquire,
                registry,
                tts,
            }
        }

        fn controller(&self, probe: Arc<dyn MediaProbePort>) -> PlaybackController {
            PlaybackController::new(
                self.acquire.clone(),
                self.registry.clone(),
                probe,
                RetryPolicy::default(),
            )
        }

        /// 上一个会话留下的引用
        fn stale_ref(&self) -> AudioRef {
            InMemoryPreviewRegistry::new("http://localhost", 4).register(
                &crate::domain::derive_key(SENTENCE, "read"),
                AudioPayload::new(vec![1], "audio/wav"),
            )
        }

        async fn generated_ref(&self) -> AudioRef {
            self.acquire
                .handle(AcquireAudio::new("read", SENTENCE))
                .await
                .audio_ref
                .unwrap()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_reference_plays_without_retry() {
        let fixture = Fixture::new();
        let audio_ref = fixture.generated_ref().await;
        let controller = fixture.controller(Arc::new(SymphoniaProbe::new()));

        let info = controller
            .load(PlaybackRequest::for_sentence("read", SENTENCE).with_ref(audio_ref))
            .await
            .unwrap();

        assert!(info.sample_rate.is_some());
        assert!(controller.state().is_playing());
        assert_eq!(controller.retry_count(), 0);
        assert!(!controller.play().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_retries() {
        let fixture = Fixture::new();
        let audio_ref = fixture.generated_ref().await;
        let controller = fixture.controller(Arc::new(RejectingProbe));
        let started = Instant::now();

        let result = controller
            .load(PlaybackRequest::for_sentence("read", SENTENCE).with_ref(audio_ref))
            .await;

        assert!(matches!(result, Err(PlaybackError::InvalidMedia(_))));
        assert!(controller.state().is_terminal_failure());
        assert_eq!(controller.retry_count(), 3);
        // 1 次初始生成 + 3 次重新生成，没有第 4 次重试
        assert_eq!(fixture.tts.calls(), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(1 + 2 + 4));
        assert!(matches!(controller.play(), Err(PlaybackError::NotPlaying)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_reference_rederived_from_cache() {
        let fixture = Fixture::new();
        fixture.generated_ref().await;

        let stale = fixture.stale_ref();
        let controller = fixture.controller(Arc::new(SymphoniaProbe::new()));
        controller
            .load(PlaybackRequest::for_sentence("read", SENTENCE).with_ref(stale))
            .await
            .unwrap();

        assert!(controller.state().is_playing());
        assert_eq!(controller.retry_count(), 0);
        assert_eq!(fixture.tts.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_sentence_failure_is_terminal() {
        let fixture = Fixture::new();
        let audio_ref = fixture.generated_ref().await;
        fixture.registry.revoke(&audio_ref);

        let controller = fixture.controller(Arc::new(SymphoniaProbe::new()));
        let result = controller.load(PlaybackRequest::for_ref(audio_ref)).await;

        assert_eq!(result, Err(PlaybackError::StaleReference));
        assert!(controller.state().is_terminal_failure());
        assert_eq!(controller.retry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_reference_acquired_from_cache() {
        let fixture = Fixture::new();
        fixture.generated_ref().await;

        let controller = fixture.controller(Arc::new(SymphoniaProbe::new()));
        controller
            .load(PlaybackRequest::for_sentence("read", SENTENCE))
            .await
            .unwrap();
        assert!(controller.state().is_playing());
        assert_eq!(fixture.tts.calls(), 1);

        let nothing = controller.load(PlaybackRequest::default()).await;
        assert_eq!(nothing, Err(PlaybackError::NothingToPlay));
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_outage_message_is_reported() {
        let fixture = Fixture::new();
        fixture.tts.set_failing(true);

        let controller = fixture.controller(Arc::new(SymphoniaProbe::new()));
        let result = controller
            .load(PlaybackRequest::for_sentence("read", SENTENCE))
            .await;

        assert_eq!(result, Err(PlaybackError::StaleReference));
        match controller.state() {
            PlaybackState::Failed { terminal, message } => {
                assert!(terminal);
                assert!(message.contains("unavailable"));
            }
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let fixture = Fixture::new();
        let audio_ref = fixture.generated_ref().await;
        let controller = Arc::new(fixture.controller(Arc::new(RejectingProbe)));
        let mut states = controller.subscribe();

        let task = {
            let controller = controller.clone();
            let request = PlaybackRequest::for_sentence("read", SENTENCE).with_ref(audio_ref.clone());
            tokio::spawn(async move { controller.load(request).await })
        };

        while !matches!(*states.borrow_and_update(), PlaybackState::Retrying { .. }) {
            states.changed().await.unwrap();
        }
        controller.cancel();

        assert_eq!(task.await.unwrap(), Err(PlaybackError::Cancelled));
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(fixture.registry.resolve(&audio_ref).is_none());
        assert_eq!(fixture.tts.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_drop_revoke_held_reference() {
        let fixture = Fixture::new();
        let probe: Arc<dyn MediaProbePort> = Arc::new(SymphoniaProbe::new());

        let audio_ref = fixture.generated_ref().await;
        let controller = fixture.controller(probe.clone());
        controller
            .load(PlaybackRequest::for_ref(audio_ref.clone()))
            .await
            .unwrap();
        controller.cancel();
        assert!(fixture.registry.resolve(&audio_ref).is_none());

        let audio_ref = fixture.generated_ref().await;
        let controller = fixture.controller(probe);
        controller
            .load(PlaybackRequest::for_ref(audio_ref.clone()))
            .await
            .unwrap();
        drop(controller);
        assert!(fixture.registry.resolve(&audio_ref).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_load_supersedes_held_reference() {
        let fixture = Fixture::new();
        let controller = fixture.controller(Arc::new(SymphoniaProbe::new()));

        let first = fixture.generated_ref().await;
        controller.load(PlaybackRequest::for_ref(first.clone())).await.unwrap();

        let second = fixture.generated_ref().await;
        controller.load(PlaybackRequest::for_ref(second.clone())).await.unwrap();

        assert!(fixture.registry.resolve(&first).is_none());
        assert!(fixture.registry.resolve(&second).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_audio_generates_without_backoff() {
        let fixture = Fixture::new();
        let controller = fixture.controller(Arc::new(SymphoniaProbe::new()));
        let started = Instant::now();

        controller
            .load(PlaybackRequest::for_sentence("read", SENTENCE))
            .await
            .unwrap();

        assert!(controller.state().is_playing());
        assert_eq!(controller.retry_count(), 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(fixture.tts.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_regenerating() {
        let fixture = Fixture::with_tts(FakeTtsClient::new(FakeTtsClientConfig {
            latency: Some(Duration::from_millis(500)),
            ..Default::default()
        }));
        let controller = Arc::new(fixture.controller(Arc::new(SymphoniaProbe::new())));

        let task = {
            let controller = controller.clone();
            let request = PlaybackRequest::for_sentence("read", SENTENCE).with_ref(fixture.stale_ref());
            tokio::spawn(async move { controller.load(request).await })
        };

        // 1 s 退避之后，重新生成进行到一半
        tokio::time::sleep(Duration::from_millis(1200)).await;
        controller.cancel();

        assert_eq!(task.await.unwrap(), Err(PlaybackError::Cancelled));
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert_eq!(fixture.tts.calls(), 1);
        assert_eq!(fixture.registry.len(), 0);
        assert!(matches!(controller.play(), Err(PlaybackError::NotPlaying)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_load_keeps_newer_state() {
        let fixture = Fixture::new();
        let valid = fixture.generated_ref().await;
        let controller = Arc::new(fixture.controller(Arc::new(SymphoniaProbe::new())));
        let mut states = controller.subscribe();

        let first = {
            let controller = controller.clone();
            let request = PlaybackRequest::for_sentence("read", SENTENCE).with_ref(fixture.stale_ref());
            tokio::spawn(async move { controller.load(request).await })
        };
        while !matches!(*states.borrow_and_update(), PlaybackState::Retrying { .. }) {
            states.changed().await.unwrap();
        }

        controller
            .load(PlaybackRequest::for_ref(valid.clone()))
            .await
            .unwrap();

        assert_eq!(first.await.unwrap(), Err(PlaybackError::Cancelled));
        assert!(controller.state().is_playing());
        assert!(fixture.registry.resolve(&valid).is_some());
        assert!(controller.play().is_ok());
    }
}
