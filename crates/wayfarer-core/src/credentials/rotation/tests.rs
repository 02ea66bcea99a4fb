use super::*;
use crate::credentials::MockTokenSource;
use async_trait::async_trait;
use std::sync::atomic::AtomicBool;

struct RecordingTransport {
    key: String,
    generation: u64,
    closed: AtomicBool,
}

#[async_trait]
impl wayfarer_llm::ToolTransport for RecordingTransport {
    fn key(&self) -> &str {
        &self.key
    }

    async fn call(
        &self,
        _subject_id: &str,
        _operation: &str,
        _arguments: serde_json::Value,
    ) -> wayfarer_llm::Result<serde_json::Value> {
        Ok(serde_json::json!({ "generation": self.generation }))
    }

    async fn close(&self) -> wayfarer_llm::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingFactory {
    builds: AtomicU64,
    fail_key: Mutex<Option<String>>,
    built: Mutex<Vec<Arc<RecordingTransport>>>,
}

impl RecordingFactory {
    fn fail_on(&self, key: Option<&str>) {
        *self.fail_key.lock().unwrap() = key.map(str::to_string);
    }

    fn built(&self) -> Vec<Arc<RecordingTransport>> {
        self.built.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolConnectionFactory for RecordingFactory {
    async fn build(&self, spec: &ToolSpec, _token: &AccessToken) -> Result<SharedToolTransport> {
        if self.fail_key.lock().unwrap().as_deref() == Some(spec.key.as_str()) {
            return Err(Error::Credential(format!("{} unreachable", spec.key)));
        }
        let transport = Arc::new(RecordingTransport {
            key: spec.key.clone(),
            generation: self.builds.fetch_add(1, Ordering::SeqCst),
            closed: AtomicBool::new(false),
        });
        self.built.lock().unwrap().push(transport.clone());
        Ok(transport)
    }
}

fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            key: "flights".to_string(),
            endpoint: "http://flights.local".to_string(),
        },
        ToolSpec {
            key: "hotels".to_string(),
            endpoint: "http://hotels.local".to_string(),
        },
    ]
}

fn settings() -> RotationSettings {
    RotationSettings {
        refresh_margin: Duration::from_secs(60),
        rotation_threshold: Duration::from_millis(120_000),
        check_interval: Duration::from_secs(60),
        retry: RetryConfig::default().with_initial_delay(Duration::from_millis(10)),
    }
}

fn hour_token(value: &str) -> AccessToken {
    AccessToken::expiring_in(value, Duration::from_secs(3600))
}

async fn seeded(
    source: MockTokenSource,
    factory: Arc<RecordingFactory>,
    initial: AccessToken,
) -> CredentialRotationManager {
    let manager =
        CredentialRotationManager::new(Arc::new(source), factory, specs(), settings());
    let set = manager.build_all_clients(&initial).await.unwrap();
    *manager.token.lock().await = Some(initial);
    *manager.lock_connections() = Arc::from(set);
    manager
}

#[tokio::test]
async fn test_expiring_token_rotates_once() {
    let mut source = MockTokenSource::new();
    source
        .expect_fetch()
        .times(1)
        .returning(|| Ok(hour_token("fresh")));
    let factory = Arc::new(RecordingFactory::default());
    let manager = seeded(
        source,
        factory.clone(),
        AccessToken::expiring_in("old", Duration::from_secs(100)),
    )
    .await;
    assert_eq!(manager.state().await, TokenState::ExpiringSoon);

    assert!(manager.check_and_rotate().await.unwrap());
    assert_eq!(manager.rotation_count(), 1);
    assert_eq!(manager.state().await, TokenState::Valid);

    let built = factory.built();
    assert_eq!(built.len(), 4);
    assert!(built[..2].iter().all(|t| t.closed.load(Ordering::SeqCst)));
    assert!(built[2..].iter().all(|t| !t.closed.load(Ordering::SeqCst)));

    let keys: Vec<_> = manager.connections().iter().map(|c| c.key.clone()).collect();
    assert_eq!(keys, vec!["flights", "hotels"]);

    assert!(!manager.check_and_rotate().await.unwrap());
    assert_eq!(manager.rotation_count(), 1);
    assert_eq!(factory.built().len(), 4);
}

#[tokio::test]
async fn test_failed_build_keeps_previous_set() {
    let mut source = MockTokenSource::new();
    source.expect_fetch().returning(|| Ok(hour_token("fresh")));
    let factory = Arc::new(RecordingFactory::default());
    let manager = seeded(
        source,
        factory.clone(),
        AccessToken::expiring_in("old", Duration::from_secs(100)),
    )
    .await;
    let before = manager.connections();

    factory.fail_on(Some("hotels"));
    let err = manager.check_and_rotate().await.unwrap_err();
    assert!(matches!(err, Error::Credential(_)));
    assert_eq!(manager.rotation_count(), 0);

    let after = manager.connections();
    assert!(Arc::ptr_eq(&before, &after));

    let built = factory.built();
    // two originals stay open, the partial "flights" rebuild is closed
    assert_eq!(built.len(), 3);
    assert!(!built[0].closed.load(Ordering::SeqCst));
    assert!(!built[1].closed.load(Ordering::SeqCst));
    assert!(built[2].closed.load(Ordering::SeqCst));
    assert_eq!(manager.state().await, TokenState::ExpiringSoon);

    factory.fail_on(None);
    assert!(manager.check_and_rotate().await.unwrap());
    assert_eq!(manager.rotation_count(), 1);
    assert!(built[0].closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_missing_token_triggers_rotation() {
    let mut source = MockTokenSource::new();
    source
        .expect_fetch()
        .times(1)
        .returning(|| Ok(hour_token("first")));
    let factory = Arc::new(RecordingFactory::default());
    let manager =
        CredentialRotationManager::new(Arc::new(source), factory.clone(), specs(), settings());

    assert_eq!(manager.state().await, TokenState::Expired);
    assert!(manager.tools().is_empty());

    assert!(manager.check_and_rotate().await.unwrap());
    assert_eq!(manager.tools().len(), 2);
}

#[tokio::test]
async fn test_connections_rebuilt_after_get_token_refresh() {
    let mut source = MockTokenSource::new();
    source
        .expect_fetch()
        .times(1)
        .returning(|| Ok(hour_token("renewed")));
    let factory = Arc::new(RecordingFactory::default());
    let manager = seeded(
        source,
        factory.clone(),
        AccessToken::expiring_in("stale", Duration::from_secs(30)),
    )
    .await;

    let token = manager.get_token().await.unwrap();
    assert_eq!(manager.state().await, TokenState::Valid);
    assert_eq!(manager.connections_state(), TokenState::ExpiringSoon);

    // Rebuilt from the already refreshed token, no second fetch
    assert!(manager.check_and_rotate().await.unwrap());
    assert_eq!(manager.connections_state(), TokenState::Valid);
    assert!(manager
        .connections()
        .iter()
        .all(|c| c.token_expires_at == token.expires_at()));
    assert_eq!(factory.built().len(), 4);

    assert!(!manager.check_and_rotate().await.unwrap());
}

#[tokio::test]
async fn test_get_token_single_flight() {
    let mut source = MockTokenSource::new();
    source
        .expect_fetch()
        .times(1)
        .returning(|| Ok(hour_token("shared")));
    let manager = Arc::new(CredentialRotationManager::new(
        Arc::new(source),
        Arc::new(RecordingFactory::default()),
        specs(),
        settings(),
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_token().await })
        })
        .collect();

    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        assert_eq!(token.secret(), "shared");
    }
}

#[tokio::test]
async fn test_get_token_refreshes_inside_margin() {
    let mut source = MockTokenSource::new();
    source
        .expect_fetch()
        .times(1)
        .returning(|| Ok(hour_token("renewed")));
    let manager = CredentialRotationManager::new(
        Arc::new(source),
        Arc::new(RecordingFactory::default()),
        specs(),
        settings(),
    );
    *manager.token.lock().await = Some(AccessToken::expiring_in("stale", Duration::from_secs(30)));

    let token = manager.get_token().await.unwrap();
    assert_eq!(token.secret(), "renewed");
}

#[tokio::test(start_paused = true)]
async fn test_refresh_retries_then_succeeds() {
    let mut seq = mockall::Sequence::new();
    let mut source = MockTokenSource::new();
    source
        .expect_fetch()
        .times(2)
        .in_sequence(&mut seq)
        .returning(|| Err(Error::Credential("token endpoint returned 503".to_string())));
    source
        .expect_fetch()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(hour_token("third-time")));
    let manager = CredentialRotationManager::new(
        Arc::new(source),
        Arc::new(RecordingFactory::default()),
        specs(),
        settings(),
    );

    let token = manager.get_token().await.unwrap();
    assert_eq!(token.secret(), "third-time");
}

#[tokio::test(start_paused = true)]
async fn test_refresh_gives_up_after_attempts() {
    let mut source = MockTokenSource::new();
    source
        .expect_fetch()
        .times(3)
        .returning(|| Err(Error::Credential("denied".to_string())));
    let manager = CredentialRotationManager::new(
        Arc::new(source),
        Arc::new(RecordingFactory::default()),
        specs(),
        settings(),
    );

    let err = manager.get_token().await.unwrap_err();
    assert!(err.to_string().contains("3 attempts"));
}

#[tokio::test(start_paused = true)]
async fn test_run_closes_connections_on_shutdown() {
    let mut source = MockTokenSource::new();
    source.expect_fetch().returning(|| Ok(hour_token("fresh")));
    let factory = Arc::new(RecordingFactory::default());
    let manager = Arc::new(
        seeded(source, factory.clone(), hour_token("initial")).await,
    );

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(manager.clone().run(shutdown.clone()));
    tokio::time::sleep(Duration::from_secs(150)).await;
    shutdown.cancel();
    task.await.unwrap();

    assert_eq!(manager.rotation_count(), 0);
    assert!(factory
        .built()
        .iter()
        .all(|t| t.closed.load(Ordering::SeqCst)));
}
