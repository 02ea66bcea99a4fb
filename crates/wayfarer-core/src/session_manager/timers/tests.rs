use super::*;
use std::sync::atomic::AtomicUsize;

fn counting_callback(counter: Arc<AtomicUsize>) -> TimerCallback {
    Arc::new(move || {
        let counter = counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    })
}

fn heartbeat_key() -> TimerKey {
    TimerKey::Heartbeat {
        session_id: "s-1".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_initial_delay_then_fixed_rate() {
    let timers = TimerService::spawn(CancellationToken::new());
    let ticks = Arc::new(AtomicUsize::new(0));

    let _handle = timers.schedule(
        heartbeat_key(),
        Duration::from_secs(5),
        Duration::from_secs(10),
        counting_callback(ticks.clone()),
    );

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_drop_cancels() {
    let timers = TimerService::spawn(CancellationToken::new());
    let ticks = Arc::new(AtomicUsize::new(0));

    let handle = timers.schedule(
        heartbeat_key(),
        Duration::from_secs(1),
        Duration::from_secs(1),
        counting_callback(ticks.clone()),
    );
    assert_eq!(timers.active().await, vec![heartbeat_key()]);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 2);

    drop(handle);
    assert!(timers.active().await.is_empty());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timers_are_independent() {
    let timers = TimerService::spawn(CancellationToken::new());
    let fast = Arc::new(AtomicUsize::new(0));
    let slow = Arc::new(AtomicUsize::new(0));

    let _a = timers.schedule(
        heartbeat_key(),
        Duration::from_secs(1),
        Duration::from_secs(1),
        counting_callback(fast.clone()),
    );
    let _b = timers.schedule(
        TimerKey::Thinking {
            session_id: "s-1".to_string(),
            request_id: "r-1".to_string(),
        },
        Duration::from_secs(3),
        Duration::from_secs(3),
        counting_callback(slow.clone()),
    );

    tokio::time::sleep(Duration::from_millis(6500)).await;
    assert_eq!(fast.load(Ordering::SeqCst), 6);
    assert_eq!(slow.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_service() {
    let shutdown = CancellationToken::new();
    let timers = TimerService::spawn(shutdown.clone());
    let ticks = Arc::new(AtomicUsize::new(0));

    let _handle = timers.schedule(
        heartbeat_key(),
        Duration::from_secs(1),
        Duration::from_secs(1),
        counting_callback(ticks.clone()),
    );
    shutdown.cancel();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 0);
    assert!(timers.active().await.is_empty());
}

#[test]
fn test_key_session_id() {
    let key = TimerKey::Thinking {
        session_id: "s-9".to_string(),
        request_id: "r-1".to_string(),
    };
    assert_eq!(key.session_id(), "s-9");
}
