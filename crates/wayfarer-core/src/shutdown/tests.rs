use super::*;

#[tokio::test]
async fn test_shutdown_phases() {
    let controller = ShutdownController::new();
    let token = controller.token();
    assert_eq!(controller.phase(), ShutdownPhase::Running);
    assert!(controller.is_accepting_work());

    controller.shutdown().await;

    assert_eq!(controller.phase(), ShutdownPhase::Terminated);
    assert!(!controller.is_accepting_work());
    assert!(token.is_cancelled());
}

#[tokio::test]
async fn test_task_guard_counts() {
    let controller = ShutdownController::new();
    {
        let _a = controller.register_task();
        let _b = controller.register_task();
        assert_eq!(controller.active_task_count(), 2);
    }
    assert_eq!(controller.active_task_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_requests() {
    let controller = ShutdownController::new();
    let guard = controller.register_task();

    let task = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(guard);
    });

    controller.shutdown().await;
    task.await.unwrap();
    assert_eq!(controller.phase(), ShutdownPhase::Terminated);
    assert_eq!(controller.active_task_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_drain_timeout() {
    let controller = ShutdownController::with_timeout(Duration::from_secs(1));
    let _stuck = controller.register_task();

    controller.shutdown().await;
    assert_eq!(controller.phase(), ShutdownPhase::Terminated);
    assert_eq!(controller.active_task_count(), 1);
}

#[tokio::test]
async fn test_second_shutdown_is_noop() {
    let controller = ShutdownController::new();
    controller.shutdown().await;
    controller.shutdown().await;
    assert_eq!(controller.phase(), ShutdownPhase::Terminated);
}
