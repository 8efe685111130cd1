//! Shutdown coordination: one close, one exit, bounded waits.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{fake_supervisor, CloseBehavior, FakeListener, ProbeStep, RecordingExit};
use track_server::lifecycle::signals::{channel, dispatch, watch_task};
use track_server::lifecycle::{
    start_or_exit, ListenerSlot, EXIT_RETRIES_EXHAUSTED, ShutdownCoordinator, ShutdownTrigger, EXIT_FAULT, EXIT_GRACEFUL,
};
use track_server::net::ListenerHandle;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn signal_closes_listener_and_exits_zero() {
    let (mut supervisor, _journal) = fake_supervisor(3, &[], &[], CloseBehavior::Immediate);
    let handle = supervisor.start().await.unwrap();
    let exit = Arc::new(RecordingExit::default());
    let coordinator = ShutdownCoordinator::new(supervisor.listener_ref(), Arc::clone(&exit), CLOSE_TIMEOUT);

    assert!(coordinator.shutdown(ShutdownTrigger::Terminate).await);

    assert!(!handle.is_open());
    assert_eq!(handle.close_calls(), 1);
    assert_eq!(exit.codes(), vec![EXIT_GRACEFUL]);
    assert!(coordinator.is_shutting_down());
}

#[tokio::test]
async fn interrupt_also_exits_zero() {
    let (mut supervisor, _journal) = fake_supervisor(3, &[], &[], CloseBehavior::Immediate);
    supervisor.start().await.unwrap();
    let exit = Arc::new(RecordingExit::default());
    let coordinator = ShutdownCoordinator::new(supervisor.listener_ref(), Arc::clone(&exit), CLOSE_TIMEOUT);

    coordinator.shutdown(ShutdownTrigger::Interrupt).await;

    assert_eq!(exit.codes(), vec![EXIT_GRACEFUL]);
}

#[tokio::test]
async fn faults_exit_non_zero() {
    for trigger in [
        ShutdownTrigger::Panic("index out of bounds".into()),
        ShutdownTrigger::TaskFailure("https-server: connection reset".into()),
    ] {
        let (mut supervisor, _journal) = fake_supervisor(3, &[], &[], CloseBehavior::Immediate);
        let handle = supervisor.start().await.unwrap();
        let exit = Arc::new(RecordingExit::default());
        let coordinator =
            ShutdownCoordinator::new(supervisor.listener_ref(), Arc::clone(&exit), CLOSE_TIMEOUT);

        coordinator.shutdown(trigger).await;

        assert_eq!(handle.close_calls(), 1);
        assert_eq!(exit.codes(), vec![EXIT_FAULT]);
    }
}

#[tokio::test]
async fn concurrent_triggers_close_and_exit_once() {
    let (mut supervisor, _journal) =
        fake_supervisor(3, &[], &[], CloseBehavior::Delay(Duration::from_millis(50)));
    let handle = supervisor.start().await.unwrap();
    let exit = Arc::new(RecordingExit::default());
    let coordinator = ShutdownCoordinator::new(supervisor.listener_ref(), Arc::clone(&exit), CLOSE_TIMEOUT);

    let (first, second) = tokio::join!(
        coordinator.shutdown(ShutdownTrigger::Interrupt),
        coordinator.shutdown(ShutdownTrigger::Terminate),
    );

    assert!(first ^ second, "exactly one trigger owns the shutdown");
    assert_eq!(handle.close_calls(), 1);
    assert_eq!(exit.codes(), vec![EXIT_GRACEFUL]);
}

#[tokio::test]
async fn first_trigger_decides_exit_status() {
    let (mut supervisor, _journal) =
        fake_supervisor(3, &[], &[], CloseBehavior::Delay(Duration::from_millis(50)));
    supervisor.start().await.unwrap();
    let exit = Arc::new(RecordingExit::default());
    let coordinator = Arc::new(ShutdownCoordinator::new(
        supervisor.listener_ref(),
        Arc::clone(&exit),
        CLOSE_TIMEOUT,
    ));

    let running = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.shutdown(ShutdownTrigger::Terminate).await })
    };
    while !coordinator.is_shutting_down() {
        tokio::task::yield_now().await;
    }
    let late = coordinator.shutdown(ShutdownTrigger::Panic("late".into())).await;

    assert!(!late);
    assert!(running.await.unwrap());
    assert_eq!(exit.codes(), vec![EXIT_GRACEFUL]);
}

#[tokio::test]
async fn shutdown_before_any_bind_still_exits() {
    let (supervisor, _journal) = fake_supervisor(3, &[], &[], CloseBehavior::Immediate);
    let exit = Arc::new(RecordingExit::default());
    let coordinator = ShutdownCoordinator::new(supervisor.listener_ref(), Arc::clone(&exit), CLOSE_TIMEOUT);

    assert!(coordinator.shutdown(ShutdownTrigger::Interrupt).await);

    assert_eq!(exit.codes(), vec![EXIT_GRACEFUL]);
}

#[tokio::test]
async fn dropped_supervisor_is_a_no_op_close() {
    let slot = {
        let (supervisor, _journal) = fake_supervisor(3, &[], &[], CloseBehavior::Immediate);
        supervisor.listener_ref()
    };
    let exit = Arc::new(RecordingExit::default());
    let coordinator: ShutdownCoordinator<FakeListener, _> =
        ShutdownCoordinator::new(slot, Arc::clone(&exit), CLOSE_TIMEOUT);

    coordinator.shutdown(ShutdownTrigger::Panic("boom".into())).await;

    assert_eq!(exit.codes(), vec![EXIT_FAULT]);
}

#[tokio::test]
async fn already_closed_listener_is_not_closed_again() {
    let (mut supervisor, _journal) = fake_supervisor(3, &[], &[], CloseBehavior::Immediate);
    let handle = supervisor.start().await.unwrap();
    handle.close().await;
    let exit = Arc::new(RecordingExit::default());
    let coordinator = ShutdownCoordinator::new(supervisor.listener_ref(), Arc::clone(&exit), CLOSE_TIMEOUT);

    coordinator.shutdown(ShutdownTrigger::Terminate).await;

    assert_eq!(handle.close_calls(), 1);
    assert_eq!(exit.codes(), vec![EXIT_GRACEFUL]);
}

#[tokio::test]
async fn stuck_close_is_bounded_by_timeout() {
    let (mut supervisor, _journal) = fake_supervisor(3, &[], &[], CloseBehavior::Hang);
    supervisor.start().await.unwrap();
    let exit = Arc::new(RecordingExit::default());
    let coordinator = ShutdownCoordinator::new(
        supervisor.listener_ref(),
        Arc::clone(&exit),
        Duration::from_millis(50),
    );

    let started = Instant::now();
    coordinator.shutdown(ShutdownTrigger::Terminate).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(exit.codes(), vec![EXIT_GRACEFUL]);
}

#[tokio::test]
async fn failed_task_reaches_coordinator_as_fault() {
    let (mut supervisor, _journal) = fake_supervisor(3, &[], &[], CloseBehavior::Immediate);
    let handle = supervisor.start().await.unwrap();
    let exit = Arc::new(RecordingExit::default());
    let coordinator = ShutdownCoordinator::new(supervisor.listener_ref(), Arc::clone(&exit), CLOSE_TIMEOUT);

    let (sender, mut triggers) = channel();
    let task = tokio::spawn(async { Err::<(), _>(std::io::Error::other("accept failed")) });
    watch_task("https-server", task, sender);

    let trigger = triggers.recv().await.unwrap();
    assert!(trigger.is_fault());
    coordinator.shutdown(trigger).await;

    assert_eq!(handle.close_calls(), 1);
    assert_eq!(exit.codes(), vec![EXIT_FAULT]);
}

async fn wait_for_exit(exit: &RecordingExit) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while exit.codes().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("coordinator never exited");
}

#[tokio::test]
async fn dispatcher_delivers_reported_faults_once() {
    let (mut supervisor, _journal) =
        fake_supervisor(3, &[], &[], CloseBehavior::Delay(Duration::from_millis(20)));
    let handle = supervisor.start().await.unwrap();
    let exit = Arc::new(RecordingExit::default());
    let coordinator = Arc::new(ShutdownCoordinator::new(
        supervisor.listener_ref(),
        Arc::clone(&exit),
        CLOSE_TIMEOUT,
    ));

    let (sender, triggers) = channel();
    let dispatcher = tokio::spawn(dispatch(Arc::clone(&coordinator), triggers));
    sender.report(ShutdownTrigger::TaskFailure("https-server: accept failed".into()));
    sender.report(ShutdownTrigger::Panic("worker crashed".into()));

    wait_for_exit(&exit).await;
    // Give the second trigger time to reach the coordinator too.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(exit.codes(), vec![EXIT_FAULT]);
    assert_eq!(handle.close_calls(), 1);
    assert!(coordinator.is_shutting_down());
    dispatcher.abort();
}

#[tokio::test]
async fn dispatcher_keeps_running_after_senders_drop() {
    let (supervisor, _journal) = fake_supervisor(3, &[], &[], CloseBehavior::Immediate);
    let exit = Arc::new(RecordingExit::default());
    let coordinator = Arc::new(ShutdownCoordinator::new(
        supervisor.listener_ref(),
        Arc::clone(&exit),
        CLOSE_TIMEOUT,
    ));

    let (sender, triggers) = channel();
    let dispatcher = tokio::spawn(dispatch(coordinator, triggers));
    drop(sender);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!dispatcher.is_finished());
    assert!(exit.codes().is_empty());
    dispatcher.abort();
}

#[tokio::test]
async fn startup_failure_exits_through_the_coordinator_once() {
    let (mut supervisor, _journal) = fake_supervisor(
        2,
        &[ProbeStep::Busy, ProbeStep::Busy],
        &[],
        CloseBehavior::Immediate,
    );
    let exit = Arc::new(RecordingExit::default());
    let coordinator = ShutdownCoordinator::new(supervisor.listener_ref(), Arc::clone(&exit), CLOSE_TIMEOUT);

    assert!(start_or_exit(&mut supervisor, &coordinator).await.is_none());
    let late = coordinator.shutdown(ShutdownTrigger::Interrupt).await;

    assert!(!late);
    assert_eq!(exit.codes(), vec![EXIT_RETRIES_EXHAUSTED]);
}

#[tokio::test]
async fn startup_failure_after_a_signal_does_not_exit_again() {
    let (mut supervisor, _journal) = fake_supervisor(
        2,
        &[ProbeStep::Busy, ProbeStep::Busy],
        &[],
        CloseBehavior::Immediate,
    );
    let exit = Arc::new(RecordingExit::default());
    let coordinator = ShutdownCoordinator::new(supervisor.listener_ref(), Arc::clone(&exit), CLOSE_TIMEOUT);

    assert!(coordinator.shutdown(ShutdownTrigger::Interrupt).await);
    assert!(start_or_exit(&mut supervisor, &coordinator).await.is_none());

    assert_eq!(exit.codes(), vec![EXIT_GRACEFUL]);
}

#[test]
fn slot_type_is_shared_with_supervisor() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ListenerSlot<FakeListener>>();
    assert_send_sync::<ShutdownCoordinator<FakeListener, Arc<RecordingExit>>>();
}
