//! Shared-resource behavior under concurrent consumers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use std::time::Duration;

use taskshare::{
    Emitter, EventKind, Host, HostConfig, Resource, ResourceError, Scope, SharedResource,
    SharingMode, SharingState,
};
use tokio_util::sync::CancellationToken;

/// Counters observed across producer runs.
#[derive(Default)]
struct Gauge {
    started: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
    released: AtomicUsize,
    cleaned: AtomicUsize,
}

/// Decrements `running` however the producer ends.
struct Running(Arc<Gauge>);

impl Drop for Running {
    fn drop(&mut self) {
        self.0.running.fetch_sub(1, SeqCst);
    }
}

fn gauged(gauge: Arc<Gauge>, cleanup: Duration) -> Resource<usize> {
    Resource::new(move |scope: Scope, emitter: Emitter<usize>| {
        let gauge = gauge.clone();
        async move {
            let n = gauge.started.fetch_add(1, SeqCst);
            let now = gauge.running.fetch_add(1, SeqCst) + 1;
            gauge.max_running.fetch_max(now, SeqCst);
            let _running = Running(gauge.clone());

            let consumed = emitter.emit(n).await;
            gauge.released.fetch_add(1, SeqCst);
            if !cleanup.is_zero() {
                tokio::time::sleep(cleanup).await;
            }
            if !scope.is_cancelled() {
                gauge.cleaned.fetch_add(1, SeqCst);
            }
            Ok(consumed)
        }
    })
    .named("gauged")
}

async fn wait_for_state<T>(shared: &SharedResource<T>, want: SharingState)
where
    T: Clone + Send + Sync + 'static,
{
    while shared.state() != want {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn eager_starts_without_consumers() {
    let gauge = Arc::new(Gauge::default());
    let host = Scope::new();
    let shared = gauged(gauge.clone(), Duration::ZERO).share_in(&host, SharingMode::Eager);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(gauge.started.load(SeqCst), 1);
    assert_eq!(gauge.running.load(SeqCst), 1);
    assert_eq!(shared.state(), SharingState::Running { ref_count: 0 });

    let v = shared.using(&Scope::new(), |v, _| async move { v }).await.unwrap();
    assert_eq!(v, 0);
    assert_eq!(shared.state(), SharingState::Running { ref_count: 0 });

    host.cancel();
    host.join().await;
    assert_eq!(gauge.running.load(SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn lazy_waits_for_first_use() {
    let gauge = Arc::new(Gauge::default());
    let host = Scope::new();
    let shared = gauged(gauge.clone(), Duration::ZERO).share_in(&host, SharingMode::Lazy);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(gauge.started.load(SeqCst), 0);
    assert_eq!(shared.state(), SharingState::NotRunning);

    shared.using(&Scope::new(), |_, _| async {}).await.unwrap();
    assert_eq!(gauge.started.load(SeqCst), 1);
    assert_eq!(gauge.running.load(SeqCst), 1);

    host.cancel();
    host.join().await;
}

#[tokio::test(start_paused = true)]
async fn graceful_stop_fires_switch_and_returns_to_not_running() {
    let gauge = Arc::new(Gauge::default());
    let host = Scope::new();
    let shared = gauged(gauge.clone(), Duration::from_millis(50))
        .share_in(&host, SharingMode::WhileUsed { graceful: true });

    shared.using(&Scope::new(), |_, _| async {}).await.unwrap();
    assert_eq!(shared.state(), SharingState::Stopping);

    shared.drained().await;
    assert_eq!(shared.state(), SharingState::NotRunning);
    assert_eq!(gauge.released.load(SeqCst), 1);
    assert_eq!(gauge.cleaned.load(SeqCst), 1);
    assert_eq!(gauge.running.load(SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn forced_stop_cancels_producer_scope() {
    let gauge = Arc::new(Gauge::default());
    let host = Scope::new();
    let shared = gauged(gauge.clone(), Duration::from_millis(50))
        .share_in(&host, SharingMode::WhileUsed { graceful: false });

    shared.using(&Scope::new(), |_, _| async {}).await.unwrap();
    shared.drained().await;

    // The producer still leaves `emit`, but under a cancelled scope.
    assert_eq!(shared.state(), SharingState::NotRunning);
    assert_eq!(gauge.released.load(SeqCst), 1);
    assert_eq!(gauge.cleaned.load(SeqCst), 0);
    assert_eq!(gauge.running.load(SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn early_leaver_does_not_stop_remaining_consumer() {
    let gauge = Arc::new(Gauge::default());
    let host = Scope::new();
    let shared = gauged(gauge.clone(), Duration::ZERO)
        .share_in(&host, SharingMode::WhileUsed { graceful: true });

    let first_done = CancellationToken::new();
    let second_done = CancellationToken::new();
    let spawn_user = |done: CancellationToken| {
        let shared = shared.clone();
        tokio::spawn(async move {
            shared
                .using(&Scope::new(), |v, _| async move {
                    done.cancelled().await;
                    v
                })
                .await
        })
    };
    let first = spawn_user(first_done.clone());
    let second = spawn_user(second_done.clone());

    wait_for_state(&shared, SharingState::Running { ref_count: 2 }).await;

    first_done.cancel();
    assert_eq!(first.await.unwrap(), Ok(0));
    assert_eq!(shared.state(), SharingState::Running { ref_count: 1 });
    assert_eq!(gauge.released.load(SeqCst), 0);

    second_done.cancel();
    assert_eq!(second.await.unwrap(), Ok(0));
    shared.drained().await;
    assert_eq!(gauge.started.load(SeqCst), 1);
    assert_eq!(gauge.released.load(SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn failure_reaches_all_waiters_then_restarts() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let gate = CancellationToken::new();
    let res = {
        let attempts = attempts.clone();
        let gate = gate.clone();
        Resource::new(move |_scope, emitter: Emitter<usize>| {
            let attempt = attempts.fetch_add(1, SeqCst);
            let gate = gate.clone();
            async move {
                if attempt == 0 {
                    gate.cancelled().await;
                    return Err(ResourceError::failed("boom"));
                }
                Ok(emitter.emit(attempt).await)
            }
        })
        .named("flaky")
    };

    let host = Scope::new();
    let shared = res.share_in(&host, SharingMode::Lazy);

    let waiters: Vec<_> = (0..2)
        .map(|_| {
            let shared = shared.clone();
            tokio::spawn(async move { shared.using(&Scope::new(), |v, _| async move { v }).await })
        })
        .collect();
    wait_for_state(&shared, SharingState::Running { ref_count: 2 }).await;

    gate.cancel();
    for waiter in waiters {
        assert_eq!(waiter.await.unwrap(), Err(ResourceError::failed("boom")));
    }

    let third = shared.using(&Scope::new(), |v, _| async move { v }).await;
    assert_eq!(third, Ok(1));
    assert_eq!(attempts.load(SeqCst), 2);

    host.cancel();
    host.join().await;
}

#[tokio::test(start_paused = true)]
async fn producer_panic_is_delivered_as_failure() {
    let host = Scope::new();
    let res = Resource::new(|_scope, emitter: Emitter<u8>| async move {
        if emitter.is_released() {
            return Ok(emitter.emit(0).await);
        }
        panic!("kaboom");
    });
    let shared = res.share_in(&host, SharingMode::Lazy);

    let err = shared
        .using(&Scope::new(), |v, _| async move { v })
        .await
        .unwrap_err();
    assert_eq!(err, ResourceError::Panicked { info: "kaboom".into() });

    host.cancel();
    host.join().await;
}

#[tokio::test(start_paused = true)]
async fn at_most_one_producer_under_churn() {
    let gauge = Arc::new(Gauge::default());
    let host = Scope::new();
    let shared = gauged(gauge.clone(), Duration::from_millis(3))
        .share_in(&host, SharingMode::WhileUsed { graceful: true });

    let users: Vec<_> = (0..32u64)
        .map(|i| {
            let shared = shared.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(i * 7 % 20)).await;
                shared
                    .using(&Scope::new(), |v, _| async move {
                        tokio::time::sleep(Duration::from_millis(i % 5)).await;
                        v
                    })
                    .await
            })
        })
        .collect();
    for user in users {
        assert!(user.await.unwrap().is_ok());
    }
    shared.drained().await;

    assert_eq!(gauge.max_running.load(SeqCst), 1);
    assert_eq!(gauge.running.load(SeqCst), 0);
    assert_eq!(
        gauge.started.load(SeqCst),
        gauge.released.load(SeqCst),
        "every run was released through its switch"
    );
    assert_eq!(shared.state(), SharingState::NotRunning);
}

#[tokio::test(start_paused = true)]
async fn ref_count_is_conserved() {
    const USERS: usize = 16;

    let gauge = Arc::new(Gauge::default());
    let host = Host::builder(HostConfig::default()).build();
    let mut rx = host.bus().subscribe();
    let shared = host.share(
        gauged(gauge.clone(), Duration::ZERO),
        SharingMode::WhileUsed { graceful: true },
    );

    let release = CancellationToken::new();
    let users: Vec<_> = (0..USERS)
        .map(|_| {
            let shared = shared.clone();
            let release = release.clone();
            tokio::spawn(async move {
                shared
                    .using(&Scope::new(), |_, _| async move { release.cancelled().await })
                    .await
            })
        })
        .collect();
    wait_for_state(&shared, SharingState::Running { ref_count: USERS }).await;
    assert_eq!(gauge.started.load(SeqCst), 1);

    release.cancel();
    for user in users {
        user.await.unwrap().unwrap();
    }
    shared.drained().await;
    assert_eq!(shared.state(), SharingState::NotRunning);

    let mut attached = Vec::new();
    let mut released = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        match ev.kind {
            EventKind::ConsumerAttached => attached.push(ev.ref_count.unwrap()),
            EventKind::ConsumerReleased => released.push(ev.ref_count.unwrap()),
            _ => {}
        }
    }
    assert_eq!(attached, (1..=USERS as u32).collect::<Vec<_>>());
    assert_eq!(released, (0..USERS as u32).rev().collect::<Vec<_>>());

    host.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancelled_use_still_releases_and_joins() {
    let gauge = Arc::new(Gauge::default());
    let host = Scope::new();
    let shared = gauged(gauge.clone(), Duration::from_millis(10))
        .share_in(&host, SharingMode::WhileUsed { graceful: true });

    let caller = Scope::new();
    let pending = shared.using(&caller, |_, _| std::future::pending::<()>());
    assert!(
        tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .is_err()
    );

    caller.join().await;
    shared.drained().await;
    assert_eq!(gauge.released.load(SeqCst), 1);
    assert_eq!(gauge.running.load(SeqCst), 0);
    assert_eq!(shared.state(), SharingState::NotRunning);
}

#[tokio::test(start_paused = true)]
async fn cancelled_caller_keeps_its_lease_until_body_returns() {
    let gauge = Arc::new(Gauge::default());
    let host = Scope::new();
    let shared = gauged(gauge.clone(), Duration::ZERO)
        .share_in(&host, SharingMode::WhileUsed { graceful: true });

    let caller = Scope::new();
    let seen = {
        let (shared, caller, gauge) = (shared.clone(), caller.clone(), gauge.clone());
        move |v: usize, body_scope: Scope| async move {
            caller.cancel();
            assert!(body_scope.is_cancelled());
            tokio::time::sleep(Duration::from_millis(10)).await;

            let during = (shared.state(), gauge.running.load(SeqCst), gauge.released.load(SeqCst));
            let joined = shared
                .using(&Scope::new(), |w, _| async move { w })
                .await
                .unwrap();
            (v, during, joined)
        }
    };
    let (v, during, joined) = shared.using(&caller, seen).await.unwrap();

    assert_eq!(v, 0);
    assert_eq!(during, (SharingState::Running { ref_count: 1 }, 1, 0));
    assert_eq!(joined, 0);

    shared.drained().await;
    assert_eq!(shared.state(), SharingState::NotRunning);
    assert_eq!(gauge.started.load(SeqCst), 1);
    assert_eq!(gauge.max_running.load(SeqCst), 1);
    assert_eq!(gauge.released.load(SeqCst), 1);
    assert_eq!(gauge.cleaned.load(SeqCst), 1);
    caller.join().await;
}

#[tokio::test(start_paused = true)]
async fn restart_waits_for_draining_instance() {
    let gauge = Arc::new(Gauge::default());
    let host = Scope::new();
    let shared = gauged(gauge.clone(), Duration::from_millis(100))
        .share_in(&host, SharingMode::WhileUsed { graceful: true });

    shared.using(&Scope::new(), |_, _| async {}).await.unwrap();
    assert_eq!(shared.state(), SharingState::Stopping);

    let observed = {
        let gauge = gauge.clone();
        shared
            .using(&Scope::new(), move |v, _| async move {
                (v, gauge.running.load(SeqCst), gauge.cleaned.load(SeqCst))
            })
            .await
            .unwrap()
    };
    assert_eq!(observed, (1, 1, 1));
    assert_eq!(gauge.max_running.load(SeqCst), 1);

    host.cancel();
    host.join().await;
}
