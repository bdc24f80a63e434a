//! # Shared Connection Example
//!
//! One "connection" shared by several workers. It opens on first use, stays
//! open while any worker holds it, and closes gracefully once the last one
//! leaves. A second wave of workers reopens it.
//!
//! Lifecycle events are printed by the built-in `LogWriter` and counted by a
//! custom subscriber.
//!
//! ## Run
//! ```bash
//! cargo run --example shared_connection --features logging
//! ```

use std::{
    sync::Arc,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use taskshare::{
    Event, EventKind, Host, HostConfig, LogWriter, Resource, Scope, SharingMode, Subscribe,
};

struct OpenCounter {
    opened: AtomicU64,
    stopped: AtomicU64,
}

#[async_trait::async_trait]
impl Subscribe for OpenCounter {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::HotStarting => {
                self.opened.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::HotStopped => {
                self.stopped.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }
    fn name(&self) -> &'static str {
        "open_counter"
    }
}

fn connection() -> Resource<Arc<str>> {
    let serial = Arc::new(AtomicU64::new(0));
    Resource::new(move |_scope, emitter| {
        let id = serial.fetch_add(1, Ordering::Relaxed) + 1;
        async move {
            println!("  open  conn#{id}");
            tokio::time::sleep(Duration::from_millis(50)).await;

            let consumed = emitter.emit(Arc::from(format!("conn#{id}"))).await;

            tokio::time::sleep(Duration::from_millis(20)).await;
            println!("  close conn#{id}");
            Ok(consumed)
        }
    })
    .named("db")
}

async fn wave(shared: &taskshare::SharedResource<Arc<str>>, label: &'static str, workers: u64) {
    let caller = Scope::new();
    for i in 0..workers {
        let shared = shared.clone();
        let scope = caller.clone();
        caller.spawn(async move {
            let res = shared
                .using(&scope, |conn, _| async move {
                    tokio::time::sleep(Duration::from_millis(30 * (i + 1))).await;
                    println!("  {label} worker {i} used {conn}");
                })
                .await;
            if let Err(err) = res {
                eprintln!("  {label} worker {i} failed: {err}");
            }
        });
    }
    caller.join().await;
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let counter = Arc::new(OpenCounter {
        opened: AtomicU64::new(0),
        stopped: AtomicU64::new(0),
    });
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new()), counter.clone()];

    let host = Host::builder(HostConfig {
        grace: Duration::from_secs(2),
        ..HostConfig::default()
    })
    .with_subscribers(subs)
    .build();

    let shared = host.share(connection(), SharingMode::WhileUsed { graceful: true });

    println!("first wave");
    wave(&shared, "first", 3).await;
    shared.drained().await;
    println!("state after first wave: {:?}", shared.state());

    println!("second wave");
    wave(&shared, "second", 2).await;

    host.shutdown().await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!();
    println!("Connections:");
    println!(" ├─► Opened:  {}", counter.opened.load(Ordering::Relaxed));
    println!(" └─► Stopped: {}", counter.stopped.load(Ordering::Relaxed));
    Ok(())
}
