//! # Resource Chain Example
//!
//! Composes resources without sharing them:
//! - `flat_map`: a session that lives strictly inside its connection;
//! - `map`: a derived view of the session;
//! - `catch`: a producer failure turned into a value for the body;
//! - `deferred`: production overlapped with unrelated setup work;
//! - `traced`: each use wrapped in a `tracing` span.
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example resource_chain
//! ```

use std::time::Duration;

use taskshare::{Resource, ResourceError, Scope};
use tracing_subscriber::EnvFilter;

fn connection(addr: &'static str) -> Resource<String> {
    Resource::new(move |_scope, emitter| async move {
        println!("  connect {addr}");
        let consumed = emitter.emit(format!("conn({addr})")).await;
        println!("  disconnect {addr}");
        Ok(consumed)
    })
    .named("connection")
}

fn session(conn: String) -> Resource<String> {
    Resource::new(move |_scope, emitter| {
        let conn = conn.clone();
        async move {
            println!("  begin session on {conn}");
            let consumed = emitter.emit(format!("session[{conn}]")).await;
            println!("  end session on {conn}");
            Ok(consumed)
        }
    })
    .named("session")
}

fn unreachable_replica() -> Resource<String> {
    Resource::new(|_scope, _emitter| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Err(ResourceError::failed("replica unreachable"))
    })
    .named("replica")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let scope = Scope::new();

    println!("nested session:");
    let label_len = connection("primary:5432")
        .flat_map(session)
        .map(|s| s.to_uppercase())
        .traced("primary-session")
        .using(&scope, |label, _| async move {
            println!("  using {label}");
            label.len()
        })
        .await?;
    println!("  label length {label_len}");

    println!("recovered failure:");
    let outcome = unreachable_replica()
        .catch()
        .using(&scope, |res, _| async move {
            match res {
                Ok(conn) => format!("replica ok: {conn}"),
                Err(err) => format!("replica skipped: {err}"),
            }
        })
        .await?;
    println!("  {outcome}");

    println!("deferred connection:");
    let conn = connection("analytics:9000")
        .deferred(false)
        .using(&scope, |pending, _| async move {
            println!("  loading config while connecting...");
            tokio::time::sleep(Duration::from_millis(20)).await;
            pending.get().await
        })
        .await??;
    println!("  got {conn}");

    scope.join().await;
    Ok(())
}
