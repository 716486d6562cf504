//! Pool behavior tests against the scripted backend.

use std::time::Duration;

use pgclient::{Error, PgConnectOptions, PgPool, Statement};

mod support;

use support::MockServer;

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("condition was not reached within 5s");
}

fn options(server: &MockServer) -> PgConnectOptions {
    server.connection_string().parse().unwrap()
}

#[tokio::test]
async fn a_released_connection_is_reused() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let pool = PgPool::new(options(&server).max_pool_size(5))?;

    let conn = pool.acquire().await?;
    let pid = conn.backend_process_id();
    drop(conn);

    // release resets in the background before parking the connection
    wait_until(|| pool.num_idle() == 1).await;

    let conn = pool.acquire().await?;
    assert_eq!(conn.backend_process_id(), pid);
    assert_eq!(pool.size(), 1);

    Ok(())
}

#[tokio::test]
async fn idle_connections_are_reused_lifo() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let pool = PgPool::new(options(&server).max_pool_size(5))?;

    let first = pool.acquire().await?;
    let second = pool.acquire().await?;

    let first_pid = first.backend_process_id();
    let second_pid = second.backend_process_id();
    assert_ne!(first_pid, second_pid);

    drop(first);
    wait_until(|| pool.num_idle() == 1).await;
    drop(second);
    wait_until(|| pool.num_idle() == 2).await;

    // the most recently released connection comes back first
    let conn = pool.acquire().await?;
    assert_eq!(conn.backend_process_id(), second_pid);

    Ok(())
}

#[tokio::test]
async fn a_saturated_pool_hands_a_release_to_the_waiter() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let pool = PgPool::new(
        options(&server)
            .max_pool_size(1)
            .acquire_timeout(None), // Timeout=0: wait forever
    )?;

    let conn = pool.acquire().await?;
    let pid = conn.backend_process_id();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await })
    };

    // give the waiter time to actually block on the pool
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(conn);

    let conn = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("waiter should be woken by the release")??;

    assert_eq!(conn.backend_process_id(), pid);
    assert_eq!(pool.size(), 1);

    Ok(())
}

#[tokio::test]
async fn acquire_times_out_when_the_pool_is_exhausted() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let pool = PgPool::new(
        options(&server)
            .max_pool_size(1)
            .acquire_timeout(Some(Duration::from_millis(250))),
    )?;

    let held = pool.acquire().await?;

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, Error::PoolTimedOut));

    // after a release the pool recovers
    drop(held);
    wait_until(|| pool.num_idle() == 1).await;

    let conn = pool.acquire().await?;
    assert_eq!(pool.size(), 1);
    drop(conn);

    Ok(())
}

#[tokio::test]
async fn the_pool_never_exceeds_its_cap() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let pool = PgPool::new(
        options(&server)
            .max_pool_size(2)
            .acquire_timeout(Some(Duration::from_millis(200))),
    )?;

    let first = pool.acquire().await?;
    let second = pool.acquire().await?;

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, Error::PoolTimedOut));
    assert!(pool.size() <= 2);

    drop(first);
    drop(second);

    Ok(())
}

#[tokio::test]
async fn min_pool_size_fills_in_the_background() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let pool = PgPool::new(options(&server).min_pool_size(3).max_pool_size(5))?;

    wait_until(|| pool.size() == 3 && pool.num_idle() == 3).await;

    Ok(())
}

#[tokio::test]
async fn connections_are_reset_on_release() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let pool = PgPool::new(options(&server).max_pool_size(2))?;

    let mut conn = pool.acquire().await?;
    conn.execute_simple("SET search_path = pg_temp").await?;
    drop(conn);

    wait_until(|| server.discard_count() == 1).await;

    Ok(())
}

#[tokio::test]
async fn no_reset_on_close_skips_the_discard() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;

    let connection_string = format!("{};NoResetOnClose=true", server.connection_string());
    let pool = PgPool::new(connection_string.parse()?)?;

    let conn = pool.acquire().await?;
    drop(conn);

    wait_until(|| pool.num_idle() == 1).await;
    assert_eq!(server.discard_count(), 0);

    Ok(())
}

#[tokio::test]
async fn a_broken_connection_is_destroyed_not_pooled() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let pool = PgPool::new(options(&server).max_pool_size(2))?;

    let mut conn = pool.acquire().await?;
    let pid = conn.backend_process_id();

    // the backend drops the socket mid-pipeline
    let err = conn
        .execute_collect(vec![Statement::new("KILL")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_) | Error::Protocol(_)));

    drop(conn);
    wait_until(|| pool.size() == 0).await;

    let conn = pool.acquire().await?;
    assert_ne!(conn.backend_process_id(), pid);

    Ok(())
}

#[tokio::test]
async fn the_registry_shares_pools_by_connection_string() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let connection_string = server.connection_string();

    let first = PgPool::shared(&connection_string)?;
    let second = PgPool::shared(&connection_string)?;

    let conn = first.acquire().await?;
    assert_eq!(second.size(), 1, "both handles see the same pool");
    drop(conn);

    first.close().await;
    assert!(second.is_closed());

    // a closed shared pool is replaced on the next request
    let third = PgPool::shared(&connection_string)?;
    assert!(!third.is_closed());

    Ok(())
}

#[tokio::test]
async fn pooling_false_is_rejected_by_the_registry() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;

    let connection_string = format!("{};Pooling=false", server.connection_string());
    let err = PgPool::shared(&connection_string).unwrap_err();

    assert!(matches!(err, Error::Configuration(_)));

    Ok(())
}

#[tokio::test]
async fn try_acquire_never_waits() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let pool = PgPool::new(options(&server).max_pool_size(2))?;

    // nothing parked yet
    let err = pool.try_acquire().unwrap_err();
    assert!(matches!(err, Error::PoolExhausted));

    let conn = pool.acquire().await?;
    drop(conn);
    wait_until(|| pool.num_idle() == 1).await;

    let conn = pool.try_acquire()?;
    assert_eq!(pool.num_idle(), 0);
    drop(conn);

    Ok(())
}

#[tokio::test]
async fn invalid_sizing_is_rejected_at_creation() {
    let err = PgPool::new(
        PgConnectOptions::new()
            .min_pool_size(8)
            .max_pool_size(4),
    )
    .unwrap_err();

    assert!(matches!(err, Error::Configuration(_)));
}
