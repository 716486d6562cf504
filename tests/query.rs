//! End-to-end tests for the extended-query pipeline, run against the
//! scripted backend in `support`.

use std::sync::{Arc, Mutex};

use pgclient::{Error, PgConnection, Statement, StatementType};

mod support;

use support::MockServer;

#[tokio::test]
async fn it_reads_a_single_literal_select() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let mut conn = PgConnection::connect(&server.connection_string()).await?;

    let mut reader = conn.execute(vec![Statement::new("SELECT 8")]).await?;

    let row = reader.read().await?.expect("expected one row");
    assert_eq!(row.try_get::<i32>(0)?, 8);

    assert!(reader.read().await?.is_none());
    assert!(!reader.next_result().await?);

    let statements = reader.close().await?;
    assert_eq!(statements[0].statement_type(), StatementType::Select);
    assert_eq!(statements[0].rows_affected(), 1);

    conn.close().await?;

    Ok(())
}

#[tokio::test]
async fn it_binds_a_positional_parameter() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let mut conn = PgConnection::connect(&server.connection_string()).await?;

    let mut reader = conn
        .execute(vec![Statement::new("SELECT $1").bind(8_i32)])
        .await?;

    let row = reader.read().await?.expect("expected one row");
    assert_eq!(row.try_get::<i32>(0)?, 8);

    assert!(!reader.next_result().await?);

    Ok(())
}

#[tokio::test]
async fn it_pipelines_two_statements() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let mut conn = PgConnection::connect(&server.connection_string()).await?;

    let mut reader = conn
        .execute(vec![
            Statement::new("SELECT $1").bind(8_i32),
            Statement::new("SELECT $1").bind(9_i32),
        ])
        .await?;

    let row = reader.read().await?.expect("first result");
    assert_eq!(row.try_get::<i32>(0)?, 8);

    assert!(reader.next_result().await?);

    let row = reader.read().await?.expect("second result");
    assert_eq!(row.try_get::<i32>(0)?, 9);

    assert!(!reader.next_result().await?);

    Ok(())
}

#[tokio::test]
async fn it_pipelines_a_thousand_statements() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let mut conn = PgConnection::connect(&server.connection_string()).await?;

    let statements: Vec<Statement> = (0..1000)
        .map(|_| Statement::new("SELECT $1").bind(8_i32))
        .collect();

    let results = conn.execute_collect(statements).await?;

    let mut sum: i64 = 0;
    for result in &results {
        for row in &result.rows {
            sum += i64::from(row.try_get::<i32>(0)?);
        }
    }

    assert_eq!(results.len(), 1000);
    assert_eq!(sum, 8000);

    Ok(())
}

#[tokio::test]
async fn it_rejects_output_parameters_before_sending() -> anyhow::Result<()> {
    use pgclient::{ParameterDirection, PgParameter, PgValue};

    let server = MockServer::spawn().await;
    let mut conn = PgConnection::connect(&server.connection_string()).await?;

    let statement = Statement::new("SELECT $1").bind_param(PgParameter {
        value: PgValue::Int4(8),
        direction: ParameterDirection::Output,
        name: None,
    });

    let err = conn.execute(vec![statement]).await.unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)));

    // nothing went on the wire; the connection is still usable
    let mut reader = conn.execute(vec![Statement::new("SELECT 8")]).await?;
    assert_eq!(reader.read().await?.unwrap().try_get::<i32>(0)?, 8);

    Ok(())
}

#[tokio::test]
async fn it_handles_an_empty_query() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let mut conn = PgConnection::connect(&server.connection_string()).await?;

    let mut reader = conn.execute(vec![Statement::new("")]).await?;

    assert!(reader.read().await?.is_none());

    let statements = reader.close().await?;
    assert_eq!(statements[0].rows_affected(), 0);

    Ok(())
}

#[tokio::test]
async fn an_error_mid_pipeline_leaves_the_connection_usable() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let mut conn = PgConnection::connect(&server.connection_string()).await?;

    let mut reader = conn
        .execute(vec![
            Statement::new("SELECT $1").bind(8_i32),
            Statement::new("BROKEN $1").bind(9_i32),
            Statement::new("SELECT $1").bind(10_i32),
        ])
        .await?;

    // the first statement's result arrives intact
    let row = reader.read().await?.expect("first result");
    assert_eq!(row.try_get::<i32>(0)?, 8);
    assert!(reader.read().await?.is_none());

    // the second surfaces the server error; the third was skipped
    let err = reader.next_result().await.unwrap_err();

    match err {
        Error::Database(err) => assert_eq!(err.code(), "42601"),
        other => panic!("expected a database error, got {other:?}"),
    }

    // the pipeline drained to ReadyForQuery; the connection works again
    let mut reader = conn.execute(vec![Statement::new("SELECT 5")]).await?;
    assert_eq!(reader.read().await?.unwrap().try_get::<i32>(0)?, 5);

    Ok(())
}

#[tokio::test]
async fn it_prepares_and_reexecutes_a_statement() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let mut conn = PgConnection::connect(&server.connection_string()).await?;

    let mut statement = Statement::new("SELECT $1");
    conn.prepare(&mut statement).await?;

    assert!(statement.is_prepared());
    assert!(statement.prepared_name().unwrap().starts_with("_pg_s_"));
    assert_eq!(statement.param_types().unwrap().len(), 1);
    assert_eq!(statement.columns().unwrap().len(), 1);

    for value in [3_i32, 4_i32] {
        let mut reader = conn
            .execute(vec![statement.clone().bind(value)])
            .await?;

        assert_eq!(reader.read().await?.unwrap().try_get::<i32>(0)?, value);
        reader.close().await?;
    }

    conn.unprepare(&mut statement).await?;
    assert!(!statement.is_prepared());

    Ok(())
}

#[tokio::test]
async fn it_tracks_non_select_results() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let mut conn = PgConnection::connect(&server.connection_string()).await?;

    let statements = conn
        .execute(vec![Statement::new("INSERT INTO t VALUES ($1)").bind(1_i32)])
        .await?
        .close()
        .await?;

    assert_eq!(statements[0].statement_type(), StatementType::Insert);
    assert_eq!(statements[0].rows_affected(), 1);

    Ok(())
}

#[tokio::test]
async fn notices_reach_the_handler_without_interrupting() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let mut conn = PgConnection::connect(&server.connection_string()).await?;

    let notices: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&notices);

    conn.set_notice_handler(Box::new(move |notice| {
        sink.lock().unwrap().push(notice.message().to_owned());
    }));

    let statements = conn
        .execute(vec![Statement::new("NOTICE")])
        .await?
        .close()
        .await?;

    assert_eq!(statements[0].rows_affected(), 0);
    assert_eq!(
        notices.lock().unwrap().as_slice(),
        ["something you should know"]
    );

    Ok(())
}

#[tokio::test]
async fn max_rows_limits_a_result() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let mut conn = PgConnection::connect(&server.connection_string()).await?;

    let mut reader = conn
        .execute(vec![Statement::new("SELECT $1").bind(8_i32).max_rows(1)])
        .await?;

    assert_eq!(reader.read().await?.unwrap().try_get::<i32>(0)?, 8);

    // the portal suspended; the result is over, the pipeline completes
    assert!(reader.read().await?.is_none());
    assert!(!reader.next_result().await?);

    Ok(())
}

#[tokio::test]
async fn the_simple_protocol_reports_rows_affected() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let mut conn = PgConnection::connect(&server.connection_string()).await?;

    assert_eq!(conn.execute_simple("SELECT 5").await?, 1);

    Ok(())
}

#[tokio::test]
async fn it_connects_after_a_declined_ssl_probe() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;

    let connection_string = format!("{};SslMode=prefer", server.connection_string());
    let mut conn = PgConnection::connect(&connection_string).await?;

    assert_eq!(conn.execute_simple("SELECT 1").await?, 1);

    Ok(())
}

#[tokio::test]
async fn it_authenticates_with_a_cleartext_password() -> anyhow::Result<()> {
    let server = MockServer::spawn_with_auth(support::AuthMode::Cleartext("secret")).await;

    // the connection string carries Password=secret
    let mut conn = PgConnection::connect(&server.connection_string()).await?;
    assert_eq!(conn.execute_simple("SELECT 1").await?, 1);

    Ok(())
}

#[tokio::test]
async fn a_wrong_password_fails_authentication() -> anyhow::Result<()> {
    let server = MockServer::spawn_with_auth(support::AuthMode::Cleartext("hunter2")).await;

    let err = PgConnection::connect(&server.connection_string())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Authentication(_)));

    Ok(())
}

#[tokio::test]
async fn cancel_requests_travel_on_a_second_connection() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let conn = PgConnection::connect(&server.connection_string()).await?;

    let pid = conn.backend_process_id();
    conn.cancel_query().await?;

    // the cancel connection is independent; poll until the server logs it
    for _ in 0..100 {
        if server.cancelled_pids().contains(&pid) {
            return Ok(());
        }

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("cancel request never arrived");
}

#[tokio::test]
async fn backend_parameters_are_captured() -> anyhow::Result<()> {
    let server = MockServer::spawn().await;
    let conn = PgConnection::connect(&server.connection_string()).await?;

    assert_eq!(conn.parameter("server_version"), Some("14.5"));
    assert_eq!(conn.parameter("client_encoding"), Some("UTF8"));

    Ok(())
}
