//! The blocking facade drives the same protocol engine to completion on its
//! own runtime; these tests run without any async scaffolding of their own.

use pgclient::{blocking, Statement};

mod support;

use support::MockServer;

// the mock backend still needs a runtime of its own to accept connections
fn spawn_server() -> (tokio::runtime::Runtime, MockServer) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(MockServer::spawn());

    (runtime, server)
}

#[test]
fn it_round_trips_a_query() {
    let (_runtime, server) = spawn_server();

    let mut conn = blocking::PgConnection::connect(&server.connection_string()).unwrap();

    let results = conn
        .execute(vec![Statement::new("SELECT $1").bind(7_i32)])
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].rows.len(), 1);
    assert_eq!(results[0].rows[0].try_get::<i32>(0).unwrap(), 7);

    conn.close().unwrap();
}

#[test]
fn the_blocking_pool_returns_connections() {
    let (_runtime, server) = spawn_server();

    let pool = blocking::PgPool::new(server.connection_string().parse().unwrap()).unwrap();

    let mut conn = pool.acquire().unwrap();
    let pid = conn.backend_process_id();

    assert_eq!(conn.execute_simple("SELECT 3").unwrap(), 1);
    drop(conn);

    // the reset happens on the facade's background worker
    for _ in 0..500 {
        if pool.num_idle() == 1 {
            break;
        }

        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    let conn = pool.acquire().unwrap();
    assert_eq!(conn.backend_process_id(), pid);
}
