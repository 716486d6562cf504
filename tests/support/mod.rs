//! A scripted in-process PostgreSQL backend.
//!
//! Listens on a loopback port, speaks enough of wire-protocol v3 to carry
//! the extended-query and simple-query flows, and echoes bound parameters
//! back as rows. Understands a handful of SQL shapes:
//!
//! * `SELECT <int>` — one int4 row with the literal
//! * `SELECT $1` — one int4 row echoing the bound parameter
//! * `INSERT …` — no rows, tag `INSERT 0 1`
//! * `NOTICE` — a NoticeResponse followed by an empty result
//! * `BROKEN …` — an ErrorResponse at parse time (statements after it are
//!   skipped until Sync, like a real backend)
//! * `KILL` — the backend drops the socket mid-pipeline
//! * `DISCARD ALL` (simple protocol) — counted, so tests can observe resets
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const PROTOCOL_VERSION: i32 = 196608;
const SSL_REQUEST_CODE: i32 = 80877103;
const CANCEL_REQUEST_CODE: i32 = 80877102;

#[derive(Copy, Clone)]
pub enum AuthMode {
    Trust,
    Cleartext(&'static str),
}

#[derive(Default)]
pub struct ServerState {
    next_pid: AtomicU32,
    discards: AtomicUsize,
    cancelled_pids: Mutex<Vec<u32>>,
}

pub struct MockServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl MockServer {
    pub async fn spawn() -> Self {
        Self::spawn_with_auth(AuthMode::Trust).await
    }

    pub async fn spawn_with_auth(auth: AuthMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(ServerState {
            next_pid: AtomicU32::new(4000),
            ..ServerState::default()
        });

        let accept_state = Arc::clone(&state);

        tokio::spawn(async move {
            loop {
                let (socket, _) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(_) => return,
                };

                let state = Arc::clone(&accept_state);

                tokio::spawn(async move {
                    let _ = serve(socket, state, auth).await;
                });
            }
        });

        MockServer { addr, state }
    }

    pub fn connection_string(&self) -> String {
        format!(
            "Host=127.0.0.1;Port={};Username=mock;Password=secret;Database=mockdb",
            self.addr.port()
        )
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// How many `DISCARD ALL`s the server has seen (pool resets).
    pub fn discard_count(&self) -> usize {
        self.state.discards.load(Ordering::SeqCst)
    }

    /// Backend pids that received a CancelRequest.
    pub fn cancelled_pids(&self) -> Vec<u32> {
        self.state.cancelled_pids.lock().unwrap().clone()
    }
}

async fn serve(mut socket: TcpStream, state: Arc<ServerState>, auth: AuthMode) -> Option<()> {
    // startup phase: length-prefixed, no type byte; SSLRequest may precede it
    loop {
        let len = socket.read_i32().await.ok()?;
        let mut body = vec![0_u8; (len - 4) as usize];
        socket.read_exact(&mut body).await.ok()?;

        let mut buf = &body[..];
        let code = get_i32(&mut buf);

        if code == SSL_REQUEST_CODE {
            socket.write_all(b"N").await.ok()?;
            continue;
        }

        if code == CANCEL_REQUEST_CODE {
            let pid = get_i32(&mut buf) as u32;
            state.cancelled_pids.lock().unwrap().push(pid);
            return Some(());
        }

        assert_eq!(code, PROTOCOL_VERSION, "unexpected startup code");
        break;
    }

    let mut out = Vec::new();

    if let AuthMode::Cleartext(expected) = auth {
        // AuthenticationCleartextPassword
        push_msg(&mut out, b'R', &3_i32.to_be_bytes());
        socket.write_all(&out).await.ok()?;
        out.clear();

        let (ty, body) = read_frame(&mut socket).await?;
        let mut buf = &body[..];

        if ty != b'p' || get_cstr(&mut buf) != expected {
            error_response(&mut out, "FATAL", "28P01", "password authentication failed");
            socket.write_all(&out).await.ok()?;
            return Some(());
        }
    }

    let pid = state.next_pid.fetch_add(1, Ordering::SeqCst);

    // AuthenticationOk
    push_msg(&mut out, b'R', &0_i32.to_be_bytes());
    parameter_status(&mut out, "server_version", "14.5");
    parameter_status(&mut out, "client_encoding", "UTF8");

    // BackendKeyData
    let mut key_data = Vec::new();
    key_data.extend_from_slice(&pid.to_be_bytes());
    key_data.extend_from_slice(&(pid.wrapping_mul(31)).to_be_bytes());
    push_msg(&mut out, b'K', &key_data);

    ready_for_query(&mut out);
    socket.write_all(&out).await.ok()?;
    out.clear();

    // command phase
    let mut statements: HashMap<String, String> = HashMap::new();
    let mut portal_sql = String::new();
    let mut portal_param: Option<Vec<u8>> = None;
    let mut skip_until_sync = false;

    loop {
        let (ty, body) = read_frame(&mut socket).await?;
        let mut buf = &body[..];

        match ty {
            b'P' => {
                if skip_until_sync {
                    continue;
                }

                let name = get_cstr(&mut buf);
                let sql = get_cstr(&mut buf);

                if sql.starts_with("KILL") {
                    return Some(());
                }

                if sql.starts_with("BROKEN") {
                    error_response(&mut out, "ERROR", "42601", "syntax error");
                    skip_until_sync = true;
                    continue;
                }

                statements.insert(name, sql);
                push_msg(&mut out, b'1', &[]);
            }

            b'D' => {
                if skip_until_sync {
                    continue;
                }

                let _kind = get_u8(&mut buf);
                let name = get_cstr(&mut buf);
                let sql = statements.get(&name).cloned().unwrap_or_default();

                // ParameterDescription
                let mut params = Vec::new();
                if sql.contains("$1") {
                    params.extend_from_slice(&1_i16.to_be_bytes());
                    params.extend_from_slice(&23_u32.to_be_bytes());
                } else {
                    params.extend_from_slice(&0_i16.to_be_bytes());
                }
                push_msg(&mut out, b't', &params);

                if sql.starts_with("SELECT") {
                    row_description_int4(&mut out);
                } else {
                    // NoData
                    push_msg(&mut out, b'n', &[]);
                }
            }

            b'B' => {
                if skip_until_sync {
                    continue;
                }

                let _portal = get_cstr(&mut buf);
                let statement = get_cstr(&mut buf);

                portal_sql = statements.get(&statement).cloned().unwrap_or_default();

                let n_formats = get_i16(&mut buf);
                for _ in 0..n_formats {
                    get_i16(&mut buf);
                }

                let n_params = get_i16(&mut buf);
                portal_param = None;

                for index in 0..n_params {
                    let len = get_i32(&mut buf);

                    if len >= 0 {
                        let bytes = buf[..len as usize].to_vec();
                        buf = &buf[len as usize..];

                        if index == 0 {
                            portal_param = Some(bytes);
                        }
                    }
                }

                push_msg(&mut out, b'2', &[]);
            }

            b'E' => {
                if skip_until_sync {
                    continue;
                }

                let _portal = get_cstr(&mut buf);
                let limit = get_i32(&mut buf);
                let sql = portal_sql.trim().to_owned();

                if sql.is_empty() {
                    // EmptyQueryResponse
                    push_msg(&mut out, b'I', &[]);
                } else if sql.starts_with("SELECT") {
                    let value = match &portal_param {
                        Some(bytes) => bytes.clone(),
                        None => {
                            let literal: i32 = sql["SELECT".len()..].trim().parse().unwrap();
                            literal.to_be_bytes().to_vec()
                        }
                    };

                    data_row(&mut out, &value);

                    if limit != 0 {
                        // PortalSuspended: the row budget ran out
                        push_msg(&mut out, b's', &[]);
                    } else {
                        command_complete(&mut out, "SELECT 1");
                    }
                } else if sql.starts_with("INSERT") {
                    command_complete(&mut out, "INSERT 0 1");
                } else if sql.starts_with("NOTICE") {
                    notice_response(&mut out, "something you should know");
                    command_complete(&mut out, "SELECT 0");
                } else {
                    command_complete(&mut out, "SET");
                }
            }

            b'C' => {
                if skip_until_sync {
                    continue;
                }

                // Close statement/portal
                let _kind = get_u8(&mut buf);
                let name = get_cstr(&mut buf);
                statements.remove(&name);

                push_msg(&mut out, b'3', &[]);
            }

            b'S' => {
                skip_until_sync = false;
                ready_for_query(&mut out);

                socket.write_all(&out).await.ok()?;
                out.clear();
            }

            b'H' => {
                socket.write_all(&out).await.ok()?;
                out.clear();
            }

            b'Q' => {
                let sql = get_cstr(&mut buf);
                let sql = sql.trim();

                if sql == "DISCARD ALL" {
                    state.discards.fetch_add(1, Ordering::SeqCst);
                    command_complete(&mut out, "DISCARD ALL");
                } else if let Some(rest) = sql.strip_prefix("SELECT ") {
                    let literal: i32 = rest.trim().parse().unwrap();

                    row_description_int4_text(&mut out);
                    data_row(&mut out, literal.to_string().as_bytes());
                    command_complete(&mut out, "SELECT 1");
                } else {
                    command_complete(&mut out, "SET");
                }

                ready_for_query(&mut out);
                socket.write_all(&out).await.ok()?;
                out.clear();
            }

            b'X' => return Some(()),

            other => panic!("mock server: unexpected frontend message {:?}", other as char),
        }
    }
}

async fn read_frame(socket: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let ty = socket.read_u8().await.ok()?;
    let len = socket.read_i32().await.ok()?;

    let mut body = vec![0_u8; (len - 4) as usize];
    socket.read_exact(&mut body).await.ok()?;

    Some((ty, body))
}

fn get_u8(buf: &mut &[u8]) -> u8 {
    let v = buf[0];
    *buf = &buf[1..];
    v
}

fn get_i16(buf: &mut &[u8]) -> i16 {
    let v = i16::from_be_bytes(buf[..2].try_into().unwrap());
    *buf = &buf[2..];
    v
}

fn get_i32(buf: &mut &[u8]) -> i32 {
    let v = i32::from_be_bytes(buf[..4].try_into().unwrap());
    *buf = &buf[4..];
    v
}

fn get_cstr(buf: &mut &[u8]) -> String {
    let pos = buf.iter().position(|&b| b == 0).expect("missing NUL");
    let s = String::from_utf8(buf[..pos].to_vec()).unwrap();
    *buf = &buf[pos + 1..];
    s
}

fn push_msg(out: &mut Vec<u8>, ty: u8, body: &[u8]) {
    out.push(ty);
    out.extend_from_slice(&((body.len() + 4) as i32).to_be_bytes());
    out.extend_from_slice(body);
}

fn parameter_status(out: &mut Vec<u8>, name: &str, value: &str) {
    let mut body = Vec::new();
    push_cstr(&mut body, name);
    push_cstr(&mut body, value);
    push_msg(out, b'S', &body);
}

fn ready_for_query(out: &mut Vec<u8>) {
    push_msg(out, b'Z', b"I");
}

fn row_description_int4(out: &mut Vec<u8>) {
    row_description(out, 1);
}

fn row_description_int4_text(out: &mut Vec<u8>) {
    row_description(out, 0);
}

fn row_description(out: &mut Vec<u8>, format: i16) {
    let mut body = Vec::new();
    body.extend_from_slice(&1_i16.to_be_bytes()); // one field
    push_cstr(&mut body, "?column?");
    body.extend_from_slice(&0_u32.to_be_bytes()); // table oid
    body.extend_from_slice(&0_i16.to_be_bytes()); // column id
    body.extend_from_slice(&23_u32.to_be_bytes()); // int4
    body.extend_from_slice(&4_i16.to_be_bytes()); // type size
    body.extend_from_slice(&(-1_i32).to_be_bytes()); // type modifier
    body.extend_from_slice(&format.to_be_bytes());
    push_msg(out, b'T', &body);
}

fn data_row(out: &mut Vec<u8>, value: &[u8]) {
    let mut body = Vec::new();
    body.extend_from_slice(&1_i16.to_be_bytes());
    body.extend_from_slice(&(value.len() as i32).to_be_bytes());
    body.extend_from_slice(value);
    push_msg(out, b'D', &body);
}

fn command_complete(out: &mut Vec<u8>, tag: &str) {
    let mut body = Vec::new();
    push_cstr(&mut body, tag);
    push_msg(out, b'C', &body);
}

fn error_response(out: &mut Vec<u8>, severity: &str, code: &str, message: &str) {
    let mut body = Vec::new();
    push_field(&mut body, b'S', severity);
    push_field(&mut body, b'V', severity);
    push_field(&mut body, b'C', code);
    push_field(&mut body, b'M', message);
    body.push(0);
    push_msg(out, b'E', &body);
}

fn notice_response(out: &mut Vec<u8>, message: &str) {
    let mut body = Vec::new();
    push_field(&mut body, b'S', "NOTICE");
    push_field(&mut body, b'V', "NOTICE");
    push_field(&mut body, b'C', "01000");
    push_field(&mut body, b'M', message);
    body.push(0);
    push_msg(out, b'N', &body);
}

fn push_field(body: &mut Vec<u8>, code: u8, value: &str) {
    body.push(code);
    push_cstr(body, value);
}

fn push_cstr(body: &mut Vec<u8>, s: &str) {
    body.extend_from_slice(s.as_bytes());
    body.push(0);
}
