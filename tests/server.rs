mod common;

use std::net::{SocketAddrV4, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use common::{RecordingReport, init_test_logging};
use tcpsock::{Report, Socket, SocketAddress, SocketConfig, SocketError, TcpServer, TracingReport};

fn listening_server(report: &dyn Report) -> (TcpServer, SocketAddress) {
    let server = TcpServer::new();
    server.open(report).unwrap();
    server.apply(&SocketConfig::new().reuse_port(true), report).unwrap();
    server
        .bind(SocketAddress::new(SocketAddress::LOCALHOST, SocketAddress::ANY_PORT), report)
        .unwrap();
    server.listen(16, report).unwrap();
    let local = server.local_address(report).unwrap();
    (server, local)
}

#[test]
fn accept_opens_client_through_hooks() {
    init_test_logging();
    let report = TracingReport::default();
    let (server, local) = listening_server(&report);
    assert!(local.has_port());

    let connector = thread::spawn(move || TcpStream::connect(SocketAddrV4::from(local)).unwrap());

    let client = Socket::new();
    let opened = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&opened);
    client.on_opened(move |fd, _| {
        assert!(fd.as_raw_fd() >= 0);
        count.fetch_add(1, Ordering::SeqCst);
    });

    let peer = server.accept(&client, &report).unwrap();
    let stream = connector.join().unwrap();

    assert!(client.is_open());
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(peer.ip(), SocketAddress::LOCALHOST);
    assert_eq!(SocketAddrV4::from(peer), match stream.local_addr().unwrap() {
        std::net::SocketAddr::V4(addr) => addr,
        other => panic!("unexpected address {}", other),
    });
    assert_eq!(client.local_address(&report).unwrap(), local);

    // The accepted socket is a regular socket: options and close work.
    client.set_no_delay(true, &report).unwrap();
    client.close(&report).unwrap();
    assert!(!client.is_open());
    assert!(server.is_open());
}

#[test]
fn accept_into_open_client_fails_without_blocking() {
    let report = RecordingReport::new();
    let (server, _) = listening_server(&report);
    let client = Socket::new();
    client.open(&report).unwrap();
    let handle = client.raw_handle();

    let err = server.accept(&client, &report).unwrap_err();
    assert!(matches!(err, SocketError::AlreadyOpen));
    assert_eq!(client.raw_handle(), handle);
    assert_eq!(report.errors(), vec!["socket is already open".to_owned()]);
}

#[test]
fn listen_and_accept_need_open_server() {
    let report = RecordingReport::new();
    let server = TcpServer::new();
    let client = Socket::new();

    assert!(matches!(server.listen(8, &report), Err(SocketError::NotOpen { operation: "listen" })));
    assert!(matches!(
        server.accept(&client, &report),
        Err(SocketError::NotOpen { operation: "accept" })
    ));
    assert!(!client.is_open());
    assert_eq!(report.errors().len(), 2);
}

#[test]
fn accept_on_non_listening_socket_reports_os_error() {
    let report = RecordingReport::new();
    let server = TcpServer::new();
    server.open(&report).unwrap();
    let client = Socket::new();

    let err = server.accept(&client, &report).unwrap_err();
    assert!(matches!(err, SocketError::Accept { errno } if errno == libc::EINVAL));
    assert!(!client.is_open());
}

#[test]
fn server_close_runs_its_own_hooks() {
    let report = RecordingReport::new();
    let (server, _) = listening_server(&report);
    let closed = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&closed);
    server.on_closed(move |_, _| {
        count.fetch_add(1, Ordering::SeqCst);
    });

    server.close(&report).unwrap();
    assert!(!server.socket().is_open());
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}
