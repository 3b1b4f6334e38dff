use unilio::net::{DnsResolver, Endpoint, UdpSocket};
use unilio::{spawn_detached, CancelToken, IoContext, Task};

#[test]
fn udp_roundtrip_reports_sender() {
    let ctx = IoContext::new();
    let (tx, rx) = flume::bounded(1);
    let ctx2 = ctx.clone();

    spawn_detached(
        &ctx,
        Task::new(async move {
            let token = CancelToken::default();
            let mut a = UdpSocket::bind(ctx2.net(), &Endpoint::new("127.0.0.1", 0))
                .expect("bind a failed");
            let mut b = UdpSocket::bind(ctx2.net(), &Endpoint::new("127.0.0.1", 0))
                .expect("bind b failed");
            let a_addr = a.local_addr().expect("local_addr failed");
            let b_addr = b.local_addr().expect("local_addr failed");

            let payload = b"ping";
            let sent = a
                .send_to(payload, &b_addr, &token)
                .await
                .expect("send_to failed");
            assert_eq!(sent, payload.len());

            let mut buf = [0u8; 64];
            let datagram = b.recv_from(&mut buf, &token).await.expect("recv_from failed");
            assert_eq!(datagram.bytes, payload.len());
            assert_eq!(&buf[..datagram.bytes], payload);
            assert_eq!(datagram.from.port, a_addr.port);

            a.close();
            assert!(!a.is_open());

            tx.send(()).ok();
            ctx2.stop();
        }),
    );

    ctx.run();
    rx.recv().unwrap();
}

#[test]
fn dns_resolves_localhost() {
    let ctx = IoContext::new();
    let resolver = DnsResolver::new(&ctx);
    let (tx, rx) = flume::bounded(1);

    let lookup = resolver.resolve("localhost", 8080, CancelToken::default());
    let ctx2 = ctx.clone();
    spawn_detached(
        &ctx,
        Task::new(async move {
            tx.send(lookup.await).ok();
            ctx2.stop();
        }),
    );

    ctx.run();
    let addrs = rx.recv().unwrap().expect("resolution failed");
    assert!(!addrs.is_empty());
    assert!(addrs.iter().all(|a| a.port == 8080));
    assert!(addrs
        .iter()
        .any(|a| a.ip == "127.0.0.1" || a.ip == "::1"));
}

#[test]
fn dns_respects_cancellation() {
    let ctx = IoContext::new();
    let resolver = DnsResolver::new(&ctx);
    let (tx, rx) = flume::bounded(1);

    let src = unilio::CancelSource::new();
    src.request_cancel();
    let lookup = resolver.resolve("localhost", 80, src.token());

    let ctx2 = ctx.clone();
    spawn_detached(
        &ctx,
        Task::new(async move {
            tx.send(lookup.await).ok();
            ctx2.stop();
        }),
    );

    ctx.run();
    assert!(rx.recv().unwrap().unwrap_err().is_canceled());
}
