// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Listener -> queue -> consumer -> sink, over a real UDP socket

use std::net::UdpSocket;
use std::thread;
use std::time::{Duration, Instant};

use prime_io::{Consumer, ListenMode, Listener, MemorySink, MessageQueue, Sink, SinkConfig};
use prime_protocol::{Decoder, DecoderConfig, DELIMITER};

fn wait_for_lines(memory: &MemorySink, count: usize) -> Vec<String> {
    let deadline = Instant::now() + Duration::from_secs(3);
    while memory.len() < count && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    memory.lines()
}

#[test]
fn test_udp_pipeline_preserves_order_and_scopes_devices() {
    let queue = MessageQueue::new();
    let memory = MemorySink::new();
    let sink = Sink::new(Box::new(memory.clone()), SinkConfig::default()).unwrap();
    let mut worker = Consumer::new(Decoder::new(DecoderConfig::default()), sink, queue.counters())
        .spawn(queue.receiver())
        .unwrap();

    let mut listener = Listener::bind(
        &ListenMode::Udp("127.0.0.1:0".parse().unwrap()),
        65535,
        queue.sender(),
    )
    .unwrap();
    let Listener::Udp(udp) = &listener else {
        panic!("expected a UDP listener");
    };
    let target = udp.local_addr();

    let device = UdpSocket::bind("127.0.0.1:0").unwrap();
    let compact = ["g", "3", "1200", "2"].join(&DELIMITER.to_string());
    for payload in [
        r#"{"type":"PRIME_API_DEV_RETURN_KNOB_DISC_REG","ts":1,"data":[{"id":3,"type":1,"min":100,"max":2000,"init":800}]}"#,
        "garbage",
        compact.as_str(),
    ] {
        device.send_to(payload.as_bytes(), target).unwrap();
    }

    let lines = wait_for_lines(&memory, 2);
    listener.stop();
    worker.stop();

    assert_eq!(
        lines,
        vec![
            "source:127.0.0.1,api:PRIME_API_DEV_RETURN_KNOB_DISC_REG,ts:1,id:3,type:PRIME_FREQ,min:100,max:2000,init:800,",
            "source:127.0.0.1,api:PRIME_API_DEV_KNOB_DISC_SET,ts:2,id:3,val:1200,type:PRIME_FREQ,",
        ]
    );
    assert_eq!(queue.stats().received, 3);
}

#[cfg(unix)]
#[test]
fn test_local_socket_pipeline() {
    use std::os::unix::net::UnixDatagram;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logger.uds");

    let queue = MessageQueue::new();
    let memory = MemorySink::new();
    let sink = Sink::new(Box::new(memory.clone()), SinkConfig::default()).unwrap();
    let mut worker = Consumer::new(Decoder::new(DecoderConfig::default()), sink, queue.counters())
        .spawn(queue.receiver())
        .unwrap();
    let mut listener =
        Listener::bind(&ListenMode::Local(path.clone()), 65535, queue.sender()).unwrap();

    let client = UnixDatagram::unbound().unwrap();
    client
        .send_to(br#"{"type":"APP_REG","ts":1000,"data":{"proc_id":42}}"#, &path)
        .unwrap();

    let lines = wait_for_lines(&memory, 1);
    listener.stop();
    worker.stop();

    assert_eq!(lines, vec!["source:UDS,api:APP_REG,ts:1000,proc_id:42,"]);
    assert!(!path.exists());
}
