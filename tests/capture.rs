//! Capture path: configuration on disk, pcap stream, reassembly, history queries

mod common;

use common::{Workspace, ethernet_udp_frame, init_tracing, pcap_stream};
use slatewire::sources::PcapSource;
use slatewire::{Slate, SlateConfig, Value};
use std::io::Cursor;
use std::time::Duration;

async fn wait_until_stopped(sniffer: &slatewire::Sniffer) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while sniffer.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("capture did not finish");
}

#[test]
fn flag_message_has_the_documented_layout() -> anyhow::Result<()> {
    let (_workspace, config) = Workspace::with_services("layout", 6250, 6251);
    let registry = Slate::registry(&SlateConfig::load(config)?)?;
    let schema = registry.schema("frontend_to_control").expect("schema loaded");

    let values = vec![
        Value::UInt32(288),
        Value::UInt32(0x2455_D067),
        Value::UInt64(0),
        Value::UInt32(0),
        Value::from(true),
    ];
    let bytes = schema.encode(&values)?;

    let mut expected = vec![0x00, 0x00, 0x01, 0x20, 0x24, 0x55, 0xD0, 0x67];
    expected.extend_from_slice(&[0u8; 12]);
    expected.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
    assert_eq!(bytes, expected);
    assert_eq!(schema.decode(&bytes)?, values);

    let directory_crc = &registry.by_name("frontend_to_control").unwrap().service.crc;
    assert_eq!(*directory_crc, 610193511);
    Ok(())
}

#[test]
fn includes_are_spliced_in_place() -> anyhow::Result<()> {
    let (_workspace, config) = Workspace::with_services("includes", 6250, 6251);
    let registry = Slate::registry(&SlateConfig::load(config)?)?;
    let schema = registry.schema("router_to_control").expect("schema loaded");

    let body: Vec<&str> = schema.body().iter().map(|field| field.name.as_str()).collect();
    assert_eq!(body, vec!["Mode", "Counter", "Speed"]);
    assert_eq!(schema.wire_size(), 27);
    Ok(())
}

#[tokio::test]
async fn pcap_capture_fills_the_history() -> anyhow::Result<()> {
    init_tracing();
    let (_workspace, config) = Workspace::with_services("pcap", 6250, 6251);
    let config = SlateConfig::load(config)?;
    let mut sniffer = Slate::sniffer(&config)?;

    let router = sniffer.registry().schema("router_to_control").cloned().expect("schema loaded");
    let mut status = router.default_message();
    status[router.index_of("Mode").unwrap()] = Value::UInt8(3);
    status[router.index_of("Counter").unwrap()] = Value::UInt16(513);
    status[router.index_of("Speed").unwrap()] = Value::Float32(12.5);
    let status_bytes = router.encode(&status)?;

    // Split so the continuation stays below the wire size
    let mut continuation = vec![0xAA; 20];
    continuation.extend_from_slice(&status_bytes[22..]);

    let frontend =
        sniffer.registry().schema("frontend_to_control").cloned().expect("schema loaded");
    let mut flag = frontend.default_message();
    flag[4] = Value::from(true);
    let flag_bytes = frontend.encode(&flag)?;

    let frames = vec![
        ethernet_udp_frame(6251, &status_bytes[..22]),
        ethernet_udp_frame(53, b"dns query"),
        ethernet_udp_frame(6250, &flag_bytes),
        ethernet_udp_frame(6251, &continuation),
    ];

    sniffer.start(PcapSource::new(Cursor::new(pcap_stream(&frames))).await?).await;
    wait_until_stopped(&sniffer).await;

    let stats = sniffer.stats();
    assert_eq!(stats.records, 4);
    assert_eq!(stats.dispatched, 2);
    assert_eq!(stats.dropped, 0);

    let statuses = sniffer.list_messages("router_to_control", None).expect("known service");
    assert_eq!(statuses.len(), 1);
    assert_eq!(&*statuses[0].fields, status.as_slice());

    let flags = sniffer.list_messages("frontend_to_control", None).expect("known service");
    assert_eq!(&*flags[0].fields, flag.as_slice());
    Ok(())
}

#[tokio::test]
async fn polling_by_last_id_sees_every_retained_message_once() -> anyhow::Result<()> {
    let (_workspace, config) = Workspace::with_services("polling", 6250, 6251);
    let config = SlateConfig::load(config)?;
    let mut sniffer = Slate::sniffer(&config)?;

    let frontend =
        sniffer.registry().schema("frontend_to_control").cloned().expect("schema loaded");
    let frames: Vec<Vec<u8>> = (0..7u64)
        .map(|seq| {
            let mut message = frontend.default_message();
            message[2] = Value::UInt64(seq);
            ethernet_udp_frame(6250, &frontend.encode(&message).unwrap())
        })
        .collect();

    sniffer.start(PcapSource::new(Cursor::new(pcap_stream(&frames[..3]))).await?).await;
    wait_until_stopped(&sniffer).await;

    let first = sniffer.list_messages("frontend_to_control", None).unwrap();
    let ids: Vec<u64> = first.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    let last_id = first.last().map(|m| m.id);

    // A second capture continues the same history; capacity 5 evicts one at a time
    sniffer.start(PcapSource::new(Cursor::new(pcap_stream(&frames[3..]))).await?).await;
    wait_until_stopped(&sniffer).await;

    let next = sniffer.list_messages("frontend_to_control", last_id).unwrap();
    let ids: Vec<u64> = next.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![3, 4, 5, 6]);
    assert_eq!(next[3].fields[2], Value::UInt64(6));

    let all = sniffer.list_messages("frontend_to_control", Some(0)).unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all[0].id, 2);

    assert!(sniffer.list_messages("frontend_to_control", Some(6)).unwrap().is_empty());
    assert!(sniffer.list_messages("unknown_service", None).is_none());
    Ok(())
}
