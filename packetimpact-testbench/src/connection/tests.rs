//! Connection scenarios against a scripted in-memory peer

use super::*;
use crate::testing::{bare_ipv4_from_peer, endpoints, ipv6_from_peer, tcp_from_peer, udp_from_peer, Wire};
use crate::{Ipv6Conn, TcpIpv4, UdpIpv4};
use packetimpact_packet::{IpProtocol, Ipv4, Ipv6, Payload, SeqNum, Tcp, TcpFlags, Udp};
use std::net::{Ipv4Addr, TcpListener};

const SERVER_PORT: u16 = 8080;
const SHORT: Duration = Duration::from_millis(50);

fn tcp_conn(wire: &Wire) -> TcpIpv4 {
    let (injector, sniffer) = wire.link();
    TcpIpv4::with_link(
        &endpoints(),
        Tcp {
            dst_port: Some(SERVER_PORT),
            ..Default::default()
        },
        Tcp {
            src_port: Some(SERVER_PORT),
            ..Default::default()
        },
        injector,
        sniffer,
    )
    .unwrap()
}

fn udp_conn(wire: &Wire) -> UdpIpv4 {
    let (injector, sniffer) = wire.link();
    UdpIpv4::with_link(
        &endpoints(),
        Udp {
            dst_port: Some(53),
            ..Default::default()
        },
        Udp {
            src_port: Some(53),
            ..Default::default()
        },
        injector,
        sniffer,
    )
    .unwrap()
}

/// A segment from the server to the connection's reserved port
fn server_segment(conn: &TcpIpv4, tcp: Tcp, payload: &[u8]) -> Frame {
    let mut segment = Tcp {
        src_port: Some(SERVER_PORT),
        dst_port: conn.local_port(),
        ..Default::default()
    };
    segment.merge(&tcp);
    tcp_from_peer(&endpoints(), segment, payload)
}

/// A datagram from the server to the connection's reserved port
fn server_datagram(conn: &UdpIpv4, payload: &[u8]) -> Frame {
    let udp = Udp {
        src_port: Some(53),
        dst_port: Some(conn.local_addr().port()),
        ..Default::default()
    };
    udp_from_peer(&endpoints(), udp, payload)
}

fn tcp_at(frame: &Frame) -> &Tcp {
    frame.get(2).and_then(Layer::as_tcp).unwrap()
}

/// Answers a SYN with a SYN-ACK starting at `server_seq`
fn accept_with(server_seq: u32) -> impl FnMut(&Frame) -> Vec<Frame> + Send + 'static {
    let endpoints = endpoints();
    move |sent: &Frame| {
        let Some(syn) = sent.get(2).and_then(Layer::as_tcp) else {
            return Vec::new();
        };
        if syn.flags != Some(TcpFlags::SYN) {
            return Vec::new();
        }
        let syn_ack = Tcp {
            src_port: syn.dst_port,
            dst_port: syn.src_port,
            seq_num: Some(server_seq),
            ack_num: syn.seq_num.map(|seq| seq.wrapping_add(1)),
            flags: Some(TcpFlags::SYN_ACK),
            ..Default::default()
        };
        vec![tcp_from_peer(&endpoints, syn_ack, &[])]
    }
}

mod create_frame_tests {
    use super::*;

    #[test]
    fn test_override_merges_into_innermost() {
        let wire = Wire::new();
        let conn = tcp_conn(&wire);
        let frame = conn
            .create_frame(
                Tcp {
                    window_size: Some(10),
                    ..Tcp::with_flags(TcpFlags::SYN)
                },
                Vec::new(),
            )
            .unwrap();

        assert_eq!(frame.len(), 3);
        let Layer::Ether(ether) = &frame[0] else { panic!("not an Ether layer") };
        assert_eq!(ether.src_addr, Some(endpoints().local_mac));
        let tcp = tcp_at(&frame);
        assert_eq!(tcp.src_port, conn.local_port());
        assert_eq!(tcp.dst_port, Some(SERVER_PORT));
        assert_eq!(tcp.seq_num, conn.local_seq_num().map(SeqNum::value));
        assert_eq!(tcp.window_size, Some(10));
        assert_eq!(tcp.flags, Some(TcpFlags::SYN));
    }

    #[test]
    fn test_additional_layers_are_appended() {
        let wire = Wire::new();
        let conn = tcp_conn(&wire);
        let frame = conn
            .create_frame(Tcp::default(), vec![Layer::Payload(Payload::from("abc"))])
            .unwrap();
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.last(), Some(&Layer::Payload(Payload::from("abc"))));
    }

    #[test]
    fn test_mismatched_override_fails() {
        let wire = Wire::new();
        let conn = tcp_conn(&wire);
        let err = conn
            .connection()
            .create_frame(&Layer::Udp(Udp::default()), Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::LayerMismatch { .. }));
    }

    #[test]
    fn test_udp_round_trip() {
        let wire = Wire::new();
        let conn = udp_conn(&wire);
        let frame = conn
            .create_frame(Udp::default(), vec![Layer::Payload(Payload::from("hello"))])
            .unwrap();

        let parsed = Frame::parse(&frame.to_bytes().unwrap());
        assert!(frame.matches(&parsed));
        let udp = parsed.get(2).and_then(Layer::as_udp).unwrap();
        assert_eq!(udp.length, Some(8 + 5));
        assert_eq!(udp.src_port, Some(conn.local_addr().port()));
        assert_eq!(udp.dst_port, Some(53));
        assert!(udp.checksum.is_some());
    }
}

mod send_tests {
    use super::*;

    #[test]
    fn test_sent_bytes_are_the_serialized_frame() {
        let wire = Wire::new();
        let mut conn = udp_conn(&wire);
        let frame = conn
            .create_frame(Udp::default(), vec![Layer::Payload(Payload::from("hello"))])
            .unwrap();
        conn.send_frame(&frame).unwrap();
        assert_eq!(wire.sent_bytes(), vec![frame.to_bytes().unwrap()]);
    }

    #[test]
    fn test_payload_advances_local_seq() {
        let wire = Wire::new();
        let mut conn = tcp_conn(&wire);
        let before = conn.local_seq_num().unwrap();

        conn.send(
            Tcp::with_flags(TcpFlags::PSH_ACK),
            vec![Layer::Payload(Payload::from("hello"))],
        )
        .unwrap();
        assert_eq!(conn.local_seq_num(), Some(before.add(5)));

        let sent = wire.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(tcp_at(&sent[0]).seq_num, Some(before.value()));
        assert!(tcp_at(&sent[0]).checksum.is_some());
    }

    #[test]
    fn test_send_ip_replaces_transport() {
        let wire = Wire::new();
        let mut conn = udp_conn(&wire);
        conn.send_ip(vec![
            Layer::Udp(Udp {
                src_port: Some(1),
                dst_port: Some(2),
                ..Default::default()
            }),
            Layer::Payload(Payload::from("raw")),
        ])
        .unwrap();

        let sent = wire.sent();
        assert_eq!(sent[0].len(), 4);
        let udp = sent[0].get(2).and_then(Layer::as_udp).unwrap();
        assert_eq!(udp.src_port, Some(1));
        assert_eq!(udp.dst_port, Some(2));
    }

    #[test]
    fn test_send_ip_needs_a_protocol() {
        let wire = Wire::new();
        let mut conn = udp_conn(&wire);
        let err = conn
            .send_ip(vec![Layer::Payload(Payload::from("raw"))])
            .unwrap_err();
        assert!(matches!(err, Error::PacketConstruction(_)));
        assert!(wire.sent().is_empty());
    }
}

mod expect_tests {
    use super::*;

    #[test]
    fn test_zero_timeout_does_not_poll() {
        let wire = Wire::new();
        let mut conn = udp_conn(&wire);
        wire.push(&server_datagram(&conn, b"ready"));

        let err = conn.expect(Udp::default(), Duration::ZERO).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(wire.polls(), 0);
        assert_eq!(wire.pending(), 1);
    }

    #[test]
    fn test_skips_unrelated_traffic() {
        let wire = Wire::new();
        let mut conn = udp_conn(&wire);
        let noise = udp_from_peer(
            &endpoints(),
            Udp {
                src_port: Some(53),
                dst_port: Some(9),
                ..Default::default()
            },
            b"noise",
        );
        wire.push(&noise);
        wire.push(&server_datagram(&conn, b"answer"));

        let udp = conn.expect(Udp::default(), SHORT).unwrap();
        assert_eq!(udp.src_port, Some(53));
        assert_eq!(wire.polls(), 2);
    }

    #[test]
    fn test_timeout_reports_every_mismatch() {
        let wire = Wire::new();
        let mut conn = udp_conn(&wire);
        for port in [9, 10] {
            let stray = Udp {
                src_port: Some(53),
                dst_port: Some(port),
                ..Default::default()
            };
            wire.push(&udp_from_peer(&endpoints(), stray, b""));
        }

        match conn.expect(Udp::default(), SHORT).unwrap_err() {
            Error::Timeout {
                waited, mismatches, ..
            } => {
                assert_eq!(waited, SHORT);
                assert_eq!(mismatches.len(), 2);
                assert!(mismatches.iter().all(|diff| diff.contains("dst_port: got")));
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_polls_share_one_deadline() {
        let wire = Wire::new();
        wire.set_latency(Duration::from_millis(2));
        let mut conn = udp_conn(&wire);
        for port in [9, 10, 11] {
            let stray = Udp {
                src_port: Some(53),
                dst_port: Some(port),
                ..Default::default()
            };
            wire.push(&udp_from_peer(&endpoints(), stray, b""));
        }

        let timeout = Duration::from_millis(500);
        let err = conn.expect(Udp::default(), timeout).unwrap_err();
        assert!(err.is_timeout());

        let timeouts = wire.recv_timeouts();
        assert_eq!(timeouts.len(), 4);
        assert!(timeouts.iter().all(|polled| *polled <= timeout));
        assert!(timeouts.windows(2).all(|pair| pair[1] < pair[0]));
    }

    #[test]
    fn test_shorter_frame_never_matches() {
        let wire = Wire::new();
        let mut conn = tcp_conn(&wire);
        wire.push(&bare_ipv4_from_peer(
            &endpoints(),
            Ipv4 {
                protocol: Some(IpProtocol::TCP),
                ..Default::default()
            },
        ));

        match conn.expect(Tcp::default(), SHORT).unwrap_err() {
            Error::Timeout { mismatches, .. } => {
                assert_eq!(mismatches.len(), 1);
                assert!(mismatches[0].contains("missing layer 2"));
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_trailing_payload_is_unconstrained() {
        let wire = Wire::new();
        let mut conn = tcp_conn(&wire);
        let local = conn.local_seq_num().unwrap();
        let ack = Tcp {
            seq_num: Some(500),
            ack_num: Some(local.value()),
            ..Tcp::with_flags(TcpFlags::ACK)
        };
        wire.push(&server_segment(&conn, ack, b"junk"));

        let tcp = conn.expect(Tcp::with_flags(TcpFlags::ACK), SHORT).unwrap();
        assert_eq!(tcp.seq_num, Some(500));
        assert_eq!(conn.remote_seq_num(), Some(SeqNum::new(504)));
    }

    #[test]
    fn test_wrong_ack_is_not_matched() {
        let wire = Wire::new();
        let mut conn = tcp_conn(&wire);
        let local = conn.local_seq_num().unwrap();
        let ack = Tcp {
            seq_num: Some(500),
            ack_num: Some(local.add(1).value()),
            ..Tcp::with_flags(TcpFlags::ACK)
        };
        wire.push(&server_segment(&conn, ack, &[]));

        assert!(conn.expect(Tcp::with_flags(TcpFlags::ACK), SHORT).unwrap_err().is_timeout());
        assert_eq!(conn.remote_seq_num(), None);
    }

    #[test]
    fn test_mismatched_expectation_is_no_match() {
        let wire = Wire::new();
        let mut conn = tcp_conn(&wire);
        wire.push(&server_segment(&conn, Tcp::with_flags(TcpFlags::RST), &[]));

        let expected = Frame::new(vec![
            Layer::Ether(Default::default()),
            Layer::Ipv4(Default::default()),
            Layer::Udp(Udp::default()),
        ]);
        let err = conn.expect_frame(&expected, SHORT).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_tcp_expect_data() {
        let wire = Wire::new();
        let mut conn = tcp_conn(&wire);
        let data = Tcp {
            seq_num: Some(7),
            ..Tcp::with_flags(TcpFlags::PSH)
        };
        wire.push(&server_segment(&conn, data.clone(), b"hello"));
        wire.push(&server_segment(&conn, data, b"hi"));

        let frame = conn
            .expect_data(Tcp::with_flags(TcpFlags::PSH), Some(Payload::from("hi")), SHORT)
            .unwrap();
        assert_eq!(frame.len(), 4);
        assert_eq!(conn.remote_seq_num(), Some(SeqNum::new(9)));
    }

    #[test]
    fn test_udp_empty_payload_is_unconstrained() {
        let wire = Wire::new();
        let mut conn = udp_conn(&wire);
        wire.push(&server_datagram(&conn, b"anything"));

        let frame = conn
            .expect_data(Udp::default(), Some(Payload::new(Vec::new())), SHORT)
            .unwrap();
        assert_eq!(frame.last(), Some(&Layer::Payload(Payload::from("anything"))));
    }

    #[test]
    fn test_drain_discards_captured() {
        let wire = Wire::new();
        let mut conn = udp_conn(&wire);
        wire.push(&server_datagram(&conn, b"one"));
        wire.push(&server_datagram(&conn, b"two"));

        conn.drain().unwrap();
        assert_eq!(wire.pending(), 0);
        assert!(conn.expect(Udp::default(), SHORT).unwrap_err().is_timeout());
    }
}

mod handshake_tests {
    use super::*;

    #[test]
    fn test_handshake_sequence_numbers() {
        let wire = Wire::new();
        wire.respond_with(accept_with(0xFFFF_FFFF));
        let mut conn = tcp_conn(&wire);
        let x = conn.local_seq_num().unwrap();

        conn.handshake().unwrap();

        assert_eq!(conn.local_seq_num(), Some(x.add(1)));
        assert_eq!(conn.remote_seq_num(), Some(SeqNum::new(0)));
        assert_eq!(conn.syn_ack().and_then(|syn_ack| syn_ack.seq_num), Some(0xFFFF_FFFF));

        let sent = wire.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(tcp_at(&sent[0]).flags, Some(TcpFlags::SYN));
        assert_eq!(tcp_at(&sent[0]).seq_num, Some(x.value()));
        assert_eq!(tcp_at(&sent[1]).flags, Some(TcpFlags::ACK));
        assert_eq!(tcp_at(&sent[1]).seq_num, Some(x.add(1).value()));
        assert_eq!(tcp_at(&sent[1]).ack_num, Some(0));
    }

    #[test]
    fn test_handshake_without_answer() {
        let wire = Wire::new();
        let mut conn = tcp_conn(&wire);
        assert!(conn.handshake().unwrap_err().is_timeout());
        assert!(conn.syn_ack().is_none());
        assert_eq!(wire.sent().len(), 1);
    }

    #[test]
    fn test_fin_after_handshake() {
        let wire = Wire::new();
        wire.respond_with(accept_with(1000));
        let mut conn = tcp_conn(&wire);
        conn.handshake().unwrap();
        let established = conn.local_seq_num().unwrap();

        conn.send(Tcp::with_flags(TcpFlags::FIN_ACK), Vec::new()).unwrap();
        assert_eq!(conn.local_seq_num(), Some(established.add(1)));
        conn.send(Tcp::with_flags(TcpFlags::FIN_ACK), Vec::new()).unwrap();
        assert_eq!(conn.local_seq_num(), Some(established.add(2)));

        let sent = wire.sent();
        assert_eq!(tcp_at(&sent[2]).seq_num, Some(established.value()));
        assert_eq!(tcp_at(&sent[3]).seq_num, Some(established.add(1).value()));
    }
}

mod close_tests {
    use super::*;

    #[test]
    fn test_close_aggregates_failures() {
        let wire = Wire::new();
        wire.fail_close();
        let mut conn = udp_conn(&wire);

        match conn.close().unwrap_err() {
            Error::Close(failures) => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("injector"));
                assert!(failures[1].starts_with("sniffer"));
            }
            other => panic!("unexpected error {}", other),
        }
        assert!(wire.is_closed());
        assert!(conn.connection().is_closed());
    }

    #[test]
    fn test_closed_connection_is_unusable() {
        let wire = Wire::new();
        let mut conn = tcp_conn(&wire);
        conn.close().unwrap();

        assert!(matches!(
            conn.send(Tcp::with_flags(TcpFlags::SYN), Vec::new()),
            Err(Error::ConnectionClosed)
        ));
        assert!(matches!(conn.expect(Tcp::default(), SHORT), Err(Error::ConnectionClosed)));
        assert!(matches!(conn.drain(), Err(Error::ConnectionClosed)));
        assert!(matches!(conn.close(), Err(Error::ConnectionClosed)));
        assert!(wire.sent().is_empty());
    }

    #[test]
    fn test_close_releases_port() {
        let wire = Wire::new();
        let mut conn = tcp_conn(&wire);
        let port = conn.local_port().unwrap();
        conn.close().unwrap();
        assert!(TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok());
    }

    #[test]
    fn test_drop_closes_link() {
        let wire = Wire::new();
        let conn = udp_conn(&wire);
        drop(conn);
        assert!(wire.is_closed());
    }
}

mod ipv6_tests {
    use super::*;

    fn ipv6_conn(wire: &Wire) -> Ipv6Conn {
        let (injector, sniffer) = wire.link();
        Ipv6Conn::with_link(&endpoints(), Ipv6::default(), Ipv6::default(), injector, sniffer).unwrap()
    }

    #[test]
    fn test_send_over_ipv6() {
        let wire = Wire::new();
        let mut conn = ipv6_conn(&wire);
        conn.send(
            Ipv6 {
                hop_limit: Some(1),
                ..Default::default()
            },
            vec![
                Layer::Udp(Udp {
                    src_port: Some(1),
                    dst_port: Some(2),
                    ..Default::default()
                }),
                Layer::Payload(Payload::from("v6")),
            ],
        )
        .unwrap();

        let sent = wire.sent();
        let Layer::Ipv6(ipv6) = &sent[0][1] else { panic!("not an IPv6 layer") };
        assert_eq!(ipv6.src_addr, Some(endpoints().local_ipv6));
        assert_eq!(ipv6.dst_addr, Some(endpoints().remote_ipv6));
        assert_eq!(ipv6.hop_limit, Some(1));
        assert_eq!(ipv6.next_header, Some(IpProtocol::UDP));
        assert_eq!(ipv6.payload_length, Some(8 + 2));
    }

    #[test]
    fn test_expect_ipv6() {
        let wire = Wire::new();
        let mut conn = ipv6_conn(&wire);
        wire.push(&ipv6_from_peer(
            &endpoints(),
            vec![Layer::Udp(Udp {
                src_port: Some(2),
                dst_port: Some(1),
                ..Default::default()
            })],
        ));

        let ipv6 = conn.expect(Ipv6::default(), SHORT).unwrap();
        assert_eq!(ipv6.src_addr, Some(endpoints().remote_ipv6));
        assert_eq!(ipv6.next_header, Some(IpProtocol::UDP));
    }
}
