//! Tests for the L2CAP channel implementation
//!
//! Channel behaviour that does not depend on the Bluetooth family (readiness,
//! record framing, truncation, cancellation, close) is exercised over an
//! `AF_UNIX` `SOCK_SEQPACKET` socket pair, which preserves record boundaries
//! the same way an L2CAP socket does.

#[cfg(test)]
mod tests {
    use super::super::cancel::*;
    use super::super::channel::*;
    use super::super::constants::*;
    use super::super::psm::*;
    use super::super::socket::SockaddrL2;
    use super::super::types::*;
    use crate::addr::BdAddr;
    use crate::error::L2capError;
    use std::os::unix::io::{AsRawFd, FromRawFd};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn channel_pair() -> (L2capChannel, L2capChannel) {
        let mut fds = [0; 2];
        let rc = unsafe {
            libc::socketpair(
                libc::AF_UNIX,
                libc::SOCK_SEQPACKET | libc::SOCK_CLOEXEC,
                0,
                fds.as_mut_ptr(),
            )
        };
        assert_eq!(rc, 0, "socketpair failed: {}", std::io::Error::last_os_error());
        unsafe { (L2capChannel::from_raw_fd(fds[0]), L2capChannel::from_raw_fd(fds[1])) }
    }

    #[test]
    fn test_kernel_struct_layouts() {
        // struct sockaddr_l2 and struct l2cap_options as the kernel defines them
        assert_eq!(std::mem::size_of::<SockaddrL2>(), 14);
        assert_eq!(std::mem::size_of::<LinkOptions>(), 12);

        let addr = SockaddrL2::new(BdAddr::from(0x001122334455u64), 0x1001);
        assert_eq!(addr.l2_family, AF_BLUETOOTH as libc::sa_family_t);
        assert_eq!(u16::from_le(addr.l2_psm), 0x1001);
        assert_eq!(addr.l2_bdaddr, [0x55, 0x44, 0x33, 0x22, 0x11, 0x00]);
        assert_eq!(addr.addr().to_u64(), 0x001122334455);
    }

    #[test]
    fn test_requested_link_options() {
        let opts = LinkOptions::requested(672, Some(672));
        assert_eq!(opts.receive_mtu, 672);
        assert_eq!(opts.transmit_mtu, 672);
        assert_eq!(opts.flush_timeout, L2CAP_DEFAULT_FLUSH_TO);

        // No transmit MTU requested falls back to the protocol default
        assert_eq!(LinkOptions::requested(1024, None).transmit_mtu, L2CAP_DEFAULT_MTU);
        assert_eq!(LinkOptions::requested(1024, Some(0)).transmit_mtu, L2CAP_DEFAULT_MTU);
        assert_eq!(LinkOptions::requested(1024, Some(2048)).transmit_mtu, 2048);
    }

    #[test]
    fn test_connect_options_builder() {
        let options = ConnectOptions::default()
            .with_authenticate(true)
            .with_receive_mtu(1013)
            .with_transmit_mtu(512)
            .with_truncate_to_mtu(true)
            .with_poll_interval(Duration::from_millis(25));

        assert_eq!(options.link_mode(), LinkMode::AUTH);
        assert_eq!(options.link_options().receive_mtu, 1013);
        assert_eq!(options.link_options().transmit_mtu, 512);
        assert!(options.channel.truncate_to_mtu);
        assert_eq!(options.channel.poll_interval, Duration::from_millis(25));
        assert_eq!(options.timeout, DEFAULT_CONNECT_TIMEOUT);

        assert!(ConnectOptions::default().link_mode().is_empty());
    }

    #[test]
    fn test_link_mode_merge() {
        let requested = LinkMode::requested(true, true);
        assert_eq!(requested, LinkMode::AUTH | LinkMode::ENCRYPT);

        // Bits get added
        assert_eq!(
            LinkMode::MASTER.merge(requested),
            Some(LinkMode::MASTER | LinkMode::AUTH | LinkMode::ENCRYPT)
        );

        // Nothing new means no write
        assert_eq!((LinkMode::AUTH | LinkMode::ENCRYPT).merge(requested), None);
        assert_eq!(LinkMode::SECURE.merge(LinkMode::requested(false, false)), None);

        // Unknown kernel bits survive the merge
        let current = LinkMode::from_bits_retain(0x0100);
        assert_eq!(current.merge(LinkMode::AUTH).unwrap().bits(), 0x0102);
    }

    #[test]
    fn test_security_classification() {
        assert_eq!(SecurityOpt::classify(LinkMode::empty()), SecurityOpt::Plaintext);
        assert_eq!(SecurityOpt::classify(LinkMode::MASTER), SecurityOpt::Plaintext);
        assert_eq!(SecurityOpt::classify(LinkMode::ENCRYPT), SecurityOpt::Encrypted);
        assert_eq!(SecurityOpt::classify(LinkMode::SECURE), SecurityOpt::Encrypted);
        assert_eq!(SecurityOpt::classify(LinkMode::AUTH), SecurityOpt::Authenticated);
        assert_eq!(
            SecurityOpt::classify(LinkMode::AUTH | LinkMode::ENCRYPT | LinkMode::SECURE),
            SecurityOpt::Authenticated
        );

        assert_eq!(SecurityOpt::Plaintext.code(), 0);
        assert_eq!(SecurityOpt::Authenticated.code(), 1);
        assert_eq!(SecurityOpt::Encrypted.code(), 2);
    }

    #[test]
    fn test_length_bounds() {
        assert_eq!(outgoing_len(100, 672, None), 100);
        assert_eq!(outgoing_len(1000, 672, None), 672);
        assert_eq!(outgoing_len(1000, 672, Some(512)), 512);
        assert_eq!(outgoing_len(100, 672, Some(48)), 48);
        assert_eq!(outgoing_len(100, 0, None), 0);

        assert_eq!(incoming_len(672, None), 672);
        assert_eq!(incoming_len(1024, Some(672)), 672);
        assert_eq!(incoming_len(10, Some(672)), 10);
    }

    #[test]
    fn test_psm() {
        assert_eq!(Psm::from(0x0001u16), Psm::SDP);
        assert_eq!(u16::from(Psm::ATT), 0x001F);
        assert!(Psm::SDP.is_valid());
        assert!(Psm(0x1001).is_valid());
        assert!(!Psm(0x1002).is_valid());
        assert!(!Psm(0x0101).is_valid());
        assert!(Psm(0x1001).is_dynamic());
        assert!(!Psm::RFCOMM.is_dynamic());
        assert_eq!(Psm::RFCOMM.to_string(), "RFCOMM (0x0003)");
        assert_eq!(Psm(0x1001).to_string(), "PSM 0x1001");
    }

    #[test]
    fn test_send_receive_preserves_records() {
        let (a, b) = channel_pair();

        assert_eq!(a.send(b"first", 672).unwrap(), 5);
        assert_eq!(a.send(b"second record", 672).unwrap(), 13);

        let mut buf = [0u8; 672];
        assert_eq!(b.receive(&mut buf, &NeverCancel).unwrap(), Received::Data(5));
        assert_eq!(&buf[..5], b"first");
        assert_eq!(b.receive(&mut buf, &NeverCancel).unwrap(), Received::Data(13));
        assert_eq!(&buf[..13], b"second record");
    }

    #[test]
    fn test_send_hundred_bytes() {
        let (a, b) = channel_pair();
        let data = [0x5Au8; 100];

        assert_eq!(a.send(&data, 672).unwrap(), 100);

        let mut buf = [0u8; 672];
        assert_eq!(b.receive(&mut buf, &NeverCancel).unwrap(), Received::Data(100));
        assert_eq!(&buf[..100], &data[..]);
    }

    #[test]
    fn test_send_truncates_to_transmit_mtu() {
        let (a, b) = channel_pair();
        let data: Vec<u8> = (0..100).collect();

        assert_eq!(a.send(&data, 40).unwrap(), 40);
        a.send(b"next", 40).unwrap();

        // The excess is dropped, not queued as another record
        let mut buf = [0u8; 256];
        assert_eq!(b.receive(&mut buf, &NeverCancel).unwrap(), Received::Data(40));
        assert_eq!(&buf[..40], &data[..40]);
        assert_eq!(b.receive(&mut buf, &NeverCancel).unwrap(), Received::Data(4));
        assert_eq!(&buf[..4], b"next");
    }

    #[test]
    fn test_receive_rejects_empty_buffer() {
        let (a, b) = channel_pair();
        a.send(b"data", 672).unwrap();

        let mut empty = [0u8; 0];
        match b.receive(&mut empty, &NeverCancel) {
            Err(L2capError::InvalidArgument(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        // The pending record was left alone
        let mut buf = [0u8; 16];
        assert_eq!(b.receive(&mut buf, &NeverCancel).unwrap(), Received::Data(4));
    }

    #[test]
    fn test_ready_reflects_pending_data() {
        let (a, b) = channel_pair();

        assert!(!b.ready().unwrap());

        a.send(b"ping", 672).unwrap();
        assert!(b.ready().unwrap());

        let mut buf = [0u8; 16];
        b.receive(&mut buf, &NeverCancel).unwrap();
        assert!(!b.ready().unwrap());
    }

    #[test]
    fn test_peer_close_is_reported() {
        let (a, b) = channel_pair();
        a.close().unwrap();

        assert!(b.ready().unwrap_err().is_peer_closed());

        let mut buf = [0u8; 16];
        let err = b.receive(&mut buf, &NeverCancel).unwrap_err();
        assert!(err.is_peer_closed());
        assert_eq!(err.to_string(), "Peer closed connection");
    }

    #[test]
    fn test_local_close_is_reported() {
        let (_a, b) = channel_pair();
        b.close().unwrap();

        assert!(b.is_closed());
        assert_eq!(b.as_raw_fd(), -1);
        assert!(b.ready().unwrap_err().is_locally_closed());

        let mut buf = [0u8; 16];
        let err = b.receive(&mut buf, &NeverCancel).unwrap_err();
        assert_eq!(err.to_string(), "Connection closed");
        assert!(b.send(b"late", 672).unwrap_err().is_locally_closed());
        assert!(b.receive_mtu().unwrap_err().is_locally_closed());
    }

    #[test]
    fn test_close_twice_reports_release_error() {
        let (_a, b) = channel_pair();
        b.close().unwrap();

        let err = b.close().unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
        assert!(err.to_string().starts_with("Failed to close socket."));
    }

    #[test]
    fn test_cancelled_token_stops_receive() {
        let (_a, b) = channel_pair();
        let token = CancelToken::new().unwrap();
        token.cancel();

        let mut buf = [0u8; 16];
        assert_eq!(b.receive(&mut buf, &token).unwrap(), Received::Cancelled);
    }

    #[test]
    fn test_cancel_wakes_blocked_receive() {
        let (_a, b) = channel_pair();
        let config = ChannelConfig {
            poll_interval: Duration::from_secs(30),
            ..ChannelConfig::default()
        };
        let b = unsafe {
            L2capChannel::from_raw_fd_with_config(std::os::unix::io::IntoRawFd::into_raw_fd(b), config)
        };
        let token = CancelToken::new().unwrap();

        let canceller = {
            let token = token.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                token.cancel();
            })
        };

        let start = Instant::now();
        let mut buf = [0u8; 16];
        let result = b.receive(&mut buf, &token).unwrap();
        canceller.join().unwrap();

        assert!(result.is_cancelled());
        // Woken by the token, not by the 30 second interval
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_flag_cancellation_observed_between_waits() {
        let (_a, b) = channel_pair();
        let flag = Arc::new(AtomicBool::new(false));

        let canceller = {
            let flag = flag.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
            })
        };

        let mut buf = [0u8; 16];
        let result = b.receive(&mut buf, &flag).unwrap();
        canceller.join().unwrap();
        assert_eq!(result, Received::Cancelled);
        assert_eq!(result.len(), None);
    }

    #[test]
    fn test_reader_and_writer_threads() {
        let (a, b) = channel_pair();
        let b = Arc::new(b);

        let reader = {
            let b = b.clone();
            thread::spawn(move || {
                let mut sizes = Vec::new();
                let mut buf = [0u8; 64];
                for _ in 0..3 {
                    match b.receive(&mut buf, &NeverCancel).unwrap() {
                        Received::Data(n) => sizes.push(n),
                        Received::Cancelled => unreachable!(),
                    }
                }
                sizes
            })
        };

        a.send(&[1; 10], 672).unwrap();
        a.send(&[2; 20], 672).unwrap();
        a.send(&[3; 30], 672).unwrap();

        assert_eq!(reader.join().unwrap(), vec![10, 20, 30]);
    }

    #[test]
    fn test_link_queries_fail_on_non_l2cap_socket() {
        let (a, _b) = channel_pair();

        // Link options belong to SOL_L2CAP; a unix socket cannot answer
        let err = a.receive_mtu().unwrap_err();
        assert!(matches!(err, L2capError::Io { .. }));
        assert!(a.transmit_mtu().is_err());
        assert!(a.security_opt(None).is_err());

        let err = a.remote_address().unwrap_err();
        assert!(err
            .to_string()
            .starts_with(&format!("Failed to get L2CAP ({}) peer name", a.as_raw_fd())));
    }

    #[test]
    fn test_truncation_needs_link_options() {
        let (a, b) = channel_pair();
        let config = ChannelConfig {
            truncate_to_mtu: true,
            ..ChannelConfig::default()
        };
        let a = unsafe {
            L2capChannel::from_raw_fd_with_config(std::os::unix::io::IntoRawFd::into_raw_fd(a), config)
        };

        // With truncation enabled the kernel MTU is consulted before sending
        assert!(matches!(a.send(b"data", 672), Err(L2capError::Io { .. })));
        assert!(!b.ready().unwrap());
    }

    #[test]
    fn test_close_tolerates_failed_shutdown() {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let write_end = unsafe { L2capChannel::from_raw_fd(fds[1]) };

        // shutdown() fails with ENOTSOCK on a pipe; only the release counts
        assert!(write_end.close().is_ok());
        assert!(write_end.is_closed());

        unsafe { libc::close(fds[0]) };
    }

    #[test]
    fn test_close_from_other_thread_wakes_receive() {
        let (_a, b) = channel_pair();
        let config = ChannelConfig {
            poll_interval: Duration::from_secs(30),
            ..ChannelConfig::default()
        };
        let b = Arc::new(unsafe {
            L2capChannel::from_raw_fd_with_config(std::os::unix::io::IntoRawFd::into_raw_fd(b), config)
        });

        let closer = {
            let b = b.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                b.close()
            })
        };

        let start = Instant::now();
        let mut buf = [0u8; 16];
        let err = b.receive(&mut buf, &NeverCancel).unwrap_err();
        closer.join().unwrap().unwrap();

        // Reported as our own close, not as the peer going away
        assert!(err.is_locally_closed());
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
