/// Example demonstrating an L2CAP client that connects to a server
///
/// Usage: l2cap_client <remote address> [psm]
///
/// Set RUST_LOG=debug (or trace for payload dumps) to see channel logging.
use rustyl2cap::*;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("L2CAP Client Example");
    println!("--------------------");

    let mut args = std::env::args().skip(1);
    let remote: BdAddr = match args.next() {
        Some(addr) => addr.parse()?,
        None => {
            eprintln!("Usage: l2cap_client <remote address> [psm]");
            return Ok(());
        }
    };
    let psm = match args.next() {
        Some(psm) => Psm(u16::from_str_radix(psm.trim_start_matches("0x"), 16)?),
        None => Psm(Psm::DYNAMIC_START),
    };

    let options = ConnectOptions::default()
        .with_receive_mtu(672)
        .with_transmit_mtu(672)
        .with_timeout(Duration::from_secs(10));

    println!("Connecting to {} on {}...", remote, psm);
    let channel = match L2capChannel::open(BdAddr::any(), remote, psm, &options) {
        Ok(channel) => Arc::new(channel),
        Err(err) => {
            eprintln!("Failed to open L2CAP channel: {}", err);
            eprintln!("Note: the peer must be paired/reachable and listening on {}", psm);
            return Err(err.into());
        }
    };

    let transmit_mtu = channel.transmit_mtu()?;
    println!("Connected to {}", channel.remote_address()?);
    println!("  Receive MTU:  {}", channel.receive_mtu()?);
    println!("  Transmit MTU: {}", transmit_mtu);
    println!("  Security:     {}", channel.security_opt(None)?);

    // Reader thread: prints incoming records until cancelled or the peer leaves
    let token = CancelToken::new()?;
    let reader = {
        let channel = channel.clone();
        let token = token.clone();
        thread::spawn(move || {
            let mut buf = vec![0u8; usize::from(channel.receive_mtu().unwrap_or(672))];
            loop {
                match channel.receive(&mut buf, &token) {
                    Ok(Received::Data(n)) => {
                        println!("\nReceived {} bytes: {:?}", n, &buf[..n]);
                        if let Ok(text) = std::str::from_utf8(&buf[..n]) {
                            println!("Received text: {}", text);
                        }
                    }
                    Ok(Received::Cancelled) => break,
                    Err(err) => {
                        eprintln!("\nReceive failed: {}", err);
                        break;
                    }
                }
            }
        })
    };

    println!("\nType messages to send or 'quit' to exit.");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line == "quit" {
            break;
        }

        match channel.send(line.as_bytes(), transmit_mtu) {
            Ok(n) => println!("Sent {} bytes", n),
            Err(e) => println!("Failed to send message: {}", e),
        }
        print!("> ");
        io::stdout().flush()?;
    }

    token.cancel();
    let _ = reader.join();

    println!("Disconnecting L2CAP channel...");
    match channel.close() {
        Ok(_) => println!("L2CAP channel disconnected"),
        Err(e) => println!("Failed to disconnect L2CAP channel: {}", e),
    }

    Ok(())
}
