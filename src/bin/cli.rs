//! `cli <Server IP> <Server Port> <Username>` — runs the client.

use std::net::SocketAddr;
use std::process::ExitCode;

use cryptorelay::client;
use cryptorelay::send::ignore_sigpipe;

fn main() -> ExitCode {
    env_logger::init();
    ignore_sigpipe();

    let (addr, username) = match parse_args() {
        Ok(parts) => parts,
        Err(msg) => {
            eprintln!("{}", msg);
            return ExitCode::FAILURE;
        }
    };

    match client::run(addr, &username) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn parse_args() -> Result<(SocketAddr, String), String> {
    let mut args = std::env::args().skip(1);
    let ip = args.next().ok_or_else(usage)?;
    let port = args.next().ok_or_else(usage)?;
    let username = args.next().ok_or_else(usage)?;

    let port: u16 = port.parse().map_err(|_| usage())?;
    let addr: SocketAddr = format!("{}:{}", ip, port)
        .parse()
        .map_err(|_| format!("invalid server address: {}:{}", ip, port))?;

    Ok((addr, username))
}

fn usage() -> String {
    "usage: cli <Server IP> <Server Port> <Username>".to_owned()
}
