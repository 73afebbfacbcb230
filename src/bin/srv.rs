//! `srv <Port>` — runs the relay server.

use std::process::ExitCode;

use cryptorelay::send::ignore_sigpipe;
use cryptorelay::server;

fn main() -> ExitCode {
    env_logger::init();
    ignore_sigpipe();

    let port = match parse_args() {
        Ok(port) => port,
        Err(msg) => {
            eprintln!("{}", msg);
            return ExitCode::FAILURE;
        }
    };

    match server::run(port) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn parse_args() -> Result<u16, String> {
    let mut args = std::env::args().skip(1);
    let port = args.next().ok_or_else(usage)?;
    port.parse::<u16>().map_err(|_| usage())
}

fn usage() -> String {
    "usage: srv <Port>".to_owned()
}
