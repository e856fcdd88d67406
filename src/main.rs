use std::{
    path::PathBuf,
    process::ExitCode,
    sync::{atomic::AtomicBool, Arc},
    thread,
};

use arc_swap::ArcSwap;
use mock_dhcpv6::{config::Config, logging, transport, Error, Result};
use tracing::{error, info, warn, Level};

mod signal;
mod v6;

const HELP: &str = "\
Mock DHCPv6 server with prefix delegation

USAGE:
  mock-dhcpv6 -i <INTERFACE> [OPTIONS]

OPTIONS:
  -i, --interface <NAME>   Interface to listen on, joins ff02::1:2 there
  -b, --bind <ADDR>        Bind a unicast address instead, e.g. [::1]:547
  -c, --config <FILE>      JSON file with offer parameters, reloaded on SIGHUP
  -l, --log-level <LEVEL>  trace, debug, info, warn or error [default: info]
      --json-logs          One JSON object per log line
  -h, --help               Print help
";

enum Listen {
    Interface(String),
    Bind(String),
}

struct Args {
    listen: Listen,
    config: Option<PathBuf>,
    log_level: Level,
    json_logs: bool,
}

fn parse_args() -> Result<Option<Args>> {
    let mut pargs = pico_args::Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(None);
    }

    let interface: Option<String> = pargs.opt_value_from_str(["-i", "--interface"])?;
    let bind: Option<String> = pargs.opt_value_from_str(["-b", "--bind"])?;
    let listen = match (bind, interface) {
        (Some(bind), _) => Listen::Bind(bind),
        (None, Some(interface)) => Listen::Interface(interface),
        (None, None) => {
            return Err(Error::InvalidConfig(
                "one of --interface or --bind is required".into(),
            ))
        }
    };

    let args = Args {
        listen,
        config: pargs.opt_value_from_str(["-c", "--config"])?,
        log_level: pargs
            .opt_value_from_str(["-l", "--log-level"])?
            .unwrap_or(Level::INFO),
        json_logs: pargs.contains("--json-logs"),
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        eprintln!("Warning: unused arguments left: {:?}", remaining);
    }
    Ok(Some(args))
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    info!(
        server_id = %config.server_id,
        address = %config.address,
        prefix = %config.prefix,
        preference = config.preference,
        "offer parameters"
    );
    let config = Arc::new(ArcSwap::from_pointee(config));

    let socket = match &args.listen {
        Listen::Bind(bind) => transport::bind_unicast(bind)?,
        Listen::Interface(interface) => {
            match transport::link_local_addr(interface)? {
                Some(ll) => info!(%interface, "link-local address {ll}"),
                None => warn!(%interface, "no link-local IPv6 address found"),
            }
            transport::bind_multicast(interface, transport::SERVER_PORT)?
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    signal::spawn_signal_handler(config.clone(), args.config.clone(), shutdown.clone())?;

    let worker = thread::Builder::new()
        .name("v6worker".to_string())
        .spawn(move || v6::v6_worker(socket, config, shutdown))?;
    if worker.join().is_err() {
        error!("v6worker panicked");
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => return ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}\n\n{HELP}");
            return ExitCode::FAILURE;
        }
    };

    if args.json_logs {
        logging::init_json(args.log_level);
    } else {
        logging::init_stdout(args.log_level);
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
