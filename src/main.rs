use std::path::Path;
use std::process::ExitCode;

use bittorrent_peer::{bencode, engine, metainfo, LEECH_PEER_ID, SEED_PEER_ID};

fn parse_port(args: &[String]) -> u16 {
    for arg in args {
        let port = arg
            .strip_prefix("--port=")
            .or_else(|| arg.strip_prefix("-p"))
            .and_then(|rest| rest.parse().ok());
        if let Some(port) = port {
            return port;
        }
    }
    6881
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn add_torrent(file_path: &str) -> Result<(), metainfo::MetainfoError> {
    let file_path = Path::new(file_path);
    let file_name = file_path.file_name().ok_or_else(|| {
        metainfo::MetainfoError::Invalid("file path has no file name".into())
    })?;

    std::fs::create_dir_all("torrents")?;
    std::fs::create_dir_all("files")?;

    let bencode_value = metainfo::create_torrent(file_path, 1 << 18, None)?;
    let torrent_path = Path::new("torrents").join(format!("{}.torrent", file_name.to_string_lossy()));
    std::fs::write(&torrent_path, bencode::encode(&bencode_value))?;

    let destination = Path::new("files").join(file_name);
    std::fs::hard_link(file_path, &destination)?;

    println!("created {}", torrent_path.display());
    Ok(())
}

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("error: failed to start runtime: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let result: Result<(), String> = match args.first().map(String::as_str) {
        Some("leech") => {
            if args.len() < 3 {
                eprintln!("usage: bittorrent-peer leech <path/to/torrent> <host> [--port=N]");
                return ExitCode::FAILURE;
            }
            let host = args[2].clone();
            let port = parse_port(&args[3..]);
            runtime
                .block_on(engine::run_leech(&args[1], host, port, LEECH_PEER_ID))
                .map_err(|err| err.to_string())
        }
        Some("add") => {
            if args.len() < 2 {
                eprintln!("usage: bittorrent-peer add <file>");
                return ExitCode::FAILURE;
            }
            add_torrent(&args[1]).map_err(|err| err.to_string())
        }
        _ => {
            let port = parse_port(&args);
            runtime
                .block_on(engine::run_seed(port, SEED_PEER_ID))
                .map_err(|err| err.to_string())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}
