mod host;

use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use host::HostConfig;

const USAGE: &str = "Usage: blockvale_host [--world <path>] [--config <file.toml>] [--frames <n>] [--speed <blocks/s>] [--no-save]";

fn main() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let mut config = HostConfig {
        world_path: PathBuf::from("world"),
        config_path: None,
        frames: None,
        speed: 4.0,
        persist: true,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--world" => config.world_path = PathBuf::from(expect_value(&mut args, "--world", "a path")),
            "--config" => {
                config.config_path = Some(PathBuf::from(expect_value(&mut args, "--config", "a path")));
            }
            "--frames" => {
                let value = expect_value(&mut args, "--frames", "a frame count");
                match value.parse::<u64>() {
                    Ok(parsed) => config.frames = Some(parsed),
                    Err(err) => {
                        eprintln!("invalid frame count '{value}': {err}");
                        std::process::exit(2);
                    }
                }
            }
            "--speed" => {
                let value = expect_value(&mut args, "--speed", "a number");
                match value.parse::<f32>() {
                    Ok(parsed) if parsed.is_finite() => config.speed = parsed,
                    Ok(_) => {
                        eprintln!("invalid speed '{value}': must be finite");
                        std::process::exit(2);
                    }
                    Err(err) => {
                        eprintln!("invalid speed '{value}': {err}");
                        std::process::exit(2);
                    }
                }
            }
            "--no-save" => config.persist = false,
            "--help" | "-h" => {
                println!("{USAGE}");
                return;
            }
            other => {
                eprintln!("unknown argument: {other}");
                eprintln!("{USAGE}");
                std::process::exit(2);
            }
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        eprintln!("\nShutdown signal received, saving world...");
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("failed to set Ctrl+C handler: {err}");
        std::process::exit(1);
    }

    if let Err(err) = host::run(config, running) {
        eprintln!("host failed: {err}");
        std::process::exit(1);
    }
}

fn expect_value(args: &mut impl Iterator<Item = String>, flag: &str, what: &str) -> String {
    let Some(value) = args.next() else {
        eprintln!("{flag} expects {what}");
        std::process::exit(2);
    };
    value
}
