use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use repcrec::{Config, Coordinator};

fn print_usage() {
    eprintln!(
        "usage: repcrec [--input|-i <file>] [--sites <n>] [--variables <n>] [--detection-interval <n>]"
    );
}

fn parse_args() -> Result<Config, String> {
    let mut config = Config::default();
    let args: Vec<String> = std::env::args().collect();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--input" | "-i" => {
                i += 1;
                let path = args.get(i).ok_or("--input requires a value")?;
                config.input = Some(PathBuf::from(path));
            }
            "--sites" => {
                i += 1;
                let value = args.get(i).ok_or("--sites requires a value")?;
                config.site_count = value.parse().map_err(|_| "--sites expects an integer")?;
            }
            "--variables" => {
                i += 1;
                let value = args.get(i).ok_or("--variables requires a value")?;
                config.variable_count = value.parse().map_err(|_| "--variables expects an integer")?;
            }
            "--detection-interval" => {
                i += 1;
                let value = args.get(i).ok_or("--detection-interval requires a value")?;
                config.detection_interval = value
                    .parse()
                    .map_err(|_| "--detection-interval expects an integer")?;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("unrecognized argument '{}'", other)),
        }
        i += 1;
    }

    Ok(config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match parse_args() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {}", message);
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let mut coordinator = Coordinator::new(&config);

    let result = match &config.input {
        Some(path) => File::open(path)
            .map_err(repcrec::SimError::from)
            .and_then(|f| coordinator.run(BufReader::new(f))),
        None => coordinator.run(BufReader::new(io::stdin().lock())),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
