use clap::{Arg, ArgAction, Command};
use r2000_driver::ReplayThread;
use std::time::{Duration, Instant};
use tracing::{error, info};

fn get_args() -> (String, u64, bool) {
    let matches = Command::new("R2000 player.")
        .about("Replays a recording at its scan frequency and prints scan statistics.")
        .disable_version_flag(true)
        .arg(
            Arg::new("recording")
                .help("Recording file to replay")
                .required(true),
        )
        .arg(
            Arg::new("seconds")
                .long("seconds")
                .help("Playback duration")
                .value_parser(clap::value_parser!(u64))
                .default_value("10"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print every scan as JSON")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let path: &String = matches.get_one("recording").unwrap();
    let seconds: &u64 = matches.get_one("seconds").unwrap();
    (path.to_string(), *seconds, matches.get_flag("json"))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("r2000_driver=info".parse().unwrap())
                .add_directive("replay_scans=info".parse().unwrap()),
        )
        .init();

    let (path, seconds, json) = get_args();
    let replay = match ReplayThread::start(&path, 100) {
        Ok(replay) => replay,
        Err(e) => {
            error!(error = %e, path = %path, "could not load recording");
            std::process::exit(1);
        }
    };
    info!(
        samples_per_scan = replay.samples_per_scan(),
        scan_frequency = replay.scan_frequency(),
        "replaying"
    );

    let end = Instant::now() + Duration::from_secs(seconds);
    while Instant::now() < end && replay.is_running() {
        let Some(scan) = replay.get_scan() else {
            std::thread::sleep(Duration::from_millis(5));
            continue;
        };
        if json {
            match serde_json::to_string(&scan) {
                Ok(line) => println!("{}", line),
                Err(e) => error!(error = %e, "could not serialize scan"),
            }
            continue;
        }
        let valid = (0..scan.len()).filter(|i| scan.is_valid_point(*i)).count();
        let nearest = (0..scan.len())
            .filter(|i| scan.is_valid_point(*i))
            .map(|i| scan.distances[i])
            .min();
        println!(
            "{} points, {} valid, nearest {} mm",
            scan.len(),
            valid,
            nearest.map_or("-".to_string(), |d| d.to_string())
        );
    }
    drop(replay);
}
