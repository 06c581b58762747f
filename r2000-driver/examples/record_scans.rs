use clap::{Arg, ArgAction, Command};
use r2000_driver::{DriverConfig, R2000Error, RecordingWriter, ScannerSession};
use std::time::Duration;
use tracing::{error, info};

struct Args {
    host: String,
    output: String,
    scans: u64,
    udp: bool,
    compress: bool,
    config: Option<String>,
}

fn get_args() -> Args {
    let matches = Command::new("R2000 recorder.")
        .about("Captures scans from an R2000 scanner and records them to a file.")
        .disable_version_flag(true)
        .arg(
            Arg::new("host")
                .help("Hostname or IP address of the scanner")
                .required(true),
        )
        .arg(
            Arg::new("output")
                .help("Recording file to write")
                .required(true),
        )
        .arg(
            Arg::new("scans")
                .long("scans")
                .help("Number of scans to record")
                .value_parser(clap::value_parser!(u64))
                .default_value("100"),
        )
        .arg(
            Arg::new("udp")
                .long("udp")
                .help("Receive scan data over UDP instead of TCP")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-compress")
                .long("no-compress")
                .help("Store distances and amplitudes uncompressed")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("JSON driver configuration"),
        )
        .get_matches();

    Args {
        host: matches.get_one::<String>("host").unwrap().clone(),
        output: matches.get_one::<String>("output").unwrap().clone(),
        scans: *matches.get_one::<u64>("scans").unwrap(),
        udp: matches.get_flag("udp"),
        compress: !matches.get_flag("no-compress"),
        config: matches.get_one::<String>("config").cloned(),
    }
}

fn parameter(session: &ScannerSession, name: &str) -> Result<u32, R2000Error> {
    let value = session.get_parameter(name)?;
    value
        .parse()
        .map_err(|_| R2000Error::InvalidResponse(format!("{} = {}", name, value)))
}

fn record(args: &Args) -> Result<(), R2000Error> {
    let config = match &args.config {
        Some(path) => DriverConfig::from_json_file(path)?,
        None => DriverConfig::default(),
    };
    let http_port = config.http_port;
    let mut session = ScannerSession::with_config(config)?;
    session.connect(&args.host, http_port)?;

    let samples_per_scan = parameter(&session, "samples_per_scan")?;
    let scan_frequency = parameter(&session, "scan_frequency")?;
    info!(samples_per_scan, scan_frequency, "scanner configured");

    let mut writer = RecordingWriter::open(&args.output)?;
    writer.set_compress(args.compress);
    writer.init(samples_per_scan, scan_frequency)?;

    if args.udp {
        session.start_capturing_udp()?;
    } else {
        session.start_capturing_tcp()?;
    }

    while writer.count() < args.scans {
        if !session.is_capturing() {
            error!("scan data stream ended");
            break;
        }
        if session.get_full_scans_available() == 0 {
            std::thread::sleep(Duration::from_millis(5));
            continue;
        }
        if let Some(scan) = session.get_scan()? {
            writer.write_scan(&scan)?;
        }
    }

    writer.close()?;
    info!(
        scans = writer.count(),
        bytes = writer.size(),
        path = %args.output,
        "recording finished"
    );
    session.disconnect();
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("r2000_driver=info".parse().unwrap())
                .add_directive("record_scans=info".parse().unwrap()),
        )
        .init();

    let args = get_args();
    if let Err(e) = record(&args) {
        error!(error = %e, fatal = e.is_fatal(), "recording failed");
        std::process::exit(1);
    }
}
