use clap::Parser;
use log::warn;
use snafu::ErrorCompat;

mod args;
mod tally;

fn main() {
    let args = args::Args::parse();

    let mut log_builder = env_logger::Builder::from_default_env();
    if args.verbose {
        log_builder.filter_level(log::LevelFilter::Debug);
    } else {
        log_builder.filter_level(log::LevelFilter::Info);
    }
    log_builder.init();

    if let Err(e) = tally::run_tally(&args) {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
