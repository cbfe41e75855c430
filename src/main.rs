//! Provides the main entry point to the program.
use human_panic::setup_panic;
use log::error;

fn main() {
    setup_panic!();

    if let Err(err) = horizon_uc::cli::run_cli() {
        if horizon_uc::log::is_logger_initialised() {
            error!("{err:?}");
        } else {
            eprintln!("Error: {err:?}");
        }

        // Terminate program, signalling an error
        std::process::exit(1);
    }
}
