//! Binary entry point for `pf`.

use preflight::cli;
use preflight::ui::output;

fn main() {
    if let Err(err) = cli::run() {
        output::error(format!("{err:#}"));
        std::process::exit(1);
    }
}
