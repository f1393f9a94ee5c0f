use clap::Parser;
use runfiler::cli::{Cli, init_tracing, run_cli};
use runfiler::output::OutputFormatter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run_cli(cli) {
        OutputFormatter::error(&e);
        std::process::exit(1);
    }
}
