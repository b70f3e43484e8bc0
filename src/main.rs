use sitestack::cli::{self, Cli};
use sitestack::ui::output::{self, Verbosity};

fn main() {
    let args = Cli::parse_args();
    cli::init_tracing(Verbosity::from_flags(args.quiet, args.debug));

    if let Err(e) = cli::run(args) {
        output::error(format!("{e:#}"));
        std::process::exit(1);
    }
}
