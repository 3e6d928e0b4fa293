use clap::Parser;
use miette::Result;
use tracing_subscriber::{prelude::*, EnvFilter};

use cabletrace::cli::{Cli, Commands};

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();

    let env_filter = if cli.global.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter),
        )
        .init();

    let global = &cli.global;
    match cli.command {
        Commands::Trace(args) => cabletrace::cli::commands::trace::run(args, global),
        Commands::Sync(args) => cabletrace::cli::commands::sync::run(args, global),
        Commands::Paths(cmd) => cabletrace::cli::commands::paths::run(cmd, global),
        Commands::Apply(args) => cabletrace::cli::commands::apply::run(args, global),
        Commands::Validate(args) => cabletrace::cli::commands::validate::run(args, global),
        Commands::Profiles(args) => cabletrace::cli::commands::profiles::run(args, global),
        Commands::Completions(args) => cabletrace::cli::commands::completions::run(args, global),
    }
}
