mod cmd;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rvcage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot and run a guest ELF executable to completion (or step limit).
    Run(cmd::run::Cmd),
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let exit_code = match &cli.command {
        Commands::Run(cmd) => cmd.execute(),
    };
    std::process::exit(exit_code);
}
