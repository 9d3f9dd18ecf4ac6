//! Loopmaker CLI
//!
//! Command-line interface for the loop crossfade engine.

use clap::Parser;
use env_logger::Env;
use log::info;

use loopmaker::cli::commands;
use loopmaker::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Loopmaker v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Loopmaker v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Render {
            input,
            output,
            tracks,
            manifest,
            save_settings,
            loop_args,
        } => commands::render(
            &input,
            &output,
            &loop_args,
            tracks,
            manifest,
            save_settings.as_deref(),
        )
        .map(|_| ()),
        Commands::Info { input } => commands::show_info(&input),
        Commands::Curve {
            mode,
            point,
            fade_out,
            steps,
        } => commands::show_curve(&mode, point, fade_out, steps),
        Commands::Batch {
            dir,
            output_dir,
            loop_args,
        } => commands::batch(&dir, &output_dir, &loop_args).map(|_| ()),
        Commands::Preview {
            input,
            output,
            loops,
            offset,
            mute,
            loop_args,
        } => commands::preview(&input, &output, loops, offset, &mute, &loop_args).map(|_| ()),
        #[cfg(feature = "device")]
        Commands::Play {
            input,
            seconds,
            device,
            loop_args,
        } => commands::play(&input, seconds, device.as_deref(), &loop_args),
    }
}
