//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(
    version,
    about,
    long_about = None,
    after_help = "`models` and `observed` read NetCDF grids and need a build with `--features netcdf`; `resolve` works in any build."
)]
/// Contains the commands
pub struct Cli {
    /// Log filter used when `RUST_LOG` is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the model ensemble dataset (needs the `netcdf` feature)
    Models {
        /// Run configuration file
        #[arg(short, long, env = "HZERO_CONFIG")]
        config: PathBuf,
    },
    /// Build the station + reanalysis dataset (needs the `netcdf` feature)
    Observed {
        /// Run configuration file
        #[arg(short, long, env = "HZERO_CONFIG")]
        config: PathBuf,
        /// Station source id, when the catalog has more than one
        #[arg(long)]
        station: Option<String>,
        /// Reanalysis source id, when the catalog has more than one
        #[arg(long)]
        reanalysis: Option<String>,
    },
    /// List the files each catalog source would read
    Resolve {
        /// Run configuration file
        #[arg(short, long, env = "HZERO_CONFIG")]
        config: PathBuf,
    },
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    let style = ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

    ProgressBar::new(size).with_message(message).with_style(style)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn should_flag_netcdf_requirement_in_help() {
        Cli::command().debug_assert();
        let cli = Cli::command();

        for name in ["models", "observed"] {
            let about = cli.find_subcommand(name).unwrap().get_about().unwrap().to_string();
            assert!(about.contains("`netcdf` feature"), "{}", about);
        }
        let after = cli.get_after_help().unwrap().to_string();
        assert!(after.contains("--features netcdf"));
    }
}
