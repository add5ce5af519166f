//! Settings file validation.

use std::path::PathBuf;

use clap::Args;

use crate::commands::CommandError;
use crate::config::{load_config, ConfigError};

#[derive(Debug, Args)]
pub struct CheckConfigArgs {
    /// Settings file to validate.
    pub path: PathBuf,
}

/// Print the effective settings, or every validation problem found.
pub fn run(args: CheckConfigArgs) -> Result<(), CommandError> {
    match load_config(&args.path) {
        Ok(settings) => {
            println!("{} is valid\n", args.path.display());
            println!("{}", toml::to_string_pretty(&settings)?);
            Ok(())
        }
        Err(ConfigError::Validation(errors)) => {
            eprintln!("{} has {} problem(s):", args.path.display(), errors.len());
            for error in &errors {
                eprintln!("  - {error}");
            }
            Err(ConfigError::Validation(errors).into())
        }
        Err(e) => Err(e.into()),
    }
}
