//! `hotmod run` command implementation

use super::{build_importer, evaluate, parse_args};
use crate::error::CliError;
use hotmod_kernel::HotImportConfig;
use std::path::Path;

/// Execute the `hotmod run` command
pub async fn run(config: HotImportConfig, file: &Path, args: &[String]) -> Result<(), CliError> {
    let importer = build_importer(config.with_watch(false));
    let handle = importer.hot_import(file).await?;

    let value = evaluate(&handle, parse_args(args))?;
    println!("{}", value);
    Ok(())
}
