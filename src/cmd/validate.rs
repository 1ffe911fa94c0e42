//! `slowrelay validate` — check a configuration file without starting.
//!
//! Exit status follows the outcome, so the command can gate deploys.

use std::path::Path;

use serde_json::json;

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::model::ServerConfig;
use crate::config::sources::parse_config_str;
use crate::config::validation;
use crate::error::{RelayError, ValidationError};

pub fn execute(args: &ValidateArgs) -> Result<(), RelayError> {
    let config = read(&args.config)?;

    match validation::validate(&config) {
        Ok(()) => {
            report_valid(&args.config, &config, &args.format);
            Ok(())
        }
        Err(errors) => {
            report_invalid(&args.config, &errors, &args.format);
            Err(RelayError::ConfigValidation { errors })
        }
    }
}

fn read(path: &Path) -> Result<ServerConfig, RelayError> {
    if !path.is_file() {
        return Err(RelayError::ConfigFileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    parse_config_str(ext, &content, &path.display().to_string())
}

fn report_valid(path: &Path, config: &ServerConfig, format: &ValidateFormat) {
    match format {
        ValidateFormat::Text => println!(
            "\u{2713} {}",
            validation::format_validation_report(&path.display().to_string(), config)
        ),
        ValidateFormat::Json => println!(
            "{}",
            json!({
                "valid": true,
                "listen": config.listen,
                "upstream": config.upstream.url,
                "strategy": config.strategy,
            })
        ),
    }
}

fn report_invalid(path: &Path, errors: &[ValidationError], format: &ValidateFormat) {
    match format {
        ValidateFormat::Text => {
            eprintln!("\u{2717} {} has {} errors\n", path.display(), errors.len());
            for error in errors {
                eprintln!("{error}");
            }
        }
        ValidateFormat::Json => {
            let errors: Vec<_> = errors
                .iter()
                .map(|e| json!({ "field": e.field, "message": e.message, "suggestion": e.suggestion }))
                .collect();
            println!("{}", json!({ "valid": false, "errors": errors }));
        }
    }
}
