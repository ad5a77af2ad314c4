//! `config` subcommand — show current configuration and file path.

use std::path::Path;

use super::{Config, ConfigOutput, Result, kv, kv_indent, kv_width, print_json};

pub(super) fn cmd_config(json: bool, custom_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(custom_path);
    let config_path = custom_path.map(|p| p.to_path_buf()).or_else(Config::path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let problems: Vec<String> = match config.validate() {
        Ok(()) => vec![],
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    };

    if json {
        let output = ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config,
            problems,
        };
        return print_json(&output);
    }

    // Human-readable output
    let w = kv_width(
        &["Config file:"],
        &[
            "default_model:",
            "listen_timeout_ms:",
            "soft_deadline_ms:",
            "max_retries:",
        ],
    );

    match &config_path {
        Some(p) if config_exists => kv("Config file:", format_args!("{} (loaded)", p.display()), w),
        Some(p) => kv(
            "Config file:",
            format_args!("{} (not found, using defaults)", p.display()),
            w,
        ),
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    kv_indent(
        "default_model:",
        config.default_model().unwrap_or("(none)"),
        w,
    );
    kv_indent("listen_timeout_ms:", config.listen_timeout_ms, w);
    kv_indent("soft_deadline_ms:", config.soft_deadline_ms, w);
    kv_indent("max_retries:", config.max_retries, w);

    if !problems.is_empty() {
        println!();
        println!("Problems:");
        for p in &problems {
            println!("  {p}");
        }
    }
    Ok(())
}
