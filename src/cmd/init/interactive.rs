//! Interactive wizard for step-by-step config generation.

use std::path::{Path, PathBuf};

use console::style;
use dialoguer::{Confirm, Input, Select};

use crate::cli::{ConfigFormat, InitArgs};
use crate::config::model::{Config, RelaySettings, Upstream};
use crate::config::validation::{validate, validate_method, validate_origin, validate_prefix};
use crate::error::BellhopError;

use super::serialize::serialize_config;

/// Map a `dialoguer::Error` to a `BellhopError`.
fn map_prompt_err(e: dialoguer::Error) -> BellhopError {
    BellhopError::Io(std::io::Error::other(e.to_string()))
}

pub fn run(args: &InitArgs) -> Result<(), BellhopError> {
    // Ensure we're running in an interactive terminal
    if !console::Term::stdout().is_term() {
        return Err(BellhopError::Io(std::io::Error::other(
            "interactive mode requires a terminal (TTY). Use bellhop init without -i for non-interactive mode.",
        )));
    }

    println!(
        "\n  {} Config Wizard\n  {}\n",
        style("Bellhop").cyan().bold(),
        style("─────────────────────").dim()
    );

    // Step 1: Output settings
    println!("  {}\n", style("Step 1: Output").bold());
    let format = prompt_format(args)?;
    let output = prompt_output(args, &format)?;

    // Step 2: Upstream
    println!("\n  {}\n", style("Step 2: Upstream").bold());
    let upstream = prompt_upstream()?;

    // Step 3: Relay behavior
    println!("\n  {}\n", style("Step 3: Relay").bold());
    let relay = prompt_relay()?;

    let config = Config { upstream, relay };

    // Validate the assembled config
    if let Err(errors) = validate(&config) {
        eprintln!(
            "\n  {} Config has validation errors:",
            style("!").red().bold()
        );
        for e in &errors {
            eprintln!("    {e}");
        }
        return Err(BellhopError::ConfigValidation { errors });
    }

    // Step 4: Review
    println!("\n  {}\n", style("Step 4: Review").bold());
    print_summary(&config, &format, &output);

    let confirm = Confirm::new()
        .with_prompt(format!("Write config to {}?", output.display()))
        .default(true)
        .interact()
        .map_err(map_prompt_err)?;

    if !confirm {
        println!("  Aborted.");
        return Ok(());
    }

    // Handle existing file
    if output.exists() {
        let overwrite = Confirm::new()
            .with_prompt(format!("{} already exists. Overwrite?", output.display()))
            .default(false)
            .interact()
            .map_err(map_prompt_err)?;
        if !overwrite {
            println!("  Aborted.");
            return Ok(());
        }
    }

    let content = serialize_config(&config, &format)?;
    std::fs::write(&output, content)?;
    println!(
        "\n  {} Created {}",
        style("✓").green().bold(),
        output.display()
    );
    Ok(())
}

fn prompt_format(args: &InitArgs) -> Result<ConfigFormat, BellhopError> {
    let formats = &["yaml", "json", "toml"];
    let default_idx = match args.format {
        ConfigFormat::Yaml => 0,
        ConfigFormat::Json => 1,
        ConfigFormat::Toml => 2,
    };

    let selection = Select::new()
        .with_prompt("Config format")
        .items(formats)
        .default(default_idx)
        .interact()
        .map_err(map_prompt_err)?;

    Ok(match selection {
        0 => ConfigFormat::Yaml,
        1 => ConfigFormat::Json,
        2 => ConfigFormat::Toml,
        _ => unreachable!(),
    })
}

fn prompt_output(args: &InitArgs, format: &ConfigFormat) -> Result<PathBuf, BellhopError> {
    let default_path = args.output.as_ref().map_or_else(
        || format!("bellhop.{}", format.extension()),
        |p| p.display().to_string(),
    );

    let path_str: String = Input::new()
        .with_prompt("Output file path")
        .default(default_path)
        .interact_text()
        .map_err(map_prompt_err)?;

    Ok(PathBuf::from(path_str))
}

fn prompt_upstream() -> Result<Upstream, BellhopError> {
    let origin: String = Input::new()
        .with_prompt("Upstream origin (e.g. http://localhost:8080)")
        .default("http://localhost:8080".into())
        .validate_with(|input: &String| -> Result<(), String> { validate_origin(input) })
        .interact_text()
        .map_err(map_prompt_err)?;

    let timeout_str: String = Input::new()
        .with_prompt("Request timeout (ms, blank to wait forever)")
        .default(String::new())
        .allow_empty(true)
        .validate_with(|input: &String| -> Result<(), String> {
            if input.is_empty() {
                return Ok(());
            }
            match input.parse::<u64>() {
                Ok(0) => Err("timeout must be greater than 0".into()),
                Ok(_) => Ok(()),
                Err(_) => Err("must be a number".into()),
            }
        })
        .interact_text()
        .map_err(map_prompt_err)?;

    let timeout = if timeout_str.is_empty() {
        None
    } else {
        timeout_str.parse::<u64>().ok()
    };

    Ok(Upstream { origin, timeout })
}

fn prompt_relay() -> Result<RelaySettings, BellhopError> {
    let prefix: String = Input::new()
        .with_prompt("Relay prefix")
        .default("/api".into())
        .validate_with(|input: &String| -> Result<(), String> { validate_prefix(input) })
        .interact_text()
        .map_err(map_prompt_err)?;

    let methods_str: String = Input::new()
        .with_prompt("Allowed methods (comma-separated)")
        .default("GET, POST, PUT, DELETE".into())
        .validate_with(|input: &String| -> Result<(), String> {
            for m in input.split(',') {
                let trimmed = m.trim();
                if trimmed.is_empty() {
                    return Err("method cannot be empty".into());
                }
                validate_method(trimmed)?;
            }
            Ok(())
        })
        .interact_text()
        .map_err(map_prompt_err)?;

    let methods: Vec<String> = methods_str
        .split(',')
        .map(|m| m.trim().to_uppercase())
        .collect();

    let forward_headers = Confirm::new()
        .with_prompt("Forward client headers to the upstream?")
        .default(true)
        .interact()
        .map_err(map_prompt_err)?;

    let strip_prefix = Confirm::new()
        .with_prompt("Strip the prefix from the forwarded path?")
        .default(false)
        .interact()
        .map_err(map_prompt_err)?;

    Ok(RelaySettings {
        prefix,
        methods,
        forward_headers,
        strip_prefix,
    })
}

fn print_summary(config: &Config, format: &ConfigFormat, output: &Path) {
    let timeout = config
        .upstream
        .timeout
        .map_or_else(|| "none".to_string(), |t| format!("{t}ms"));
    let path_mode = if config.relay.strip_prefix {
        "stripped"
    } else {
        "forwarded verbatim"
    };

    println!(
        "  {}",
        style("┌─────────────────────────────────────────────┐").dim()
    );
    println!(
        "  {}  Format:   {:<35}{}",
        style("│").dim(),
        format.extension(),
        style("│").dim()
    );
    println!(
        "  {}  Output:   {:<35}{}",
        style("│").dim(),
        output.display(),
        style("│").dim()
    );
    println!(
        "  {}  Upstream: {:<35}{}",
        style("│").dim(),
        config.origin(),
        style("│").dim()
    );
    println!(
        "  {}  Timeout:  {:<35}{}",
        style("│").dim(),
        timeout,
        style("│").dim()
    );
    println!(
        "  {}  Prefix:   {:<35}{}",
        style("│").dim(),
        format!("{} ({})", config.relay.prefix, path_mode),
        style("│").dim()
    );
    println!(
        "  {}  Methods:  {:<35}{}",
        style("│").dim(),
        config.relay.methods.join(", "),
        style("│").dim()
    );
    println!(
        "  {}  Headers:  {:<35}{}",
        style("│").dim(),
        if config.relay.forward_headers {
            "forwarded"
        } else {
            "not forwarded"
        },
        style("│").dim()
    );
    println!(
        "  {}\n",
        style("└─────────────────────────────────────────────┘").dim()
    );
}
