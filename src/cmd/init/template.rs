//! Static config templates for non-interactive init.
//!
//! The default template carries only the required `upstream.origin`;
//! `--full` writes every setting with its default and a comment
//! explaining it (JSON gets the full settings without comments).

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::error::BellhopError;

const MINIMAL_YAML: &str = "\
# bellhop config
# Relays requests under the prefix (default /api) to the upstream and
# unwraps its {status, payload, errors} response envelope.

upstream:
  origin: http://localhost:8080
";

const FULL_YAML: &str = "\
# bellhop config (full reference)
# Every setting with its default. Only upstream.origin is required.

upstream:
  # Base URL requests are forwarded to.
  origin: http://localhost:8080

  # Per-request timeout in milliseconds. Unset means wait forever.
  # timeout: 5000

relay:
  # Path prefix the relay answers under. \"/\" relays every path.
  prefix: /api

  # Allowed inbound methods (GET, POST, PUT, DELETE, PATCH).
  # Anything else under the prefix gets 405.
  methods: [GET, POST, PUT, DELETE]

  # Forward the inbound header set to the upstream.
  forward_headers: true

  # Remove the prefix from the outbound path. With the default (false)
  # the upstream sees the same path the caller sent.
  strip_prefix: false
";

const MINIMAL_JSON: &str = "\
{
  \"upstream\": {
    \"origin\": \"http://localhost:8080\"
  }
}
";

const FULL_JSON: &str = "\
{
  \"upstream\": {
    \"origin\": \"http://localhost:8080\"
  },
  \"relay\": {
    \"prefix\": \"/api\",
    \"methods\": [\"GET\", \"POST\", \"PUT\", \"DELETE\"],
    \"forward_headers\": true,
    \"strip_prefix\": false
  }
}
";

const MINIMAL_TOML: &str = "\
# bellhop config
# Relays requests under the prefix (default /api) to the upstream and
# unwraps its {status, payload, errors} response envelope.

[upstream]
origin = \"http://localhost:8080\"
";

const FULL_TOML: &str = "\
# bellhop config (full reference)
# Every setting with its default. Only upstream.origin is required.

[upstream]
# Base URL requests are forwarded to.
origin = \"http://localhost:8080\"

# Per-request timeout in milliseconds. Unset means wait forever.
# timeout = 5000

[relay]
# Path prefix the relay answers under. \"/\" relays every path.
prefix = \"/api\"

# Allowed inbound methods (GET, POST, PUT, DELETE, PATCH).
# Anything else under the prefix gets 405.
methods = [\"GET\", \"POST\", \"PUT\", \"DELETE\"]

# Forward the inbound header set to the upstream.
forward_headers = true

# Remove the prefix from the outbound path. With the default (false)
# the upstream sees the same path the caller sent.
strip_prefix = false
";

pub fn run(args: &InitArgs) -> Result<(), BellhopError> {
    let output = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!("bellhop.{}", args.format.extension()))
    });

    if output.exists() {
        return Err(BellhopError::FileExists { path: output });
    }

    let content = render(&args.format, args.full)?;
    std::fs::write(&output, content)?;

    println!("Created {}", output.display());
    println!("\nNext steps:");
    println!("  1. Point upstream.origin at your backend");
    println!("  2. Check it:  bellhop validate {}", output.display());
    println!("  3. Start it:  bellhop run -c {}", output.display());
    Ok(())
}

fn render(format: &ConfigFormat, full: bool) -> Result<&'static str, BellhopError> {
    match format {
        #[cfg(feature = "yaml")]
        ConfigFormat::Yaml => Ok(if full { FULL_YAML } else { MINIMAL_YAML }),

        #[cfg(not(feature = "yaml"))]
        ConfigFormat::Yaml => Err(BellhopError::UnsupportedFormat("yaml".into())),

        ConfigFormat::Json => Ok(if full { FULL_JSON } else { MINIMAL_JSON }),

        #[cfg(feature = "toml")]
        ConfigFormat::Toml => Ok(if full { FULL_TOML } else { MINIMAL_TOML }),

        #[cfg(not(feature = "toml"))]
        ConfigFormat::Toml => Err(BellhopError::UnsupportedFormat("toml".into())),
    }
}
