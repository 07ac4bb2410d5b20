//! `bellhop run` — start the relay server.
//!
//! Loads configuration from a file or the environment, starts the Axum
//! HTTP server with graceful shutdown, and spawns a background config
//! refresh loop for hot-reloading.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::RunArgs;
use crate::config::model::Config;
use crate::config::sources::{self, env::EnvSource};
use crate::config::{validation, ConfigResolver, ConfigSource};
use crate::error::BellhopError;
use crate::logging;
use crate::server::{self, AppState, LoadedConfig, Stats};

pub async fn execute(args: RunArgs) -> Result<(), BellhopError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let resolver = resolve_config_sources(&args).await?;
    let overrides = Overrides {
        origin: args.upstream.clone(),
        timeout: args.timeout_ms,
    };

    let (mut config, version) = resolver.load_with_fallback().await?;
    overrides.apply(&mut config)?;

    let upstream = config.origin().to_string();
    let prefix = config.relay.prefix.clone();

    let loaded_config = tokio::sync::RwLock::new(LoadedConfig {
        config: Arc::new(config),
        version,
        source_name: resolver.primary_name().to_string(),
        loaded_at: Instant::now(),
    });

    let state = Arc::new(AppState {
        config: loaded_config,
        http_client: server::build_http_client(),
        start_time: Instant::now(),
        stats: Stats::new(),
    });

    // Shutdown signal: dropping shutdown_tx closes the channel and stops the refresh loop
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // Spawn config refresh loop with cancellation
    let refresh_state = state.clone();
    let poll_interval = args.poll_interval;
    let refresh_handle = tokio::spawn(async move {
        config_refresh_loop(refresh_state, resolver, overrides, poll_interval, shutdown_rx).await;
    });

    let router = server::build_router(state, args.max_body);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        upstream = %upstream,
        prefix = %prefix,
        "bellhop started"
    );

    // Wrap the shutdown signal to also stop the config refresh loop immediately
    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown)
    .await?;

    // Wait for the config refresh task to finish (catches panics)
    if let Err(e) = refresh_handle.await {
        tracing::error!(error = %e, "config refresh task failed");
    }

    tracing::info!("bellhop stopped");
    Ok(())
}

/// CLI values that take precedence over whatever the source loaded.
/// Re-applied after every hot reload so a reload cannot silently undo
/// them.
pub struct Overrides {
    pub origin: Option<String>,
    pub timeout: Option<u64>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) -> Result<(), BellhopError> {
        if self.origin.is_none() && self.timeout.is_none() {
            return Ok(());
        }

        if let Some(ref origin) = self.origin {
            config.upstream.origin = origin.clone();
        }
        if let Some(timeout) = self.timeout {
            config.upstream.timeout = Some(timeout);
        }

        if let Err(errors) = validation::validate(config) {
            return Err(BellhopError::ConfigValidation { errors });
        }
        Ok(())
    }
}

async fn resolve_config_sources(args: &RunArgs) -> Result<ConfigResolver, BellhopError> {
    let file_source = resolve_file_source(args.config.as_deref()).await?;

    // --upstream (or UPSTREAM_ORIGIN, via clap) is enough to run file-less
    let env_source: Option<Box<dyn ConfigSource>> = args
        .upstream
        .clone()
        .map(|origin| Box::new(EnvSource::new(origin)) as Box<dyn ConfigSource>);

    match (file_source, env_source) {
        (Some(file), env) => Ok(ConfigResolver::new(file, env)),
        (None, Some(env)) => Ok(ConfigResolver::new(env, None)),
        (None, None) => Err(BellhopError::NoConfigSource {
            hint: "Provide --config <file>, --upstream <url>, or set UPSTREAM_ORIGIN.\n  \
                   Run 'bellhop init' to create a config file."
                .into(),
        }),
    }
}

async fn resolve_file_source(
    explicit: Option<&std::path::Path>,
) -> Result<Option<Box<dyn ConfigSource>>, BellhopError> {
    if let Some(path) = explicit {
        return create_file_source(path).map(Some);
    }

    // Auto-detect in current directory
    let candidates = [
        "bellhop.yaml",
        "bellhop.yml",
        "bellhop.json",
        "bellhop.toml",
    ];

    for name in &candidates {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return create_file_source(&path).map(Some);
        }
    }

    Ok(None)
}

fn create_file_source(path: &std::path::Path) -> Result<Box<dyn ConfigSource>, BellhopError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(Box::new(sources::yaml::new(path.to_path_buf()))),

        #[cfg(feature = "json")]
        "json" => Ok(Box::new(sources::json::new(path.to_path_buf()))),

        #[cfg(feature = "toml")]
        "toml" => Ok(Box::new(sources::toml_source::new(path.to_path_buf()))),

        other => Err(BellhopError::UnsupportedFormat(other.to_string())),
    }
}

async fn config_refresh_loop(
    state: Arc<AppState>,
    resolver: ConfigResolver,
    overrides: Overrides,
    interval_secs: u64,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                tracing::debug!("config refresh loop shutting down");
                return;
            }
        }

        refresh_once(&state, &resolver, &overrides).await;
    }
}

/// One refresh attempt: check the primary source for changes, reload,
/// re-apply the CLI overrides, and swap the served config. A reload
/// that fails to load or validate keeps the current config.
pub async fn refresh_once(state: &AppState, resolver: &ConfigResolver, overrides: &Overrides) {
    let current_version = {
        let config = state.config.read().await;
        config.version.clone()
    };

    match resolver.primary().has_changed(&current_version).await {
        Ok(true) => {
            tracing::info!("config change detected, reloading");
            match resolver.load_with_fallback().await {
                Ok((mut config, version)) => {
                    if let Err(e) = overrides.apply(&mut config) {
                        tracing::error!(error = %e, "reloaded config rejected, keeping current config");
                        return;
                    }
                    let upstream = config.origin().to_string();
                    let mut loaded = state.config.write().await;
                    loaded.config = Arc::new(config);
                    loaded.version = version;
                    loaded.loaded_at = std::time::Instant::now();
                    drop(loaded);
                    tracing::info!(upstream = %upstream, "config reloaded");
                }
                Err(e) => {
                    tracing::error!(error = %e, "config reload failed, keeping current config");
                }
            }
        }
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(error = %e, "config change check failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{RelaySettings, Upstream};

    fn loaded_config() -> Config {
        Config {
            upstream: Upstream {
                origin: "http://localhost:8080".into(),
                timeout: Some(5000),
            },
            relay: RelaySettings::default(),
        }
    }

    #[test]
    fn empty_overrides_leave_config_untouched() {
        let mut config = loaded_config();
        let overrides = Overrides {
            origin: None,
            timeout: None,
        };

        overrides.apply(&mut config).unwrap();

        assert_eq!(config.origin(), "http://localhost:8080");
        assert_eq!(config.upstream.timeout, Some(5000));
    }

    #[test]
    fn overrides_replace_origin_and_timeout() {
        let mut config = loaded_config();
        let overrides = Overrides {
            origin: Some("http://backend:9000".into()),
            timeout: Some(250),
        };

        overrides.apply(&mut config).unwrap();

        assert_eq!(config.origin(), "http://backend:9000");
        assert_eq!(config.upstream.timeout, Some(250));
    }

    #[test]
    fn invalid_override_fails_validation() {
        let mut config = loaded_config();
        let overrides = Overrides {
            origin: Some("not a url".into()),
            timeout: None,
        };

        let err = overrides.apply(&mut config).unwrap_err();
        assert!(matches!(err, BellhopError::ConfigValidation { .. }));
    }
}
