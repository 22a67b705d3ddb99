//! CLI command implementations

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Subcommand};
use trove_core::config::LibraryConfig;
use trove_core::{
    Entropy, FilterParams, QueryEngine, RandomSelector, SourceKind, TroveConfig, TroveError,
};
use trove_web::handlers::ListData;

/// Where the library comes from. Unset flags keep the environment value.
#[derive(Args, Debug, Clone, Default)]
pub struct LibraryArgs {
    /// Library root directory
    #[arg(long)]
    pub library: Option<PathBuf>,
    /// Item source: directory or catalog
    #[arg(long)]
    pub source: Option<SourceKind>,
    /// Base URL of the remote catalog
    #[arg(long)]
    pub catalog_url: Option<String>,
    /// Access token for the remote catalog
    #[arg(long)]
    pub catalog_token: Option<String>,
}

impl LibraryArgs {
    fn apply(&self, config: &mut LibraryConfig) {
        if let Some(path) = &self.library {
            config.path = Some(path.clone());
        }
        if let Some(source) = self.source {
            config.source = source;
        }
        if let Some(url) = &self.catalog_url {
            config.catalog_url = Some(url.clone());
            // A catalog URL on its own implies the catalog source.
            if self.source.is_none() {
                config.source = SourceKind::Catalog;
            }
        }
        if let Some(token) = &self.catalog_token {
            config.catalog_token = Some(token.clone());
        }
    }
}

/// Item filters shared by `list` and `random`.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Case-insensitive substring of name, tags or metadata
    #[arg(long)]
    pub keyword: Option<String>,
    /// File extension, with or without the dot
    #[arg(long)]
    pub ext: Option<String>,
    /// Comma separated; every tag must match
    #[arg(long)]
    pub tags: Option<String>,
    /// Comma separated; any folder may match
    #[arg(long)]
    pub folders: Option<String>,
}

impl FilterArgs {
    fn into_params(self) -> FilterParams {
        FilterParams {
            keyword: self.keyword,
            ext: self.ext,
            tags: self.tags,
            folders: self.folders,
            ..FilterParams::default()
        }
    }
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (until Ctrl-C)
    Serve {
        #[command(flatten)]
        library: LibraryArgs,
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Do not send CORS headers
        #[arg(long)]
        no_cors: bool,
    },
    /// Print a page of matching items as JSON
    List {
        #[command(flatten)]
        library: LibraryArgs,
        #[command(flatten)]
        filters: FilterArgs,
        /// name, created, modified, size (with _asc/_desc) or random
        #[arg(long)]
        order_by: Option<String>,
        /// Page size
        #[arg(long)]
        limit: Option<String>,
        /// Items to skip
        #[arg(long)]
        offset: Option<String>,
    },
    /// Print one random matching item as JSON
    Random {
        #[command(flatten)]
        library: LibraryArgs,
        #[command(flatten)]
        filters: FilterArgs,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the failure of the command that ran
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            library,
            host,
            port,
            no_cors,
        } => serve(library, host, port, no_cors).await,
        Commands::List {
            library,
            filters,
            order_by,
            limit,
            offset,
        } => {
            let params = FilterParams {
                order_by,
                limit,
                offset,
                ..filters.into_params()
            };
            list(library, params).await
        }
        Commands::Random { library, filters } => random(library, filters.into_params()).await,
    }
}

fn load_config(library: &LibraryArgs) -> TroveConfig {
    let mut config = TroveConfig::from_env();
    library.apply(&mut config.library);
    config
}

/// Run the HTTP server
///
/// # Errors
/// - `ServerError::BindFailed` - Address could not be bound
pub async fn serve(
    library: LibraryArgs,
    host: Option<String>,
    port: Option<u16>,
    no_cors: bool,
) -> anyhow::Result<()> {
    let mut config = load_config(&library);
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if no_cors {
        config.server.enable_cors = false;
    }

    tracing::info!(
        source = %config.library.source,
        library = ?config.library.path,
        "Starting Trove server"
    );
    trove_web::run_server(config)
        .await
        .context("server stopped with an error")
}

/// Print a page of matching items
///
/// # Errors
/// - `SourceError::Unconfigured` - No library configured
pub async fn list(library: LibraryArgs, params: FilterParams) -> anyhow::Result<()> {
    let config = load_config(&library);
    let source = trove_core::source::from_config(&config.library);
    let engine = QueryEngine::new(source, Entropy::from_os());

    let filter = params.into_filter(config.query.default_limit);
    let page = engine
        .list(&filter)
        .await
        .map_err(report)?
        .map(|item| item.summary());

    let data = ListData {
        files: page.items,
        total: page.total,
        limit: page.limit,
        offset: page.offset,
    };
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

/// Print one random matching item
///
/// # Errors
/// - `SourceError::Unconfigured` - No library configured
/// - No item matched the filters
pub async fn random(library: LibraryArgs, params: FilterParams) -> anyhow::Result<()> {
    let config = load_config(&library);
    let source = trove_core::source::from_config(&config.library);
    let selector = RandomSelector::new(source, Entropy::from_os());

    let filter = params.into_filter(config.query.default_limit);
    let item = selector
        .pick_full(&filter)
        .await
        .map_err(report)?
        .context("no item matches the given filters")?;

    println!("{}", serde_json::to_string_pretty(&item.summary())?);
    Ok(())
}

/// User errors are reported by their message alone. Anything else keeps
/// the underlying detail below the message.
fn report(error: impl Into<TroveError>) -> anyhow::Error {
    let error = error.into();
    let message = error.user_message();
    if error.is_user_error() {
        anyhow::anyhow!(message)
    } else {
        anyhow::Error::new(error).context(message)
    }
}

#[cfg(test)]
mod tests {
    use trove_core::SourceError;

    use super::*;

    #[test]
    fn test_library_args_override_config() {
        let mut config = LibraryConfig::default();
        let args = LibraryArgs {
            library: Some(PathBuf::from("/srv/library")),
            ..LibraryArgs::default()
        };
        args.apply(&mut config);
        assert_eq!(config.path, Some(PathBuf::from("/srv/library")));
        assert_eq!(config.source, SourceKind::Directory);
    }

    #[test]
    fn test_catalog_url_implies_catalog_source() {
        let mut config = LibraryConfig::default();
        let args = LibraryArgs {
            catalog_url: Some("http://127.0.0.1:41595".to_string()),
            ..LibraryArgs::default()
        };
        args.apply(&mut config);
        assert_eq!(config.source, SourceKind::Catalog);

        let mut config = LibraryConfig::default();
        let args = LibraryArgs {
            catalog_url: Some("http://127.0.0.1:41595".to_string()),
            source: Some(SourceKind::Directory),
            ..LibraryArgs::default()
        };
        args.apply(&mut config);
        assert_eq!(config.source, SourceKind::Directory);
    }

    #[test]
    fn test_filter_args_become_params() {
        let params = FilterArgs {
            tags: Some("a, b".to_string()),
            ext: Some("PNG".to_string()),
            ..FilterArgs::default()
        }
        .into_params();

        let filter = params.into_filter(100);
        assert_eq!(filter.tags, vec!["a", "b"]);
        assert_eq!(filter.extension.as_deref(), Some(".png"));
    }

    #[test]
    fn test_report_keeps_detail_only_for_operator_errors() {
        let error = report(SourceError::InvalidId {
            id: "a/b".to_string(),
        });
        assert_eq!(format!("{error:#}"), "'a/b' is not a valid item id");

        let error = report(SourceError::Unconfigured {
            reason: "no library path configured".to_string(),
        });
        assert!(error.to_string().starts_with("Library is not available yet"));
        assert!(format!("{error:#}").contains("Library is not configured"));
    }
}
