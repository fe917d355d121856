use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use geoplace::config::ResolverConfig;
use geoplace::location::{
    normalize, BatchRequest, CancelToken, PlaceResolver, Progress, ResolutionCache,
};
use geoplace::server::{self, AppState};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// geoplace: resolve dashboard place names to coordinates.
///
/// Names are normalized and deduplicated, served from a local cache when
/// possible, and otherwise looked up on Nominatim at most one call per
/// 400 ms.
///
/// Examples:
///   geoplace resolve Pune Hosur "NCT of Delhi"
///   geoplace resolve --file places.txt --max-lookups 10
///   geoplace normalize "Jammu & Kashmir" " delhi "
///   geoplace serve --port 8080
#[derive(Parser)]
#[command(name = "geoplace", version, about, long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve one batch of names and print the result as JSON.
    Resolve {
        /// Place names. Combined with --file when both are given.
        names: Vec<String>,

        /// Read names from a file, one per line ("-" for stdin).
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,

        /// Ceiling on distinct lookups for this batch.
        #[arg(long)]
        max_lookups: Option<usize>,

        #[command(flatten)]
        opts: ResolverArgs,
    },
    /// Print the canonical form of each name.
    Normalize { names: Vec<String> },
    /// Show cache statistics.
    Cache {
        #[command(flatten)]
        opts: ResolverArgs,
    },
    /// Serve the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, short = 'p', default_value_t = 8080)]
        port: u16,

        #[command(flatten)]
        opts: ResolverArgs,
    },
}

#[derive(Args)]
struct ResolverArgs {
    /// JSON config file. Missing fields take defaults.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Country appended to every query (default: India).
    #[arg(long)]
    country: Option<String>,

    /// Offline mode: only use the cache.
    #[arg(long)]
    offline: bool,

    /// Keep the cache in memory only.
    #[arg(long)]
    no_persist: bool,

    /// Cache file (default: ~/.geoplace/cache.json).
    #[arg(long)]
    cache: Option<PathBuf>,
}

impl ResolverArgs {
    fn load(&self) -> ResolverConfig {
        let mut config =
            ResolverConfig::load_or_default(self.config.as_deref()).unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                std::process::exit(2);
            });
        if let Some(ref country) = self.country {
            config.country_context = country.clone();
        }
        if let Some(ref cache) = self.cache {
            config.cache_path = Some(cache.clone());
        }
        config.offline |= self.offline;
        if self.no_persist {
            config.persist_cache = false;
        }
        config
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Resolve { names, file, max_lookups, opts } => {
            cmd_resolve(names, file, max_lookups, &opts)
        }
        Command::Normalize { names } => {
            for name in names {
                println!("{:?} -> {}", name, normalize(&name));
            }
        }
        Command::Cache { opts } => cmd_cache(&opts),
        Command::Serve { host, port, opts } => cmd_serve(&host, port, &opts),
    }
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "geoplace=debug"
    } else {
        "geoplace=info"
    }
}

fn init_tracing(verbose: bool) {
    let default = default_filter(verbose);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_resolver(config: &ResolverConfig) -> PlaceResolver {
    PlaceResolver::from_config(config).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    })
}

fn read_names(file: &Path) -> Vec<String> {
    let data = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else {
        std::fs::read_to_string(file)
    };
    let data = data.unwrap_or_else(|e| {
        eprintln!("Error: cannot read {}: {}", file.display(), e);
        std::process::exit(1);
    });
    data.lines().map(str::to_string).collect()
}

fn cmd_resolve(
    mut names: Vec<String>,
    file: Option<PathBuf>,
    max_lookups: Option<usize>,
    opts: &ResolverArgs,
) {
    if let Some(ref file) = file {
        names.extend(read_names(file));
    }
    if names.is_empty() {
        eprintln!("Error: No place names given.");
        eprintln!();
        eprintln!("Usage:");
        eprintln!("  geoplace resolve Pune Hosur");
        eprintln!("  geoplace resolve --file places.txt");
        std::process::exit(1);
    }

    let config = opts.load();
    let resolver = build_resolver(&config);
    let request = BatchRequest::new(names, max_lookups.unwrap_or(config.max_lookups));

    let bar = ProgressBar::new(0);
    let template = "  {spinner} resolving {pos}/{len} {wide_bar}";
    if let Ok(style) = ProgressStyle::with_template(template) {
        bar.set_style(style);
    }
    let mut on_progress = |p: Progress| {
        bar.set_length(p.total as u64);
        bar.set_position(p.done as u64);
    };

    let result = resolver.resolve_batch(&request, &mut on_progress, &CancelToken::new());
    bar.finish_and_clear();

    if result.truncated {
        eprintln!(
            "  \u{26A0}\u{FE0F}  Resolved only the first {} of {} distinct places. Narrow the selection for complete results.",
            result.coordinates.len(),
            result.distinct,
        );
    }
    if !result.failed.is_empty() {
        eprintln!(
            "  {} place(s) failed this time and will be retried on the next run.",
            result.failed.len()
        );
    }

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: cannot encode result: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_cache(opts: &ResolverArgs) {
    let config = opts.load();
    let path = config.cache_file();
    let cache = ResolutionCache::open(path.clone(), config.cache_policy(), Utc::now());
    let stats = cache.stats(Utc::now());
    eprintln!("  Cache: {}", path.display());
    match serde_json::to_string_pretty(&stats) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: cannot encode stats: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_serve(host: &str, port: u16, opts: &ResolverArgs) {
    let config = opts.load();
    let state = AppState {
        resolver: Arc::new(build_resolver(&config)),
        max_lookups: config.max_lookups,
    };

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Error: cannot start runtime: {}", e);
        std::process::exit(1);
    });
    eprintln!("  geoplace server on http://{}:{}  (Ctrl+C to stop)", host, port);
    if let Err(e) = runtime.block_on(server::start(host, port, state)) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
