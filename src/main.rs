use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};

use luascope_core::{LuascopeConfig, OutputFormat};
use luascope_extract::resolver::{build_repo_map, filter_reachable};
use luascope_extract::walker::walk_lua_repo;
use luascope_index::embedding::VoyageClient;
use luascope_index::graph::GraphStore;
use luascope_index::pipeline::process_repository;
use luascope_index::retriever::HybridRetriever;
use luascope_index::vector::VectorStore;
use luascope_index::writer::DualStoreWriter;

#[derive(Parser)]
#[command(
    name = "luascope",
    version,
    about = "Hybrid graph + vector code search for Lua codebases",
    long_about = "Luascope ingests a Lua codebase into a dependency graph and a vector index,\n\
                   then answers natural-language queries against both at once.\n\n\
                   Examples:\n  \
                     luascope ingest --path .          Index the repository\n  \
                     luascope search 'spell casting'   Search the indexed code\n  \
                     luascope preview --path .         Show reachable files before indexing\n  \
                     luascope doctor                   Check setup and environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .luascope.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a Lua repository into the graph and vector stores
    #[command(long_about = "Ingest a Lua repository into the graph and vector stores.\n\n\
        Walks the repository for .lua files, keeps those reachable from the\n\
        configured entry points, extracts functions, methods, and table fields\n\
        with tree-sitter, embeds them, and writes both stores.\n\n\
        Examples:\n  luascope ingest --path .\n  luascope ingest --path ./my-rotation")]
    Ingest {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Search the indexed codebase
    #[command(
        long_about = "Search the indexed codebase.\n\n\
        Embeds the query and runs it against the dependency graph and the vector\n\
        index concurrently, merging results by name with the higher score winning.\n\
        Run 'luascope ingest' first.\n\n\
        Examples:\n  luascope search 'damage calculation'\n  luascope search 'menu rendering' --limit 10"
    )]
    Search {
        /// Natural-language search query
        query: String,

        /// Repository path holding the stores (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Maximum results to return (default: 5)
        #[arg(long, default_value = "5")]
        limit: usize,
    },
    /// Preview which files the entry-point filter would keep
    #[command(long_about = "Preview which files the entry-point filter would keep.\n\n\
        Builds the repo map and runs the reachability filter without embedding\n\
        or writing anything. Useful for checking entry_points in .luascope.toml.\n\n\
        Example:\n  luascope preview --path .")]
    Preview {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
    /// Create a default .luascope.toml configuration file
    #[command(long_about = "Create a default .luascope.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .luascope.toml already exists.")]
    Init,
    /// Check your luascope setup and environment
    #[command(long_about = "Check your luascope setup and environment.\n\n\
        Runs diagnostics for the config file, embedding API key, entry points,\n\
        and both stores. Use --format json for machine-readable output.")]
    Doctor,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1m\x1b[33m⚡\x1b[0m \x1b[1mluascope\x1b[0m v{version} — hybrid graph + vector search for Lua codebases\n");

        println!("Quick start:");
        println!("  \x1b[36mluascope init\x1b[0m                  Create a .luascope.toml config file");
        println!("  \x1b[36mluascope ingest --path .\x1b[0m       Index the repository");
        println!("  \x1b[36mluascope search 'query'\x1b[0m        Search the indexed code\n");

        println!("All commands:");
        println!("  \x1b[32mingest\x1b[0m    Index a Lua repository into both stores");
        println!("  \x1b[32msearch\x1b[0m    Hybrid graph + vector search");
        println!("  \x1b[32mpreview\x1b[0m   Show files kept by the entry-point filter");
        println!("  \x1b[32mdoctor\x1b[0m    Check your setup and environment");
        println!("  \x1b[32minit\x1b[0m      Create default configuration\n");
    } else {
        println!("luascope v{version} — hybrid graph + vector search for Lua codebases\n");

        println!("Quick start:");
        println!("  luascope init                  Create a .luascope.toml config file");
        println!("  luascope ingest --path .       Index the repository");
        println!("  luascope search 'query'        Search the indexed code\n");

        println!("All commands:");
        println!("  ingest    Index a Lua repository into both stores");
        println!("  search    Hybrid graph + vector search");
        println!("  preview   Show files kept by the entry-point filter");
        println!("  doctor    Check your setup and environment");
        println!("  init      Create default configuration\n");
    }

    println!("Run 'luascope <command> --help' for details.");
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            "fail" => "\u{2717}",
            _ => "~",
        }
    }

    fn colored_symbol(&self) -> String {
        match self.status {
            "pass" => "\x1b[32m\u{2713}\x1b[0m".into(),
            "fail" => "\x1b[31m\u{2717}\x1b[0m".into(),
            _ => "\x1b[33m~\x1b[0m".into(),
        }
    }
}

fn run_doctor(config: &LuascopeConfig, format: OutputFormat, use_color: bool) -> Result<()> {
    let mut checks: Vec<CheckResult> = Vec::new();
    let cwd = std::env::current_dir().into_diagnostic()?;

    // 1. Config file
    let config_path = std::path::Path::new(".luascope.toml");
    if config_path.exists() {
        checks.push(CheckResult::pass("config_file", ".luascope.toml found"));
    } else {
        checks.push(CheckResult::fail(
            "config_file",
            ".luascope.toml not found",
            "run 'luascope init' to create a default config",
        ));
    }

    // 2. Embedding provider + API key
    checks.push(CheckResult::pass(
        "embedding_provider",
        format!(
            "{} (model: {}, {} dims)",
            config.embedding.provider, config.embedding.model, config.embedding.dimensions
        ),
    ));
    if config.embedding.api_key.is_some() || std::env::var("VOYAGE_API_KEY").is_ok() {
        checks.push(CheckResult::pass("embedding_api_key", "VOYAGE_API_KEY set"));
    } else {
        checks.push(CheckResult::fail(
            "embedding_api_key",
            "VOYAGE_API_KEY not set",
            "export VOYAGE_API_KEY=... or set api_key in .luascope.toml [embedding]",
        ));
    }

    // 3. Entry points on disk
    let present: Vec<&String> = config
        .ingest
        .entry_points
        .iter()
        .filter(|p| cwd.join(p).exists())
        .collect();
    if present.is_empty() {
        checks.push(CheckResult::fail(
            "entry_points",
            format!("none of {} configured entry points exist here", config.ingest.entry_points.len()),
            "set ingest.entry_points in .luascope.toml, or run from the repo root",
        ));
    } else {
        checks.push(CheckResult::pass(
            "entry_points",
            format!(
                "{}/{} present ({})",
                present.len(),
                config.ingest.entry_points.len(),
                present
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ));
    }

    // 4. Graph store
    let graph_path = cwd.join(&config.store.graph_path);
    if graph_path.exists() {
        let detail = match rusqlite::Connection::open_with_flags(
            &graph_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        ) {
            Ok(conn) => {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM entities", [], |r| r.get(0))
                    .unwrap_or(0);
                format!("exists ({count} entities)")
            }
            Err(_) => "exists".into(),
        };
        checks.push(CheckResult::pass("graph_store", detail));
    } else {
        checks.push(CheckResult::info(
            "graph_store",
            "not found (run 'luascope ingest' to create)",
        ));
    }

    // 5. Vector store
    let vector_path = cwd.join(&config.store.vector_path);
    if vector_path.exists() {
        let detail = match rusqlite::Connection::open_with_flags(
            &vector_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        ) {
            Ok(conn) => {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM records", [], |r| r.get(0))
                    .unwrap_or(0);
                format!("exists ({count} records)")
            }
            Err(_) => "exists".into(),
        };
        checks.push(CheckResult::pass("vector_store", detail));
    } else {
        checks.push(CheckResult::info(
            "vector_store",
            "not found (run 'luascope ingest' to create)",
        ));
    }

    match format {
        OutputFormat::Json => {
            let version = env!("CARGO_PKG_VERSION");
            let json = serde_json::json!({
                "version": version,
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        _ => {
            let version = env!("CARGO_PKG_VERSION");
            println!("luascope v{version} — Environment Check\n");

            for check in &checks {
                let sym = if use_color {
                    check.colored_symbol()
                } else {
                    check.symbol().to_string()
                };
                let label = check.name.replace('_', " ");
                println!("  {sym} {label:<20} {}", check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            let info = checks.iter().filter(|c| c.status == "info").count();
            println!("\n{passed} checks passed, {failed} failed, {info} info");
        }
    }

    Ok(())
}

fn open_writer(repo: &std::path::Path, config: &LuascopeConfig) -> Result<DualStoreWriter> {
    let graph = GraphStore::open(&repo.join(&config.store.graph_path))?;
    let vector = VectorStore::open(
        &repo.join(&config.store.vector_path),
        config.embedding.dimensions,
    )?;
    Ok(DualStoreWriter::new(graph, vector))
}

const DEFAULT_CONFIG: &str = r#"# Luascope Configuration

[embedding]
# provider = "voyage"
# model = "voyage-code-3"
# dimensions = 1536
# api_key = "..."           # or export VOYAGE_API_KEY

[ingest]
# Files seeding the require() reachability filter
# entry_points = ["main.lua", "_api/core.lua", "_api/game_object.lua", "_api/menu.lua"]

[store]
# graph_path = ".luascope/graph.db"
# vector_path = ".luascope/vectors.db"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LuascopeConfig::from_file(path)?,
        None => {
            let default_path = std::path::Path::new(".luascope.toml");
            if default_path.exists() {
                LuascopeConfig::from_file(default_path)?
            } else {
                LuascopeConfig::default()
            }
        }
    };

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    if cli.verbose {
        eprintln!("format: {}", cli.format);
        eprintln!(
            "embedding: {} ({} dims)",
            config.embedding.model, config.embedding.dimensions
        );
        eprintln!("entry points: {}", config.ingest.entry_points.join(", "));
    }

    match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Ingest { ref path }) => {
            // Hint: missing embedding API key, before doing any work
            if config.embedding.api_key.is_none() && std::env::var("VOYAGE_API_KEY").is_err() {
                miette::bail!(miette::miette!(
                    help = "Set VOYAGE_API_KEY or add api_key in your .luascope.toml under [embedding]",
                    "No API key configured for embedding provider '{}'",
                    config.embedding.provider
                ));
            }

            let embedder = VoyageClient::with_config(&config.embedding)?;
            let writer = open_writer(path, &config)?;

            eprintln!("Walking repository at {} ...", path.display());
            let files = walk_lua_repo(path)?;
            eprintln!("Found {} Lua files.", files.len());

            let is_tty = std::io::stderr().is_terminal();
            let spinner = if is_tty {
                let pb = indicatif::ProgressBar::new_spinner();
                pb.set_style(
                    indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                        .unwrap(),
                );
                pb.set_message("Extracting and embedding entities...");
                pb.enable_steady_tick(std::time::Duration::from_millis(120));
                Some(pb)
            } else {
                None
            };

            let stats = process_repository(&files, &config.ingest.entry_points, &embedder, &writer)
                .await
                .inspect_err(|_e| {
                    if let Some(pb) = &spinner {
                        pb.finish_with_message("Failed");
                    }
                })?;

            if let Some(pb) = spinner {
                pb.finish_with_message("Done");
            }

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&stats).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    println!("# Ingest Report\n");
                    println!("- **Files walked:** {}", stats.files_walked);
                    println!("- **Files reachable:** {}", stats.files_reachable);
                    println!("- **Entities indexed:** {}", stats.entities_indexed);
                }
                OutputFormat::Text => {
                    println!(
                        "Indexed {} entities from {} reachable files ({} walked).",
                        stats.entities_indexed, stats.files_reachable, stats.files_walked,
                    );
                }
            }
        }
        Some(Command::Search {
            ref query,
            ref path,
            limit,
        }) => {
            if config.embedding.api_key.is_none() && std::env::var("VOYAGE_API_KEY").is_err() {
                miette::bail!(miette::miette!(
                    help = "Set VOYAGE_API_KEY or add api_key in your .luascope.toml under [embedding]",
                    "No API key configured for embedding provider '{}'",
                    config.embedding.provider
                ));
            }

            let graph_path = path.join(&config.store.graph_path);
            if !graph_path.exists() {
                let repo = path.display().to_string();
                miette::bail!(miette::miette!(
                    help = "Run 'luascope ingest --path {repo}' first",
                    "No index found at {}",
                    graph_path.display()
                ));
            }

            let embedder = VoyageClient::with_config(&config.embedding)?;
            let graph = GraphStore::open(&graph_path)?;
            let vector = VectorStore::open(
                &path.join(&config.store.vector_path),
                config.embedding.dimensions,
            )?;
            let retriever = HybridRetriever::new(embedder, graph, vector);

            let results = retriever.search(query, limit).await?;

            match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&results).into_diagnostic()?
                    );
                }
                OutputFormat::Markdown => {
                    if results.is_empty() {
                        println!("No results found.");
                    } else {
                        println!("# Search Results\n");
                        for (i, r) in results.iter().enumerate() {
                            println!(
                                "## {}. `{}` ({}) — `{}:{}–{}` (score: {:.4})\n",
                                i + 1,
                                r.entity.name,
                                r.entity.kind,
                                r.entity.file_path.display(),
                                r.entity.start_line + 1,
                                r.entity.end_line + 1,
                                r.score,
                            );
                            if !r.dependencies.is_empty() {
                                println!("**Depends on:** {}\n", r.dependencies.join(", "));
                            }
                            println!("```lua\n{}\n```\n", r.entity.content);
                        }
                    }
                }
                OutputFormat::Text => {
                    if results.is_empty() {
                        println!("No results found.");
                    } else {
                        for (i, r) in results.iter().enumerate() {
                            println!(
                                "{}. {} ({}) {}:{}–{} (score: {:.4})",
                                i + 1,
                                r.entity.name,
                                r.entity.kind,
                                r.entity.file_path.display(),
                                r.entity.start_line + 1,
                                r.entity.end_line + 1,
                                r.score,
                            );
                            if !r.dependencies.is_empty() {
                                println!("   depends on: {}", r.dependencies.join(", "));
                            }
                            // Show a snippet preview (first 3 lines)
                            let preview: String = r
                                .entity
                                .content
                                .lines()
                                .take(3)
                                .map(|l| format!("   {l}"))
                                .collect::<Vec<_>>()
                                .join("\n");
                            println!("{preview}\n");
                        }
                    }
                }
            }
        }
        Some(Command::Preview { ref path }) => {
            let files = walk_lua_repo(path)?;
            let repo_map = build_repo_map(&files)?;
            let reachable = filter_reachable(repo_map, &config.ingest.entry_points);

            match cli.format {
                OutputFormat::Json => {
                    let summary: Vec<serde_json::Value> = reachable
                        .iter()
                        .map(|(file, captures)| {
                            let definitions = captures
                                .iter()
                                .filter(|c| c.label.starts_with("definition"))
                                .count();
                            let calls = captures
                                .iter()
                                .filter(|c| c.label == "reference.call")
                                .count();
                            serde_json::json!({
                                "file": file,
                                "definitions": definitions,
                                "calls": calls,
                            })
                        })
                        .collect();
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&summary).into_diagnostic()?
                    );
                }
                OutputFormat::Markdown => {
                    println!("# Reachable Files\n");
                    println!("| File | Definitions | Calls |");
                    println!("|------|-------------|-------|");
                    for (file, captures) in &reachable {
                        let definitions = captures
                            .iter()
                            .filter(|c| c.label.starts_with("definition"))
                            .count();
                        let calls = captures
                            .iter()
                            .filter(|c| c.label == "reference.call")
                            .count();
                        println!("| `{file}` | {definitions} | {calls} |");
                    }
                }
                OutputFormat::Text => {
                    println!(
                        "{} of {} files reachable from entry points:",
                        reachable.len(),
                        files.len()
                    );
                    for (file, captures) in &reachable {
                        let definitions = captures
                            .iter()
                            .filter(|c| c.label.starts_with("definition"))
                            .count();
                        let calls = captures
                            .iter()
                            .filter(|c| c.label == "reference.call")
                            .count();
                        println!("  {file}  ({definitions} definitions, {calls} calls)");
                    }
                }
            }
        }
        Some(Command::Init) => {
            let path = std::path::Path::new(".luascope.toml");
            if path.exists() {
                miette::bail!(".luascope.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .luascope.toml with default configuration");
        }
        Some(Command::Doctor) => {
            run_doctor(&config, cli.format, use_color)?;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "luascope", &mut std::io::stdout());
        }
    }

    Ok(())
}
