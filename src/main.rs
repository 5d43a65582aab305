use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use research_review::config::{find_config_file, load_config, save_config, Config, CONFIG_FILE_NAME};
use research_review::mcp::McpServer;
use research_review::models::{ReviewRequest, ReviewResult};
use research_review::review::{ErrorKind, ReviewPipeline};
use research_review::sources::SourceRegistry;
use research_review::ui::{self, print_status, Spinner, Status};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Research Review - Grounded literature reviews from bibliographic metadata sources
#[derive(Parser, Debug)]
#[command(name = "research-review")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "hongkongkiwi")]
#[command(about = "Synthesize literature reviews with resolved citations from Crossref, Scopus, Web of Science, OpenAlex and Semantic Scholar", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show all environment variables
    #[arg(long, global = true)]
    env: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for a review
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Markdown on a terminal, JSON otherwise
    Auto,
    /// The full result as JSON
    Json,
    /// The narrative only
    Markdown,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a literature review on a topic
    #[command(alias = "r")]
    Review {
        /// Research topic or question
        topic: String,

        /// Citation style for the reference list
        #[arg(long, short, default_value = "raw", value_parser = ["raw", "bibtex", "apa7"])]
        format: String,

        /// Output language for the narrative
        #[arg(long, short, default_value = "English")]
        language: String,

        /// Records handed to the generator (overrides [selection] top_k)
        #[arg(long, short = 'k')]
        top_k: Option<usize>,

        /// Output format
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Auto)]
        output: OutputFormat,
    },

    /// List the configured sources
    #[command(alias = "ls")]
    Sources,

    /// Run the MCP server
    Serve {
        /// Run in streamable HTTP mode instead of stdio
        #[arg(long)]
        http: bool,

        /// Port for HTTP mode
        #[arg(long, short, default_value_t = 3000)]
        port: u16,

        /// Host to bind to for HTTP mode
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective configuration as TOML (API keys omitted)
    Show,

    /// Write a configuration file with default values
    Init {
        /// Destination (default: ./research-review.toml)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Print all recognized environment variables
fn print_env_vars() {
    println!("Research Review - Environment Variables");
    println!();
    println!("Source credentials:");
    println!("  ELSEVIER_API_KEY            Scopus Search API key (required for scopus)");
    println!("  ELSEVIER_INST_TOKEN         Elsevier institutional token (optional)");
    println!("  WOS_API_KEY                 Web of Science API key (required for wos)");
    println!("  SEMANTIC_SCHOLAR_API_KEY    Semantic Scholar key (higher rate limits)");
    println!("  CROSSREF_MAILTO             Contact address for the Crossref/OpenAlex polite pools");
    println!("  OPENALEX_EMAIL              Alternative contact address for OpenAlex");
    println!();
    println!("Generation and embeddings:");
    println!("  OPENAI_API_KEY              Key for OpenAI endpoints (secondary generator, embeddings)");
    println!();
    println!("Configuration overrides (nested keys use a double underscore):");
    println!("  RESEARCH_REVIEW_SOURCES__ENABLED        Comma-separated source ids, in order");
    println!("  RESEARCH_REVIEW_SELECTION__TOP_K        Records handed to the generator (default: 12)");
    println!("  RESEARCH_REVIEW_RETRIEVAL__MAX_TERMS    Generated alternative queries (default: 3)");
    println!("  RESEARCH_REVIEW_LLM__PRIMARY__BASE_URL  Primary generator URL (default: http://localhost:11434)");
    println!("  RESEARCH_REVIEW_LOGGING__FORMAT         text or json");
    println!();
    println!("Other Settings:");
    println!("  RUST_LOG                    Rust logging level (e.g., debug, info, warn, error)");
    std::process::exit(0);
}

fn init_tracing(verbose: u8, quiet: bool, config: &Config) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("research_review={}", level)),
    );

    // stdout carries results and the stdio MCP transport
    let json = config.logging.format.eq_ignore_ascii_case("json");
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn resolve_config(path: Option<&PathBuf>) -> Result<Config> {
    let path = path.cloned().or_else(find_config_file);
    Ok(load_config(path.as_deref())?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.env {
        print_env_vars();
    }

    let config = resolve_config(cli.config.as_ref())?;
    init_tracing(cli.verbose, cli.quiet, &config);

    match cli.command {
        Some(Commands::Review {
            topic,
            format,
            language,
            top_k,
            output,
        }) => {
            let mut pipeline = ReviewPipeline::from_config(&config)?;
            if let Some(k) = top_k {
                pipeline = pipeline.with_top_k(k);
            }
            let request = ReviewRequest::new(topic)
                .citation_format(format)
                .language(language);

            let spinner = (!cli.quiet).then(|| Spinner::new(&format!(
                    "Reviewing \"{}\"...",
                    ui::truncate_with_ellipsis(&request.topic, 48)
                )));
            let outcome = tokio::select! {
                result = pipeline.synthesize_review(&request) => result,
                _ = tokio::signal::ctrl_c() => {
                    if let Some(spinner) = &spinner {
                        spinner.finish_with_error("Cancelled");
                    }
                    std::process::exit(130);
                }
            };

            match outcome {
                Ok(result) => {
                    if let Some(spinner) = &spinner {
                        spinner.clear();
                    }
                    if result.is_empty() && !cli.quiet {
                        print_status(Status::Warning, "No records were retrieved for this topic");
                    }
                    print_review(&result, output)?;
                }
                Err(e) => {
                    if let Some(spinner) = &spinner {
                        spinner.finish_with_error(&e.to_string());
                    } else {
                        print_status(Status::Error, &e.to_string());
                    }
                    let code = match e.kind() {
                        ErrorKind::InvalidRequest => 2,
                        ErrorKind::ServiceUnavailable => 1,
                    };
                    std::process::exit(code);
                }
            }
        }

        Some(Commands::Sources) => {
            let registry = SourceRegistry::from_config(&config)?;
            print_sources(&registry);
        }

        Some(Commands::Serve { http, port, host }) => {
            let pipeline = ReviewPipeline::from_config(&config)?;
            let server = McpServer::new(Arc::new(pipeline))?;

            if http {
                let addr = format!("{}:{}", host, port);
                let (bound_addr, handle) = server.run_http(&addr).await?;
                tracing::info!("MCP server listening on {}", bound_addr);

                handle
                    .await
                    .map_err(|e| anyhow::anyhow!("Server task failed: {}", e))?;
            } else {
                server.run().await?;
            }
        }

        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show => {
                println!("{}", toml::to_string_pretty(&config.redacted())?);
            }
            ConfigCommands::Init { path, force } => {
                let path = path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
                if path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        path.display()
                    );
                }
                save_config(&Config::default(), &path)?;
                print_status(
                    Status::Success,
                    &format!("Wrote {}", path.display()),
                );
            }
        },

        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "research-review",
                &mut std::io::stdout(),
            );
        }

        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

fn print_review(result: &ReviewResult, format: OutputFormat) -> Result<()> {
    let actual_format = if format == OutputFormat::Auto {
        if ui::is_terminal() {
            OutputFormat::Markdown
        } else {
            OutputFormat::Json
        }
    } else {
        format
    };

    match actual_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Markdown => {
            println!("{}", result.result);
            if let Some(provider) = &result.generated_by {
                ui::print_section("Sources");
                println!(
                    "{} records selected, {} cited, drafted by {}",
                    result.resources.len(),
                    result.citations.len(),
                    provider
                );
            }
        }
        OutputFormat::Auto => unreachable!(),
    }
    Ok(())
}

fn print_sources(registry: &SourceRegistry) {
    use comfy_table::{Attribute, Cell, Color, Table};

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["#", "Id", "Name", "Credentials"]);

    for (i, source) in registry.all().iter().enumerate() {
        let credentials = if !source.requires_credentials() {
            Cell::new("not needed")
        } else if source.has_credentials() {
            Cell::new("configured").fg(Color::Green)
        } else {
            Cell::new("missing").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(format!("{} {}", ui::source_icon(source.id()), source.id()))
                .add_attribute(Attribute::Bold),
            Cell::new(source.name()),
            credentials,
        ]);
    }
    println!("{table}");
}
