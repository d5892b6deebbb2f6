use anyhow::Result;
use bibfetch::config::{Config, Credentials};
use bibfetch::constants;
use bibfetch::orchestrator::Orchestrator;
use bibfetch::registry::ProviderRegistry;
use bibfetch::types::{ActiveSource, ProviderKind, SearchParams};
use bibfetch::logging;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "bibfetch")]
#[command(about = "Multi-source bibliographic metadata lookup")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look a book up by ISBN, trying sources in priority order
    Lookup {
        /// ISBN-10 or ISBN-13, hyphens allowed
        isbn: String,
        /// Sources to try, comma-separated, in priority order.
        /// Defaults to all implemented sources.
        #[arg(long)]
        sources: Option<String>,
    },
    /// Multi-field search on a single source
    Search {
        /// Source code (see `bibfetch sources`)
        #[arg(long)]
        source: String,
        #[arg(long)]
        isbn: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        publisher: Option<String>,
        #[arg(long)]
        year_from: Option<String>,
        #[arg(long)]
        year_to: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
    },
    /// Fetch full details for an edition key returned by `search`
    Details {
        /// Source code the edition key came from
        #[arg(long)]
        source: String,
        /// Opaque edition key
        key: String,
    },
    /// List implemented sources and their capabilities
    Sources,
}

fn parse_source_list(registry: &ProviderRegistry, sources: Option<String>) -> Vec<ActiveSource> {
    let codes: Vec<String> = match sources {
        Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
        None => constants::supported_sources()
            .into_iter()
            .map(str::to_string)
            .collect(),
    };

    codes
        .into_iter()
        .enumerate()
        .map(|(i, code)| {
            let (name, kind) = match registry.get(&code) {
                Some(p) => (p.name().to_string(), p.kind()),
                None => (code.clone(), ProviderKind::Api),
            };
            ActiveSource::enabled(&code, &name, kind, i as i32 + 1)
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;
    let credentials = Credentials::from_env();
    let registry = ProviderRegistry::new(&config, &credentials);
    let orchestrator = Orchestrator::new(registry);

    match cli.command {
        Commands::Lookup { isbn, sources } => {
            let active = parse_source_list(orchestrator.registry(), sources);
            info!(isbn = %isbn, sources = active.len(), "starting ISBN lookup");

            let lookup = orchestrator.search_isbn(&isbn, &active).await;

            match &lookup.result {
                Some(result) => {
                    println!("✅ Found via {}", result.provider);
                    if let Some(url) = &result.source_url {
                        println!("   {}", url);
                    }
                    println!("{}", serde_json::to_string_pretty(&result.record)?);
                }
                None => {
                    println!(
                        "❌ No source had this ISBN ({} attempted)",
                        lookup.attempted.len()
                    );
                }
            }

            if !lookup.errors.is_empty() {
                println!("\nPer-source errors:");
                let mut codes: Vec<&String> = lookup.errors.keys().collect();
                codes.sort();
                for code in codes {
                    println!("   {}: {}", code, lookup.errors[code]);
                }
            }
        }
        Commands::Search {
            source,
            isbn,
            title,
            author,
            publisher,
            year_from,
            year_to,
            limit,
            offset,
        } => {
            let params = SearchParams {
                isbn,
                title,
                author,
                publisher,
                year_from,
                year_to,
                limit,
                offset,
            };

            match orchestrator.search_by_fields(&source, &params).await {
                Ok(outcome) => {
                    println!(
                        "{} results (total {}, more: {})",
                        outcome.items.len(),
                        outcome.total,
                        outcome.has_more
                    );
                    println!("{}", serde_json::to_string_pretty(&outcome.items)?);
                }
                Err(e) => println!("❌ {}", e),
            }
        }
        Commands::Details { source, key } => match orchestrator.get_details(&source, &key).await {
            Ok(hit) => {
                if let Some(url) = &hit.source_url {
                    println!("   {}", url);
                }
                println!("{}", serde_json::to_string_pretty(&hit.record)?);
            }
            Err(e) => println!("❌ {}", e),
        },
        Commands::Sources => {
            let registry = orchestrator.registry();
            println!("code            field-search  details  name");
            for code in registry.implemented_codes() {
                let provider = registry.get(code).unwrap();
                println!(
                    "{:<15} {:<13} {:<8} {}",
                    code,
                    if provider.supports_field_search() { "yes" } else { "no" },
                    if provider.supports_details() { "yes" } else { "no" },
                    provider.name()
                );
            }
        }
    }

    Ok(())
}
