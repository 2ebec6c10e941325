//! Caregraph CLI: load healthcare data into a graph and run reports against it
//!
//! The backend comes from the environment (`CAREGRAPH_BACKEND`, `NEO4J_*`) or a
//! YAML file. With the embedded backend the graph lives only for one run, so
//! `--data` preloads a CSV before the command executes.

use anyhow::Context;
use caregraph::config::AppConfig;
use caregraph::ingest::{self, ErrorPolicy, GraphSchema, IngestReport, Ingestor};
use caregraph::retrieval::{self, NamedQuery, QueryRunner, Traversal};
use caregraph::{EmbeddingClient, GraphClient, Params, PropertyValue, ResultRecord};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "caregraph", version, about = "Healthcare knowledge graph CLI")]
struct Cli {
    /// YAML configuration file (defaults to the environment)
    #[arg(long, global = true, env = "CAREGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// CSV to ingest before running the command
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a healthcare CSV
    Load {
        path: PathBuf,

        /// Stop at the first failing record
        #[arg(long)]
        abort_on_error: bool,
    },
    /// Ingest the laureate demo facts
    Seed,
    /// Run every catalogued healthcare report
    Report,
    /// Run one catalogued query, or a Cypher template
    Query {
        /// Catalog name or Cypher text
        query: String,

        /// Parameters as name=value
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
    },
    /// Providers (or patients) matching every given constraint
    Providers {
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        specialization: Option<String>,
        #[arg(long)]
        condition: Option<String>,
        /// List patients of matching providers instead
        #[arg(long)]
        patients: bool,
    },
    /// Providers whose bio is most similar to a text
    Similar {
        text: String,
        #[arg(long, default_value_t = 3)]
        top_k: usize,
        /// Create the index and embed bios first
        #[arg(long)]
        backfill: bool,
    },
    /// Create the vector index and embed every provider bio
    Index,
    /// Node and relationship counts
    Stats,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::from_env().context("loading configuration from the environment")?,
    };
    let client = caregraph::connect(&config).await.context("connecting to the graph store")?;

    if let Some(path) = &cli.data {
        load_csv(&client, path, ErrorPolicy::Continue).await?;
    }

    match cli.command {
        Commands::Load { path, abort_on_error } => {
            let policy = if abort_on_error { ErrorPolicy::Abort } else { ErrorPolicy::Continue };
            let report = load_csv(&client, &path, policy).await?;
            print_ingest_report(&report, &cli.format)?;
        }
        Commands::Seed => {
            let ingestor = Ingestor::new(client.clone(), GraphSchema::laureate())?;
            let outcome = ingestor.ingest(&ingest::laureate_facts()).await?;
            info!(nodes = outcome.nodes_merged, edges = outcome.edges_linked, "Seeded laureate facts");
            let query = retrieval::find(retrieval::catalog::ALL_NAMES).context("catalog lookup")?;
            let records = QueryRunner::new(client).run_query(&query, &Params::new()).await;
            print_records(&query.name, &records, &cli.format)?;
        }
        Commands::Report => {
            let runner = QueryRunner::new(client);
            let params = retrieval::report_params();
            for query in retrieval::catalog() {
                if query.name == retrieval::catalog::LAUREATE_FACTS {
                    continue;
                }
                let records = runner.run_query(&query, &params).await;
                print_records(&query.name, &records, &cli.format)?;
            }
        }
        Commands::Query { query, params } => {
            let named = retrieval::find(&query).unwrap_or_else(|| NamedQuery::adhoc(&query));
            let params = parse_params(&params)?;
            let records = QueryRunner::new(client).try_run_query(&named, &params).await?;
            print_records(&named.name, &records, &cli.format)?;
        }
        Commands::Providers { provider, location, specialization, condition, patients } => {
            let mut traversal = if patients { Traversal::patients() } else { Traversal::providers() };
            traversal.provider = provider;
            traversal.location = location;
            traversal.specialization = specialization;
            traversal.condition = condition;
            let names = QueryRunner::new(client).try_traverse(&traversal).await?;
            let column = traversal.target.column();
            let records: Vec<ResultRecord> = names
                .into_iter()
                .map(|name| std::iter::once((column.to_string(), serde_json::Value::String(name))).collect())
                .collect();
            print_records("traversal", &records, &cli.format)?;
        }
        Commands::Similar { text, top_k, backfill } => {
            let embedder = Arc::new(EmbeddingClient::new(config.require_embedding()?)?);
            if backfill {
                ingest::ensure_vector_index(client.as_ref(), &config.vector_index).await?;
                ingest::backfill_embeddings(client.as_ref(), embedder.as_ref(), &config.vector_index).await?;
            }
            let runner = QueryRunner::new(client).with_embedder(embedder, config.vector_index.clone());
            let hits = runner.try_similar(&text, top_k).await?;
            let records: Vec<ResultRecord> = hits
                .iter()
                .map(|hit| {
                    [
                        ("name".to_string(), serde_json::json!(hit.name)),
                        ("bio".to_string(), serde_json::json!(hit.bio)),
                        ("score".to_string(), serde_json::json!(hit.score)),
                    ]
                    .into_iter()
                    .collect()
                })
                .collect();
            print_records("similar", &records, &cli.format)?;
        }
        Commands::Index => {
            let embedder = EmbeddingClient::new(config.require_embedding()?)?;
            ingest::ensure_vector_index(client.as_ref(), &config.vector_index).await?;
            let report = ingest::backfill_embeddings(client.as_ref(), &embedder, &config.vector_index).await?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Table => {
                    println!("Embedded: {}", report.embedded);
                    println!("Failed:   {}", report.failed);
                    println!("Skipped:  {}", report.skipped);
                }
            }
        }
        Commands::Stats => {
            let stats = client.status().await?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Table => {
                    println!("Nodes: {}", stats.nodes);
                    println!("Edges: {}", stats.edges);
                }
            }
        }
    }

    Ok(())
}

async fn load_csv(client: &Arc<dyn GraphClient>, path: &Path, policy: ErrorPolicy) -> anyhow::Result<IngestReport> {
    let records = ingest::healthcare_records(path).with_context(|| format!("reading {}", path.display()))?;
    let ingestor = Ingestor::new(client.clone(), GraphSchema::healthcare())?.with_policy(policy);
    Ok(ingestor.ingest_batch(records).await?)
}

/// `name=value` pairs; integers and floats are parsed, anything else is a string
fn parse_params(pairs: &[String]) -> anyhow::Result<Params> {
    let mut params = Params::new();
    for pair in pairs {
        let (name, raw) = pair
            .split_once('=')
            .with_context(|| format!("parameter '{}' is not name=value", pair))?;
        let value: PropertyValue = if let Ok(i) = raw.parse::<i64>() {
            i.into()
        } else if let Ok(f) = raw.parse::<f64>() {
            f.into()
        } else {
            raw.into()
        };
        params.insert(name.trim().to_string(), value);
    }
    Ok(params)
}

fn print_ingest_report(report: &IngestReport, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Table => {
            println!("Records ok:     {}", report.records_ok);
            println!("Records failed: {}", report.records_failed);
            println!("Nodes merged:   {}", report.nodes_merged);
            println!("Edges linked:   {}", report.edges_linked);
            println!("Edges skipped:  {}", report.edges_skipped);
            for failure in &report.failures {
                println!("  record {}: {}", failure.index, failure.error);
            }
        }
    }
    Ok(())
}

fn print_records(title: &str, records: &[ResultRecord], format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "query": title, "records": records }))?);
        }
        OutputFormat::Table => {
            println!("{}", title);
            let Some(first) = records.first() else {
                println!("(no results)\n");
                return Ok(());
            };

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(first.fields().map(|(name, _)| name.clone()).collect::<Vec<_>>());
            for record in records {
                table.add_row(record.fields().map(|(_, v)| format_table_value(v)).collect::<Vec<_>>());
            }
            println!("{}", table);
            println!("{} row(s)\n", records.len());
        }
    }
    Ok(())
}

fn format_table_value(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(items) if items.len() > 8 => format!("<vector dim={}>", items.len()),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params = parse_params(&["limit=5".to_string(), "location=Houston".to_string()]).unwrap();
        assert_eq!(params["limit"], PropertyValue::from(5i64));
        assert_eq!(params["location"], PropertyValue::from("Houston"));
        assert!(parse_params(&["oops".to_string()]).is_err());
    }

    #[test]
    fn test_providers_accepts_every_constraint() {
        let cli = Cli::try_parse_from([
            "caregraph",
            "providers",
            "--provider",
            "Dr. Smith",
            "--location",
            "Houston",
            "--specialization",
            "Cardiology",
            "--patients",
        ])
        .unwrap();
        match cli.command {
            Commands::Providers { provider, location, specialization, condition, patients } => {
                assert_eq!(provider.as_deref(), Some("Dr. Smith"));
                assert_eq!(location.as_deref(), Some("Houston"));
                assert_eq!(specialization.as_deref(), Some("Cardiology"));
                assert!(condition.is_none());
                assert!(patients);
            }
            _ => panic!("expected the providers command"),
        }
    }

    #[test]
    fn test_format_table_value() {
        assert_eq!(format_table_value(&serde_json::json!("Dr. Smith")), "Dr. Smith");
        assert_eq!(format_table_value(&serde_json::json!(null)), "null");
        assert_eq!(format_table_value(&serde_json::Value::Array(vec![serde_json::json!(0.1); 16])), "<vector dim=16>");
    }
}
