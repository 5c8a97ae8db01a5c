//! ebes CLI: example-based entity search.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use ebes::config::SearchConfig;
use ebes::evaluate::Method;
use ebes::graph::remote::RemoteGraph;
use ebes::graph::sparql::OxigraphGraph;
use ebes::graph::{Entity, GraphAdapter};
use ebes::model::Query;
use ebes::rank::Ranking;
use ebes::sample::{sample_files, PreparedSample, Sample};
use ebes::score;
use ebes::session::{SearchOutcome, SearchSession};

#[derive(Parser)]
#[command(name = "ebes", version, about = "Example-based entity search")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank the entities of a sample file.
    Rank {
        /// Triple file, directory of triple files, or SPARQL endpoint URL.
        #[arg(long)]
        graph: String,

        /// Sample file (TOML with `topic`, `relevant`, `not_relevant`).
        #[arg(long)]
        sample: PathBuf,

        /// Seed for choosing random examples.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run an ad-hoc query.
    Query {
        /// Triple file, directory of triple files, or SPARQL endpoint URL.
        #[arg(long)]
        graph: String,

        /// Free-text relation, e.g. "capital cities".
        #[arg(long)]
        relation: String,

        /// Example entity (repeatable).
        #[arg(long = "example", required = true)]
        examples: Vec<String>,

        /// Entity to rank (repeatable).
        #[arg(long = "candidate")]
        candidates: Vec<String>,
    },

    /// Evaluate every method over a directory of sample files.
    Evaluate {
        /// Triple file, directory of triple files, or SPARQL endpoint URL.
        #[arg(long)]
        graph: String,

        /// Directory holding `*.toml` sample files.
        #[arg(long)]
        samples: PathBuf,

        /// Seed for choosing random examples.
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => SearchConfig::load(path)?,
        None => SearchConfig::default(),
    };

    match cli.command {
        Commands::Rank {
            graph,
            sample,
            seed,
        } => {
            let session = SearchSession::new(open_graph(&graph, &config)?, config)?;
            let mut rng = rng(seed);
            let prepared = Sample::load(&sample)?.prepare(session.config().examples_amount, &mut rng);
            let outcome = session.search(&prepared.query(), &prepared.entities_to_rank)?;

            if cli.json {
                print_json(&outcome)?;
            } else {
                print_examples(&prepared.examples);
                print_outcome(&outcome, Some(&prepared));
            }
        }

        Commands::Query {
            graph,
            relation,
            examples,
            candidates,
        } => {
            let session = SearchSession::new(open_graph(&graph, &config)?, config)?;
            let query = Query::new(relation, examples.iter().map(|e| Entity::parse_lenient(e)));
            let candidates: Vec<Entity> = candidates.iter().map(|c| Entity::parse_lenient(c)).collect();
            let outcome = session.search(&query, &candidates)?;

            if cli.json {
                print_json(&outcome)?;
            } else {
                print_outcome(&outcome, None);
            }
        }

        Commands::Evaluate {
            graph,
            samples,
            seed,
        } => {
            let session = SearchSession::new(open_graph(&graph, &config)?, config)?;
            let mut rng = rng(seed);
            let mut prepared = Vec::new();
            for file in sample_files(&samples)? {
                prepared.push(Sample::load(&file)?.prepare(session.config().examples_amount, &mut rng));
            }
            if prepared.is_empty() {
                miette::bail!("no sample files (*.toml) found in {}", samples.display());
            }
            let report = session.evaluate_all(&prepared)?;

            if cli.json {
                print_json(&report)?;
            } else {
                for evaluation in &report.samples {
                    println!("Stats for `{}` (top {}):", evaluation.topic, evaluation.limit);
                    for (method, result) in &evaluation.metrics {
                        println!("  Ranking with `{method}` method");
                        println!("    R-Precision -> {}", score::format_fixed(&result.r_precision, 5));
                        println!("    AvgPrec -> {}", score::format_fixed(&result.avg_prec, 5));
                    }
                    println!("  Fusion strategy: {}", evaluation.outcome.fused.strategy);
                }
                println!("Mean stats:");
                for (method, result) in &report.means {
                    println!("  Ranking with `{method}` method");
                    println!("    R-Precision -> {}", score::format_fixed(&result.r_precision, 5));
                    println!("    AvgPrec -> {}", score::format_fixed(&result.avg_prec, 5));
                }
            }
        }
    }

    Ok(())
}

/// Open a graph: an `http(s)://` argument is a SPARQL endpoint, anything
/// else a triple file or directory.
fn open_graph(spec: &str, config: &SearchConfig) -> Result<Arc<dyn GraphAdapter>> {
    let languages = config.language_filter();
    if spec.starts_with("http://") || spec.starts_with("https://") {
        let remote = RemoteGraph::new(spec, languages, Duration::from_secs(30));
        remote.ping()?;
        tracing::info!(endpoint = spec, "using remote SPARQL endpoint");
        Ok(Arc::new(remote))
    } else {
        let local = OxigraphGraph::open(Path::new(spec), languages)?;
        tracing::info!(path = spec, triples = local.size()?, "loaded local triples");
        Ok(Arc::new(local))
    }
}

fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

fn print_examples(examples: &[Entity]) {
    println!("Examples:");
    for example in examples {
        println!("  {example}");
    }
}

fn print_outcome(outcome: &SearchOutcome, sample: Option<&PreparedSample>) {
    let relevant = sample.map(|s| s.relevant_set());
    for method in Method::ALL {
        let ap = match method {
            Method::Text => Some(outcome.text.avg_prec()),
            Method::Example => Some(outcome.example.avg_prec()),
            Method::Fused => None,
        };
        println!("{}", "-".repeat(30));
        match ap {
            Some(ap) => println!("Ranking - {method} (AP on examples {}):", score::format_fixed(ap, 5)),
            None => println!("Ranking - {method} ({}):", outcome.fused.strategy),
        }
        print_ranking(outcome.ranking(method), relevant.as_ref());
    }
}

fn print_ranking(ranking: &Ranking, relevant: Option<&std::collections::HashSet<Entity>>) {
    for entry in ranking {
        let value = score::format_fixed(&entry.score, 5);
        match relevant {
            Some(relevant) if relevant.contains(&entry.entity) => {
                println!(" OK {} - {value}", entry.entity)
            }
            Some(_) => println!(" NO {} - {value}", entry.entity),
            None => println!(" {} - {value}", entry.entity),
        }
    }
}
