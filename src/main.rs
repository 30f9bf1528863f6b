//! pive CLI: philosophical inference validation engine.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use pive::config::PiveConfig;
use pive::engine::{Engine, SeedBundle};
use pive::entity::{EntityId, GateId, ThesisStatus};
use pive::query::QueryParameters;
use pive::service::{ListRequest, LoopRequest, QueryRequest, ValidateRequest};

const DEFAULT_DATA_DIR: &str = ".pive";

#[derive(Parser)]
#[command(name = "pive", version, about = "Philosophical inference validation engine")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true, env = "PIVE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for persistent storage (overrides `store.data_dir`).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Keep everything in memory for this invocation.
    #[arg(long, global = true, conflicts_with = "data_dir")]
    ephemeral: bool,

    /// Print raw JSON responses.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a data directory and write a default config file.
    Init {
        /// Where to write the config file.
        #[arg(long, default_value = "pive.toml")]
        output: PathBuf,
    },

    /// Run the six quality gates over a new thesis.
    Validate {
        /// Thesis statement.
        thesis: String,

        #[arg(long)]
        domain: Option<String>,

        /// Generated entity (RPE) the thesis derives from.
        #[arg(long)]
        rpe: Option<String>,

        /// Axiom id to check coherence against (repeatable).
        #[arg(long = "axiom")]
        axioms: Vec<String>,
    },

    /// Refine a stored thesis through the adversarial loop.
    Loop {
        thesis_id: String,

        #[arg(long)]
        max_iterations: Option<usize>,
    },

    /// Run a Phi-QL query (WHY, COUNTEREX, REPAIR, TRACE).
    Query {
        query_type: String,
        /// thesis, argument or claim.
        entity_type: String,
        entity_id: String,

        /// COUNTEREX: cap on new counterexamples.
        #[arg(long)]
        max_new: Option<usize>,

        /// REPAIR: repairs to persist as scenarios.
        #[arg(long)]
        max_scenarios: Option<usize>,

        /// WHY/TRACE: follow provenance transitively.
        #[arg(long)]
        transitive: bool,
    },

    /// List theses with statistics.
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<ThesisStatus>,

        #[arg(long)]
        domain: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Load vocabulary, axioms, concepts and RPEs from a JSON bundle.
    Seed {
        #[arg(long)]
        file: PathBuf,
    },

    /// Show engine info and statistics.
    Info,
}

fn parse_status(raw: &str) -> std::result::Result<ThesisStatus, String> {
    ThesisStatus::parse(raw).ok_or_else(|| {
        format!("unknown status \"{raw}\" (expected unverified, validating, validated or rejected)")
    })
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

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PiveConfig::load(path)?,
        None => PiveConfig::default(),
    };
    config.store.data_dir = if cli.ephemeral {
        None
    } else {
        cli.data_dir
            .clone()
            .or(config.store.data_dir)
            .or_else(|| Some(PathBuf::from(DEFAULT_DATA_DIR)))
    };

    match cli.command {
        Commands::Init { output } => {
            config.save(&output)?;
            let engine = Engine::new(config)?;
            println!("Wrote config to {}", output.display());
            println!("{}", engine.info()?);
        }

        Commands::Validate {
            thesis,
            domain,
            rpe,
            axioms,
        } => {
            let engine = Engine::new(config)?;
            let response = engine.validate(ValidateRequest {
                thesis,
                domain,
                related_rpe_id: rpe.map(EntityId::from),
                axiom_references: axioms.into_iter().map(EntityId::from).collect(),
            })?;

            if cli.json {
                print_json(&response)?;
            } else {
                println!("Thesis {}: {}", response.thesis_id, response.validation_status);
                for id in GateId::ALL {
                    if let Some(gate) = response.gates.get(&id) {
                        let mark = if gate.passed { "pass" } else { "FAIL" };
                        println!(
                            "  {id} {:<24} {mark}  score={:.2}  {}",
                            id.title(),
                            gate.score,
                            gate.details
                        );
                    }
                }
                let summary = &response.summary;
                println!(
                    "{}/{} gates passed, {} formalizations, {} counterexamples, {} repairs suggested",
                    summary.gates_passed,
                    summary.gates_total,
                    summary.formalizations,
                    summary.counterexamples,
                    summary.repairs_suggested
                );
            }
        }

        Commands::Loop {
            thesis_id,
            max_iterations,
        } => {
            let engine = Engine::new(config)?;
            let response = engine.adversarial_loop(LoopRequest {
                thesis_id: EntityId::from(thesis_id),
                max_iterations,
            })?;

            if cli.json {
                print_json(&response)?;
            } else {
                println!("Run {}", response.run_id);
                for it in &response.iterations {
                    println!(
                        "  #{} challenges={} countermodels={} repairs={}{}",
                        it.iteration_number,
                        it.red_team.total_challenges,
                        it.countermodels.len(),
                        it.repairs.len(),
                        it.convergence
                            .as_deref()
                            .map(|c| format!("  [{c}]"))
                            .unwrap_or_default()
                    );
                }
                let assessment = &response.final_assessment;
                println!(
                    "Outcome: {:?} after {} iteration(s), {} issue(s) remaining, strength {:+.2}",
                    assessment.outcome,
                    assessment.iterations_count,
                    assessment.remaining_issues,
                    assessment.strength_improvement
                );
                println!("Final statement: {}", assessment.final_statement);
            }
        }

        Commands::Query {
            query_type,
            entity_type,
            entity_id,
            max_new,
            max_scenarios,
            transitive,
        } => {
            let engine = Engine::new(config)?;
            let response = engine.query(QueryRequest {
                query_type,
                entity_type,
                entity_id: EntityId::from(entity_id),
                parameters: QueryParameters {
                    max_new,
                    max_scenarios,
                    transitive,
                },
            })?;
            print_json(&response)?;
        }

        Commands::List {
            status,
            domain,
            limit,
        } => {
            let engine = Engine::new(config)?;
            let response = engine.list_theses(ListRequest {
                status_filter: status,
                domain_filter: domain,
                limit,
            })?;

            if cli.json {
                print_json(&response)?;
            } else if response.theses.is_empty() {
                println!("No theses.");
            } else {
                for t in &response.theses {
                    println!(
                        "  {} [{}] {:.0}% gates, {} objection(s){}  {}",
                        t.thesis.id,
                        t.thesis.status,
                        t.gate_success_rate,
                        t.objection_count,
                        t.rpe_name
                            .as_deref()
                            .map(|n| format!(", from \"{n}\""))
                            .unwrap_or_default(),
                        truncate(&t.thesis.statement, 60)
                    );
                }
                let stats = &response.statistics;
                println!(
                    "{} total: {} validated, {} rejected, {} unverified, average gate success {:.1}%",
                    stats.total,
                    stats.validated,
                    stats.rejected,
                    stats.unverified,
                    stats.average_gate_success
                );
            }
        }

        Commands::Seed { file } => {
            let engine = Engine::new(config)?;
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            let bundle: SeedBundle = serde_json::from_str(&content).into_diagnostic()?;
            let report = engine.seed(bundle)?;
            println!(
                "Seeded {} vocabulary term(s), {} axiom(s), {} concept(s), {} RPE(s) from {}",
                report.vocabulary,
                report.axioms,
                report.concepts,
                report.generated_entities,
                file.display()
            );
        }

        Commands::Info => {
            let engine = Engine::new(config)?;
            println!("{}", engine.info()?);
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
