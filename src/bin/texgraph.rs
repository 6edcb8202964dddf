//! texgraph CLI - parse one LaTeX paper and export its graph, chunks and
//! structured document

#[cfg(feature = "cli")]
use clap::{ArgAction, Parser, ValueEnum};
#[cfg(feature = "cli")]
use serde::Deserialize;
#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::io::{self, Read};
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};
#[cfg(feature = "cli")]
use texgraph::{
    process, utils::format_diagnostics, AnalysisOptions, Dag, DiagnosticSeverity, ExportError,
    ParseOptions,
};
#[cfg(feature = "cli")]
use tracing::info;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "texgraph")]
#[command(version)]
#[command(
    about = "texgraph - LaTeX paper parser with a typed semantic graph and chunked exports",
    long_about = None
)]
struct Cli {
    /// Input file path (reads from stdin if not provided)
    input_file: Option<PathBuf>,

    /// Write the structured document JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write the graph in GraphViz DOT format to this path
    #[arg(long)]
    dot: Option<PathBuf>,

    /// Write the knowledge-graph JSON to this path
    #[arg(long)]
    kg: Option<PathBuf>,

    /// Write the chunks, one JSON string per line, to this path
    #[arg(long)]
    chunks: Option<PathBuf>,

    /// Print the AST to stdout
    #[arg(long)]
    print_ast: bool,

    /// Print the graph hierarchy to stdout
    #[arg(long)]
    print_graph: bool,

    /// Annotate the graph and print the analyses as JSON
    #[arg(long)]
    analyze: bool,

    /// TOML file with [parse] and [analysis] tables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Option preset applied before the config file
    #[arg(long, value_enum, default_value_t = Preset::Default)]
    preset: Preset,

    /// Tag author blocks with the CRF
    #[arg(long)]
    crf: bool,

    /// Minimum severity of printed diagnostics
    #[arg(long, value_enum, default_value_t = Severity::Warning)]
    diagnostics: Severity,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[cfg(feature = "cli")]
#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Default,
    Strict,
    Lenient,
}

#[cfg(feature = "cli")]
#[derive(Clone, Copy, ValueEnum)]
enum Severity {
    Info,
    Warning,
    Error,
}

#[cfg(feature = "cli")]
impl From<Severity> for DiagnosticSeverity {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Info => DiagnosticSeverity::Info,
            Severity::Warning => DiagnosticSeverity::Warning,
            Severity::Error => DiagnosticSeverity::Error,
        }
    }
}

/// `--config` file contents.
#[cfg(feature = "cli")]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    parse: Option<ParseOptions>,
    analysis: AnalysisOptions,
}

#[cfg(feature = "cli")]
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[cfg(feature = "cli")]
fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&text)?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

#[cfg(feature = "cli")]
fn write_text(path: &Path, contents: &str) -> Result<(), ExportError> {
    fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = contents.len(), "wrote output");
    Ok(())
}

#[cfg(feature = "cli")]
fn analysis_report(graph: &mut Dag, options: &AnalysisOptions) -> serde_json::Value {
    let inferred = graph.infer_section_relationships();
    graph.annotate_semantics(options);
    let ranking: Vec<serde_json::Value> = graph
        .rank_nodes_by_importance()
        .into_iter()
        .take(options.theme_limit)
        .map(|(id, score)| serde_json::json!({ "id": id, "score": score }))
        .collect();
    serde_json::json!({
        "inferred_edges": inferred,
        "importance": ranking,
        "bridging_concepts": graph.find_bridging_concepts(options),
        "citations": graph.analyze_citations(options.top_citations),
        "structure": graph.analyze_paper_structure(options),
        "themes": graph.extract_key_themes(options.theme_limit),
        "concept_hierarchy": graph.build_concept_hierarchy(),
        "methodology_flow": graph.track_methodology_flow(),
        "methodology_gaps": graph.validate_methodology_completeness(),
        "evidence_gaps": graph.validate_evidence_chain(),
        "logical_gaps": graph.identify_logical_gaps(),
        "research_gaps": graph.identify_research_gaps(),
        "contradictions": graph.find_contradictions(),
        "components": graph.strongly_connected_components().len(),
        "validation": graph.validate(),
    })
}

#[cfg(feature = "cli")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match cli.config.as_deref() {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    let mut options = config.parse.unwrap_or_else(|| match cli.preset {
        Preset::Default => ParseOptions::default(),
        Preset::Strict => ParseOptions::strict(),
        Preset::Lenient => ParseOptions::lenient(),
    });
    if cli.crf {
        options.use_crf = true;
    }

    let source = match cli.input_file.as_deref() {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let mut out = process(&source, &options);

    if cli.print_ast {
        println!("{}", out.ast.print());
    }
    if cli.print_graph {
        println!("{}", out.graph.dump_structure());
    }
    if cli.analyze {
        let report = analysis_report(&mut out.graph, &config.analysis);
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if let Some(path) = cli.json.as_deref() {
        write_text(path, &out.document_json()?)?;
    }
    if let Some(path) = cli.dot.as_deref() {
        out.graph.write_dot(path)?;
    }
    if let Some(path) = cli.kg.as_deref() {
        out.graph.write_knowledge_graph(path)?;
    }
    if let Some(path) = cli.chunks.as_deref() {
        let mut lines = String::new();
        for chunk in &out.chunks {
            lines.push_str(&serde_json::to_string(chunk)?);
            lines.push('\n');
        }
        write_text(path, &lines)?;
    }

    let report = format_diagnostics(&out.diagnostics, cli.diagnostics.into());
    if !report.is_empty() {
        eprintln!("{}", report);
    }
    eprintln!(
        "✓ {} chunks, {} fragments, {} graph nodes, {} edges",
        out.chunks.len(),
        out.document.content.len(),
        out.graph.len(),
        out.graph.edge_count()
    );
    if out.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Build with --features cli");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  texgraph [OPTIONS] [INPUT_FILE]");
}
