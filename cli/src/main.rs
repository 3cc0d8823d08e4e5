//! pdfsift CLI - structured PDF content extraction

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, LevelFilter};

use pdfsift::render::{to_json, to_xhtml, ExtractionStats};
use pdfsift::{
    keys, AccessCheckMode, EmbeddedCollector, ExtractOptions, Extraction, Extractor, JsonFormat,
    OcrStrategy,
};

#[derive(Parser)]
#[command(name = "pdfsift")]
#[command(version)]
#[command(about = "Extract text, metadata and attachments from PDF", long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    options: OptionArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Extraction options shared by every subcommand. Flags override the
/// config file.
#[derive(Args, Debug, Default)]
struct OptionArgs {
    /// JSON file with extraction options
    #[arg(long, value_name = "FILE", global = true, env = "PDFSIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Password for encrypted documents
    #[arg(long, global = true, env = "PDFSIFT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// When pages go through OCR
    #[arg(long, value_enum, global = true)]
    ocr: Option<OcrMode>,

    /// Permission enforcement for encrypted documents
    #[arg(long, value_enum, global = true)]
    access: Option<AccessMode>,

    /// Stop after this many characters of output
    #[arg(long, value_name = "CHARS", global = true)]
    write_limit: Option<usize>,

    /// Include actions (JavaScript, launch, URI)
    #[arg(long, global = true)]
    actions: bool,

    /// Include inline images
    #[arg(long, global = true)]
    inline_images: bool,

    /// Follow the structure tree of tagged documents
    #[arg(long, global = true)]
    marked_content: bool,

    /// Collect font names
    #[arg(long, global = true)]
    font_names: bool,

    /// Handle rotated text
    #[arg(long, global = true)]
    detect_angles: bool,

    /// Extract earlier revisions of incrementally updated files
    #[arg(long, global = true)]
    revisions: bool,

    /// Fail on the first error instead of recording a warning
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract content as XHTML, text or JSON
    Extract {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "xhtml")]
        format: OutputFormat,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        /// Save attachments into this directory
        #[arg(long, value_name = "DIR")]
        attachments: Option<PathBuf>,
    },

    /// Extract plain text
    Text {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show document metadata
    #[command(alias = "info")]
    Meta {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print the metadata record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract many files in parallel
    Batch {
        /// Input PDF files
        #[arg(value_name = "FILES", required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Xhtml,
    Text,
    Json,
}

impl OutputFormat {
    fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xhtml => "xhtml",
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OcrMode {
    /// Never run OCR
    None,
    /// OCR only, ignoring the text layer
    Only,
    /// Text layer and OCR
    Both,
    /// OCR when the text layer looks insufficient
    Auto,
}

impl From<OcrMode> for OcrStrategy {
    fn from(mode: OcrMode) -> Self {
        match mode {
            OcrMode::None => OcrStrategy::NoOcr,
            OcrMode::Only => OcrStrategy::OcrOnly,
            OcrMode::Both => OcrStrategy::OcrAndTextExtraction,
            OcrMode::Auto => OcrStrategy::Auto,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum AccessMode {
    Ignore,
    Accessibility,
    Enforce,
}

impl From<AccessMode> for AccessCheckMode {
    fn from(mode: AccessMode) -> Self {
        match mode {
            AccessMode::Ignore => AccessCheckMode::DontCheck,
            AccessMode::Accessibility => AccessCheckMode::AllowForAccessibility,
            AccessMode::Enforce => AccessCheckMode::Enforce,
        }
    }
}

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

impl OptionArgs {
    /// Config file first, then the flags on top.
    fn resolve(&self) -> CliResult<ExtractOptions> {
        let mut options = match &self.config {
            Some(path) => {
                debug!("reading options from {}", path.display());
                ExtractOptions::from_json_file(path)?
            }
            None => ExtractOptions::default(),
        };

        if let Some(password) = &self.password {
            options = options.with_password(password.clone());
        }
        if let Some(mode) = self.ocr {
            options = options.with_ocr_strategy(mode.into());
        }
        if let Some(mode) = self.access {
            options = options.with_access_check(mode.into());
        }
        if let Some(limit) = self.write_limit {
            options = options.with_write_limit(limit);
        }
        if self.actions {
            options = options.with_actions(true);
        }
        if self.inline_images {
            options = options.with_inline_images(true);
        }
        if self.marked_content {
            options = options.with_marked_content(true);
        }
        if self.font_names {
            options = options.with_font_names(true);
        }
        if self.detect_angles {
            options = options.with_angle_detection(true);
        }
        if self.revisions {
            let max = options.max_incremental_updates;
            options = options.with_incremental_updates(true, max);
        }
        if self.strict {
            options = options.strict();
        }
        options.validate()?;
        Ok(options)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = cli.options.resolve().and_then(|options| match cli.command {
        Commands::Extract {
            input,
            output,
            format,
            compact,
            attachments,
        } => cmd_extract(
            options,
            &input,
            output.as_deref(),
            format,
            compact,
            attachments.as_deref(),
        ),
        Commands::Text { input, output } => cmd_text(options, &input, output.as_deref()),
        Commands::Meta { input, json } => cmd_meta(options, &input, json),
        Commands::Batch {
            inputs,
            output,
            format,
        } => cmd_batch(options, &inputs, &output, format),
    });

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn render(extraction: &Extraction, format: OutputFormat, compact: bool) -> CliResult<String> {
    Ok(match format {
        OutputFormat::Xhtml => to_xhtml(&extraction.events, &extraction.metadata)?,
        OutputFormat::Text => extraction.text(),
        OutputFormat::Json => {
            let json_format = if compact {
                JsonFormat::Compact
            } else {
                JsonFormat::Pretty
            };
            to_json(extraction, json_format)?
        }
    })
}

fn write_output(output: Option<&Path>, content: &str) -> CliResult {
    if let Some(path) = output {
        fs::write(path, content)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", content);
    }
    Ok(())
}

fn report_warnings(extraction: &Extraction) {
    if extraction.is_partial() {
        eprintln!(
            "{} {} error(s) recovered, output may be incomplete",
            "Warning:".yellow().bold(),
            extraction.warnings.len()
        );
        for warning in &extraction.warnings {
            eprintln!("  {} {}", "-".dimmed(), warning);
        }
    }
}

/// File name an attachment can safely be written under.
fn attachment_file_name(name: &str, index: usize) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("attachment-{index}"))
}

fn cmd_extract(
    options: ExtractOptions,
    input: &Path,
    output: Option<&Path>,
    format: OutputFormat,
    compact: bool,
    attachments: Option<&Path>,
) -> CliResult {
    let collector = Arc::new(EmbeddedCollector::new());
    let mut builder = Extractor::builder().options(options);
    if attachments.is_some() {
        builder = builder.embedded_extractor(collector.clone());
    }
    let extractor = builder.build()?;

    let extraction = pdfsift::extract_file_with(&extractor, input)?;
    report_warnings(&extraction);
    write_output(output, &render(&extraction, format, compact)?)?;

    if let Some(dir) = attachments {
        fs::create_dir_all(dir)?;
        let saved: Vec<_> = collector
            .take()
            .into_iter()
            .filter(|r| r.resource_type() == Some("ATTACHMENT"))
            .collect();
        for (index, resource) in saved.iter().enumerate() {
            let name = attachment_file_name(resource.name().unwrap_or(""), index);
            fs::write(dir.join(&name), &resource.bytes)?;
            println!("{} {}", "Extracted".green(), name);
        }
        println!("\n{} {} attachments saved", "Done!".green().bold(), saved.len());
    }
    Ok(())
}

fn cmd_text(options: ExtractOptions, input: &Path, output: Option<&Path>) -> CliResult {
    let extractor = Extractor::new().with_options(options)?;
    let extraction = pdfsift::extract_file_with(&extractor, input)?;
    report_warnings(&extraction);
    write_output(output, &extraction.text())
}

fn cmd_meta(options: ExtractOptions, input: &Path, json: bool) -> CliResult {
    let format = pdfsift::detect_format_from_path(input)?;
    let extractor = Extractor::new().with_options(options)?;
    let extraction = pdfsift::extract_file_with(&extractor, input)?;
    let metadata = &extraction.metadata;

    if json {
        println!("{}", serde_json::to_string_pretty(metadata)?);
        return Ok(());
    }

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Format".bold(), format);
    for (label, key) in [
        ("Pages", keys::N_PAGES),
        ("Encrypted", keys::ENCRYPTED),
        ("Title", keys::TITLE),
        ("Author", keys::CREATOR),
        ("Creator", keys::CREATOR_TOOL),
        ("Producer", keys::PRODUCER),
        ("Created", keys::CREATED),
        ("Modified", keys::MODIFIED),
        ("Language", keys::LANGUAGE),
        ("Revisions", keys::INCREMENTAL_UPDATE_COUNT),
    ] {
        if let Some(value) = metadata.get(key) {
            println!("{}: {}", label.bold(), value);
        }
    }

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    let stats = &extraction.stats;
    println!("{}: {}", "Words".bold(), stats.word_count);
    println!("{}: {}", "Characters".bold(), stats.char_count);
    println!("{}: {}", "Unmapped characters".bold(), stats.unmapped_char_count);
    println!("{}: {}", "Embedded resources".bold(), stats.embedded_count);

    println!();
    println!("{}", "All Metadata".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for (key, values) in metadata.iter() {
        println!("{} = {}", key.dimmed(), values.join(", "));
    }
    report_warnings(&extraction);
    Ok(())
}

fn cmd_batch(
    options: ExtractOptions,
    inputs: &[PathBuf],
    output: &Path,
    format: OutputFormat,
) -> CliResult {
    fs::create_dir_all(output)?;
    let extractor = Extractor::new().with_options(options)?;

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message("Extracting...");

    let mut failed = 0usize;
    let mut totals = ExtractionStats::default();
    for chunk in inputs.chunks(batch_chunk_size()) {
        for (path, result) in pdfsift::extract_batch(&extractor, chunk) {
            let rendered = result
                .map_err(Box::<dyn std::error::Error>::from)
                .and_then(|e| {
                    totals.merge(&e.stats);
                    render(&e, format, false)
                });
            match rendered {
                Ok(content) => {
                    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
                    let target = output.join(format!("{stem}.{}", format.extension()));
                    fs::write(&target, content)?;
                }
                Err(e) => {
                    failed += 1;
                    pb.println(format!("{} {}: {}", "Failed".red(), path.display(), e));
                }
            }
            pb.inc(1);
        }
    }
    pb.finish_with_message("Done!");

    println!(
        "\n{} {} of {} files extracted to {}",
        "Done!".green().bold(),
        inputs.len() - failed,
        inputs.len(),
        output.display()
    );
    println!(
        "{} pages, {} words, {} embedded resources",
        totals.page_count, totals.word_count, totals.embedded_count
    );
    Ok(())
}

/// Files per parallel round; the progress bar advances between rounds.
fn batch_chunk_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pdfsift").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("options.json");
        fs::write(
            &config,
            r#"{ "extract_actions": false, "max_recursion_depth": 20, "ocr": { "strategy": "OCR_ONLY" } }"#,
        )
        .unwrap();

        let cli = parse(&[
            "text",
            "in.pdf",
            "--config",
            config.to_str().unwrap(),
            "--actions",
            "--ocr",
            "none",
        ]);
        let options = cli.options.resolve().unwrap();
        assert!(options.extract_actions);
        assert_eq!(options.max_recursion_depth, 20);
        assert_eq!(options.ocr.strategy, OcrStrategy::NoOcr);
    }

    #[test]
    fn test_defaults_without_config() {
        let cli = parse(&["meta", "in.pdf"]);
        assert_eq!(cli.options.resolve().unwrap(), ExtractOptions::default());
    }

    #[test]
    fn test_strict_and_limits() {
        let cli = parse(&["-vv", "extract", "in.pdf", "--strict", "--write-limit", "10", "-f", "json"]);
        assert_eq!(cli.verbose, 2);
        let options = cli.options.resolve().unwrap();
        assert!(!options.catch_intermediate_errors);
        assert_eq!(options.write_limit, Some(10));
        assert!(matches!(cli.command, Commands::Extract { format: OutputFormat::Json, .. }));
    }

    #[test]
    fn test_attachment_names_stay_in_directory() {
        assert_eq!(attachment_file_name("../../etc/passwd", 0), "passwd");
        assert_eq!(attachment_file_name("report.csv", 1), "report.csv");
        assert_eq!(attachment_file_name("", 2), "attachment-2");
    }
}
