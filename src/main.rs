//! CLI entry point for `mbox2pdf`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use mbox2pdf::config::Config;
use mbox2pdf::convert::{self, ConvertOptions};
use mbox2pdf::model::summary::{format_duration, RunSummary};

#[derive(Parser)]
#[command(
    name = "mbox2pdf",
    version,
    about = "Convert an mbox email archive into one PDF per message"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input mbox file
    #[arg(value_name = "MBOX")]
    input: Option<PathBuf>,

    /// Output directory for the generated PDFs
    #[arg(value_name = "OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// Skip extracting attachments
    #[arg(long)]
    no_attachments: bool,

    /// Custom directory for attachments (default: OUTPUT_DIR/attachments)
    #[arg(long, value_name = "DIR")]
    attachments_dir: Option<PathBuf>,

    /// Show only the progress bar and summary on the console
    #[arg(short, long)]
    quiet: bool,

    /// Verbose console logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the final summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            cmd_completions(shell)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Manpage) => {
            cmd_manpage()?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            let (Some(input), Some(output)) = (cli.input.clone(), cli.output.clone()) else {
                anyhow::bail!("missing required arguments: <MBOX> <OUTPUT_DIR> (see --help)");
            };
            cmd_convert(&cli, input, output)
        }
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mbox2pdf", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Run the full conversion and print the summary.
fn cmd_convert(cli: &Cli, input: PathBuf, output: PathBuf) -> anyhow::Result<ExitCode> {
    if !input.is_file() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    // The log file lives in the output directory, so it must exist
    // before logging starts.
    std::fs::create_dir_all(&output)?;

    let config = mbox2pdf::config::load_config();
    setup_logging(&output, &config, cli.verbose, cli.quiet);

    let attachments_dir = cli
        .attachments_dir
        .clone()
        .unwrap_or_else(|| output.join(&config.output.attachments_subdir));

    let opts = ConvertOptions {
        input,
        output_dir: output,
        extract_attachments: !cli.no_attachments,
        attachments_dir,
    };

    let pb = conversion_bar();
    let summary = convert::convert_mbox(
        &opts,
        Some(&|current, total| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;
    pb.finish_and_clear();

    if cli.json {
        print_summary_json(&summary)?;
    } else {
        print_summary_table(&summary);
    }

    Ok(if summary.meets_threshold() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Set up tracing: full detail to `conversion.log`, errors to stderr.
///
/// `-v` raises the console level; `--quiet` drops console logging
/// entirely so only the progress bar and summary are shown.
fn setup_logging(output_dir: &Path, config: &Config, verbose: u8, quiet: bool) {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let level = match verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never(output_dir, convert::LOG_FILE_NAME);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(file_appender);

    let registry = tracing_subscriber::registry().with(env_filter).with(file_layer);

    if quiet {
        registry.init();
    } else {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        // Without -v the console only surfaces errors
        let stderr_layer = if verbose == 0 {
            stderr_layer.with_filter(LevelFilter::ERROR).boxed()
        } else {
            stderr_layer.boxed()
        };
        registry.with(stderr_layer).init();
    }
}

/// Progress bar over the message count, redrawn at most twice a second.
fn conversion_bar() -> ProgressBar {
    let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(2));
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} Converting emails [{bar:30.cyan/blue}] {pos}/{len} {percent}% | Elapsed: {elapsed_precise} | ETA: {eta}",
            )
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb
}

/// Print the summary in a human-readable table.
fn print_summary_table(s: &RunSummary) {
    use humansize::{format_size, BINARY};

    println!();
    println!("Conversion summary:");
    println!(
        "  {:<24} {} ({})",
        "Archive",
        s.input.display(),
        format_size(s.archive_size, BINARY)
    );
    println!("  {:<24} {}", "Messages processed", s.total);
    println!(
        "  {:<24} {} ({:.1}%)",
        "Converted",
        s.succeeded,
        s.success_rate()
    );
    println!("  {:<24} {}", "Failed", s.failed);
    println!(
        "  {:<24} {} ({:.2}s per message)",
        "Elapsed",
        format_duration(s.elapsed),
        s.seconds_per_message()
    );

    if let Some(dir) = &s.attachments_dir {
        println!(
            "  {:<24} {} (from {} found)",
            "Attachments extracted", s.attachments_saved, s.attachments_found
        );
        println!("  {:<24} {}", "Attachments directory", dir.display());
    }

    println!("  {:<24} {}", "Output directory", s.output_dir.display());
    println!("  {:<24} {}", "Detailed log", s.log_path.display());
    println!();
}

/// Print the summary as JSON.
fn print_summary_json(s: &RunSummary) -> anyhow::Result<()> {
    let attachments = s.attachments_dir.as_ref().map(|dir| {
        serde_json::json!({
            "extracted": s.attachments_saved,
            "found": s.attachments_found,
            "directory": dir.to_string_lossy(),
        })
    });

    let output = serde_json::json!({
        "archive": s.input.to_string_lossy(),
        "archive_size": s.archive_size,
        "processed": s.total,
        "succeeded": s.succeeded,
        "failed": s.failed,
        "success_rate": s.success_rate(),
        "elapsed_ms": s.elapsed.as_millis() as u64,
        "seconds_per_message": s.seconds_per_message(),
        "attachments": attachments,
        "output_dir": s.output_dir.to_string_lossy(),
        "log_file": s.log_path.to_string_lossy(),
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
