mod config;
mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use config::Config;
use folio::document::plain_text;
use renderer::{BuildError, ParseFailure, Site};

const SUBCOMMANDS: &[&str] = &["build", "check", "inspect", "test", "help"];

#[derive(Parser)]
#[command(name = "folio", version, about = "Documentation site renderer")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// More log output: -v for progress, -vv for per-document detail
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a source tree into an output directory
    Build(BuildArgs),

    /// Parse and resolve a source tree without writing anything
    Check(CheckArgs),

    /// Parse a single file and show what the parser sees
    Inspect(InspectArgs),

    /// Run .test.md fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Source root containing .md files
    source: PathBuf,

    /// Output root for the rendered site
    output: PathBuf,

    /// Worker threads (0 = one per CPU)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Omit the table of contents
    #[arg(long)]
    no_toc: bool,

    /// Do not copy non-markup files
    #[arg(long)]
    no_assets: bool,

    /// Remove the output directory first
    #[arg(long)]
    clean: bool,

    /// Config file (default: folio.toml in the source root)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Source root containing .md files
    source: PathBuf,

    /// Worker threads (0 = one per CPU)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Config file (default: folio.toml in the source root)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(clap::Args)]
struct InspectArgs {
    /// Markup file to parse
    file: PathBuf,

    /// Dump the parsed document tree
    #[arg(long)]
    ast: bool,

    /// List heading anchors
    #[arg(long)]
    anchors: bool,

    /// Write the document back out as normalized markup
    #[arg(long)]
    markup: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// A .test.md fixture, or a directory searched for them
    path: String,

    /// Run only fixtures in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let args = with_default_subcommand(std::env::args().collect());
    let cli = Cli::parse_from(&args);
    init_tracing(cli.verbose);

    let color_choice = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    match cli.command {
        Command::Build(build_args) => do_build(build_args, color_choice),
        Command::Check(check_args) => do_check(check_args, color_choice),
        Command::Inspect(inspect_args) => do_inspect(inspect_args, color_choice),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

/// `folio <source> <output>` is shorthand for `folio build <source> <output>`.
/// Global flags take no value, so the first argument after them decides:
/// anything but a subcommand or help/version flag gets `build` inserted
/// before it.
fn with_default_subcommand(mut args: Vec<String>) -> Vec<String> {
    let Some(pos) = args.iter().skip(1).position(|a| !is_global_flag(a)) else {
        return args;
    };
    let pos = pos + 1;
    let arg = args[pos].as_str();
    let known = SUBCOMMANDS.contains(&arg) || matches!(arg, "-h" | "--help" | "-V" | "--version");
    if !known {
        args.insert(pos, "build".to_string());
    }
    args
}

fn is_global_flag(arg: &str) -> bool {
    match arg {
        "--no-color" | "--verbose" => true,
        _ => arg.len() > 1 && arg.starts_with('-') && arg[1..].chars().all(|c| c == 'v'),
    }
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "folio=warn,renderer=warn",
        1 => "folio=info,renderer=info",
        _ => "folio=debug,renderer=debug",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(source: &Path, explicit: Option<&Path>) -> Config {
    match Config::discover(source, explicit) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn load_site(source: &Path, exclude: Option<&Path>) -> Site {
    match Site::load(source, exclude) {
        Ok(site) => site,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn do_build(args: BuildArgs, color_choice: ColorChoice) {
    let config = load_config(&args.source, args.config.as_deref());
    let mut options = match config.build_options() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    if let Some(jobs) = args.jobs {
        options.jobs = jobs;
    }
    options.page.toc &= !args.no_toc;
    options.copy_assets &= !args.no_assets;
    options.clean = args.clean;
    tracing::debug!(?options, "build options");

    let site = load_site(&args.source, Some(&args.output));
    let writer = StandardStream::stderr(color_choice);

    match site.build(&args.output, &options) {
        Ok(report) => {
            emit_parse_failures(&writer, site.files(), &report.parse_failures);
            if !report.is_success() {
                eprintln!(
                    "error: {} document(s) failed to parse; wrote the other {} page(s)",
                    report.parse_failures.len(),
                    report.pages_written
                );
                process::exit(1);
            }
            eprintln!(
                "ok: wrote {} page(s) and {} asset(s) to {}",
                report.pages_written,
                report.assets_copied,
                args.output.display()
            );
        }
        Err(err) => {
            report_build_error(&writer, site.files(), &err);
            process::exit(1);
        }
    }
}

fn do_check(args: CheckArgs, color_choice: ColorChoice) {
    let config = load_config(&args.source, args.config.as_deref());
    let jobs = args.jobs.unwrap_or(config.build.jobs);
    let site = load_site(&args.source, None);
    let writer = StandardStream::stderr(color_choice);

    match site.check(jobs) {
        Ok(report) => {
            emit_parse_failures(&writer, site.files(), &report.parse_failures);
            if !report.is_success() {
                eprintln!(
                    "error: {} document(s) failed to parse",
                    report.parse_failures.len()
                );
                process::exit(1);
            }
            eprintln!(
                "ok: {} document(s), {} cross-reference(s) resolved",
                report.documents, report.references
            );
        }
        Err(err) => {
            report_build_error(&writer, site.files(), &err);
            process::exit(1);
        }
    }
}

fn do_inspect(args: InspectArgs, color_choice: ColorChoice) {
    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file.display(), e);
            process::exit(1);
        }
    };
    let name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.file.display().to_string());

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.display().to_string(), source.clone());

    let document = match folio::Parser::new(name.as_str(), &source, file_id).parse() {
        Ok(document) => document,
        Err(errors) => {
            let writer = StandardStream::stderr(color_choice);
            let diagnostics: Vec<Diagnostic<usize>> =
                errors.iter().map(|e| e.to_diagnostic()).collect();
            emit(&writer, &files, &diagnostics);
            process::exit(1);
        }
    };

    if args.ast {
        println!("{:#?}", document);
        return;
    }

    if args.markup {
        print!("{}", document);
        return;
    }

    if args.anchors {
        for (level, anchor, content) in document.headings() {
            let pad = "  ".repeat(level as usize - 1);
            let prefix = "#".repeat(level as usize);
            let explicit = if anchor.explicit { " (explicit)" } else { "" };
            println!(
                "{}{} {}  {}{}",
                pad,
                prefix,
                anchor.id,
                plain_text(content),
                explicit
            );
        }
        return;
    }

    println!("{}: \"{}\"", args.file.display(), document.title);
    println!("  {} block(s), {} anchor(s)", document.blocks.len(), document.anchors.len());
    println!("  {} cross-reference(s)", document.references.len());
    for reference in &document.references {
        println!(
            "    {}:{}  {}",
            reference.location.line, reference.location.column, reference.token
        );
    }
}

fn report_build_error(writer: &StandardStream, files: &SimpleFiles<String, String>, err: &BuildError) {
    match err {
        BuildError::Unresolved {
            references,
            parse_failures,
        } => {
            emit_parse_failures(writer, files, parse_failures);
            let diagnostics: Vec<Diagnostic<usize>> =
                references.iter().map(|r| r.to_diagnostic()).collect();
            emit(writer, files, &diagnostics);
            eprintln!(
                "error: {} unresolved reference(s); nothing was written",
                references.len()
            );
        }
        other => eprintln!("error: {}", other),
    }
}

fn emit_parse_failures(
    writer: &StandardStream,
    files: &SimpleFiles<String, String>,
    failures: &[ParseFailure],
) {
    let diagnostics: Vec<Diagnostic<usize>> = failures
        .iter()
        .flat_map(|f| f.errors.iter().map(|e| e.to_diagnostic()))
        .collect();
    emit(writer, files, &diagnostics);
}

fn emit(writer: &StandardStream, files: &SimpleFiles<String, String>, diagnostics: &[Diagnostic<usize>]) {
    let config = term::Config::default();
    for diagnostic in diagnostics {
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, diagnostic);
    }
}
