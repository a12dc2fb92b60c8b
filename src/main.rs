//! Purpose: `mshar` CLI entry point and v0.1 command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits archives and JSON on stdout.
//! Invariants: `create` without --output writes archive bytes to stdout and nothing else.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Archives are built and inspected only through `api` operations.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::ffi::OsString;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod color_json;
mod command_dispatch;

use color_json::colorize_json;
use mshar::api::{
    Archiver, BuildOutcome, BundleRequest, Error, ErrorKind, ErrorPolicy, ScannedBundle,
    SkippedFile, VerifyReport, VerifyStatus, read_script_file, scan_archive_file, to_exit_code,
    verify_archive_file,
};
use mshar::notice::{Notice, notice_json};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    init_tracing();
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;

    let result = command_dispatch::dispatch_command(cli.command, color_mode);

    result
        .map_err(add_corrupt_hint)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

// Quiet by default: skip notices carry the stderr contract, tracing is the
// opt-in diagnostic channel (RUST_LOG=debug).
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let replacement = arg.to_str().and_then(|value| match value {
                "---help" => Some("--help"),
                "---version" => Some("--version"),
                _ => None,
            });
            replacement.map(OsString::from).unwrap_or_else(|| arg)
        })
        .collect()
}

#[derive(Parser)]
#[command(
    name = "mshar",
    version,
    about = "Self-extracting POSIX shell archives",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Bundle plain files into a shell script that unpacks itself.
The result runs anywhere a POSIX sh and base64 exist.

Mental model:
  - `create` builds an archive (write)
  - `list` shows what an archive holds (read)
  - `verify` re-checks structure and digests (read)
"#,
    after_help = r#"EXAMPLES
  $ mshar create notes.txt todo.md > bundle.mshar
  $ mshar create -o bundle.mshar --pre setup.sh notes.txt
  $ sh bundle.mshar                  # unpack into the current directory
  $ mshar list bundle.mshar
  $ mshar verify bundle.mshar

LEARN MORE
  $ mshar <command> --help
  https://github.com/mxpsql/mshar-rs"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty && std::env::var_os("NO_COLOR").is_none(),
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, ValueEnum)]
enum ErrorPolicyCli {
    Stop,
    Skip,
}

impl From<ErrorPolicyCli> for ErrorPolicy {
    fn from(value: ErrorPolicyCli) -> Self {
        match value {
            ErrorPolicyCli::Stop => ErrorPolicy::Stop,
            ErrorPolicyCli::Skip => ErrorPolicy::Skip,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Build an archive from files",
        long_about = r#"Build a self-extracting archive from plain files.

The archive is a POSIX sh script: the prologue runs first, then every file is
restored into the current directory, then the postscript runs. Without
--output the script is written to stdout."#,
        after_help = r#"EXAMPLES
  $ mshar create notes.txt todo.md > bundle.mshar
  $ mshar create -o bundle.mshar notes.txt todo.md
  $ mshar create --pre setup.sh --post cleanup.sh -o bundle.mshar data.csv
  $ mshar create --on-error skip -o bundle.mshar *.log

NOTES
  - Entry names are the final path component; duplicates are rejected
  - Inputs are embedded in the order given and restored in that order
  - --on-error skip drops unreadable inputs with a notice on stderr
  - With --output the archive file is marked executable on Unix"#
    )]
    Create {
        #[arg(help = "Files to bundle, in order", value_hint = ValueHint::FilePath)]
        files: Vec<PathBuf>,
        #[arg(
            long = "pre",
            value_name = "PATH",
            help = "Prologue script to run before extraction (UTF-8)",
            value_hint = ValueHint::FilePath
        )]
        pre: Option<PathBuf>,
        #[arg(
            long = "post",
            value_name = "PATH",
            help = "Postscript to run after extraction (UTF-8)",
            value_hint = ValueHint::FilePath
        )]
        post: Option<PathBuf>,
        #[arg(
            short = 'o',
            long = "output",
            value_name = "PATH",
            help = "Write the archive here instead of stdout",
            value_hint = ValueHint::FilePath
        )]
        output: Option<PathBuf>,
        #[arg(long, help = "Overwrite an existing --output file")]
        force: bool,
        #[arg(
            short = 'e',
            long = "on-error",
            default_value = "stop",
            value_enum,
            help = "Unreadable input policy: stop|skip"
        )]
        on_error: ErrorPolicyCli,
        #[arg(long, help = "Emit a JSON receipt (requires --output)")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "List archive entries",
        long_about = r#"List the entries of an archive without executing it.

Prints a human-readable table by default. Use --json for machine-readable
output."#,
        after_help = r#"EXAMPLES
  $ mshar list bundle.mshar
  $ mshar list bundle.mshar --json

NOTES
  - The archive is parsed, never executed.
  - Names, sizes, and digests come from the entry declarations."#
    )]
    List {
        #[arg(help = "Archive path", value_hint = ValueHint::FilePath)]
        archive: PathBuf,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Check archive structure and digests",
        long_about = r#"Re-parse an archive and check its structure, declared sizes, and SHA-256
digests against the embedded payloads."#,
        after_help = r#"EXAMPLES
  $ mshar verify bundle.mshar
  $ mshar verify bundle.mshar --json

NOTES
  - Human-readable output is the default.
  - Use --json for machine-readable output.
  - Exits nonzero when corruption is detected."#
    )]
    Verify {
        #[arg(help = "Archive path", value_hint = ValueHint::FilePath)]
        archive: PathBuf,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(
        about = "Print version info as JSON",
        long_about = r#"Emit version info as JSON (stable, machine-readable)."#,
        after_help = r#"EXAMPLES
  $ mshar version"#
    )]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        long_about = r#"Generate shell completion scripts.

Prints a completion script for the given shell to stdout.
Install the generated file in your shell's completion directory (or source it)
to enable tab completion."#,
        after_help = r#"EXAMPLES
  $ mshar completion bash > ~/.local/share/bash-completion/completions/mshar
  $ source ~/.bashrc
  $ mshar completion zsh > ~/.zfunc/_mshar
  $ autoload -U compinit && compinit
  $ mshar completion fish > ~/.config/fish/completions/mshar.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

const SHA256_PREVIEW_CHARS: usize = 12;

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Permission => err.with_hint(
            "Permission denied. Check file permissions or write the archive somewhere writable.",
        ),
        ErrorKind::Io => err.with_hint("I/O error. Check the path, filesystem, and disk space."),
        _ => err,
    }
}

fn add_corrupt_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Corrupt || err.hint().is_some() {
        return err;
    }
    err.with_hint("Archive appears corrupt. Rebuild it from the original inputs.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_BACKTRACE=1 and share command/context if it persists.",
    )
}

fn resolve_script_arg(path: Option<&Path>) -> Result<String, Error> {
    match path {
        Some(path) => read_script_file(path),
        None => Ok(String::new()),
    }
}

fn write_archive_stdout(text: &str) -> Result<(), Error> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write archive to stdout")
                .with_source(err)
        })
}

fn write_archive_file(path: &Path, text: &str, force: bool) -> Result<(), Error> {
    if !force && path.exists() {
        return Err(Error::new(ErrorKind::AlreadyExists)
            .with_message("output file already exists")
            .with_path(path)
            .with_hint("Re-run with --force to overwrite or choose a different path."));
    }
    std::fs::write(path, text).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write archive")
            .with_path(path)
            .with_source(err)
    })?;
    mark_executable(path)
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to stat archive")
                .with_path(path)
                .with_source(err)
        })?
        .permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to mark archive executable")
            .with_path(path)
            .with_source(err)
    })
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<(), Error> {
    Ok(())
}

fn skip_notice(skipped: &SkippedFile, archive_label: &str, color_mode: ColorMode) {
    let mut details = Map::new();
    details.insert(
        "path".to_string(),
        json!(skipped.path.display().to_string()),
    );
    let notice = Notice {
        kind: "input_skip".to_string(),
        time: notice_time_now().unwrap_or_else(|| "unknown".to_string()),
        cmd: "create".to_string(),
        archive: archive_label.to_string(),
        message: format!(
            "Skipped {}: {}.",
            short_display_path(&skipped.path, None),
            skipped.message
        ),
        details,
    };
    emit_notice(&notice, color_mode);
}

fn skip_summary_notice(outcome: &BuildOutcome, archive_label: &str, color_mode: ColorMode) {
    let mut details = Map::new();
    details.insert(
        "bundled".to_string(),
        json!(outcome.bundle.entries().len()),
    );
    details.insert("skipped".to_string(), json!(outcome.skipped.len()));
    let notice = Notice {
        kind: "skip_summary".to_string(),
        time: notice_time_now().unwrap_or_else(|| "unknown".to_string()),
        cmd: "create".to_string(),
        archive: archive_label.to_string(),
        message: format!(
            "Finished with {} skipped input{}.",
            outcome.skipped.len(),
            if outcome.skipped.len() == 1 { "" } else { "s" }
        ),
        details,
    };
    emit_notice(&notice, color_mode);
}

fn create_receipt_json(outcome: &BuildOutcome, path: &Path, bytes: u64) -> Value {
    let skipped = outcome
        .skipped
        .iter()
        .map(|skip| skip.path.display().to_string())
        .collect::<Vec<_>>();
    json!({
        "created": {
            "archive": path.display().to_string(),
            "entries": outcome.bundle.entries().len(),
            "bytes": bytes,
            "skipped": skipped,
        }
    })
}

fn emit_create_receipt(
    outcome: &BuildOutcome,
    path: &Path,
    bytes: u64,
    json: bool,
    color_mode: ColorMode,
) {
    if json || !io::stdout().is_terminal() {
        emit_json(create_receipt_json(outcome, path, bytes), color_mode);
        return;
    }
    let entries = outcome.bundle.entries().len();
    let noun = if entries == 1 { "entry" } else { "entries" };
    println!(
        "Created {} ({entries} {noun}, {})",
        short_display_path(path, None),
        format_bytes(bytes)
    );
    if !outcome.skipped.is_empty() {
        println!("  skipped: {} input(s), see notices above", outcome.skipped.len());
    }
}

fn listing_json(scanned: &ScannedBundle, path: &Path) -> Value {
    let entries = scanned
        .entries
        .iter()
        .map(|entry| {
            json!({
                "name": entry.name,
                "size": entry.declared_size,
                "sha256": entry.declared_sha256,
            })
        })
        .collect::<Vec<_>>();
    json!({
        "archive": path.display().to_string(),
        "entries": entries,
    })
}

fn emit_listing_table(scanned: &ScannedBundle, path: &Path) {
    let interactive = io::stdout().is_terminal();
    if interactive && scanned.entries.is_empty() {
        println!("No entries in {}", short_display_path(path, None));
        println!();
        println!("  The prologue and postscript still run when the archive executes.");
        return;
    }

    let headers = vec!["NAME", "SIZE", "SHA256"];
    let rows = scanned
        .entries
        .iter()
        .map(|entry| {
            let size = if interactive {
                format_bytes(entry.declared_size)
            } else {
                entry.declared_size.to_string()
            };
            let digest = if interactive {
                entry
                    .declared_sha256
                    .chars()
                    .take(SHA256_PREVIEW_CHARS)
                    .collect::<String>()
            } else {
                entry.declared_sha256.clone()
            };
            vec![entry.name.clone(), size, digest]
        })
        .collect::<Vec<_>>();
    emit_table(&headers, &rows);
}

fn report_json(report: &VerifyReport) -> Value {
    let issues = report
        .issues
        .iter()
        .map(|issue| {
            json!({
                "code": issue.code,
                "message": issue.message,
                "entry": issue.entry,
                "offset": issue.offset,
            })
        })
        .collect::<Vec<_>>();
    json!({
        "archive": report.archive,
        "path": report.path.to_string_lossy(),
        "status": match report.status {
            VerifyStatus::Ok => "ok",
            VerifyStatus::Corrupt => "corrupt",
        },
        "entries_total": report.entries_total,
        "issue_count": report.issue_count,
        "issues": issues,
        "remediation_hints": report.remediation_hints,
    })
}

fn emit_verify_human(report: &VerifyReport) {
    if !io::stdout().is_terminal() {
        let label = report
            .archive
            .clone()
            .unwrap_or_else(|| report.path.to_string_lossy().to_string());
        match report.status {
            VerifyStatus::Ok => {
                println!("OK: {label}");
            }
            VerifyStatus::Corrupt => {
                let issue = report
                    .issues
                    .first()
                    .map(|issue| format!(" issue={}", issue.message))
                    .unwrap_or_default();
                println!("CORRUPT: {label}{issue}");
            }
        }
        return;
    }

    let label = short_display_path(&report.path, None);
    match report.status {
        VerifyStatus::Ok => {
            println!("{label}: ok");
            println!("  entries:   {}", report.entries_total);
            println!("  checked:   structure, sizes, sha256 digests");
        }
        VerifyStatus::Corrupt => {
            println!("{label}: corrupt");
            println!("  entries:   {}", report.entries_total);
            println!("  issues:    {}", report.issue_count);
            for issue in &report.issues {
                match issue.entry.as_deref() {
                    Some(entry) => println!("  - {} ({entry}): {}", issue.code, issue.message),
                    None => println!("  - {}: {}", issue.code, issue.message),
                }
            }
            for hint in &report.remediation_hints {
                println!("  hint:      {hint}");
            }
        }
    }
}

fn emit_version_output(color_mode: ColorMode) {
    if io::stdout().is_terminal() {
        println!("mshar {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(
            json!({
                "name": "mshar",
                "version": env!("CARGO_PKG_VERSION"),
            }),
            color_mode,
        );
    }
}

fn short_display_path(path: &Path, base_dir: Option<&Path>) -> String {
    if let Some(base) = base_dir {
        if let Ok(relative) = path.strip_prefix(base) {
            if !relative.as_os_str().is_empty() {
                return relative.display().to_string();
            }
        }
    }
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

fn display_handoff_path_from_path(path: &Path) -> String {
    let to_dot_relative = |value: &Path| {
        let rendered = value.display().to_string();
        if rendered.starts_with("./") || rendered.starts_with("../") {
            rendered
        } else {
            format!("./{rendered}")
        }
    };

    if path.is_relative() {
        return to_dot_relative(path);
    }
    if let Ok(cwd) = std::env::current_dir()
        && let Ok(relative) = path.strip_prefix(&cwd)
        && !relative.as_os_str().is_empty()
    {
        return to_dot_relative(relative);
    }
    path.display().to_string()
}

fn emit_table(headers: &[&str], rows: &[Vec<String>]) {
    println!("{}", render_table(headers, rows));
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let column_count = headers.len();
    let mut sanitized_rows = Vec::with_capacity(rows.len());
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();

    for row in rows {
        let mut sanitized = Vec::with_capacity(column_count);
        for (idx, width) in widths.iter_mut().enumerate() {
            let value = row.get(idx).map(String::as_str).unwrap_or("");
            let cleaned = sanitize_table_cell(value);
            *width = (*width).max(cleaned.chars().count());
            sanitized.push(cleaned);
        }
        sanitized_rows.push(sanitized);
    }

    let mut lines = Vec::with_capacity(sanitized_rows.len() + 1);
    lines.push(format_table_line(
        &headers
            .iter()
            .map(|header| header.to_string())
            .collect::<Vec<_>>(),
        &widths,
    ));
    for row in sanitized_rows {
        lines.push(format_table_line(&row, &widths));
    }
    lines.join("\n")
}

fn sanitize_table_cell(value: &str) -> String {
    value.replace('\n', "\\n").replace('\r', "\\r")
}

fn format_table_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, width) in widths.iter().enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        let cell = cells.get(idx).map(String::as_str).unwrap_or("");
        line.push_str(cell);
        let cell_len = cell.chars().count();
        if *width > cell_len {
            line.push_str(&" ".repeat(*width - cell_len));
        }
    }
    line
}

fn format_bytes(value: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * 1024 * 1024;
    if value < KIB {
        return value.to_string();
    }
    let (unit, suffix) = if value >= GIB {
        (GIB, "G")
    } else if value >= MIB {
        (MIB, "M")
    } else {
        (KIB, "K")
    };
    if value.is_multiple_of(unit) {
        return format!("{}{}", value / unit, suffix);
    }
    format!("{:.1}{}", (value as f64) / (unit as f64), suffix)
}

fn emit_json(value: serde_json::Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let use_color = color_mode.use_color(is_tty);
    let pretty = is_tty || use_color;
    let json = if pretty {
        if use_color {
            colorize_json(&value, true)
        } else {
            serde_json::to_string_pretty(&value)
                .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
        }
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

fn emit_notice(notice: &Notice, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = colorize_label("notice:", color_mode.use_color(is_tty), AnsiColor::Yellow);
        eprintln!("{label} {}", notice.message);
        return;
    }

    let value = notice_json(notice);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::AlreadyExists => "already exists".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Corrupt => "corrupt archive".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(entry) = err.entry() {
        inner.insert("entry".to_string(), json!(entry));
    }
    if let Some(offset) = err.offset() {
        inner.insert("offset".to_string(), json!(offset));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            display_handoff_path_from_path(path)
        ));
    }
    if let Some(entry) = err.entry() {
        lines.push(format!(
            "{} {entry}",
            colorize_label("entry:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(offset) = err.offset() {
        lines.push(format!(
            "{} {offset}",
            colorize_label("offset:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let missing_required = rendered.contains("required arguments were not provided")
        || rendered.contains("required argument was not provided");
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `mshar --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "mshar") else {
        return "Try `mshar --help`.".to_string();
    };

    let mut parts = Vec::new();
    for token in tokens.iter().skip(pos + 1) {
        if token.starts_with('-') || token.starts_with('<') || token.starts_with('[') {
            break;
        }
        parts.push(*token);
    }

    if parts.is_empty() {
        return "Try `mshar --help`.".to_string();
    }

    let required_tokens: Vec<&str> = tokens
        .iter()
        .skip(pos + 1 + parts.len())
        .copied()
        .filter(|token| token.starts_with('<') && token.ends_with('>'))
        .collect();
    if missing_required
        && (parts.as_slice() == ["list"] || parts.as_slice() == ["verify"])
        && required_tokens.iter().any(|token| token.contains("ARCHIVE"))
    {
        return format!(
            "Provide an archive path, for example: `mshar {} bundle.mshar`.",
            parts[0]
        );
    }

    format!("Try `mshar {} --help`.", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::{
        Error, ErrorKind, create_receipt_json, error_json, error_text, format_bytes,
        listing_json, render_table, report_json, short_display_path, write_archive_file,
    };
    use mshar::api::{
        Bundle, BuildOutcome, FileEntry, ScannedBundle, ScannedEntry, SkippedFile, VerifyReport,
    };
    use std::path::{Path, PathBuf};

    #[test]
    fn format_bytes_boundaries() {
        assert_eq!(format_bytes(0), "0");
        assert_eq!(format_bytes(1023), "1023");
        assert_eq!(format_bytes(1024), "1K");
        assert_eq!(format_bytes(1536), "1.5K");
        assert_eq!(format_bytes(1024 * 1024), "1M");
    }

    #[test]
    fn error_text_respects_color_flag() {
        let err = Error::new(ErrorKind::Usage).with_message("bad input");
        let colored = error_text(&err, true);
        let plain = error_text(&err, false);
        assert!(colored.contains("\u{1b}[31merror:\u{1b}[0m"));
        assert!(plain.contains("error:"));
        assert!(!plain.contains("\u{1b}["));
    }

    #[test]
    fn error_json_carries_entry_and_offset() {
        let err = Error::new(ErrorKind::Corrupt)
            .with_message("digest mismatch")
            .with_entry("notes.txt")
            .with_offset(120);
        let value = error_json(&err);
        let inner = value.get("error").expect("error object");
        assert_eq!(inner.get("kind").and_then(|v| v.as_str()), Some("Corrupt"));
        assert_eq!(
            inner.get("entry").and_then(|v| v.as_str()),
            Some("notes.txt")
        );
        assert_eq!(inner.get("offset").and_then(|v| v.as_u64()), Some(120));
    }

    #[test]
    fn render_table_aligns_and_sanitizes_cells() {
        let output = render_table(
            &["NAME", "DETAIL"],
            &[
                vec!["a".to_string(), "line1\nline2".to_string()],
                vec!["long-name".to_string(), "ok".to_string()],
            ],
        );
        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[0].contains("  DETAIL"));
        assert!(lines[1].contains("line1\\nline2"));
        assert!(lines[2].contains("long-name"));
        assert!(!lines[1].ends_with(' '));
    }

    #[test]
    fn short_display_path_prefers_relative_to_base_dir() {
        let path = PathBuf::from("/tmp/archives/bundle.mshar");
        let base = Path::new("/tmp/archives");
        assert_eq!(
            short_display_path(path.as_path(), Some(base)),
            "bundle.mshar".to_string()
        );
    }

    #[test]
    fn short_display_path_falls_back_to_basename() {
        let path = PathBuf::from("/tmp/archives/bundle.mshar");
        let other_base = Path::new("/different");
        assert_eq!(
            short_display_path(path.as_path(), Some(other_base)),
            "bundle.mshar".to_string()
        );
        assert_eq!(
            short_display_path(path.as_path(), None),
            "bundle.mshar".to_string()
        );
    }

    #[test]
    fn create_receipt_counts_entries_and_skips() {
        let entry = FileEntry::new("a.txt", b"alpha".to_vec()).expect("entry");
        let bundle = Bundle::new("", vec![entry], "").expect("bundle");
        let outcome = BuildOutcome {
            bundle,
            skipped: vec![SkippedFile {
                path: PathBuf::from("gone.txt"),
                message: "file not found".to_string(),
            }],
        };

        let value = create_receipt_json(&outcome, Path::new("out.mshar"), 421);
        let created = value.get("created").expect("created object");
        assert_eq!(
            created.get("archive").and_then(|v| v.as_str()),
            Some("out.mshar")
        );
        assert_eq!(created.get("entries").and_then(|v| v.as_u64()), Some(1));
        assert_eq!(created.get("bytes").and_then(|v| v.as_u64()), Some(421));
        assert_eq!(
            created
                .get("skipped")
                .and_then(|v| v.as_array())
                .map(|v| v.len()),
            Some(1)
        );
    }

    #[test]
    fn listing_json_uses_declared_metadata() {
        let scanned = ScannedBundle {
            prologue: String::new(),
            postscript: String::new(),
            entries: vec![ScannedEntry {
                name: "a.txt".to_string(),
                declared_size: 5,
                declared_sha256: "ab".repeat(32),
                content: Some(b"alpha".to_vec()),
                offset: 42,
            }],
            declared_entries: 1,
            issues: Vec::new(),
        };

        let value = listing_json(&scanned, Path::new("bundle.mshar"));
        assert_eq!(
            value.get("archive").and_then(|v| v.as_str()),
            Some("bundle.mshar")
        );
        let entries = value
            .get("entries")
            .and_then(|v| v.as_array())
            .expect("entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].get("name").and_then(|v| v.as_str()), Some("a.txt"));
        assert_eq!(entries[0].get("size").and_then(|v| v.as_u64()), Some(5));
        assert_eq!(
            entries[0]
                .get("sha256")
                .and_then(|v| v.as_str())
                .map(str::len),
            Some(64)
        );
    }

    #[test]
    fn verify_report_json_shape() {
        let report = VerifyReport::ok(PathBuf::from("x.mshar")).with_archive("x.mshar");
        let value = report_json(&report);
        assert_eq!(value.get("status").and_then(|v| v.as_str()), Some("ok"));
        assert_eq!(value.get("issue_count").and_then(|v| v.as_u64()), Some(0));
        assert_eq!(
            value.get("archive").and_then(|v| v.as_str()),
            Some("x.mshar")
        );
    }

    #[test]
    fn write_archive_file_refuses_overwrite_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out.mshar");
        std::fs::write(&path, "old").expect("seed");

        let err = write_archive_file(&path, "new", false).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "old");

        write_archive_file(&path, "new", true).expect("force overwrite");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "new");
    }

    #[cfg(unix)]
    #[test]
    fn written_archive_is_marked_executable() {
        use std::os::unix::fs::PermissionsExt;
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out.mshar");
        write_archive_file(&path, "#!/bin/sh\nexit 0\n", false).expect("write");
        let mode = std::fs::metadata(&path)
            .expect("metadata")
            .permissions()
            .mode();
        assert!(mode & 0o111 != 0);
    }
}
