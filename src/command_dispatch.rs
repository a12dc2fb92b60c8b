//! Purpose: Hold top-level CLI command dispatch for `mshar`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Command behavior, output envelopes, and exit code semantics stay unchanged.
//! Invariants: Helpers in `main.rs` remain the source of command business logic.

use super::*;

pub(super) fn dispatch_command(
    command: Command,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "mshar", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output(color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Create {
            files,
            pre,
            post,
            output,
            force,
            on_error,
            json,
        } => {
            if json && output.is_none() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("--json requires --output")
                    .with_hint(
                        "Without --output the archive itself is the stdout payload. Write it to a file to get a receipt.",
                    ));
            }
            if force && output.is_none() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("--force requires --output")
                    .with_hint("There is nothing to overwrite when writing to stdout."));
            }

            let prologue = resolve_script_arg(pre.as_deref())?;
            let postscript = resolve_script_arg(post.as_deref())?;
            let request = BundleRequest::new(prologue, postscript, files);
            let outcome = Archiver::new()
                .with_error_policy(on_error.into())
                .build(&request)?;

            let archive_label = output
                .as_deref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "-".to_string());
            for skipped in &outcome.skipped {
                skip_notice(skipped, &archive_label, color_mode);
            }
            if on_error == ErrorPolicyCli::Skip && !outcome.skipped.is_empty() {
                skip_summary_notice(&outcome, &archive_label, color_mode);
            }

            let text = outcome.bundle.render();
            match output {
                Some(path) => {
                    write_archive_file(&path, &text, force)?;
                    emit_create_receipt(&outcome, &path, text.len() as u64, json, color_mode);
                }
                None => write_archive_stdout(&text)?,
            }
            Ok(RunOutcome::ok())
        }
        Command::List { archive, json } => {
            let scanned = scan_archive_file(&archive)?;
            if json {
                emit_json(listing_json(&scanned, &archive), color_mode);
            } else {
                emit_listing_table(&scanned, &archive);
            }
            Ok(RunOutcome::ok())
        }
        Command::Verify { archive, json } => {
            let report = verify_archive_file(&archive)?;
            if json {
                emit_json(report_json(&report), color_mode);
            } else {
                emit_verify_human(&report);
            }
            let exit_code = match report.status {
                VerifyStatus::Ok => 0,
                VerifyStatus::Corrupt => to_exit_code(ErrorKind::Corrupt),
            };
            Ok(RunOutcome::with_code(exit_code))
        }
    }
}
