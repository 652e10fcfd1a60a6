//! Result handlers: writing TEI outputs to disk, or logging for dry runs.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{ClientError, Options, ProcessResult, DEFAULT_EXT};

/// Where the output for `input` lands: `<stem>.grobid.tei.xml`, either next
/// to the input or under `opts.output_dir`.
pub fn output_filename(input: &Path, opts: &Options) -> PathBuf {
    let name = format!("{}.{}", stem_of(input), DEFAULT_EXT);
    match &opts.output_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// True when the output for `input` already exists on disk.
pub fn is_already_processed(input: &Path, opts: &Options) -> bool {
    output_filename(input, opts).exists()
}

/// Write the response body to the output path. Non-200 responses and empty
/// bodies are written to `<stem>_<status>.txt` instead, so a failed file
/// leaves a trace without masquerading as TEI.
pub fn write_result(result: &ProcessResult, opts: &Options) -> Result<(), ClientError> {
    let dst = output_filename(&result.filename, opts);
    if let Some(parent) = dst.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if result.status != 200 || result.body.is_empty() {
        let err_dst = error_filename(&dst, result.status);
        tracing::warn!(
            file = %result.filename.display(),
            status = result.status,
            error_file = %err_dst.display(),
            "writing error output"
        );
        fs::write(&err_dst, &result.body)?;
        return Ok(());
    }
    fs::write(&dst, &result.body)?;
    tracing::debug!(file = %dst.display(), bytes = result.body.len(), "wrote TEI");
    if opts.create_hash_symlinks && !result.sha256.is_empty() {
        create_hash_symlink(&dst, &result.sha256)?;
    }
    Ok(())
}

fn error_filename(dst: &Path, status: i32) -> PathBuf {
    let s = dst.to_string_lossy();
    PathBuf::from(s.replace(&format!(".{DEFAULT_EXT}"), &format!("_{status}.txt")))
}

#[cfg(unix)]
fn create_hash_symlink(dst: &Path, sha256: &str) -> Result<(), ClientError> {
    let link = dst.with_file_name(format!("{sha256}.{DEFAULT_EXT}"));
    if link.exists() {
        return Ok(());
    }
    // Relative target so the link survives moving the output directory.
    let target = dst.file_name().map(PathBuf::from).unwrap_or_else(|| dst.to_path_buf());
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_hash_symlink(_dst: &Path, _sha256: &str) -> Result<(), ClientError> {
    Ok(())
}

/// Dry-run handler: log the outcome, fail only on submissions that never
/// completed.
pub fn log_result(result: &ProcessResult, _opts: &Options) -> Result<(), ClientError> {
    match &result.error_message {
        Some(err) => {
            tracing::warn!(
                file = %result.filename.display(),
                status = result.status,
                elapsed = ?result.elapsed,
                error = %err,
                "processing failed"
            );
            Err(ClientError::Submission(err.clone()))
        }
        None => {
            tracing::info!(
                file = %result.filename.display(),
                status = result.status,
                elapsed = ?result.elapsed,
                bytes = result.body.len(),
                "processed"
            );
            Ok(())
        }
    }
}
