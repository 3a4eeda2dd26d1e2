pub mod backups;
pub mod check;
pub mod init;
pub mod rollback;
pub mod update;

use colored::Colorize;

/// `[OK] message` on stdout, set apart by blank lines.
pub(crate) fn ok(message: &str) {
    println!("\n{} {message}", "[OK]".green().bold());
}

pub(crate) fn error(message: &str) {
    println!("\n{} {message}", "[ERROR]".red().bold());
}

pub(crate) fn cancelled(message: &str) {
    println!("\n{} {message}", "[CANCELLED]".yellow().bold());
}

pub(crate) fn detail(message: &str) {
    println!("  {message}");
}

pub(crate) fn warning(message: &str) {
    println!("  {} {message}", "!".yellow().bold());
}

/// `outer: inner: ...` for an error chain, skipping causes whose text the
/// message before them already quotes.
pub(crate) fn describe(err: &anyhow::Error) -> String {
    let mut message = String::new();
    for cause in err.chain() {
        let text = cause.to_string();
        if message.contains(&text) {
            continue;
        }
        if !message.is_empty() {
            message.push_str(": ");
        }
        message.push_str(&text);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    use upkeep_core::CoreError;

    #[test]
    fn quoted_causes_are_not_repeated() {
        let err = anyhow::Error::new(CoreError::Io {
            path: PathBuf::from("upkeep.yaml"),
            source: io::Error::new(io::ErrorKind::Other, "disk unreadable"),
        })
        .context("failed to load configuration upkeep.yaml");

        assert_eq!(
            describe(&err),
            "failed to load configuration upkeep.yaml: I/O error at upkeep.yaml: disk unreadable"
        );
    }

    #[test]
    fn unquoted_causes_are_appended() {
        let err = anyhow::Error::new(io::Error::new(io::ErrorKind::NotFound, "no such file"))
            .context("could not read build log");
        assert_eq!(describe(&err), "could not read build log: no such file");
    }
}
