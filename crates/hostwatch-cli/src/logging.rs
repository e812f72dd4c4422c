//! env_logger setup shared by every subcommand.

use std::fs::File;
use std::io;
use std::path::Path;

use env_logger::{Builder, Env, Target};

/// Install the global logger.
///
/// `RUST_LOG` wins over the default filter (`warn`, or `info` with
/// `--verbose`). Without a log file, output goes to stderr when
/// `stderr_allowed`; otherwise no logger is installed at all.
pub fn init(verbose: bool, log_file: Option<&Path>, stderr_allowed: bool) -> io::Result<()> {
    let target = match log_file {
        Some(path) => Target::Pipe(Box::new(File::create(path)?)),
        None if stderr_allowed => Target::Stderr,
        None => return Ok(()),
    };

    let default_filter = if verbose { "info" } else { "warn" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_filter));
    builder.target(target);

    // A second init keeps the first logger.
    let _ = builder.try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostwatch.log");
        init(true, Some(&path), false).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn unwritable_log_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("hostwatch.log");
        assert!(init(false, Some(&path), true).is_err());
    }

    #[test]
    fn silent_mode_installs_nothing() {
        assert!(init(false, None, false).is_ok());
    }
}
