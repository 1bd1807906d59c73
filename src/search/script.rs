//! Operations backed by external programs.
//!
//! Each operation runs its program once per call and reads the sample or
//! result from stdout, byte for byte. Samples are passed as command line
//! arguments:
//!
//! | Operation | Invocation                      |
//! |-----------|---------------------------------|
//! | random    | `random`                        |
//! | history   | `history`                       |
//! | mutate    | `mutate <sample1> <sample2>`    |
//! | test      | `test <sample>`                 |
//! | store     | `store <sample> <result>`       |
//!
//! A program that cannot be started or exits unsuccessfully fails the
//! operation, which aborts the run.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;

use log::{debug, trace};

use crate::schema::{Evaluation, Sample, ScriptPaths};

use super::ops::{OpResult, OperationError, OperationKind, Operations};

/// Search operations implemented as external programs.
#[derive(Debug, Clone)]
pub struct ScriptOperations {
    paths: ScriptPaths,
}

impl ScriptOperations {
    pub fn new(paths: ScriptPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ScriptPaths {
        &self.paths
    }

    pub fn random(&self) -> OpResult<Sample> {
        run_program(OperationKind::Random, &self.paths.random, &[]).map(Sample::from)
    }

    pub fn history(&self) -> OpResult<Sample> {
        run_program(OperationKind::History, &self.paths.history, &[]).map(Sample::from)
    }

    pub fn mutate(&self, s1: &Sample, s2: &Sample) -> OpResult<Sample> {
        run_program(
            OperationKind::Mutate,
            &self.paths.mutate,
            &[s1.as_bytes(), s2.as_bytes()],
        )
        .map(Sample::from)
    }

    pub fn test(&self, sample: &Sample) -> OpResult<Evaluation> {
        run_program(OperationKind::Test, &self.paths.test, &[sample.as_bytes()])
            .map(Evaluation::from)
    }

    pub fn store(&self, sample: &Sample, evaluation: &Evaluation) -> OpResult<()> {
        run_program(
            OperationKind::Store,
            &self.paths.store,
            &[sample.as_bytes(), evaluation.as_bytes()],
        )
        .map(|_| ())
    }

    /// Bind all five operations for the scheduler.
    pub fn into_operations(self) -> Operations {
        let scripts = Arc::new(self);
        let (random, history, mutate, test, store) = (
            Arc::clone(&scripts),
            Arc::clone(&scripts),
            Arc::clone(&scripts),
            Arc::clone(&scripts),
            scripts,
        );

        Operations::new()
            .with_random(move || random.random())
            .with_history(move || history.history())
            .with_mutate(move |s1, s2| mutate.mutate(s1, s2))
            .with_test(move |sample| test.test(sample))
            .with_store(move |sample, evaluation| store.store(sample, evaluation))
    }
}

/// Run `program` with `args` and return its stdout.
fn run_program(kind: OperationKind, program: &Path, args: &[&[u8]]) -> OpResult<Vec<u8>> {
    let mut command = Command::new(program);
    command
        .args(args.iter().map(|arg| os_arg(arg)))
        .stdin(Stdio::null());

    trace!("Running {kind} operation `{}`", program.display());
    let output = command
        .output()
        .map_err(|source| OperationError::Spawn {
            kind,
            program: program.display().to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(OperationError::Failed {
            kind,
            program: program.display().to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    debug!(
        "{kind} operation `{}` returned {} bytes",
        program.display(),
        output.stdout.len()
    );
    Ok(output.stdout)
}

#[cfg(unix)]
fn os_arg(bytes: &[u8]) -> OsString {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::OsStr::from_bytes(bytes).to_os_string()
}

#[cfg(not(unix))]
fn os_arg(bytes: &[u8]) -> OsString {
    String::from_utf8_lossy(bytes).into_owned().into()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::schema::RunConfig;
    use crate::search::{CancelToken, SearchError, run_search};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Writing an executable while another test thread forks can make exec
    // fail with ETXTBSY, so script tests run one at a time.
    static SCRIPTS: Mutex<()> = Mutex::new(());

    fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// A complete set of scripts keeping their store in `store.log`.
    fn script_set(dir: &TempDir) -> ScriptPaths {
        let log = dir.path().join("store.log");
        ScriptPaths {
            random: write_script(dir, "random.sh", "printf 'rnd'"),
            history: write_script(
                dir,
                "history.sh",
                &format!(
                    "if [ -s '{0}' ]; then head -n 1 '{0}' | cut -d= -f1 | tr -d '\\n'; fi",
                    log.display()
                ),
            ),
            mutate: write_script(dir, "mutate.sh", "printf '%s+%s' \"$1\" \"$2\""),
            test: write_script(dir, "test.sh", "printf 'len%s' \"${#1}\""),
            store: write_script(
                dir,
                "store.sh",
                &format!("printf '%s=%s\\n' \"$1\" \"$2\" >> '{}'", log.display()),
            ),
        }
    }

    #[test]
    fn test_each_operation() {
        let _guard = SCRIPTS.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let scripts = ScriptOperations::new(script_set(&dir));

        assert_eq!(scripts.random().unwrap(), Sample::from("rnd"));
        // Nothing stored yet: history is empty, which is not an error.
        assert!(scripts.history().unwrap().is_empty());

        let child = scripts
            .mutate(&Sample::from("a b"), &Sample::from("c"))
            .unwrap();
        assert_eq!(child, Sample::from("a b+c"));
        assert_eq!(scripts.test(&child).unwrap(), Evaluation::from("len5"));

        scripts.store(&child, &Evaluation::from("len5")).unwrap();
        let log = fs::read_to_string(dir.path().join("store.log")).unwrap();
        assert_eq!(log, "a b+c=len5\n");
        assert_eq!(scripts.history().unwrap(), Sample::from("a b+c"));
    }

    #[test]
    fn test_non_zero_exit_is_error() {
        let _guard = SCRIPTS.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let mut paths = script_set(&dir);
        paths.test = write_script(&dir, "fail.sh", "echo 'bad sample' >&2\nexit 3");

        let err = ScriptOperations::new(paths)
            .test(&Sample::from("x"))
            .unwrap_err();
        match err {
            OperationError::Failed {
                kind, ref stderr, ..
            } => {
                assert_eq!(kind, OperationKind::Test);
                assert_eq!(stderr, "bad sample");
            }
            other => panic!("expected exit failure, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let _guard = SCRIPTS.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let paths = ScriptPaths {
            random: dir.path().join("does-not-exist"),
            ..script_set(&dir)
        };

        let err = ScriptOperations::new(paths).random().unwrap_err();
        assert!(matches!(
            err,
            OperationError::Spawn {
                kind: OperationKind::Random,
                ..
            }
        ));
    }

    #[test]
    fn test_script_driven_search() {
        let _guard = SCRIPTS.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let ops = ScriptOperations::new(script_set(&dir)).into_operations();
        let config = RunConfig {
            iterations: 3,
            random_per_iter: 1,
            mutated_per_iter: 1,
            parallelism: 1,
            show_progress: false,
        };

        let summary = run_search(config, &ops, &CancelToken::new()).unwrap();
        assert_eq!(summary.submitted, 3);

        let log = fs::read_to_string(dir.path().join("store.log")).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        // First iteration has no history, so both samples are random.
        assert_eq!(&lines[..2], &["rnd=len3", "rnd=len3"]);
        // Later iterations mutate the first stored sample with itself.
        assert_eq!(lines[2], "rnd+rnd=len7");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_failing_script_aborts_search() {
        let _guard = SCRIPTS.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let mut paths = script_set(&dir);
        paths.store = write_script(&dir, "store-fail.sh", "exit 1");
        let ops = ScriptOperations::new(paths).into_operations();
        let config = RunConfig {
            iterations: 10,
            random_per_iter: 2,
            mutated_per_iter: 0,
            parallelism: 2,
            show_progress: false,
        };

        let result = run_search(config, &ops, &CancelToken::new());
        match result {
            Err(SearchError::Operation(err)) => assert_eq!(err.kind(), OperationKind::Store),
            other => panic!("expected store failure, got {other:?}"),
        }
    }
}
