use std::borrow::Cow;
use std::ffi::OsStr;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command as ProcessCommand, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use crate::ExitCode;
use crate::error::ShellError;
use crate::parser::Command;
use crate::session::Session;
use crate::stream::{BufferHandle, StageInput, StageOutput};

/// An external pipeline stage that has been spawned but not yet waited on.
#[derive(Debug)]
pub struct SpawnedStage {
    child: Child,
    /// Present when the stage's output is collected into an in-memory buffer.
    capture: Option<CaptureDrain>,
}

/// Background reader keeping a captured child's stdout pipe empty.
///
/// The child writes as fast as it likes while other stages are still
/// running; without the drain its stdout pipe would fill and stall the
/// whole pipeline. The shared buffer is single-threaded (`Rc`), so the
/// thread collects into a plain vector and the bytes are merged on the
/// interpreter thread at wait time.
#[derive(Debug)]
struct CaptureDrain {
    handle: BufferHandle,
    thread: JoinHandle<io::Result<Vec<u8>>>,
}

/// Resolves the program behind `command` and spawns it with the given stream
/// bindings.
///
/// The child inherits the interpreter's environment as-is; shell-local
/// variables are never exported.
pub fn spawn_stage(
    command: &Command,
    input: StageInput,
    output: StageOutput,
    session: &Session,
) -> Result<SpawnedStage, ShellError> {
    let program = resolve_program(command.name(), session)?;

    let mut cmd = ProcessCommand::new(&program);
    cmd.args(command.args())
        .stdin(input.into_stdio())
        .current_dir(&session.current_dir);

    let capture_handle = match output {
        StageOutput::Buffer(handle) => {
            cmd.stdout(Stdio::piped());
            Some(handle)
        }
        other => {
            cmd.stdout(other.into_stdio());
            None
        }
    };

    let mut child = cmd.spawn().map_err(|source| ShellError::Spawn {
        program: program.display().to_string(),
        source,
    })?;

    let capture = capture_handle.and_then(|handle| {
        child.stdout.take().map(|stdout| CaptureDrain {
            handle,
            thread: collect_stdout(stdout),
        })
    });

    Ok(SpawnedStage { child, capture })
}

fn collect_stdout(mut stdout: ChildStdout) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut collected = Vec::new();
        stdout.read_to_end(&mut collected)?;
        Ok(collected)
    })
}

/// Waits for the child and reports its exit status.
///
/// A captured stage's drain is joined here so the collected bytes land in
/// the shared buffer before the status is returned.
pub fn wait_stage(stage: SpawnedStage) -> io::Result<ExitCode> {
    let SpawnedStage { mut child, capture } = stage;
    let status = child.wait()?;
    if let Some(CaptureDrain { handle, thread }) = capture {
        let collected = thread
            .join()
            .map_err(|_| io::Error::other("stdout drain thread panicked"))??;
        handle.borrow_mut().extend_from_slice(&collected);
    }
    Ok(child_status(status))
}

fn resolve_program(name: &str, session: &Session) -> Result<PathBuf, ShellError> {
    let search_paths = session.lookup_var("PATH");
    match find_command_path(OsStr::new(&search_paths), Path::new(name)) {
        Some(path) => Ok(path.into_owned()),
        None => Err(ShellError::CommandNotFound {
            name: name.to_string(),
        }),
    }
}

/// Exit code for a finished child: its own code when it has one, otherwise
/// the signal mapping.
fn child_status(exit_status: ExitStatus) -> ExitCode {
    match exit_status.code() {
        Some(code) => code,
        None => terminated_by_signal(exit_status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;
    match ExitStatusExt::signal(&exit_status) {
        Some(signal) => 128 + signal,
        None => 1,
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> ExitCode {
    1
}

/// Resolve a command path the way a typical shell would.
///
/// - Absolute path: returned if it exists.
/// - Relative with multiple components (e.g. `bin/sh`): returned if it exists.
/// - `./foo` on Unix, or any path on other platforms: checked against the
///   current directory first.
/// - Single component: each directory in `search_paths` is tried in order.
/// - Empty path: `None`.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let search_in_current_dir = cfg!(not(unix)) || path.starts_with("./");
    if search_in_current_dir && path.exists() {
        return Some(Cow::Borrowed(path));
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, None) => None,
        (Some(name), None) => find_in_path(search_paths, name.as_os_str()).map(Cow::Owned),
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    for dir in std::env::split_paths(search_paths) {
        let path = dir.join(cmd);
        if let Some(path) = find_by_path(&path) {
            return Some(path.to_owned());
        }
    }
    None
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::buffer_handle;
    use crate::testsupport::{lock_current_dir, make_unique_temp_dir};
    use std::fs;
    use std::fs::File;

    #[cfg(unix)]
    fn osstr(s: &str) -> &OsStr {
        OsStr::new(s)
    }

    fn stage(words: &[&str]) -> Command {
        Command {
            argv: words.iter().map(|w| w.to_string()).collect(),
        }
    }

    #[test]
    #[cfg(unix)]
    fn absolute_existing_path_is_found() {
        let path = Path::new("/bin/sh");
        let res = find_command_path(osstr("/bin"), path);
        assert_eq!(res.expect("expected /bin/sh to resolve").as_ref(), path);
    }

    #[test]
    #[cfg(unix)]
    fn absolute_missing_path_is_not_found() {
        let res = find_command_path(osstr("/bin"), Path::new("/bin/nonexisting"));
        assert!(res.is_none());
    }

    #[test]
    #[cfg(unix)]
    fn single_component_is_searched_in_path() {
        let res = find_command_path(osstr("/bin"), Path::new("sh"));
        let found = res.expect("expected to find 'sh' in /bin");
        assert!(found.as_ref().ends_with("sh"));
        assert!(found.as_ref().starts_with("/bin"));
    }

    #[test]
    #[cfg(unix)]
    fn single_component_missing_from_path() {
        let res = find_command_path(osstr("/bin"), Path::new("nonexisting"));
        assert!(res.is_none());
    }

    #[test]
    #[cfg(unix)]
    fn relative_multi_component_resolves_against_cwd() {
        let _lock = lock_current_dir();
        let temp = make_unique_temp_dir("path_walk").expect("temp dir");
        fs::create_dir_all(temp.join("bin")).expect("create temp bin dir");
        File::create(temp.join("bin").join("sh")).expect("touch bin/sh");

        let cwd_before = std::env::current_dir().expect("cwd");
        std::env::set_current_dir(&temp).expect("set cwd");
        let res = find_command_path(osstr("/does/not/matter"), Path::new("bin/sh"));
        std::env::set_current_dir(&cwd_before).ok();

        let found = res.expect("expected relative 'bin/sh' to resolve");
        assert!(found.as_ref().ends_with("bin/sh"));
        let _ = fs::remove_dir_all(temp);
    }

    #[test]
    #[cfg(unix)]
    fn dot_prefix_resolves_against_cwd() {
        let _lock = lock_current_dir();
        let temp = make_unique_temp_dir("dot_prefix").expect("temp dir");
        File::create(temp.join("foo")).expect("touch foo");

        let cwd_before = std::env::current_dir().expect("cwd");
        std::env::set_current_dir(&temp).expect("set cwd");
        let res = find_command_path(osstr("/bin"), Path::new("./foo"));
        std::env::set_current_dir(&cwd_before).ok();

        assert_eq!(res.expect("expected ./foo to resolve").as_ref(), Path::new("./foo"));
        let _ = fs::remove_dir_all(temp);
    }

    #[test]
    #[cfg(unix)]
    fn empty_path_is_none() {
        let res = find_command_path(osstr("/bin"), Path::new(""));
        assert!(res.is_none());
    }

    #[test]
    #[cfg(unix)]
    fn child_status_reads_code_and_signal() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(child_status(ExitStatus::from_raw(3 << 8)), 3);
        // raw wait status 9 means "killed by SIGKILL"
        assert_eq!(child_status(ExitStatus::from_raw(9)), 137);
    }

    #[test]
    fn unknown_program_is_command_not_found() {
        let session = Session::new();
        let command = stage(&["definitely_missing_whelk_program"]);
        let err = spawn_stage(
            &command,
            StageInput::Buffer(buffer_handle()),
            StageOutput::Buffer(buffer_handle()),
            &session,
        )
        .unwrap_err();
        assert!(matches!(err, ShellError::CommandNotFound { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn spawned_stage_output_is_captured() {
        let mut session = Session::new();
        session.current_dir = PathBuf::from("/");

        let handle = buffer_handle();
        let command = stage(&["/bin/echo", "spawned"]);
        let spawned = spawn_stage(
            &command,
            StageInput::Buffer(buffer_handle()),
            StageOutput::Buffer(handle.clone()),
            &session,
        )
        .expect("spawn /bin/echo");

        let status = wait_stage(spawned).expect("wait /bin/echo");
        assert_eq!(status, 0);
        assert_eq!(handle.borrow().as_slice(), b"spawned\n");
    }

    // The drain thread must keep reading while the child is still running,
    // otherwise a child writing past the pipe capacity never exits.
    #[test]
    #[cfg(unix)]
    fn capture_collects_more_than_a_pipe_buffer() {
        let mut session = Session::new();
        session.current_dir = PathBuf::from("/");

        let handle = buffer_handle();
        let command = stage(&["/bin/sh", "-c", "head -c 300000 /dev/zero"]);
        let spawned = spawn_stage(
            &command,
            StageInput::Buffer(buffer_handle()),
            StageOutput::Buffer(handle.clone()),
            &session,
        )
        .expect("spawn /bin/sh");

        let status = wait_stage(spawned).expect("wait /bin/sh");
        assert_eq!(status, 0);
        assert_eq!(handle.borrow().len(), 300_000);
    }

    #[test]
    #[cfg(unix)]
    fn failing_child_reports_nonzero() {
        let mut session = Session::new();
        session.current_dir = PathBuf::from("/");

        let command = stage(&["/bin/sh", "-c", "exit 5"]);
        let spawned = spawn_stage(
            &command,
            StageInput::Buffer(buffer_handle()),
            StageOutput::Buffer(buffer_handle()),
            &session,
        )
        .expect("spawn /bin/sh");

        let status = wait_stage(spawned).expect("wait /bin/sh");
        assert_eq!(status, 5);
    }
}
