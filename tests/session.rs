use std::fs;
use std::sync::{Arc, Mutex};

use titan_script::commands::{Command, EchoCmd};
use titan_script::shell::registry::{builtin, command};
use titan_script::shell::stream::OutputStream;
use titan_script::{ErrorKind, Session};

fn session_in(dir: &std::path::Path) -> Session {
    let mut session = Session::new().unwrap().with_stdout(OutputStream::Null);
    session.set_cwd(dir);
    session
}

#[test]
fn empty_script_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    session.run_script("").unwrap();
    assert!(session.first_error().is_none());
    assert_eq!(session.output("").unwrap(), b"");
}

#[test]
fn echo_piped_through_base64() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    assert_eq!(session.output("echo hello | base64").unwrap(), b"aGVsbG8=");
}

#[test]
fn continuation_joins_lines() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    assert_eq!(session.output("echo a\\\nb").unwrap(), b"ab");
}

#[test]
fn first_error_wins() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    let script = "mkdir no/such/parent/dir\necho should-not-run";
    let err = session.output(script).unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::NotFound | ErrorKind::Io));
    assert_eq!(err.stage(), Some("mkdir"));
    assert!(err.to_string().contains("mkdir"));
    assert_eq!(
        session.first_error().map(|e| e.to_string()),
        Some(err.to_string())
    );
    assert!(!dir.path().join("no").exists());
}

#[test]
fn lines_after_failure_do_not_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    let err = session
        .run_script("mkdir first\nunalias\nmkdir second")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
    assert!(dir.path().join("first").is_dir());
    assert!(!dir.path().join("second").exists());
}

#[test]
fn glob_move_without_matches_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    fs::create_dir(dir.path().join("out")).unwrap();
    let mut session = session_in(dir.path());

    let err = session.run_script("mv --glob *.none out").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(dir.path().join("a.txt").exists());
    assert_eq!(fs::read_dir(dir.path().join("out")).unwrap().count(), 0);
}

#[test]
fn glob_copy_into_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    fs::write(dir.path().join("b.txt"), "b").unwrap();
    let mut session = session_in(dir.path());

    session
        .run_script("mkdir -p backup\ncp --glob *.txt backup")
        .unwrap();
    assert_eq!(fs::read_to_string(dir.path().join("backup/a.txt")).unwrap(), "a");
    assert_eq!(fs::read_to_string(dir.path().join("backup/b.txt")).unwrap(), "b");
    assert!(dir.path().join("a.txt").exists());
}

#[test]
fn aliases_expand_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    let out = session
        .output("alias greet echo hi\nalias echo greet\ngreet there")
        .unwrap();
    assert_eq!(out, b"hi there");
}

#[test]
fn alias_listing() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    let out = session.output("alias ll ls -l\nalias ll").unwrap();
    assert_eq!(out, b"ls -l\n");

    let err = session_in(dir.path()).run_script("alias missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn conditional_lines() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("present.txt"), "x").unwrap();
    let mut session = session_in(dir.path());
    let script = r#"
export F=present.txt
if fileIsRegular($F) then echo found
if fileExists("absent.txt") then echo missing
if not(fileExists('absent.txt')) then echo " ok"
"#;
    assert_eq!(session.output(script).unwrap(), b"found ok");
}

#[test]
fn variables_in_conditions_stay_atomic() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    session.put_env("TRICKY", "\"), true, (\"");
    assert!(!session.test("fileExists($TRICKY)").unwrap());
    assert!(session.test("fileIsDirectory(\".\")").unwrap());
}

#[test]
fn bad_condition_latches() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    let err = session.run_script("if nosuch() then echo x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Eval);
    assert!(session.first_error().is_some());
}

#[test]
fn expansion_runs_before_quoting() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    let out = session
        .output("export WHO='two  words'\necho \"$WHO\" '$WHO' $WHO")
        .unwrap();
    assert_eq!(out, b"two  words two  words two words");
}

#[test]
fn unterminated_quote_is_syntax_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    let err = session.run_script("echo \"open").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.stage(), Some("echo"));
    assert!(err.to_string().starts_with("echo failed in `echo \"open`"));
}

#[test]
fn custom_builtin_sees_session() {
    let dir = tempfile::tempdir().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let mut session = session_in(dir.path()).with_builtins([(
        "record",
        Some(builtin(move |s, argv| {
            record.lock().unwrap().push((argv.to_vec(), s.get_env("MODE")));
            Ok(())
        })),
    )]);

    session.run_script("export MODE=fast\nrecord a b").unwrap();
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, vec!["record", "a", "b"]);
    assert_eq!(seen[0].1, "fast");
}

#[test]
fn custom_pipeline_command() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path()).with_commands([(
        "say",
        Some(command(|| Box::new(EchoCmd) as Box<dyn Command>)),
    )]);
    assert_eq!(session.output("say hi | cat").unwrap(), b"hi");

    let mut session = session_in(dir.path()).with_commands([("base64", None)]);
    let err = session.run_script("echo x | base64 --bogus-flag-for-test").unwrap_err();
    // no longer a pipeline command, so it runs (and fails) as an external program
    assert_ne!(err.kind(), ErrorKind::Argument);
}

#[cfg(unix)]
#[test]
fn failed_spawn_releases_running_stages() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    let err = session
        .run_script("yes | cat | definitely-not-a-program-xyz")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.stage(), Some("definitely-not-a-program-xyz"));
}

#[cfg(unix)]
#[test]
fn builtin_names_run_as_programs_in_pipelines() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    session.run_script("mkdir -p made/inner | cat").unwrap();
    assert!(dir.path().join("made/inner").is_dir());
}

#[test]
fn unset_variable_is_not_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    assert!(!session.test("fileExists($OUTDIR_UNSET_FOR_TEST)").unwrap());
    let out = session
        .output("if fileExists($OUTDIR_UNSET_FOR_TEST) then echo ran")
        .unwrap();
    assert_eq!(out, b"");
}

#[test]
fn cat_and_head_read_relative_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lines.txt"), "1\n2\n3\n").unwrap();
    let mut session = session_in(dir.path());
    assert_eq!(session.output("cat lines.txt | head -n 2").unwrap(), b"1\n2\n");
}

#[test]
fn unknown_program_reports_stage() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    let err = session
        .run_script("echo x | definitely-not-a-program-xyz")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.stage(), Some("definitely-not-a-program-xyz"));
    assert!(err.to_string().contains("echo x | definitely-not-a-program-xyz"));
}

#[cfg(unix)]
#[test]
fn external_programs_see_session_env_and_cwd() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    let out = session
        .output("export GREETING=hey\nsh -c 'printenv GREETING; pwd'")
        .unwrap();
    let text = String::from_utf8(out).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("hey"));
    let pwd = fs::canonicalize(lines.next().unwrap()).unwrap();
    assert_eq!(pwd, fs::canonicalize(dir.path()).unwrap());
}
