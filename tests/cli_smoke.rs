use std::{
    path::PathBuf,
    process::{Command, Output},
};

struct Env {
    _tmp: tempfile::TempDir,
    data: PathBuf,
    upstream: PathBuf,
}

fn setup() -> Result<Env, Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    let data = tmp.path().join("data");
    let upstream = tmp.path().join("upstream");

    std::fs::create_dir_all(upstream.join("git"))?;
    std::fs::write(upstream.join("git/commit.md"), "# git commit\nRecord changes.\n")?;
    std::fs::write(upstream.join("git/push.md"), "# git push\n")?;
    std::fs::write(upstream.join("tar.md"), "# tar\nArchive files.\n")?;

    Ok(Env {
        _tmp: tmp,
        data,
        upstream,
    })
}

fn run(env: &Env, args: &[&str]) -> Result<Output, Box<dyn std::error::Error>> {
    Ok(Command::new(cheatdex_bin()?)
        .args(args)
        .env("CHEATDEX_DATA_DIR", &env.data)
        .env("CHEATDEX_UPSTREAM", &env.upstream)
        .env("CHEATDEX_LOG", "warn")
        .output()?)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn update_then_lookup() -> Result<(), Box<dyn std::error::Error>> {
    let env = setup()?;

    let update = run(&env, &["update"])?;
    assert!(update.status.success());
    assert!(stdout(&update).contains("Successfully updated index"));

    let lookup = run(&env, &["git", "commit"])?;
    assert!(lookup.status.success());
    assert!(stdout(&lookup).contains("Record changes."));

    let detail = run(&env, &["git", "commit", "--detail"])?;
    assert!(stdout(&detail).contains("no detailed write-up"));

    let siblings = run(&env, &["git", "pull"])?;
    assert!(stdout(&siblings).contains("git push"));

    let miss = run(&env, &["kubectl"])?;
    assert!(miss.status.success());
    assert!(stdout(&miss).contains("no command like that"));

    let history = run(&env, &["show", "hist"])?;
    let history = stdout(&history);
    assert!(history.contains("Update"));
    assert!(history.contains("git commit"));
    Ok(())
}

#[test]
fn search_and_complete() -> Result<(), Box<dyn std::error::Error>> {
    let env = setup()?;
    run(&env, &["update"])?;

    let search = stdout(&run(&env, &["search", "archive", "tar"])?);
    assert!(search.contains("tar"));

    let complete = stdout(&run(&env, &["complete", "git "])?);
    assert_eq!(complete.lines().collect::<Vec<_>>(), vec!["commit", "push"]);
    Ok(())
}

#[test]
fn empty_queue_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let env = setup()?;
    let output = run(&env, &["show", "updates"])?;
    assert!(output.status.success());
    assert!(stdout(&output).contains("No updates in the queue"));
    Ok(())
}

#[test]
fn unknown_flag_exits_with_usage_error() -> Result<(), Box<dyn std::error::Error>>
{
    let env = setup()?;
    let output = run(&env, &["git", "--bogus"])?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}

#[test]
fn fetch_failure_is_reported_inline() -> Result<(), Box<dyn std::error::Error>> {
    let env = setup()?;
    run(&env, &["update"])?;
    std::fs::remove_file(env.upstream.join("tar.md"))?;

    let output = run(&env, &["tar"])?;
    assert!(output.status.success());
    assert!(stdout(&output).contains("Error:"));
    Ok(())
}

fn cheatdex_bin() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Ok(bin) = std::env::var("CARGO_BIN_EXE_cheatdex") {
        return Ok(PathBuf::from(bin));
    }

    let mut path = std::env::current_exe()?;
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("cheatdex");

    if cfg!(windows) {
        path.set_extension("exe");
    }

    Ok(path)
}
