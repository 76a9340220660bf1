use std::process::Command;

fn gridwalk() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_gridwalk"));
    let _ = command.current_dir(env!("CARGO_MANIFEST_DIR"));
    command
}

#[test]
fn sample_scenario_prints_agents_and_digest() {
    let output = gridwalk()
        .arg("scenarios/crossing.toml")
        .output()
        .expect("failed to invoke the gridwalk binary");

    assert!(output.status.success(), "gridwalk should play the sample scenario");
    let stdout = String::from_utf8(output.stdout).expect("utf-8 output");
    assert!(stdout.lines().any(|line| line == "tick 120"));
    assert_eq!(stdout.lines().filter(|line| line.starts_with("agent ")).count(), 3);
    let digest = stdout
        .lines()
        .find_map(|line| line.strip_prefix("digest "))
        .expect("digest line");
    assert_eq!(digest.len(), 64);
}

#[test]
fn repeated_runs_print_the_same_digest() {
    let run = || {
        let output = gridwalk()
            .arg("scenarios/crossing.toml")
            .output()
            .expect("failed to invoke the gridwalk binary");
        String::from_utf8(output.stdout).expect("utf-8 output")
    };

    assert_eq!(run(), run());
}

#[test]
fn missing_scenario_reports_the_path() {
    let output = gridwalk()
        .arg("scenarios/does-not-exist.toml")
        .output()
        .expect("failed to invoke the gridwalk binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).expect("utf-8 output");
    assert!(stderr.contains("failed to read scenario scenarios/does-not-exist.toml"));
}
