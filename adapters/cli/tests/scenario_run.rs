use std::process::{Command, Output};

const DEMO: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../demos/ambush.toml");

fn gauntlet(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gauntlet"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to launch gauntlet binary")
}

#[test]
fn demo_scenario_runs_to_completion() {
    let output = gauntlet(&[DEMO, "run"]);
    assert!(
        output.status.success(),
        "run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("zone#3: authored active, forced free"));
    assert!(stdout.contains("rewards at"));
    assert!(stdout.contains("rejected"));
    assert!(stdout.contains("live agents:"));
}

#[test]
fn same_seed_prints_the_same_report() {
    let first = gauntlet(&[DEMO, "--seed", "7", "run"]);
    let second = gauntlet(&[DEMO, "--seed", "7", "run"]);
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn preview_lists_every_challenge() {
    let output = gauntlet(&[DEMO, "preview", "--max-level", "30", "--every", "5"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["Warlord's Den", "Convoy Rescue", "Hold the Relay"] {
        assert!(stdout.contains(name), "missing `{name}` in preview");
    }
    assert_eq!(stdout.matches("level").count(), 3);
}

#[test]
fn missing_scenarios_fail_cleanly() {
    let output = gauntlet(&["/nonexistent/scenario.toml"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read scenario"));
}

#[test]
fn zero_step_budget_is_rejected_on_the_command_line() {
    let output = gauntlet(&[DEMO, "--attempts-per-step", "0", "run"]);
    assert!(!output.status.success());
}
