use std::{
    env, fs,
    path::{Path, PathBuf},
    process::Command,
};

fn run_bin(args: &[&str]) {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_epimut"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

    assert!(
        output.status.success(),
        "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
    );
}

fn write_config(test_dir: &Path, insert_variant: bool, trace_agents: bool) {
    let config_contents = String::new()
        + "[model]\n"
        + "spread_chance = 0.2\n"
        + "fatality_rate = 0.024\n"
        + "min_time_to_recover = 1\n"
        + &format!("insert_variant = {insert_variant}\n")
        + "variation_chance = 0.01\n"
        + "move_chance = 0.5\n"
        + "recovery_chance = 0.04\n"
        + "resistance_chance = 0.005\n"
        + "\n"
        + "[init]\n"
        + "n_susceptible = 300\n"
        + "n_infected = 3\n"
        + "width = 20\n"
        + "height = 20\n"
        + "seed = 1024\n"
        + "\n"
        + "[output]\n"
        + "steps_per_file = 64\n"
        + &format!("trace_agents = {trace_agents}\n");

    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");
}

fn fresh_dir(name: &str) -> PathBuf {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);
    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");
    test_dir
}

#[test]
fn basic_workflow() {
    let test_dir = fresh_dir("basic_workflow");
    write_config(&test_dir, true, false);

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);
    run_bin(&["--sim-dir", test_dir_str, "create"]);

    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]);
    run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "1"]);

    let run_dir = test_dir.join("run-0000");
    assert!(run_dir.join("trajectory-0000.csv").is_file());
    assert!(run_dir.join("trajectory-0001.csv").is_file());
    assert!(run_dir.join("checkpoint.msgpack").is_file());

    let trajectory =
        fs::read_to_string(run_dir.join("trajectory-0000.csv")).expect("failed to read trajectory");
    let mut lines = trajectory.lines();
    assert_eq!(
        lines.next(),
        Some("Iteration,Susceptible,Exposed,Infected,Resistant,Dead")
    );
    assert_eq!(lines.next(), Some("0,300,0,3,0,0"));
    assert_eq!(lines.count(), 63);

    // Both runs share the seed, so their trajectories are identical.
    let other = fs::read_to_string(test_dir.join("run-0001").join("trajectory-0001.csv"))
        .expect("failed to read trajectory");
    let this = fs::read_to_string(run_dir.join("trajectory-0001.csv"))
        .expect("failed to read trajectory");
    assert_eq!(this, other);

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);
    assert!(run_dir.join("results.json").is_file());

    run_bin(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!run_dir.exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn agent_trace_is_written() {
    let test_dir = fresh_dir("agent_trace_is_written");
    write_config(&test_dir, false, true);

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);

    let trace = fs::read_to_string(test_dir.join("run-0000").join("agents-0000.csv"))
        .expect("failed to read agent trace");
    // One header plus one line per agent and step.
    assert_eq!(trace.lines().count(), 1 + 303 * 64);

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_config_fails() {
    let test_dir = fresh_dir("invalid_config_fails");
    write_config(&test_dir, false, false);
    let config_path = test_dir.join("config.toml");
    let contents = fs::read_to_string(&config_path)
        .expect("failed to read config file")
        .replace("spread_chance = 0.2", "spread_chance = 1.2");
    fs::write(&config_path, contents).expect("failed to write config file");

    let bin = PathBuf::from(env!("CARGO_BIN_EXE_epimut"));
    let output = Command::new(bin)
        .args(["--sim-dir", test_dir.to_str().unwrap(), "create"])
        .output()
        .expect("failed to execute command");
    assert!(!output.status.success());

    fs::remove_dir_all(&test_dir).ok();
}
