use std::{env, fs, path::PathBuf, process::Command};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[world]\n"
        + "width = 800.0\n"
        + "height = 600.0\n"
        + "\n"
        + "[population]\n"
        + "humans = 120\n"
        + "zombies = 3\n"
        + "\n"
        + "[infection]\n"
        + "bite_range = 12.0\n"
        + "incubation_min = 60\n"
        + "incubation_max = 120\n"
        + "\n"
        + "[variants]\n"
        + "runner_lifespan = 200\n"
        + "\n"
        + "[output]\n"
        + "ticks = 400\n"
        + "ticks_per_save = 20\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_outbreak"));

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

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "create"]);
    run_bin(&["--sim-dir", test_dir_str, "create", "--seed", "7"]);
    run_bin(&["--sim-dir", test_dir_str, "create", "--ticks", "150", "--seed", "7"]);

    assert!(test_dir.join("run-0000/history.msgpack").is_file());
    assert!(test_dir.join("run-0002/history.msgpack").is_file());

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);
    assert!(test_dir.join("results.msgpack").is_file());

    run_bin(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!test_dir.join("run-0000").exists());
    assert!(!test_dir.join("results.msgpack").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn rejects_invalid_config() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("rejects_invalid_config");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_contents = String::new()
        + "[variants.tank]\n"
        + "weight = 0.5\n"
        + "speed_factor = 0.6\n"
        + "radius = 7.0\n"
        + "hit_points = 300\n";
    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    let output = Command::new(env!("CARGO_BIN_EXE_outbreak"))
        .args(["--sim-dir", test_dir.to_str().expect("utf-8 path"), "create"])
        .output()
        .expect("failed to execute command");

    assert!(!output.status.success());
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}
