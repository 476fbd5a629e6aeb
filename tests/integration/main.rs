//! Integration tests for herdcache

mod read_path;

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// Run against a config path that does not exist, so defaults apply
    fn herdcache(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("herdcache");
        cmd.env("HERDCACHE_CONFIG", temp.path().join("config.toml"));
        cmd
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        herdcache(&temp)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("coalesced cache-aside reads"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        herdcache(&temp)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("herdcache"));
    }

    #[test]
    fn config_path_honours_env() {
        let temp = TempDir::new().unwrap();
        herdcache(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        herdcache(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]").and(predicate::str::contains("ttl_ms")));
    }

    #[test]
    fn config_init_creates_file() {
        let temp = TempDir::new().unwrap();
        herdcache(&temp)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));

        assert!(temp.path().join("config.toml").exists());
    }

    #[test]
    fn invalid_config_fails() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.toml"), "[cache]\nttl_ms = \"soon\"").unwrap();

        herdcache(&temp)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn env_override_is_validated() {
        let temp = TempDir::new().unwrap();
        herdcache(&temp)
            .env("HERDCACHE_CACHE_TTL_MS", "0")
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("cache.ttl_ms"));
    }

    #[test]
    fn env_override_shows_in_config() {
        let temp = TempDir::new().unwrap();
        herdcache(&temp)
            .env("HERDCACHE_BIND", "0.0.0.0:9000")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("0.0.0.0:9000"));
    }

    #[test]
    fn probe_reports_single_lookup() {
        let temp = TempDir::new().unwrap();
        herdcache(&temp)
            .args(["probe", "abc", "-n", "50", "--latency-ms", "50"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("50 successful reads")
                    .and(predicate::str::contains("Store lookups: 1")),
            );
    }

    #[test]
    fn probe_absent_reports_not_found() {
        let temp = TempDir::new().unwrap();
        herdcache(&temp)
            .args(["probe", "ghost", "-n", "5", "--absent"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Record not found: ghost"));
    }
}
