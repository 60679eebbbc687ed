//! Integration tests for pkgstore

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Command isolated to a temporary store and config file
    fn pkgstore(dir: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("pkgstore");
        cmd.env_remove("PKGSTORE_STORE")
            .env_remove("PKGSTORE_CONFIG")
            .env("CI", "true")
            .arg("--store")
            .arg(dir.path().join("store"))
            .arg("--config")
            .arg(dir.path().join("config.toml"));
        cmd
    }

    fn recipe_folder(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let folder = dir.path().join(name);
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("conanfile.py"), content).unwrap();
        folder
    }

    /// Export `folder` and return the printed revision
    fn export(dir: &TempDir, reference: &str, folder: &Path) -> String {
        pkgstore(dir)
            .args(["export", reference])
            .arg(folder)
            .assert()
            .success()
            .stdout(predicate::str::contains("Exported"));

        let output = pkgstore(dir).args(["latest", reference]).output().unwrap();
        let pinned = String::from_utf8(output.stdout).unwrap();
        pinned
            .trim()
            .rsplit_once('#')
            .map(|(_, rev)| rev.to_string())
            .unwrap()
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        pkgstore(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("package cache for C/C++"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        pkgstore(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("pkgstore"));
    }

    #[test]
    fn latest_of_unknown_reference_fails_with_hint() {
        let dir = TempDir::new().unwrap();
        pkgstore(&dir)
            .args(["latest", "zlib/1.2.13@conan/stable"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn malformed_reference_is_rejected() {
        let dir = TempDir::new().unwrap();
        pkgstore(&dir)
            .args(["latest", "zlib@conan"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Malformed reference"));
    }

    #[test]
    fn export_then_latest_and_revisions() {
        let dir = TempDir::new().unwrap();
        let v1 = recipe_folder(&dir, "v1", "version one");
        let v2 = recipe_folder(&dir, "v2", "version two");

        let first = export(&dir, "lib/1.0@user/channel", &v1);
        let second = export(&dir, "lib/1.0@user/channel", &v2);
        assert_ne!(first, second);

        pkgstore(&dir)
            .args(["latest", "lib/1.0@user/channel"])
            .assert()
            .success()
            .stdout(predicate::str::diff(format!("lib/1.0@user/channel#{}\n", second)));

        pkgstore(&dir)
            .args(["revisions", "lib/1.0@user/channel", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::diff(format!("{}\n{}\n", second, first)));

        pkgstore(&dir)
            .args(["revisions", "lib/1.0@user/channel", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"revision_id\""));
    }

    #[test]
    fn path_shows_layout() {
        let dir = TempDir::new().unwrap();
        let folder = recipe_folder(&dir, "src", "recipe");
        let rrev = export(&dir, "lib/1.0", &folder);

        pkgstore(&dir)
            .args(["path", "lib/1.0"])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("{}/export", rrev)));
    }

    #[test]
    fn dirty_entry_is_reported_corrupted() {
        let dir = TempDir::new().unwrap();
        let folder = recipe_folder(&dir, "src", "recipe");
        let rrev = export(&dir, "lib/1.0", &folder);

        let marker = dir
            .path()
            .join("store/lib/1.0/_/_")
            .join(format!("{}.dirty", rrev));
        fs::write(&marker, "").unwrap();

        pkgstore(&dir)
            .args(["path", "lib/1.0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Corrupted"));

        pkgstore(&dir)
            .args(["remove", &format!("lib/1.0#{}", rrev)])
            .assert()
            .success();
        assert!(!marker.exists());
    }

    #[test]
    fn remove_restores_previous_latest() {
        let dir = TempDir::new().unwrap();
        let first = export(&dir, "lib/1.0", &recipe_folder(&dir, "a", "a"));
        let second = export(&dir, "lib/1.0", &recipe_folder(&dir, "b", "b"));

        pkgstore(&dir)
            .args(["remove", &format!("lib/1.0#{}", second)])
            .assert()
            .success();
        pkgstore(&dir)
            .args(["latest", "lib/1.0"])
            .assert()
            .success()
            .stdout(predicate::str::contains(first));

        pkgstore(&dir)
            .args(["remove", "lib/1.0", "--all"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed 1 revision(s)"));
    }

    #[test]
    fn remove_without_revision_needs_one() {
        let dir = TempDir::new().unwrap();
        export(&dir, "lib/1.0", &recipe_folder(&dir, "a", "a"));
        pkgstore(&dir)
            .args(["remove", "lib/1.0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("has no revision"));
    }

    const PROCESSES: usize = 6;

    /// Run one `pkgstore export` per folder, all at once
    fn export_concurrently(dir: &TempDir, reference: &str, folders: &[std::path::PathBuf]) {
        std::thread::scope(|scope| {
            let runs: Vec<_> = folders
                .iter()
                .map(|folder| {
                    scope.spawn(move || {
                        pkgstore(dir)
                            .args(["export", reference])
                            .arg(folder)
                            .output()
                            .unwrap()
                    })
                })
                .collect();
            for run in runs {
                let output = run.join().unwrap();
                assert!(
                    output.status.success(),
                    "export failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                );
            }
        });
    }

    fn ledger_lines(dir: &TempDir) -> Vec<String> {
        let ledger = dir.path().join("store/lib/1.0/_/_/revisions.txt");
        fs::read_to_string(ledger)
            .unwrap()
            .lines()
            .map(|line| line.split(',').next().unwrap().to_string())
            .collect()
    }

    #[test]
    fn concurrent_processes_record_every_export() {
        let dir = TempDir::new().unwrap();
        let folders: Vec<_> = (0..PROCESSES)
            .map(|i| recipe_folder(&dir, &format!("src{}", i), &format!("content {}", i)))
            .collect();

        export_concurrently(&dir, "lib/1.0", &folders);

        let mut recorded = ledger_lines(&dir);
        recorded.sort();
        recorded.dedup();
        assert_eq!(recorded.len(), PROCESSES);

        let output = pkgstore(&dir)
            .args(["revisions", "lib/1.0", "--format", "plain"])
            .output()
            .unwrap();
        assert_eq!(String::from_utf8(output.stdout).unwrap().lines().count(), PROCESSES);
    }

    #[test]
    fn concurrent_processes_share_one_entry() {
        let dir = TempDir::new().unwrap();
        let folder = recipe_folder(&dir, "src", "same content");
        let folders = vec![folder; PROCESSES];

        export_concurrently(&dir, "lib/1.0", &folders);

        let recorded = ledger_lines(&dir);
        assert_eq!(recorded.len(), PROCESSES);
        assert!(recorded.iter().all(|rev| rev == &recorded[0]));

        let entry = dir.path().join("store/lib/1.0/_/_").join(&recorded[0]);
        assert_eq!(
            fs::read_to_string(entry.join("export/conanfile.py")).unwrap(),
            "same content"
        );
        assert!(!entry.with_extension("dirty").exists());
        assert!(!dir
            .path()
            .join("store/lib/1.0/_/_")
            .join(format!("{}.count", recorded[0]))
            .exists());
    }

    #[test]
    fn outdated_is_empty_without_packages() {
        let dir = TempDir::new().unwrap();
        export(&dir, "lib/1.0", &recipe_folder(&dir, "a", "a"));
        pkgstore(&dir)
            .args(["outdated", "lib/1.0", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn config_init_show_and_set() {
        let dir = TempDir::new().unwrap();
        pkgstore(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));
        assert!(dir.path().join("config.toml").is_file());

        pkgstore(&dir)
            .args(["config", "set", "locks.read_busy_delay_ms", "25"])
            .assert()
            .success();
        pkgstore(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("read_busy_delay_ms = 25"));

        pkgstore(&dir)
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        pkgstore(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn completions_generate() {
        let dir = TempDir::new().unwrap();
        pkgstore(&dir)
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("pkgstore"));
    }
}
