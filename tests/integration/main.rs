//! Integration tests for bwcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn bwcache() -> Command {
        cargo_bin_cmd!("bwcache")
    }

    #[test]
    fn help_displays() {
        bwcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Bitwarden CLI lookups"));
    }

    #[test]
    fn version_displays() {
        bwcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("bwcache"));
    }

    #[test]
    fn config_path() {
        bwcache()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        bwcache()
            .args(["--no-local", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"));
    }

    #[test]
    fn completions_generate() {
        bwcache()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("bwcache"));
    }

    #[test]
    fn write_attachment_rejects_bad_mode() {
        bwcache()
            .args([
                "write-attachment",
                "tls",
                "--filename",
                "server.key",
                "--dest",
                "/nonexistent/server.key",
                "--mode",
                "rw-r--r--",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Mode is not valid"));
    }
}

#[cfg(unix)]
mod vault_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const ITEMS: &str = r#"[
  {"id": "a1", "name": "db", "login": {"username": "admin", "password": "hunter2"},
   "fields": [{"name": "port", "value": "5432"}]},
  {"id": "a2", "name": "db-replica", "login": {"username": "ro", "password": "other"}},
  {"id": "t1", "name": "tls", "login": null}
]"#;

    /// Stand-in `bw` that logs each invocation next to itself
    fn fake_bw(dir: &Path) -> PathBuf {
        let items = dir.join("items.json");
        std::fs::write(&items, ITEMS).unwrap();

        let script = dir.join("bw");
        let body = format!(
            r#"#!/bin/sh
echo "$*" >> "{calls}"
if [ -n "$FAKE_BW_LOCKED" ]; then
  echo "Vault is locked." >&2
  exit 1
fi
case "$1" in
  sync) ;;
  list) cat "{items}" ;;
  get)
    out=""
    while [ $# -gt 0 ]; do
      if [ "$1" = "--output" ]; then out="$2"; fi
      shift
    done
    printf 'secret-bytes' > "$out"
    ;;
  *) echo "unknown command: $1" >&2; exit 1 ;;
esac
"#,
            calls = dir.join("calls.log").display(),
            items = items.display(),
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    fn calls(dir: &Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// bwcache isolated from user config, with its cache under `dir`
    fn bwcache(dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("bwcache");
        cmd.current_dir(dir)
            .env_remove("BWCACHE_CONFIG")
            .env_remove("FAKE_BW_LOCKED")
            .arg("--no-local")
            .arg("--config")
            .arg(dir.join("missing.toml"))
            .arg("--cache-dir")
            .arg(dir)
            .arg("--bw")
            .arg(dir.join("bw"));
        cmd
    }

    #[test]
    fn lookup_field_hits_vault_once() {
        let temp = TempDir::new().unwrap();
        fake_bw(temp.path());

        for _ in 0..2 {
            bwcache(temp.path())
                .args(["lookup", "db", "--field", "password"])
                .assert()
                .success()
                .stdout("hunter2\n");
        }

        assert_eq!(calls(temp.path()), vec!["list items --search db"]);

        let mode = std::fs::metadata(temp.path().join("bwcache.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn lookup_custom_field() {
        let temp = TempDir::new().unwrap();
        fake_bw(temp.path());

        bwcache(temp.path())
            .args(["lookup", "db", "--field", "port", "--no-cache"])
            .assert()
            .success()
            .stdout("5432\n");

        assert!(!temp.path().join("bwcache.json").exists());
    }

    #[test]
    fn lookup_missing_item() {
        let temp = TempDir::new().unwrap();
        fake_bw(temp.path());

        bwcache(temp.path())
            .args(["lookup", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("no results found!"))
            .stderr(predicate::str::contains("bw list items --search='nope'"));
    }

    #[test]
    fn failed_lookup_is_not_cached() {
        let temp = TempDir::new().unwrap();
        fake_bw(temp.path());

        for _ in 0..2 {
            bwcache(temp.path())
                .args(["lookup", "nope"])
                .assert()
                .failure();
        }

        assert_eq!(calls(temp.path()).len(), 2);
    }

    #[test]
    fn locked_vault_has_hint() {
        let temp = TempDir::new().unwrap();
        fake_bw(temp.path());

        bwcache(temp.path())
            .env("FAKE_BW_LOCKED", "1")
            .args(["lookup", "db"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("locked"))
            .stderr(predicate::str::contains("bw unlock"));
    }

    #[test]
    fn missing_bw_reports_not_found() {
        let temp = TempDir::new().unwrap();

        bwcache(temp.path())
            .args(["lookup", "db"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Bitwarden CLI not found"));
    }

    #[test]
    fn attachment_prints_base64() {
        let temp = TempDir::new().unwrap();
        fake_bw(temp.path());

        bwcache(temp.path())
            .args(["attachment", "tls", "--filename", "server.key"])
            .assert()
            .success()
            .stdout("c2VjcmV0LWJ5dGVz\n");

        let calls = calls(temp.path());
        assert_eq!(calls.len(), 2);
        assert!(calls[1].starts_with("get attachment server.key --itemid t1 --output "));
    }

    #[test]
    fn write_attachment_then_unchanged() {
        let temp = TempDir::new().unwrap();
        fake_bw(temp.path());
        let dest = temp.path().join("server.key");
        let dest_arg = dest.to_str().unwrap();

        let args = [
            "write-attachment",
            "tls",
            "--filename",
            "server.key",
            "--dest",
            dest_arg,
            "--mode",
            "0640",
        ];

        bwcache(temp.path())
            .args(args)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"changed\": true"));

        assert_eq!(std::fs::read(&dest).unwrap(), b"secret-bytes");
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);

        bwcache(temp.path())
            .args(args)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"changed\": false"));
    }

    #[test]
    fn cache_list_and_clear() {
        let temp = TempDir::new().unwrap();
        fake_bw(temp.path());

        bwcache(temp.path())
            .args(["lookup", "db", "--field", "username"])
            .assert()
            .success();

        bwcache(temp.path())
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("lookup:"))
            .stdout(predicate::str::contains("admin").not());

        bwcache(temp.path())
            .args(["cache", "clear", "--yes"])
            .assert()
            .success();

        bwcache(temp.path())
            .args(["cache", "info", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"entries\": 0"));
    }

    #[test]
    fn sync_clears_cache() {
        let temp = TempDir::new().unwrap();
        fake_bw(temp.path());

        bwcache(temp.path())
            .args(["lookup", "db", "--field", "password"])
            .assert()
            .success();
        bwcache(temp.path()).arg("sync").assert().success();
        bwcache(temp.path())
            .args(["lookup", "db", "--field", "password"])
            .assert()
            .success();

        assert_eq!(
            calls(temp.path()),
            vec!["list items --search db", "sync", "list items --search db"]
        );
    }
}
