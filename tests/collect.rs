// tests/collect.rs

//! End-to-end collection into a bundle directory

mod common;

use common::{bundle_dir, FakeSysroot};
use diagplug::local::MANIFEST_NAME;
use diagplug::options::OptionStore;
use diagplug::{run_plugins, select_plugins, Error, LocalHost};
use std::fs;
use std::path::Path;

const ETC: &str = "var/snap/charmed-postgresql/current/etc";

fn read(bundle: &Path, rel: &str) -> String {
    fs::read_to_string(bundle.join(rel)).unwrap()
}

#[test]
fn test_charmed_postgresql_bundle_is_redacted() {
    let root = FakeSysroot::new().with_charmed_postgresql();
    let (_keep, out) = bundle_dir();
    let mut host = LocalHost::new(root.path(), &out).unwrap();
    let mut plugins = select_plugins(&["charmed_postgresql".to_string()]).unwrap();

    let summary = run_plugins(&mut host, &mut plugins, false).unwrap();
    assert_eq!(summary.ran, vec!["charmed_postgresql"]);

    let patroni = read(&out, &format!("{}/patroni/patroni.yaml", ETC));
    assert!(!patroni.contains("op-secret"));
    assert!(!patroni.contains("restapi-pass"));
    assert!(!patroni.contains("repl-secret"));
    assert!(patroni.contains("password: \"*********\""));
    assert!(patroni.contains("username: operator"));

    let pgbackrest = read(&out, &format!("{}/pgbackrest/pgbackrest.conf", ETC));
    assert!(pgbackrest.contains("repo1-s3-key=*********\n"));
    assert!(pgbackrest.contains("repo1-s3-key-secret=*********\n"));
    assert!(pgbackrest.contains("repo1-s3-bucket=backups"));
    assert!(!pgbackrest.contains("AKIAEXAMPLE"));

    let userlist = read(&out, &format!("{}/pgbouncer/userlist.txt", ETC));
    assert!(userlist.contains("\"operator\" \"*********\""));
    assert!(userlist.contains("\"pgbouncer_auth\" \"*********\""));
    assert!(!userlist.contains("md5aaaa"));

    // The sysroot itself is untouched
    let original = fs::read_to_string(root.join(&format!("/{}/patroni/patroni.yaml", ETC))).unwrap();
    assert!(original.contains("op-secret"));

    assert!(!out.join(format!("{}/pgbouncer/key.pem", ETC)).exists());
    assert!(!out.join(format!("{}/patroni/cert.pem", ETC)).exists());
    assert!(out.join(format!("{}/pgbouncer/pgbouncer.ini", ETC)).exists());
    assert!(out
        .join("var/snap/charmed-postgresql/common/var/log/patroni/patroni.log")
        .exists());

    let plugin = host.manifest().plugin("charmed_postgresql").unwrap();
    assert!(plugin
        .forbidden
        .iter()
        .any(|p| p.ends_with("pgbouncer/key.pem")));
    // Commands never run against a foreign sysroot
    assert!(plugin.commands.iter().all(|c| c.artifact.is_none()));
    let psql = plugin
        .commands
        .iter()
        .find(|c| c.command.contains("\\duS+"))
        .unwrap();
    assert_eq!(psql.env, vec!["PGPASSWORD".to_string()]);
    assert!(!psql.command.contains("op-secret"));

    let manifest = fs::read_to_string(out.join(MANIFEST_NAME)).unwrap();
    assert!(!manifest.contains("op-secret"));
    let json: serde_json::Value = serde_json::from_str(&manifest).unwrap();
    assert_eq!(json["plugins"][0]["name"], "charmed_postgresql");
}

#[test]
fn test_pcp_bundle_respects_count_limit() {
    let root = FakeSysroot::new().with_pcp();
    let (_keep, out) = bundle_dir();
    let mut options = OptionStore::new();
    options.set_override("pcp.pmloggerfiles=2").unwrap();
    let mut host = LocalHost::new(root.path(), &out)
        .unwrap()
        .with_hostname("node1")
        .with_options(options)
        .run_commands(true);
    let mut plugins = select_plugins(&["pcp".to_string()]).unwrap();

    run_plugins(&mut host, &mut plugins, false).unwrap();

    let logger = out.join("var/log/pcp/pmlogger/node1");
    assert!(logger.join("20240103.0").exists());
    assert!(logger.join("20240102.0").exists());
    assert!(!logger.join("20240101.0").exists());

    assert!(out.join("etc/pcp.conf").exists());
    assert!(out.join("etc/pcp/pmcd/pmcd.conf").exists());
    assert!(out.join("var/lib/pcp/config/pmlogger/config.default").exists());
    assert!(!out.join("var/lib/pcp/config/pmchart/Overview").exists());
    assert!(out.join("var/log/pcp/pmcd/pmcd.log").exists());
    assert!(out.join("var/log/pcp/NOTICES").exists());
}

#[test]
fn test_pcp_foreign_sysroot_scans_pmlogger_dir() {
    let root = FakeSysroot::new().with_pcp();
    let (_keep, out) = bundle_dir();
    let mut options = OptionStore::new();
    options.set_override("pcp.pmloggerfiles=1").unwrap();
    let mut host = LocalHost::new(root.path(), &out)
        .unwrap()
        .with_hostname("node1")
        .with_options(options);
    let mut plugins = select_plugins(&["pcp".to_string()]).unwrap();

    run_plugins(&mut host, &mut plugins, false).unwrap();

    let logger = out.join("var/log/pcp/pmlogger/node1");
    assert!(logger.join("20240103.0").exists());
    assert!(!logger.join("20240102.0").exists());
    // `pcp` is recorded but not run, so there is no pmstat
    let commands = &host.manifest().plugin("pcp").unwrap().commands;
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].command, "pcp");
    assert!(commands[0].artifact.is_none());
}

#[test]
fn test_non_utf8_config_is_redacted() {
    let root = FakeSysroot::new().with_charmed_postgresql();
    let mut content = b"# caf\xe9 cluster\r\n".to_vec();
    content.extend_from_slice(common::PATRONI_YAML.as_bytes());
    content.extend_from_slice(b"bootstrap: {dcs: {password: flow-secret}}\n");
    root.write(&format!("/{}/patroni/patroni.yaml", ETC), &content);
    let (_keep, out) = bundle_dir();
    let mut host = LocalHost::new(root.path(), &out).unwrap();
    let mut plugins = select_plugins(&["charmed_postgresql".to_string()]).unwrap();

    run_plugins(&mut host, &mut plugins, false).unwrap();

    let bytes = fs::read(out.join(format!("{}/patroni/patroni.yaml", ETC))).unwrap();
    assert!(bytes.starts_with(b"# caf\xe9 cluster\r\n"));
    let text = String::from_utf8_lossy(&bytes);
    for secret in ["op-secret", "restapi-pass", "repl-secret", "flow-secret"] {
        assert!(!text.contains(secret), "{} leaked", secret);
    }
    assert!(text.contains("{dcs: {password: \"*********\"}}"));
}

#[test]
fn test_unwritable_command_dir_still_redacts() {
    let root = FakeSysroot::new().with_charmed_postgresql();
    let (_keep, out) = bundle_dir();
    let mut host = LocalHost::new(root.path(), &out).unwrap().run_commands(true);
    // A file where the command directory should go
    fs::write(out.join("sos_commands"), "").unwrap();
    let mut plugins = select_plugins(&["charmed_postgresql".to_string()]).unwrap();

    let summary = run_plugins(&mut host, &mut plugins, false).unwrap();
    assert_eq!(summary.ran, vec!["charmed_postgresql"]);

    let patroni = read(&out, &format!("{}/patroni/patroni.yaml", ETC));
    assert!(!patroni.contains("op-secret"));
    assert!(patroni.contains("password: \"*********\""));

    let plugin = host.manifest().plugin("charmed_postgresql").unwrap();
    assert!(!plugin.commands.is_empty());
    assert!(plugin.commands.iter().all(|c| c.artifact.is_none()));
    assert!(out.join(MANIFEST_NAME).exists());
}

#[test]
fn test_undetected_plugins_leave_empty_bundle() {
    let root = FakeSysroot::new();
    let (_keep, out) = bundle_dir();
    let mut host = LocalHost::new(root.path(), &out).unwrap();
    let mut plugins = select_plugins(&[]).unwrap();

    let summary = run_plugins(&mut host, &mut plugins, false).unwrap();
    assert!(summary.ran.is_empty());
    assert!(host.manifest().plugins.is_empty());
    assert!(out.join(MANIFEST_NAME).exists());
}

#[test]
fn test_existing_bundle_not_overwritten() {
    let root = FakeSysroot::new();
    let (_keep, out) = bundle_dir();
    let mut host = LocalHost::new(root.path(), &out).unwrap();
    run_plugins(&mut host, &mut [], false).unwrap();

    assert!(matches!(
        LocalHost::new(root.path(), &out),
        Err(Error::BundleExists(_))
    ));
}
