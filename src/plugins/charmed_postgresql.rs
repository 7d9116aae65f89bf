// src/plugins/charmed_postgresql.rs

//! Charmed PostgreSQL
//!
//! Collects the snap's PostgreSQL, Patroni, pgBackRest and PgBouncer
//! configuration and logs, cluster state from `patronictl`, catalog
//! listings from `psql`, and the Patroni and exporter metrics.
//!
//! Connection details come from Patroni's own configuration. Every value is
//! optional: a missing cluster name, host, port or user just drops the
//! matching argument, and the superuser password only ever travels in
//! `PGPASSWORD`.

use super::{get_option, Plugin};
use crate::command::CommandSpec;
use crate::config::PatroniConfig;
use crate::host::{CopySpec, Host};
use crate::options::{OptionValue, PluginOpt};
use crate::redact::{
    RedactionRule, INI_S3_KEY, PLACEHOLDER, USERLIST_SECRET, YAML_FLOW_PASSWORD, YAML_PASSWORD,
};
use regex::bytes::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SNAP_NAME: &str = "charmed-postgresql";
pub const SNAP_COMMON_PATH: &str = "/var/snap/charmed-postgresql/common";
pub const SNAP_CURRENT_PATH: &str = "/var/snap/charmed-postgresql/current";

pub const POSTGRESQL_CONF: &str = "/var/snap/charmed-postgresql/common/var/lib/postgresql";
pub const POSTGRESQL_LOGS: &str = "/var/snap/charmed-postgresql/common/var/log/postgresql";
pub const PATRONI_CONF: &str = "/var/snap/charmed-postgresql/current/etc/patroni";
pub const PATRONI_LOGS: &str = "/var/snap/charmed-postgresql/common/var/log/patroni";
pub const PGBACKREST_CONF: &str = "/var/snap/charmed-postgresql/current/etc/pgbackrest";
pub const PGBACKREST_LOGS: &str = "/var/snap/charmed-postgresql/common/var/log/pgbackrest";
pub const PGBOUNCER_CONF: &str = "/var/snap/charmed-postgresql/current/etc/pgbouncer";
pub const PGBOUNCER_LOGS: &str = "/var/snap/charmed-postgresql/common/var/log/pgbouncer";

/// Patroni config file names, preferred first
const PATRONI_CONFIG_FILES: [&str; 2] = ["patroni.yaml", "patroni.yml"];

pub const SNAP_DAEMON_USER: &str = "snap_daemon";
pub const PSQL: &str = "charmed-postgresql.psql";
pub const PATRONICTL: &str = "charmed-postgresql.patronictl";

/// postgres_exporter listens here unless told otherwise
pub const EXPORTER_ADDRESS: &str = "127.0.0.1:9187";

/// Option: capture Patroni and exporter metrics
pub const OPT_METRICS: &str = "metrics";

#[derive(Debug, Default)]
pub struct CharmedPostgresql;

impl CharmedPostgresql {
    pub fn new() -> Self {
        Self
    }

    /// System path of the Patroni config file
    pub fn patroni_config_path(&self, host: &dyn Host) -> PathBuf {
        let dir = Path::new(PATRONI_CONF);
        PATRONI_CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| host.path_exists(path))
            .unwrap_or_else(|| dir.join(PATRONI_CONFIG_FILES[0]))
    }

    /// Freshly read Patroni configuration; empty if absent or unparsable
    pub fn patroni_config(&self, host: &dyn Host) -> PatroniConfig {
        PatroniConfig::load(&host.resolve(&self.patroni_config_path(host)))
    }

    pub fn patroni_cluster_name(&self, host: &dyn Host) -> Option<String> {
        self.patroni_config(host).cluster_name().map(str::to_string)
    }

    pub fn patroni_address(&self, host: &dyn Host) -> Option<String> {
        self.patroni_config(host).restapi_address().map(str::to_string)
    }

    pub fn postgresql_host(&self, host: &dyn Host) -> Option<String> {
        self.patroni_config(host).postgresql_host()
    }

    pub fn postgresql_port(&self, host: &dyn Host) -> Option<String> {
        self.patroni_config(host).postgresql_port()
    }

    pub fn postgresql_username(&self, host: &dyn Host) -> Option<String> {
        self.patroni_config(host).superuser_username().map(str::to_string)
    }

    pub fn postgresql_password(&self, host: &dyn Host) -> Option<String> {
        self.patroni_config(host).superuser_password().map(str::to_string)
    }

    /// `patronictl --config-file <cfg> <subcommand> [cluster]` as snap_daemon
    pub fn patronictl(&self, host: &dyn Host, subcommand: &str) -> CommandSpec {
        let config_file = self.patroni_config_path(host);
        let cmd = CommandSpec::run_as(SNAP_DAEMON_USER, PATRONICTL)
            .arg("--config-file")
            .arg(config_file.to_string_lossy())
            .arg(subcommand);
        match self.patroni_cluster_name(host) {
            Some(cluster) => cmd.arg(cluster),
            None => {
                debug!("No Patroni scope found; patronictl {} uses its config default", subcommand);
                cmd
            }
        }
    }

    /// `psql ... -c <meta_command>` as snap_daemon, password via `PGPASSWORD`
    pub fn psql(&self, host: &dyn Host, meta_command: &str) -> CommandSpec {
        let cmd = CommandSpec::run_as(SNAP_DAEMON_USER, PSQL)
            .opt_arg("-U", self.postgresql_username(host).as_deref())
            .opt_arg("-h", self.postgresql_host(host).as_deref())
            .opt_arg("-p", self.postgresql_port(host).as_deref())
            .args(["-d", "postgres", "-P", "pager=off", "-c", meta_command]);
        match self.postgresql_password(host) {
            Some(password) => cmd.env("PGPASSWORD", password),
            None => cmd,
        }
    }

    /// Every credential-bearing file type this plugin collects
    pub fn redaction_rules(&self) -> Vec<RedactionRule> {
        let quoted = format!("${{1}}\"{}\"", PLACEHOLDER);
        let bare = format!("${{1}}{}", PLACEHOLDER);
        let specs: [(String, &Regex, &str); 5] = [
            (format!("{}/*", PATRONI_CONF), &*YAML_PASSWORD, quoted.as_str()),
            (format!("{}/*", PATRONI_CONF), &*YAML_FLOW_PASSWORD, quoted.as_str()),
            (format!("{}/pgbackrest.conf", PGBACKREST_CONF), &*INI_S3_KEY, bare.as_str()),
            (format!("{}/userlist.txt", PGBOUNCER_CONF), &*USERLIST_SECRET, quoted.as_str()),
            (format!("{}/pgbouncer/userlist.txt", PGBOUNCER_CONF), &*USERLIST_SECRET, quoted.as_str()),
        ];

        let mut rules = Vec::with_capacity(specs.len());
        for (glob, pattern, replacement) in specs {
            match RedactionRule::new(&glob, pattern, replacement) {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!("Skipping redaction rule for {}: {}", glob, e),
            }
        }
        rules
    }
}

impl Plugin for CharmedPostgresql {
    fn name(&self) -> &'static str {
        "charmed_postgresql"
    }

    fn short_desc(&self) -> &'static str {
        "Charmed PostgreSQL"
    }

    fn option_list(&self) -> Vec<PluginOpt> {
        vec![PluginOpt::new(
            OPT_METRICS,
            OptionValue::Bool(true),
            "collect Patroni and PostgreSQL exporter metrics",
        )]
    }

    fn check_enabled(&self, host: &dyn Host) -> bool {
        host.path_exists(Path::new(SNAP_COMMON_PATH)) || host.path_exists(Path::new(SNAP_CURRENT_PATH))
    }

    fn setup(&mut self, host: &mut dyn Host) {
        // Keys and certificates
        host.add_forbidden_path(&format!("{}/*.pem", PATRONI_CONF));
        host.add_forbidden_path(&format!("{}/*.pem", PGBOUNCER_CONF));

        for path in [
            format!("{}/*.conf*", POSTGRESQL_CONF),
            POSTGRESQL_LOGS.to_string(),
            format!("{}/*.y*ml", PATRONI_CONF),
            PATRONI_LOGS.to_string(),
            PGBACKREST_CONF.to_string(),
            PGBACKREST_LOGS.to_string(),
            PGBOUNCER_CONF.to_string(),
            PGBOUNCER_LOGS.to_string(),
        ] {
            host.add_copy_spec(CopySpec::new(path));
        }

        host.add_journal(&format!("snap.{}.*", SNAP_NAME));

        host.add_cmd_output(
            CommandSpec::new("snap")
                .args(["info", SNAP_NAME])
                .suggest_filename("snap-info"),
        );
        // Initialization and bootstrap logs
        host.add_cmd_output(
            CommandSpec::new("snap")
                .args(["logs", format!("{}.patroni", SNAP_NAME).as_str(), "-n", "all"])
                .suggest_filename("patroni-logs-snap"),
        );

        for (subcommand, artifact) in [
            ("topology", "patroni-topology"),
            ("history", "patroni-history"),
            ("show-config", "patroni-dcs-config"),
        ] {
            let cmd = self.patronictl(&*host, subcommand).suggest_filename(artifact);
            host.add_cmd_output(cmd);
        }

        for (meta, artifact) in [
            (r"\l+", "postgresql-databases"),
            (r"\duS+", "postgresql-users"),
            (r"\dtS+", "postgresql-tables"),
        ] {
            let cmd = self.psql(&*host, meta).suggest_filename(artifact);
            host.add_cmd_output(cmd);
        }

        if get_option(&*self, &*host, OPT_METRICS).as_bool() {
            match self.patroni_address(&*host) {
                Some(address) => host.add_cmd_output(
                    CommandSpec::new("curl")
                        .args(["-vk", format!("{}/metrics", address).as_str()])
                        .suggest_filename("metrics-patroni"),
                ),
                None => debug!("No Patroni REST API address; skipping Patroni metrics"),
            }
            host.add_cmd_output(
                CommandSpec::new("curl")
                    .args(["-vk", format!("{}/metrics", EXPORTER_ADDRESS).as_str()])
                    .suggest_filename("metrics-postgresql"),
            );
        }
    }

    fn postproc(&mut self, host: &mut dyn Host) {
        for rule in self.redaction_rules() {
            host.do_path_regex_sub(&rule);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{join_sysroot, HostBackend};
    use crate::recording::RecordingHost;
    use std::fs;
    use tempfile::TempDir;

    const PATRONI_YAML: &str = r#"
scope: cluster1
restapi:
  connect_address: 10.0.0.5:8008
postgresql:
  connect_address: 10.0.0.5:5432
  authentication:
    superuser:
      username: operator
      password: "s3cr3t"
"#;

    fn sysroot_with(file: &str, content: &str) -> TempDir {
        let root = TempDir::new().unwrap();
        let path = join_sysroot(root.path(), &Path::new(PATRONI_CONF).join(file));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        root
    }

    #[test]
    fn test_accessors() {
        let root = sysroot_with("patroni.yaml", PATRONI_YAML);
        let host = RecordingHost::new(root.path());
        let plugin = CharmedPostgresql::new();

        assert_eq!(plugin.patroni_cluster_name(&host).as_deref(), Some("cluster1"));
        assert_eq!(plugin.patroni_address(&host).as_deref(), Some("10.0.0.5:8008"));
        assert_eq!(plugin.postgresql_host(&host).as_deref(), Some("10.0.0.5"));
        assert_eq!(plugin.postgresql_port(&host).as_deref(), Some("5432"));
        assert_eq!(plugin.postgresql_username(&host).as_deref(), Some("operator"));
        assert_eq!(plugin.postgresql_password(&host).as_deref(), Some("s3cr3t"));
    }

    #[test]
    fn test_accessors_without_config() {
        let root = TempDir::new().unwrap();
        let host = RecordingHost::new(root.path());
        let plugin = CharmedPostgresql::new();

        assert_eq!(plugin.patroni_cluster_name(&host), None);
        assert_eq!(plugin.postgresql_host(&host), None);
        assert_eq!(plugin.postgresql_password(&host), None);
    }

    #[test]
    fn test_legacy_yml_fallback() {
        let root = sysroot_with("patroni.yml", "scope: legacy\n");
        let host = RecordingHost::new(root.path());
        let plugin = CharmedPostgresql::new();

        assert_eq!(
            plugin.patroni_config_path(&host),
            Path::new(PATRONI_CONF).join("patroni.yml")
        );
        assert_eq!(plugin.patroni_cluster_name(&host).as_deref(), Some("legacy"));
    }

    #[test]
    fn test_psql_command() {
        let root = sysroot_with("patroni.yaml", PATRONI_YAML);
        let host = RecordingHost::new(root.path());
        let cmd = CharmedPostgresql::new().psql(&host, r"\l+");

        let line = cmd.command_line();
        assert!(line.starts_with("runuser -u snap_daemon -- charmed-postgresql.psql "));
        assert!(line.contains("-U operator -h 10.0.0.5 -p 5432"));
        assert!(line.ends_with(r"-d postgres -P pager=off -c '\l+'"));
        assert!(!line.contains("s3cr3t"));
        assert!(!cmd.args.iter().any(|a| a.contains("s3cr3t")));
        assert_eq!(cmd.env.get("PGPASSWORD").map(String::as_str), Some("s3cr3t"));
    }

    #[test]
    fn test_psql_degrades_without_credentials() {
        let root = sysroot_with("patroni.yaml", "postgresql:\n  connect_address: 10.0.0.5:5432\n");
        let host = RecordingHost::new(root.path());
        let cmd = CharmedPostgresql::new().psql(&host, r"\duS+");

        assert!(!cmd.args.contains(&"-U".to_string()));
        assert!(cmd.command_line().contains("-h 10.0.0.5 -p 5432"));
        assert!(cmd.env.is_empty());
    }

    #[test]
    fn test_patronictl_command() {
        let root = sysroot_with("patroni.yaml", PATRONI_YAML);
        let host = RecordingHost::new(root.path());
        let cmd = CharmedPostgresql::new().patronictl(&host, "topology");
        assert_eq!(
            cmd.command_line(),
            "runuser -u snap_daemon -- charmed-postgresql.patronictl --config-file \
             /var/snap/charmed-postgresql/current/etc/patroni/patroni.yaml topology cluster1"
        );

        let empty = TempDir::new().unwrap();
        let host = RecordingHost::new(empty.path());
        let cmd = CharmedPostgresql::new().patronictl(&host, "history");
        assert_eq!(cmd.args.last().map(String::as_str), Some("history"));
    }

    #[test]
    fn test_setup_directives() {
        let root = sysroot_with("patroni.yaml", PATRONI_YAML);
        let mut host = RecordingHost::new(root.path());
        let mut plugin = CharmedPostgresql::new();
        host.begin_plugin(plugin.name());
        plugin.setup(&mut host);

        let plan = host.plan("charmed_postgresql").unwrap();
        assert_eq!(
            plan.forbidden,
            vec![
                format!("{}/*.pem", PATRONI_CONF),
                format!("{}/*.pem", PGBOUNCER_CONF)
            ]
        );
        assert_eq!(plan.copy_specs.len(), 8);
        assert!(plan.copy_paths().contains(&format!("{}/*.y*ml", PATRONI_CONF).as_str()));
        assert_eq!(plan.journals, vec!["snap.charmed-postgresql.*"]);

        for artifact in [
            "snap-info",
            "patroni-logs-snap",
            "patroni-topology",
            "patroni-history",
            "patroni-dcs-config",
            "postgresql-databases",
            "postgresql-users",
            "postgresql-tables",
            "metrics-patroni",
            "metrics-postgresql",
        ] {
            assert!(plan.command(artifact).is_some(), "missing {}", artifact);
        }
        assert_eq!(
            plan.command("metrics-patroni").unwrap().args,
            vec!["-vk", "10.0.0.5:8008/metrics"]
        );
        for cmd in &plan.commands {
            assert!(!cmd.command_line().contains("s3cr3t"));
        }
    }

    #[test]
    fn test_setup_without_config_or_metrics() {
        let root = TempDir::new().unwrap();
        let mut options = crate::options::OptionStore::new();
        options.set_override("charmed_postgresql.metrics=false").unwrap();
        let mut host = RecordingHost::new(root.path()).with_options(options);
        let mut plugin = CharmedPostgresql::new();
        host.begin_plugin(plugin.name());
        plugin.setup(&mut host);

        let plan = host.plan("charmed_postgresql").unwrap();
        assert!(plan.command("metrics-patroni").is_none());
        assert!(plan.command("metrics-postgresql").is_none());
        assert!(plan.command("postgresql-users").unwrap().env.is_empty());
        assert_eq!(plan.command("patroni-topology").unwrap().args.last().unwrap(), "topology");
    }

    #[test]
    fn test_redaction_rules_cover_secret_files() {
        let rules = CharmedPostgresql::new().redaction_rules();
        let covered = |path: &str| rules.iter().any(|r| r.matches_path(Path::new(path)));

        assert!(covered(&format!("{}/patroni.yaml", PATRONI_CONF)));
        assert!(covered(&format!("{}/pgbackrest.conf", PGBACKREST_CONF)));
        assert!(covered(&format!("{}/userlist.txt", PGBOUNCER_CONF)));
        assert!(covered(&format!("{}/pgbouncer/userlist.txt", PGBOUNCER_CONF)));
        assert!(!covered(&format!("{}/postgresql.log", POSTGRESQL_LOGS)));
    }

    #[test]
    fn test_patroni_rules_mask_block_and_flow_passwords() {
        let path = format!("{}/patroni.yaml", PATRONI_CONF);
        let input = "superuser:\r\n  password: op-secret\r\nreplication: {username: rep, password: rep-secret}\n";
        let mut content = input.as_bytes().to_vec();
        for rule in CharmedPostgresql::new().redaction_rules() {
            if rule.matches_path(Path::new(&path)) {
                let (out, _) = rule.apply(&content);
                content = out.into_owned();
            }
        }
        let out = String::from_utf8(content).unwrap();
        assert_eq!(
            out,
            "superuser:\r\n  password: \"*********\"\r\nreplication: {username: rep, password: \"*********\"}\n"
        );
    }

    #[test]
    fn test_check_enabled() {
        let plugin = CharmedPostgresql::new();
        let empty = TempDir::new().unwrap();
        assert!(!plugin.check_enabled(&RecordingHost::new(empty.path())));

        let root = sysroot_with("patroni.yaml", "");
        assert!(plugin.check_enabled(&RecordingHost::new(root.path())));
    }
}
