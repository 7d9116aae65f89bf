// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Arguments shared by plan and collect
fn run_args() -> Vec<Arg> {
    vec![
        Arg::new("plugin")
            .short('p')
            .long("plugin")
            .value_name("NAME")
            .action(ArgAction::Append)
            .help("Plugin to run (repeatable; default: every detected plugin)"),
        Arg::new("sysroot")
            .long("sysroot")
            .value_name("DIR")
            .help("Root of the system to collect from"),
        Arg::new("option")
            .short('k')
            .long("option")
            .value_name("PLUGIN.OPT=VAL")
            .action(ArgAction::Append)
            .help("Plugin option, e.g. pcp.pmloggerfiles=24 (repeatable)"),
        Arg::new("all_logs")
            .long("all-logs")
            .action(ArgAction::SetTrue)
            .help("Collect all logs regardless of size limits"),
        Arg::new("log_size")
            .long("log-size")
            .value_name("MB")
            .help("Default size cap for log files in MB"),
    ]
}

fn build_cli() -> Command {
    Command::new("diagplug")
        .version(env!("CARGO_PKG_VERSION"))
        .author("diagplug contributors")
        .about("Diagnostic collection for charmed PostgreSQL and Performance Co-Pilot")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Run settings file (default: /etc/diagplug/diagplug.toml)"),
        )
        .subcommand(Command::new("list").about("List plugins and their options"))
        .subcommand(
            Command::new("plan")
                .about("Show the directives plugins would issue")
                .args(run_args()),
        )
        .subcommand(
            Command::new("collect")
                .about("Collect diagnostics into a directory")
                .args(run_args())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("DIR")
                        .required(true)
                        .help("Output directory for the bundle"),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_name("SECS")
                        .help("Timeout for each command in seconds"),
                )
                .arg(
                    Arg::new("run_commands")
                        .long("run-commands")
                        .action(ArgAction::SetTrue)
                        .help("Run commands even when the sysroot is not /"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("diagplug.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
