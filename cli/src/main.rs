mod dispatch;
mod mailing;
mod seed;
mod stats;
mod util;

use clap::{Arg, Command};
use courier::{config, Config};
use tokio_util::sync::CancellationToken;

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cmd().get_matches();

    // Without an explicit path we look for the default config file in the
    // working directory and fall back to defaults if it's not there.
    let mut config: Config = match matches.get_one::<String>("config") {
        Some(path) => config::load_from(path)?,
        None => config::load().unwrap_or_default(),
    };
    if let Some(level) = matches.get_one::<String>("verbosity") {
        config.tracing.level = level.parse()?;
    }

    let _guard = courier::tracing::init(&config)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("Initiating graceful shutdown...");
                cancel.cancel();
            }
        }
    });

    match matches.subcommand() {
        Some(("run-dispatch", m)) => dispatch::run(m, &config).await?,
        Some(("watch", m)) => dispatch::watch(m, &config, cancel.clone()).await?,
        Some(("start", m)) => mailing::start(m, &config).await?,
        Some(("toggle", m)) => mailing::toggle(m, &config)?,
        Some(("block", m)) => mailing::block(m, &config)?,
        Some(("stats", m)) => stats::run(m, &config)?,
        Some(("seed", _)) => seed::run(&config)?,
        _ => unreachable!(),
    }

    Ok(())
}

pub fn cmd() -> Command {
    Command::new("courier")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .infer_subcommands(true)
        .version(VERSION)
        .about("Scheduled bulk mailing dispatch")
        .subcommand(dispatch::cmd())
        .subcommand(dispatch::watch_cmd())
        .subcommand(mailing::start_cmd())
        .subcommand(mailing::toggle_cmd())
        .subcommand(mailing::block_cmd())
        .subcommand(stats::cmd())
        .subcommand(seed::cmd())
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .global(true)
                .help("Path to the config file"),
        )
        .arg(
            Arg::new("verbosity")
                .long("verbosity")
                .short('v')
                .display_order(100)
                .value_name("level")
                .value_parser(["trace", "debug", "info", "warn", "error", "none"])
                .global(true)
                .help("Set the verbosity of the log output"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cmd() {
        cmd().debug_assert();
    }

    #[test]
    fn parses_targeted_run() {
        let matches = cmd()
            .try_get_matches_from(["courier", "run-dispatch", "--mailing-id", "7", "--force"])
            .unwrap();
        let (name, m) = matches.subcommand().unwrap();
        assert_eq!(name, "run-dispatch");
        assert_eq!(m.get_one::<u64>("mailing-id"), Some(&7));
        assert!(m.get_flag("force"));
        assert!(!m.get_flag("simulate"));
    }

    #[test]
    fn force_needs_a_mailing_id() {
        assert!(cmd()
            .try_get_matches_from(["courier", "run-dispatch", "--force"])
            .is_err());
    }

    #[test]
    fn start_needs_a_user() {
        assert!(cmd().try_get_matches_from(["courier", "start", "3"]).is_err());
        assert!(cmd()
            .try_get_matches_from(["courier", "start", "3", "--user", "1"])
            .is_ok());
    }

    #[test]
    fn parses_block() {
        let matches = cmd()
            .try_get_matches_from(["courier", "block", "5", "--user", "2"])
            .unwrap();
        let (name, m) = matches.subcommand().unwrap();
        assert_eq!(name, "block");
        assert_eq!(m.get_one::<u64>("user-id"), Some(&5));
        assert_eq!(m.get_one::<u64>("user"), Some(&2));
    }
}
