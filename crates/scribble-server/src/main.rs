//! `scribble-quest` command line: `serve` and `check-config`

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use scribble_core::ProgressionEngine;
use scribble_openai::OpenAiClient;
use scribble_server::config::{ServerConfig, API_KEY_ENV};
use scribble_server::{logging, routes, spawn_sweeper};
use std::net::SocketAddr;
use std::path::PathBuf;

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .short('c')
        .default_value("scribble-quest.toml")
        .value_parser(value_parser!(PathBuf))
        .help("Path to the TOML configuration file");

    Command::new("scribble-quest")
        .version(scribble_core::VERSION)
        .about("Scribble Quest drawing game server")
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP server (default)")
                .arg(config_arg.clone())
                .arg(
                    Arg::new("bind")
                        .long("bind")
                        .value_parser(value_parser!(SocketAddr))
                        .help("Listen address, overrides [server].bind"),
                )
                .arg(
                    Arg::new("log-json")
                        .long("log-json")
                        .action(ArgAction::SetTrue)
                        .help("Emit logs as JSON lines"),
                ),
        )
        .subcommand(
            Command::new("check-config")
                .about("Validate and print the effective configuration")
                .arg(config_arg),
        )
}

fn load_config(args: &ArgMatches) -> anyhow::Result<ServerConfig> {
    let path = args
        .get_one::<PathBuf>("config")
        .context("missing --config")?;
    let config = ServerConfig::load(path)?.with_api_key(std::env::var(API_KEY_ENV).ok());
    config.validate().context("configuration rejected")?;
    Ok(config)
}

async fn serve(args: &ArgMatches) -> anyhow::Result<()> {
    logging::init(args.get_flag("log-json"));

    let mut config = load_config(args)?;
    if let Some(bind) = args.get_one::<SocketAddr>("bind") {
        config.server.bind = *bind;
    }

    let client = OpenAiClient::new(config.openai.clone()).context("building OpenAI client")?;
    let engine = ProgressionEngine::new(config.game.clone(), scribble_openai::capabilities(client));
    let sweeper = spawn_sweeper(engine.clone(), config.sweep_interval());

    let (addr, server) = warp::serve(routes::api(engine, config.openai.api_key.is_some()))
        .try_bind_with_graceful_shutdown(config.server.bind, shutdown_signal())
        .with_context(|| format!("binding {}", config.server.bind))?;
    tracing::info!(%addr, version = scribble_core::VERSION, "scribble quest listening");

    server.await;
    sweeper.abort();
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

fn check_config(args: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(args)?;
    println!("{}", config.to_toml().context("rendering configuration")?);
    let key = if config.openai.api_key.is_some() { "set" } else { "missing" };
    println!("# api key: {key}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("check-config", args)) => check_config(args),
        Some(("serve", args)) => serve(args).await,
        _ => {
            let defaults = cli().get_matches_from(["scribble-quest", "serve"]);
            match defaults.subcommand() {
                Some((_, args)) => serve(args).await,
                None => anyhow::bail!("no command"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn serve_flags_parse() {
        let matches = cli()
            .try_get_matches_from(["scribble-quest", "serve", "--bind", "0.0.0.0:9000", "--log-json"])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "serve");
        assert_eq!(
            args.get_one::<SocketAddr>("bind").copied(),
            Some("0.0.0.0:9000".parse().unwrap())
        );
        assert!(args.get_flag("log-json"));
        assert_eq!(
            args.get_one::<PathBuf>("config"),
            Some(&PathBuf::from("scribble-quest.toml"))
        );
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        assert!(cli()
            .try_get_matches_from(["scribble-quest", "serve", "--bind", "nowhere"])
            .is_err());
    }
}
