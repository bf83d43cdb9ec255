//! # fapi-runner
//!
//! Command-line front-end for the Binance USDT-M futures bot.
//!
//! Places one MARKET / LIMIT / STOP_LIMIT order, or runs a TWAP, and prints
//! a single JSON document on stdout:
//!
//! ```text
//! {"ok": true,  "result": { ... }}
//! {"ok": false, "error": "..."}
//! ```
//!
//! Logs go to stderr and to a rotating file (`bot.log` unless configured).
//!
//! # Usage
//!
//! ```bash
//! fapi-runner --api-key K --api-secret S --symbol BTCUSDT --side BUY --type MARKET --quantity 0.001
//! fapi-runner --config bot.json --symbol BTCUSDT --side SELL --type TWAP --quantity 0.01 --slices 5 --interval 30
//! ```
//!
//! Credentials may also come from `--config` or `FAPI_API_KEY` / `FAPI_API_SECRET`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use fapi_core::Environment;
use fapi_core::config::{AppConfig, load_config};
use fapi_core::logging::LogGuard;
use fapi_td::{CancelHandle, ClientConfig, Credentials, FuturesClient};
use serde_json::{Value, json};
use tracing::{error, info, warn};

/// Log file used when neither the config nor the command line names one.
const DEFAULT_LOG_FILE: &str = "bot.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OrderType {
    #[value(name = "MARKET")]
    Market,
    #[value(name = "LIMIT")]
    Limit,
    #[value(name = "STOP_LIMIT")]
    StopLimit,
    #[value(name = "TWAP")]
    Twap,
}

/// Binance Futures trading bot (USDT-M).
#[derive(Debug, Parser)]
#[command(name = "fapi-runner", about = "Binance Futures trading bot (USDT-M)")]
struct Cli {
    /// Binance API key.
    #[arg(long)]
    api_key: Option<String>,

    /// Binance API secret.
    #[arg(long)]
    api_secret: Option<String>,

    /// Trading symbol, e.g. BTCUSDT.
    #[arg(long)]
    symbol: String,

    /// BUY or SELL.
    #[arg(long)]
    side: String,

    /// Order type.
    #[arg(long = "type", value_enum, ignore_case = true)]
    order_type: OrderType,

    /// Order quantity (base asset). For TWAP, the total.
    #[arg(long)]
    quantity: Option<f64>,

    /// Limit price (LIMIT) or limit leg (STOP_LIMIT).
    #[arg(long)]
    price: Option<f64>,

    /// Stop trigger price (STOP_LIMIT).
    #[arg(long)]
    stop_price: Option<f64>,

    /// Time in force: GTC, IOC or FOK.
    #[arg(long, default_value = "GTC")]
    tif: String,

    /// Send reduceOnly=true.
    #[arg(long)]
    reduce_only: bool,

    /// Trade on production instead of testnet.
    #[arg(long)]
    production: bool,

    /// TWAP: number of slices.
    #[arg(long)]
    slices: Option<usize>,

    /// TWAP: seconds between slices.
    #[arg(long)]
    interval: Option<f64>,

    /// Optional JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Rotating log file path.
    #[arg(long)]
    log_file: Option<String>,

    /// recvWindow for signed requests, in milliseconds.
    #[arg(long)]
    recv_window: Option<u64>,

    /// HTTP timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Measure the server clock offset before trading.
    #[arg(long)]
    sync_time: bool,
}

/// Validated intent, resolved before any network activity.
#[derive(Debug, Clone, PartialEq)]
enum Action {
    Market { quantity: f64 },
    Limit { quantity: f64, price: f64 },
    StopLimit { quantity: f64, stop_price: f64, price: f64 },
    Twap { total: f64, slices: usize, interval: Duration },
}

impl Action {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let action = match cli.order_type {
            OrderType::Market => Self::Market {
                quantity: cli.quantity.context("--quantity is required for MARKET")?,
            },
            OrderType::Limit => match (cli.quantity, cli.price) {
                (Some(quantity), Some(price)) => Self::Limit { quantity, price },
                _ => bail!("--quantity and --price are required for LIMIT"),
            },
            OrderType::StopLimit => match (cli.quantity, cli.price, cli.stop_price) {
                (Some(quantity), Some(price), Some(stop_price)) => Self::StopLimit {
                    quantity,
                    stop_price,
                    price,
                },
                _ => bail!("--quantity, --price and --stop-price are required for STOP_LIMIT"),
            },
            OrderType::Twap => match (cli.quantity, cli.slices, cli.interval) {
                (Some(total), Some(slices), Some(interval)) => Self::Twap {
                    total,
                    slices,
                    interval: Duration::try_from_secs_f64(interval)
                        .map_err(|_| anyhow::anyhow!("--interval must be a non-negative number of seconds"))?,
                },
                _ => bail!("--quantity, --slices and --interval are required for TWAP"),
            },
        };
        Ok(action)
    }
}

/// Overlay command-line settings on the loaded config.
fn apply_cli(cli: &Cli, config: &mut AppConfig) {
    if let Some(key) = &cli.api_key {
        config.exchange.api_key = key.clone();
    }
    if let Some(secret) = &cli.api_secret {
        config.exchange.api_secret = secret.clone();
    }
    if cli.production {
        config.exchange.environment = Environment::Production;
    }
    if let Some(rw) = cli.recv_window {
        config.exchange.recv_window = rw;
    }
    if let Some(t) = cli.timeout {
        config.exchange.timeout_secs = t;
    }
    if cli.sync_time {
        config.exchange.sync_time = true;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(file) = &cli.log_file {
        config.logging.file = Some(file.clone());
    }
    if config.logging.file.is_none() {
        config.logging.file = Some(DEFAULT_LOG_FILE.to_string());
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path).with_context(|| format!("loading {}", path.display()))?,
        None => {
            let mut config = AppConfig::default();
            config.apply_env_overrides()?;
            config
        }
    };
    apply_cli(cli, &mut config);
    config.validate()?;
    Ok(config)
}

async fn run(cli: &Cli, config: &AppConfig, action: Action) -> Result<Value> {
    let credentials = Credentials::from(&config.exchange);
    if credentials.is_empty() {
        bail!("API key and secret are required (--api-key/--api-secret, config file or FAPI_API_KEY/FAPI_API_SECRET)");
    }
    let client = FuturesClient::connect(credentials, ClientConfig::from(&config.exchange)).await?;

    let (symbol, side, tif) = (cli.symbol.as_str(), cli.side.as_str(), cli.tif.as_str());
    let result = match action {
        Action::Market { quantity } => fapi_td::market_order(&client, symbol, side, quantity, cli.reduce_only).await?,
        Action::Limit { quantity, price } => {
            fapi_td::limit_order(&client, symbol, side, quantity, price, tif, cli.reduce_only).await?
        }
        Action::StopLimit {
            quantity,
            stop_price,
            price,
        } => {
            fapi_td::stop_limit_order(&client, symbol, side, quantity, stop_price, price, tif, cli.reduce_only).await?
        }
        Action::Twap {
            total,
            slices,
            interval,
        } => {
            let cancel = CancelHandle::new();
            let watcher = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("Ctrl+C received, cancelling TWAP at the next slice boundary");
                        cancel.cancel();
                    }
                })
            };
            let report = fapi_td::twap_market(&client, symbol, side, total, slices, interval, &cancel).await;
            watcher.abort();
            serde_json::to_value(report?)?
        }
    };
    Ok(result)
}

/// Configuration and logging, ready before any order work starts.
fn setup(cli: &Cli) -> Result<(AppConfig, LogGuard)> {
    // 1. Configuration: file / env, then command line on top
    let config = resolve_config(cli)?;

    // 2. Logging
    let guard = fapi_core::logging::init_logging(&config.logging)?;
    Ok((config, guard))
}

/// The single JSON document printed on stdout.
fn envelope(outcome: &Result<Value>) -> Value {
    match outcome {
        Ok(result) => json!({ "ok": true, "result": result }),
        Err(e) => json!({ "ok": false, "error": format!("{e:#}") }),
    }
}

fn report(outcome: Result<Value>) -> ExitCode {
    match &outcome {
        Ok(result) => info!(%result, "order result"),
        Err(e) => error!(error = %format!("{e:#}"), "order failed"),
    }
    println!("{:#}", envelope(&outcome));
    if outcome.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, _log_guard) = match setup(&cli) {
        Ok(ready) => ready,
        Err(e) => return report(Err(e)),
    };
    info!(
        environment = config.exchange.environment.label(),
        order_type = ?cli.order_type,
        symbol = %cli.symbol,
        side = %cli.side,
        "fapi-runner starting"
    );

    // 3. Place the order(s)
    let outcome = match Action::from_cli(&cli) {
        Ok(action) => run(&cli, &config, action).await,
        Err(e) => Err(e),
    };

    // 4. Report
    report(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let base = ["fapi-runner", "--symbol", "BTCUSDT", "--side", "BUY"];
        Cli::try_parse_from(base.iter().chain(args)).unwrap()
    }

    #[test]
    fn order_type_is_case_insensitive() {
        assert_eq!(parse(&["--type", "stop_limit"]).order_type, OrderType::StopLimit);
        assert_eq!(parse(&["--type", "Twap"]).order_type, OrderType::Twap);
        assert!(Cli::try_parse_from(["fapi-runner", "--symbol", "X", "--side", "BUY", "--type", "OCO"]).is_err());
    }

    #[test]
    fn required_fields_per_type() {
        let cli = parse(&["--type", "MARKET"]);
        assert!(Action::from_cli(&cli).is_err());

        let cli = parse(&["--type", "LIMIT", "--quantity", "1", "--price", "100"]);
        assert_eq!(
            Action::from_cli(&cli).unwrap(),
            Action::Limit {
                quantity: 1.0,
                price: 100.0
            }
        );

        let cli = parse(&["--type", "STOP_LIMIT", "--quantity", "1", "--price", "100"]);
        assert!(Action::from_cli(&cli).is_err());
    }

    #[test]
    fn twap_interval_must_be_non_negative() {
        let cli = parse(&["--type", "TWAP", "--quantity", "0.01", "--slices", "5", "--interval", "1.5"]);
        assert_eq!(
            Action::from_cli(&cli).unwrap(),
            Action::Twap {
                total: 0.01,
                slices: 5,
                interval: Duration::from_millis(1500)
            }
        );

        let cli = parse(&["--type", "TWAP", "--quantity", "0.01", "--slices", "5", "--interval=-1"]);
        assert!(Action::from_cli(&cli).is_err());
    }

    #[test]
    fn cli_overrides_config() {
        let cli = parse(&[
            "--type",
            "MARKET",
            "--api-key",
            "k",
            "--api-secret",
            "s",
            "--production",
            "--recv-window",
            "2000",
            "--log-level",
            "debug",
        ]);
        let mut config = AppConfig::default();
        apply_cli(&cli, &mut config);
        assert_eq!(config.exchange.api_key, "k");
        assert_eq!(config.exchange.api_secret, "s");
        assert_eq!(config.exchange.environment, Environment::Production);
        assert_eq!(config.exchange.recv_window, 2000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file.as_deref(), Some(DEFAULT_LOG_FILE));
    }

    #[test]
    fn setup_failures_use_the_error_envelope() {
        let cli = parse(&["--type", "MARKET", "--config", "/nonexistent/fapi-runner.json"]);
        let err = setup(&cli).map(|_| ()).unwrap_err();
        let out = envelope(&Err(err));
        assert_eq!(out["ok"], false);
        assert!(out["error"].as_str().unwrap().contains("/nonexistent/fapi-runner.json"), "{out}");

        let out = envelope(&Ok(json!({"orderId": 1})));
        assert_eq!(out, json!({"ok": true, "result": {"orderId": 1}}));
    }

    #[test]
    fn invalid_override_fails_validation_not_parsing() {
        let cli = parse(&["--type", "MARKET", "--recv-window", "0"]);
        let mut config = AppConfig::default();
        apply_cli(&cli, &mut config);
        assert!(config.validate().is_err());
    }

    #[test]
    fn configured_log_file_is_kept() {
        let cli = parse(&["--type", "MARKET"]);
        let mut config = AppConfig::default();
        config.logging.file = Some("logs/trades.log".into());
        apply_cli(&cli, &mut config);
        assert_eq!(config.logging.file.as_deref(), Some("logs/trades.log"));
        assert_eq!(config.exchange.environment, Environment::Testnet);
    }
}
