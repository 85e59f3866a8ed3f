use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use distcalc::agent::Agent;
use distcalc::calc::{parse, OperationTimes};
use distcalc::config::Config;
use distcalc::core::{Expression, ExpressionId, ExpressionStatus};
use distcalc::orchestration::Orchestrator;
use distcalc::{api, dlog, dlog_error, Error, Result};

/// Poll interval for workers running inside `eval`.
const LOCAL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Distributed arithmetic expression evaluator
#[derive(Parser, Debug)]
#[command(name = "distcalc")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    DISTCALC_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Config file (default: ~/.distcalc/distcalc.toml)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the orchestrator HTTP server
    Serve {
        /// Listen address (overrides orchestrator.addr)
        #[arg(long)]
        addr: Option<SocketAddr>,
    },

    /// Run a worker agent against an orchestrator
    Agent {
        /// Orchestrator base URL (overrides agent.orchestrator_url)
        #[arg(long)]
        url: Option<String>,

        /// Number of concurrent workers (overrides agent.computing_power)
        #[arg(long, short = 'w')]
        workers: Option<usize>,
    },

    /// Evaluate an expression in-process and print the result
    Eval {
        /// The arithmetic expression, e.g. "(2+3)*4"
        expression: String,

        /// Evaluate the parse tree directly, without tasks
        #[arg(long)]
        direct: bool,

        /// Honor the configured operation times
        #[arg(long)]
        timed: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    distcalc::log::init_with_debug(cli.debug, config.log_path());

    match cli.command {
        Command::Serve { addr } => run_serve(&config, addr),
        Command::Agent { url, workers } => run_agent(config, url, workers),
        Command::Eval {
            expression,
            direct,
            timed,
        } => run_eval(&config, &expression, direct, timed),
    }
}

/// Cancel `shutdown` on Ctrl-C.
fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                dlog!("Interrupt received, shutting down");
                shutdown.cancel();
            }
            Err(e) => dlog_error!("Cannot listen for Ctrl-C: {}", e),
        }
    });
}

fn run_serve(config: &Config, addr: Option<SocketAddr>) -> Result<()> {
    let addr = match addr {
        Some(addr) => addr,
        None => config.orchestrator.addr.parse().map_err(|e| {
            Error::Config(format!(
                "invalid orchestrator.addr {:?}: {}",
                config.orchestrator.addr, e
            ))
        })?,
    };

    let orchestrator = Arc::new(
        Orchestrator::new(config.timings).with_lease(config.orchestrator.task_lease()),
    );
    dlog!(
        "Operation times: +{}ms -{}ms *{}ms /{}ms, lease {:?}",
        config.timings.addition_ms,
        config.timings.subtraction_ms,
        config.timings.multiplication_ms,
        config.timings.division_ms,
        config.orchestrator.task_lease()
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let shutdown = CancellationToken::new();
        cancel_on_ctrl_c(shutdown.clone());
        api::serve(addr, orchestrator, shutdown).await
    })
}

fn run_agent(mut config: Config, url: Option<String>, workers: Option<usize>) -> Result<()> {
    if let Some(url) = url {
        config.agent.orchestrator_url = url;
    }
    if let Some(workers) = workers {
        config.agent.computing_power = workers;
    }
    config.validate()?;

    let agent = Agent::from_config(&config.agent)?;
    dlog!(
        "Agent connecting to orchestrator at {}",
        config.agent.orchestrator_url
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let shutdown = CancellationToken::new();
        cancel_on_ctrl_c(shutdown.clone());
        agent.run(shutdown).await;
    });
    Ok(())
}

fn run_eval(config: &Config, text: &str, direct: bool, timed: bool) -> Result<()> {
    if direct {
        let value = parse(text)
            .map_err(|e| Error::Validation(e.to_string()))?
            .evaluate()?;
        println!("{}", value);
        return Ok(());
    }

    let times = if timed {
        config.timings
    } else {
        OperationTimes::instant()
    };
    let orchestrator = Arc::new(Orchestrator::new(times));
    let id = match orchestrator.submit(text) {
        Ok(id) => id,
        Err(Error::ExpressionRejected { source, .. }) => {
            eprintln!("error: {}", source);
            std::process::exit(1);
        }
        Err(e) => return Err(e),
    };

    let rt = tokio::runtime::Runtime::new()?;
    let expression = rt.block_on(async {
        let shutdown = CancellationToken::new();
        let agent = Agent::new(
            Arc::clone(&orchestrator),
            config.agent.computing_power,
            LOCAL_POLL_INTERVAL,
        );
        let workers = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { agent.run(shutdown).await })
        };

        let expression = wait_until_resolved(&orchestrator, &id).await;
        shutdown.cancel();
        if let Err(e) = workers.await {
            dlog_error!("Local workers failed: {}", e);
        }
        expression
    })?;

    match expression.status {
        ExpressionStatus::Completed => {
            println!("{}", expression.result.unwrap_or_default());
            Ok(())
        }
        _ => {
            eprintln!(
                "error: {}",
                expression.error.as_deref().unwrap_or("evaluation failed")
            );
            std::process::exit(1);
        }
    }
}

async fn wait_until_resolved(orchestrator: &Orchestrator, id: &ExpressionId) -> Result<Expression> {
    loop {
        let expression = orchestrator.expression(id)?;
        if expression.status.is_terminal() {
            return Ok(expression);
        }
        tokio::time::sleep(LOCAL_POLL_INTERVAL).await;
    }
}
