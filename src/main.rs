// CLI adapter for the quantlab engine
// Exit codes: 0 success, 1 usage, 2 validation, 3 upstream data, 4 cancelled

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use quantlab::backtesting::{BacktestConfig, TransactionCostModel};
use quantlab::config::EngineConfig;
use quantlab::errors::{EngineError, EngineResult};
use quantlab::jobs::{BacktestService, JobOutput, JobState};
use quantlab::market_data::source::{Clock, CsvMarketData, SystemClock};
use quantlab::models::engine::{price_option, PricingInputs, PricingModel};
use quantlab::models::implied_vol::{solve, IvMethod, IvRequest};
use quantlab::models::{ExerciseStyle, OptionType};
use quantlab::strategies::{templates, TradingStrategy};

#[derive(Parser)]
#[command(name = "quantlab", version, about = "Deterministic pricing, backtesting and risk analytics engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliOptionType {
    Call,
    Put,
}

impl From<CliOptionType> for OptionType {
    fn from(v: CliOptionType) -> Self {
        match v {
            CliOptionType::Call => OptionType::Call,
            CliOptionType::Put => OptionType::Put,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliStyle {
    European,
    American,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliModel {
    Bs,
    Crr,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliIvMethod {
    Brent,
    Bisection,
    Newton,
}

#[derive(Subcommand)]
enum Command {
    /// Price an option and report its Greeks
    Price {
        #[arg(long)]
        spot: f64,
        #[arg(long)]
        strike: f64,
        /// Time to expiry in years
        #[arg(long)]
        expiry: f64,
        #[arg(long, default_value_t = 0.05)]
        rate: f64,
        #[arg(long, default_value_t = 0.0)]
        dividend: f64,
        #[arg(long)]
        vol: f64,
        #[arg(long, value_enum, default_value = "call")]
        option_type: CliOptionType,
        #[arg(long, value_enum, default_value = "european")]
        style: CliStyle,
        #[arg(long, value_enum, default_value = "bs")]
        model: CliModel,
        /// Lattice steps for the CRR model
        #[arg(long)]
        steps: Option<usize>,
    },
    /// Solve for implied volatility from a market price
    Iv {
        #[arg(long)]
        market_price: f64,
        #[arg(long)]
        spot: f64,
        #[arg(long)]
        strike: f64,
        #[arg(long)]
        expiry: f64,
        #[arg(long, default_value_t = 0.05)]
        rate: f64,
        #[arg(long, default_value_t = 0.0)]
        dividend: f64,
        #[arg(long, value_enum, default_value = "call")]
        option_type: CliOptionType,
        #[arg(long, value_enum, default_value = "brent")]
        method: CliIvMethod,
        #[arg(long, default_value_t = 1e-6)]
        tolerance: f64,
        #[arg(long, default_value_t = 100)]
        max_iterations: usize,
        #[arg(long)]
        initial_guess: Option<f64>,
    },
    /// Run a backtest over CSV bar files
    Backtest {
        /// Directory with <symbol>.csv files (default from config/env)
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Comma-separated universe, e.g. "AAPL,MSFT"
        #[arg(long)]
        symbols: String,
        #[arg(long)]
        start: NaiveDate,
        /// Defaults to today when omitted
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, default_value_t = 100_000.0)]
        capital: f64,
        /// JSON strategy definition; defaults to the momentum template
        #[arg(long)]
        strategy_file: Option<PathBuf>,
        #[arg(long)]
        benchmark: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // clap renders its own message; help/version are not errors
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(exit_code(&err));
    }
}

fn exit_code(err: &EngineError) -> i32 {
    match err {
        EngineError::Validation(_) => 2,
        EngineError::DataUnavailable { .. } => 3,
        EngineError::Cancelled => 4,
        _ => 1,
    }
}

async fn run(cli: Cli) -> EngineResult<()> {
    match cli.command {
        Command::Price {
            spot, strike, expiry, rate, dividend, vol,
            option_type, style, model, steps,
        } => {
            let inputs = PricingInputs {
                spot,
                strike,
                time_to_expiry: expiry,
                risk_free_rate: rate,
                dividend_yield: dividend,
                volatility: vol,
                option_type: option_type.into(),
                style: match style {
                    CliStyle::European => ExerciseStyle::European,
                    CliStyle::American => ExerciseStyle::American,
                },
                steps,
            };
            let requested = match model {
                CliModel::Bs => PricingModel::BlackScholes,
                CliModel::Crr => PricingModel::BinomialCrr,
            };
            let output = price_option(&inputs, requested)?;

            println!("{}", "=".repeat(60));
            println!("OPTION PRICE");
            println!("{}", "=".repeat(60));
            println!("Price:          {:>12.4}", output.price);
            println!("Intrinsic:      {:>12.4}", output.intrinsic_value);
            println!("Time value:     {:>12.4}", output.time_value);
            println!("Model:          {:>12}", format!("{:?}", output.model_used));
            println!();
            println!("Delta:          {:>12.4}", output.greeks.delta);
            println!("Gamma:          {:>12.4}", output.greeks.gamma);
            println!("Theta (daily):  {:>12.4}", output.greeks.theta);
            println!("Vega (per 1%):  {:>12.4}", output.greeks.vega);
            println!("Rho (per 1%):   {:>12.4}", output.greeks.rho);
            Ok(())
        }

        Command::Iv {
            market_price, spot, strike, expiry, rate, dividend,
            option_type, method, tolerance, max_iterations, initial_guess,
        } => {
            let mut request = IvRequest::new(
                market_price, spot, strike, expiry, rate, dividend, option_type.into(),
            );
            request.method = match method {
                CliIvMethod::Brent => IvMethod::Brent,
                CliIvMethod::Bisection => IvMethod::Bisection,
                CliIvMethod::Newton => IvMethod::NewtonRaphson,
            };
            request.tolerance = tolerance;
            request.max_iterations = max_iterations;
            request.initial_guess = initial_guess;

            let solution = solve(&request);
            println!("{}", "=".repeat(60));
            println!("IMPLIED VOLATILITY");
            println!("{}", "=".repeat(60));
            println!("Sigma:          {:>12.6}  ({:.2}%)", solution.sigma, solution.sigma * 100.0);
            println!("Converged:      {:>12}", solution.converged);
            println!("Iterations:     {:>12}", solution.iterations);
            println!("Final price:    {:>12.6}", solution.final_price);
            println!("Price error:    {:>12.2e}", solution.price_error);

            if !solution.converged {
                return Err(EngineError::validation(
                    "solver did not converge; market price may be unattainable",
                ));
            }
            Ok(())
        }

        Command::Backtest {
            data_dir, symbols, start, end, capital, strategy_file, benchmark,
        } => {
            let engine_config = EngineConfig::from_env();
            let dir = data_dir
                .unwrap_or_else(|| PathBuf::from(engine_config.data_dir.clone()));

            let strategy: TradingStrategy = match strategy_file {
                Some(path) => {
                    let content = std::fs::read_to_string(path)?;
                    serde_json::from_str(&content)
                        .map_err(|e| EngineError::validation(format!("bad strategy file: {e}")))?
                }
                None => templates::momentum_strategy(),
            };

            let end = end.unwrap_or_else(|| SystemClock.today());
            let config = BacktestConfig {
                strategy,
                universe: symbols
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                start_date: start,
                end_date: end,
                initial_capital: capital,
                costs: TransactionCostModel::default(),
                benchmark,
                risk_free_source: "constant".to_string(),
                walk_forward: None,
                sectors: Default::default(),
            };

            let source = Arc::new(CsvMarketData::new(
                dir,
                engine_config.default_risk_free_rate,
            ));
            let service = BacktestService::new(
                engine_config.orchestrator_config(),
                source,
                engine_config.fetch_deadline(),
            );

            let job_id = service.submit_backtest(config)?;
            println!("job {job_id} submitted");

            let mut last_pct = -1.0;
            let job = loop {
                let job = service.status(&job_id)?;
                if job.progress != last_pct {
                    println!("[{:>5.1}%] {}", job.progress, job.message);
                    last_pct = job.progress;
                }
                if job.state.is_terminal() {
                    break job;
                }
                tokio::time::sleep(Duration::from_millis(150)).await;
            };

            match job.state {
                JobState::Completed => {
                    let JobOutput::Backtest(result) = service.result(&job_id)? else {
                        return Err(EngineError::Failed("unexpected result kind".into()));
                    };
                    print_backtest_summary(&result);
                    Ok(())
                }
                JobState::Cancelled => Err(EngineError::Cancelled),
                _ => Err(service.result(&job_id).expect_err("terminal failure has error")),
            }
        }
    }
}

fn print_backtest_summary(result: &quantlab::backtesting::BacktestResult) {
    let m = &result.metrics;

    println!("\n{}", "=".repeat(70));
    println!("BACKTEST RESULTS - {}", result.strategy_name);
    println!("{}", "=".repeat(70));
    println!("Period: {} to {}", result.start_date, result.end_date);
    println!("Initial capital:  ${:>12.2}", result.initial_capital);
    println!("Final value:      ${:>12.2}", result.final_value);
    println!();
    println!("Total return:     {:>12.2}%", m.total_return_pct);
    println!("Annualized:       {:>12.2}%", m.annualized_return * 100.0);
    println!("Volatility:       {:>12.2}%", m.volatility * 100.0);
    println!("Sharpe ratio:     {:>12.2}", m.sharpe_ratio);
    println!("Sortino ratio:    {:>12.2}", m.sortino_ratio);
    println!("Max drawdown:     {:>12.2}%", m.max_drawdown * 100.0);
    println!("VaR 95 (daily):   {:>12.4}", m.var_95);
    println!("CVaR 95 (daily):  {:>12.4}", m.cvar_95);
    println!();
    println!("Trades:           {:>12}", m.total_trades);
    println!("Win rate:         {:>12.1}%", m.win_rate * 100.0);
    println!("Profit factor:    {:>12.2}", m.profit_factor);
    println!("{}", "=".repeat(70));
}
