use std::net::SocketAddr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use first_million::config::Config;
use first_million::core::{
    DEFAULT_GOAL, DEFAULT_MAX_MONTHS, MonthRecord, ProjectionInput, ProjectionParams,
    ProjectionSummary, format_currency, project, summarize,
};
use first_million::store::NewCalculation;

#[derive(Parser, Debug)]
#[command(
    name = "first-million",
    about = "Compound-interest projection: months until a savings goal is reached"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (requires FM_JWT_SECRET)
    Serve {
        #[arg(long, help = "Overrides FM_LISTEN_ADDR")]
        addr: Option<SocketAddr>,
        #[arg(long, help = "SQLite file to store accounts in; overrides FM_DATABASE_URL")]
        database_url: Option<String>,
    },
    /// Print a projection schedule without starting the server
    Project {
        #[arg(long, help = "Initial deposit, defaults to 10000")]
        initial: Option<String>,
        #[arg(long, help = "Monthly contribution, defaults to 1000")]
        monthly: Option<String>,
        #[arg(long, help = "Monthly interest rate in percent, e.g. 0.8")]
        rate: Option<String>,
        #[arg(long, default_value_t = DEFAULT_GOAL, value_parser = parse_goal)]
        goal: f64,
        #[arg(long, default_value_t = DEFAULT_MAX_MONTHS, value_parser = clap::value_parser!(u32).range(1..))]
        max_months: u32,
        #[arg(long, help = "Emit the schedule and summary as JSON")]
        json: bool,
        #[arg(
            long,
            value_name = "NAME",
            conflicts_with = "json",
            help = "Print a POST /api/calculations body for this projection instead"
        )]
        payload: Option<String>,
    },
}

fn parse_goal(raw: &str) -> Result<f64, String> {
    let goal: f64 = raw
        .trim()
        .parse()
        .map_err(|e| format!("`{raw}` is not a number: {e}"))?;
    if !goal.is_finite() || goal <= 0.0 {
        return Err(format!("goal must be a positive finite amount, got {raw}"));
    }
    Ok(goal)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve { addr, database_url } => {
            let mut config = Config::from_env().context("invalid server configuration")?;
            if let Some(addr) = addr {
                config.listen_addr = addr;
            }
            if database_url.is_some() {
                config.database_url = database_url;
            }
            first_million::init_tracing();
            first_million::api::run_http_server(config)
                .await
                .context("server error")?;
        }
        Command::Project {
            initial,
            monthly,
            rate,
            goal,
            max_months,
            json,
            payload,
        } => {
            let params = ProjectionParams {
                initial_contribution: initial.map(|v| v.as_str().into()),
                monthly_contribution: monthly.map(|v| v.as_str().into()),
                monthly_rate_percent: rate.map(|v| v.as_str().into()),
            };
            let input = params.normalize(goal, max_months);
            match payload {
                Some(name) => print_payload(&input, name)?,
                None => print_projection(&input, json)?,
            }
        }
    }
    Ok(())
}

fn print_projection(input: &ProjectionInput, json: bool) -> anyhow::Result<()> {
    let (months, summary) = run(input)?;

    if json {
        let body = serde_json::json!({ "summary": summary, "months": months });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!(
        "{:>5} {:>5} {:>14} {:>18} {:>14} {:>18} {:>18}",
        "Year", "Month", "Contribution", "Contributed", "Interest", "Interest total", "Total"
    );
    for month in &months {
        print_row(month);
    }
    println!();
    println!(
        "Months: {}{}",
        summary.months_to_reach_goal,
        if summary.goal_reached {
            ""
        } else {
            " (goal not reached)"
        }
    );
    println!("Final amount: {}", format_currency(summary.final_amount));
    println!("Total contributed: {}", format_currency(summary.total_contributed));
    println!("Total interest: {}", format_currency(summary.total_interest));
    Ok(())
}

fn run(input: &ProjectionInput) -> anyhow::Result<(Vec<MonthRecord>, ProjectionSummary)> {
    let months = project(input);
    let summary = summarize(&months, input.goal).context("projection produced no months")?;
    Ok((months, summary))
}

fn save_payload(input: &ProjectionInput, name: String) -> anyhow::Result<NewCalculation> {
    let (_, summary) = run(input)?;
    Ok(NewCalculation::from_summary(
        Some(name),
        input.initial_contribution,
        input.monthly_contribution,
        input.monthly_rate_percent,
        &summary,
    ))
}

fn print_payload(input: &ProjectionInput, name: String) -> anyhow::Result<()> {
    let payload = save_payload(input, name)?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn print_row(month: &MonthRecord) {
    println!(
        "{:>5} {:>5} {:>14} {:>18} {:>14} {:>18} {:>18}",
        month.year,
        month.month,
        format_currency(month.monthly_contribution),
        format_currency(month.accumulated_contributions),
        format_currency(month.monthly_interest),
        format_currency(month.accumulated_interest),
        format_currency(month.total),
    );
}
