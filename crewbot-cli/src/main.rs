use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use crewbot_core::{Planner, Priority, RepoSlug, Request, RequestType};
use std::time::Duration;

/// crewbot: plan and submit multi-agent review requests
#[derive(Parser, Debug)]
#[command(name = "crewbot")]
#[command(about = "Plan and submit multi-agent review and auto-fix requests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the task plan for a request without contacting anything
    Plan(RequestArgs),
    /// Send a request to a running crewbot server
    Submit(SubmitArgs),
}

#[derive(Args, Debug)]
struct RequestArgs {
    /// Repository in owner/name form
    #[arg(long)]
    repo: RepoSlug,

    /// Kind of request: review_pr, auto_fix or other
    #[arg(long = "type", default_value = "review_pr")]
    request_type: RequestType,

    /// Pull request number, if the request concerns one
    #[arg(long)]
    pr: Option<u64>,

    /// Free-form instructions for the agents
    #[arg(long, default_value = "")]
    instructions: String,

    /// low, normal or high
    #[arg(long, default_value = "normal")]
    priority: Priority,

    /// Who is asking (e.g. an email address)
    #[arg(long)]
    requester: Option<String>,
}

#[derive(Args, Debug)]
struct SubmitArgs {
    #[command(flatten)]
    request: RequestArgs,

    /// Base URL of the crewbot server
    #[arg(long, env = "CREWBOT_SERVER", default_value = "http://localhost:8000")]
    server: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

impl RequestArgs {
    fn into_request(self) -> Request {
        let mut request =
            Request::new(self.request_type, self.repo).with_instructions(self.instructions);
        request.pr_number = self.pr;
        request.priority = self.priority;
        request.requester = self.requester;
        request
    }
}

fn run_plan(args: RequestArgs) -> Result<()> {
    let request = args.into_request();
    let plan = Planner::new().decompose(&request);
    println!(
        "{}",
        serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?
    );
    Ok(())
}

async fn run_submit(args: SubmitArgs) -> Result<()> {
    let request = args.request.into_request();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()
        .context("Failed to create HTTP client")?;

    let url = format!("{}/v1/request-review", args.server.trim_end_matches('/'));
    let response = client
        .post(&url)
        .json(&request)
        .send()
        .await
        .with_context(|| format!("Failed to reach crewbot server at {}", url))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .context("Failed to read server response")?;

    if !status.is_success() {
        return Err(anyhow!("Server rejected request: {} - {}", status, text));
    }

    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text.trim()),
    }
    eprintln!("Status: {}", status);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan(args) => run_plan(args),
        Commands::Submit(args) => run_submit(args).await,
    }
}
