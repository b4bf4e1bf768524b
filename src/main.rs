//! armctl - Entry Point
//!
//! Turns typed commands into validated plans and runs them on the simulated
//! arm. With prompt words it handles one command and exits; otherwise it
//! starts an interactive session.

use armctl::backend::SimulatedArm;
use armctl::command::{Interpreter, Outcome};
use armctl::core::config::ArmConfig;
use armctl::core::error::Result;
use armctl::llm::{ActionModel, KeywordActionModel, LlmActionModel, LlmClient};
use armctl::schema::ActionVocabulary;

use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

type Session = Interpreter<Box<dyn ActionModel>, SimulatedArm>;

/// Natural language command interpreter for a robot arm
#[derive(Parser, Debug)]
#[command(name = "armctl")]
#[command(about = "Turn natural language into validated robot arm plans")]
struct Args {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the offline keyword model instead of an LLM
    #[arg(long)]
    offline: bool,

    /// Print the validated plan without executing it
    #[arg(long)]
    compile_only: bool,

    /// Command to run once; starts an interactive session when omitted
    prompt: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("armctl=info")),
        )
        .init();

    let config = match &args.config {
        Some(path) => ArmConfig::load(path)?,
        None => ArmConfig::default(),
    };

    let model = select_model(&args, &config);
    let arm = SimulatedArm::from_scene(&config.scene);
    let mut session: Session = Interpreter::new(model, arm, &config);

    // Runtime for the async model and backend calls
    let rt = Runtime::new()?;

    if !args.prompt.is_empty() {
        let text = args.prompt.join(" ");
        return run_once(&rt, &mut session, &text, args.compile_only);
    }

    repl(&rt, &mut session, args.compile_only)
}

fn select_model(args: &Args, config: &ArmConfig) -> Box<dyn ActionModel> {
    if args.offline {
        return Box::new(KeywordActionModel::new());
    }
    match LlmClient::from_config(&config.llm) {
        Ok(client) => {
            tracing::info!("using LLM model {}", client.model());
            Box::new(LlmActionModel::new(client, &ActionVocabulary::standard()))
        }
        Err(e) => {
            tracing::warn!("{} - using the offline keyword model", e);
            Box::new(KeywordActionModel::new())
        }
    }
}

fn run_once(rt: &Runtime, session: &mut Session, text: &str, compile_only: bool) -> Result<()> {
    if compile_only {
        let plan = rt.block_on(session.compile(text))?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    match rt.block_on(session.handle(text))? {
        Outcome::Completed { plan, attempts } => {
            println!("Done in {} attempt(s):", attempts.len());
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Outcome::Clarification { question } => println!("{}", question),
    }
    Ok(())
}

fn repl(rt: &Runtime, session: &mut Session, compile_only: bool) -> Result<()> {
    println!("\n=== ARMCTL ===");
    println!("Model: {}", session.model().name());
    println!();
    println!("Commands:");
    println!("  history         - Show recent turns");
    println!("  clear           - Forget the dialogue context");
    println!("  quit / q        - Exit");
    println!("  <any text>      - Command for the arm");
    println!();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        match input {
            "" => continue,
            "quit" | "q" => break,
            "history" => {
                print_history(session);
                continue;
            }
            "clear" => {
                session.clear_context();
                println!("Context cleared.");
                continue;
            }
            _ => {}
        }

        if let Err(e) = run_once(rt, session, input, compile_only) {
            println!("Error: {}", e);
        }
    }

    println!("Goodbye.");
    Ok(())
}

fn print_history(session: &Session) {
    let context = session.context();
    if context.is_empty() {
        println!("(no turns yet)");
        return;
    }
    for entry in context.entries() {
        let status = if entry.result.is_success() {
            "ok".to_string()
        } else {
            format!("failed: {}", entry.result.reason())
        };
        let plan = entry.plan.as_ref().map(|p| p.describe()).unwrap_or_default();
        println!(
            "  {} [{}] {} {}",
            entry.timestamp.format("%H:%M:%S"),
            status,
            entry.command,
            plan
        );
    }
}
