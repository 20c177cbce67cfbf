use acuadvisor_rag::{
    AdvisorConfig, Answer, Orchestrator, ResourceRegistry, SubmitOutcome,
};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Acupuncture clinical advisor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to ./acuadvisor.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Index file, overriding the configuration
    #[arg(short, long)]
    index: Option<PathBuf>,

    /// Passages retrieved per query, overriding the configuration
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Completion model, overriding the configuration
    #[arg(short, long)]
    model: Option<String>,

    /// Print the whole answer at once
    #[arg(long)]
    no_animate: bool,

    /// Delay between words when animating
    #[arg(long, default_value_t = 50)]
    word_delay_ms: u64,

    /// Print the retrieved passages after each answer
    #[arg(long)]
    show_sources: bool,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a single question
    Ask {
        /// Clinical question
        question: String,
    },
    /// Answer questions read line by line from stdin
    Repl,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<AdvisorConfig> {
    let mut config = AdvisorConfig::load(args.config.as_deref())?;
    if let Some(index) = &args.index {
        config.index.path = index.clone();
    }
    if let Some(top_k) = args.top_k {
        config.retrieval.top_k = top_k;
    }
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let pipeline = ResourceRegistry::global().pipeline(&config).await?;
    let orchestrator = Orchestrator::new(pipeline);
    let display = Display {
        animate: !args.no_animate,
        word_delay: Duration::from_millis(args.word_delay_ms),
        show_sources: args.show_sources,
    };

    match args.command {
        Commands::Ask { question } => match orchestrator.submit(&question).await? {
            SubmitOutcome::Answered(answer) | SubmitOutcome::Reused(answer) => {
                display.render(&answer).await?;
                Ok(())
            }
            SubmitOutcome::Failed(message) => {
                Err(anyhow::anyhow!("Clinical analysis failed: {message}"))
            }
            SubmitOutcome::Ignored => Err(anyhow::anyhow!("Question is empty")),
            SubmitOutcome::Busy => Err(anyhow::anyhow!("A query is already processing")),
        },
        Commands::Repl => {
            eprintln!("Enter a clinical query (e.g. Treatment protocol for chronic headache). Ctrl-D to exit.");
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                print!("> ");
                std::io::stdout().flush()?;
                let Some(line) = lines.next_line().await? else {
                    break;
                };
                if matches!(line.trim(), "exit" | "quit") {
                    break;
                }

                match orchestrator.submit(&line).await? {
                    SubmitOutcome::Answered(answer) => display.render(&answer).await?,
                    SubmitOutcome::Reused(answer) => {
                        eprintln!("(same question as before)");
                        display.render(&answer).await?;
                    }
                    SubmitOutcome::Failed(message) => {
                        eprintln!("Clinical analysis failed: {message}");
                    }
                    SubmitOutcome::Busy | SubmitOutcome::Ignored => {}
                }
            }
            println!();
            Ok(())
        }
    }
}

struct Display {
    animate: bool,
    word_delay: Duration,
    show_sources: bool,
}

impl Display {
    /// Print an answer, word by word when animating
    async fn render(&self, answer: &Answer) -> Result<()> {
        let mut stdout = std::io::stdout();
        if self.animate && !self.word_delay.is_zero() {
            for word in answer.text.split_inclusive(char::is_whitespace) {
                write!(stdout, "{word}")?;
                stdout.flush()?;
                tokio::time::sleep(self.word_delay).await;
            }
            writeln!(stdout)?;
        } else {
            writeln!(stdout, "{}", answer.text)?;
        }

        if self.show_sources {
            writeln!(stdout, "\nSources ({} passages):", answer.passages.len())?;
            for (rank, hit) in answer.passages.iter().enumerate() {
                let preview: String = hit.chunk.text.chars().take(100).collect();
                writeln!(
                    stdout,
                    "  {}. [{:.3}] {} | {}",
                    rank + 1,
                    hit.score,
                    hit.chunk.source_label().unwrap_or("unknown source"),
                    preview.replace('\n', " ")
                )?;
            }
        }
        Ok(())
    }
}
