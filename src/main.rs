//! Seminar - Resilient Auto-Discussion Engine
//!
//! Command-line client for AI study services: runs multi-round
//! auto-discussions with retries, pacing, pause on Ctrl-C, and locally
//! persisted transcripts.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use seminar::client::create_service;
use seminar::config::SeminarConfig;
use seminar::error::SeminarError;
use seminar::retry::with_retry;
use seminar::session::{MessageRole, SessionStore};
use seminar::status::{ServerStatus, StatusMonitor};
use seminar::workflow::{
    RunState, Sequencer, StepPayload, WorkflowEvent, MAX_ITERATIONS, MIN_ITERATIONS,
};

#[derive(Parser)]
#[command(name = "seminar")]
#[command(version = "0.1.0")]
#[command(about = "Resilient auto-discussion engine for AI study services", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "SEMINAR_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use the built-in mock service instead of a live endpoint
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full auto-discussion on a topic
    Discuss {
        /// Topic to discuss
        topic: String,

        /// Number of discussion rounds (1-5)
        #[arg(short, long, value_name = "N")]
        iterations: Option<u32>,

        /// Search results requested per round
        #[arg(short, long, value_name = "N")]
        results: Option<u32>,

        /// Disable the pacing delay before each service call
        #[arg(long)]
        no_pacing: bool,
    },

    /// Ask a single question without running the discussion workflow
    Ask {
        /// Question to send to the study service
        question: String,
    },

    /// Check whether the study service is reachable
    Ping {
        /// Keep checking on an interval until interrupted
        #[arg(short, long)]
        watch: bool,
    },

    /// Inspect saved discussion transcripts
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List saved discussions
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a discussion transcript
    Show {
        /// Session ID (defaults to the active discussion)
        id: Option<Uuid>,
    },

    /// Delete the active discussion
    Clear {
        /// Delete every saved discussion
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "seminar=debug,info"
    } else {
        "seminar=info,warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(error) = run(cli).await {
        eprintln!("{} {error:#}", "Error:".red().bold());
        let code = error
            .downcast_ref::<SeminarError>()
            .map_or(1, SeminarError::exit_code);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = SeminarConfig::load_or_default(cli.config.as_deref())?;

    let mut service_config = config.service.clone();
    if cli.mock {
        service_config.mock = true;
    }

    match cli.command {
        Commands::Discuss {
            topic,
            iterations,
            results,
            no_pacing,
        } => {
            let service = create_service(&service_config)?;

            // Probe availability up front, then keep watching in the
            // background so a mid-run outage shows up in the final report.
            let monitor = StatusMonitor::new(Arc::clone(&service))
                .with_check_interval(config.status.interval());
            print_status(&monitor.check_once().await);

            let mut sequencer_config = config.sequencer_config();
            if let Some(count) = iterations {
                if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&count) {
                    eprintln!(
                        "{} Rounds must be between {} and {}; clamping {}",
                        "Warning:".yellow().bold(),
                        MIN_ITERATIONS,
                        MAX_ITERATIONS,
                        count
                    );
                }
                sequencer_config = sequencer_config.with_iterations(count);
            }
            if let Some(count) = results {
                sequencer_config = sequencer_config.with_results_per_page(count);
            }
            if no_pacing {
                sequencer_config = sequencer_config.with_pacing(false);
            }

            let mut sequencer = Sequencer::new(Arc::clone(&service), sequencer_config);
            let mut events = sequencer.subscribe();
            let sequencer = Arc::new(sequencer);

            sequencer.start(&topic).await?;

            let persistence = if config.sessions.autosave {
                Some(config.session_persistence()?)
            } else {
                None
            };
            let mut store = match &persistence {
                Some(persistence) => persistence.load()?,
                None => SessionStore::new(),
            };
            store.create_session(Some(&topic));
            store.add_message(MessageRole::User, &topic);

            let total_steps = sequencer.state().await.total_steps();
            let progress = ProgressBar::new(total_steps as u64);
            progress.set_style(
                ProgressStyle::with_template("[{bar:30.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );

            let watch_cancel = CancellationToken::new();
            let watcher = {
                let monitor = monitor.clone();
                let cancel = watch_cancel.clone();
                tokio::spawn(async move { monitor.watch(cancel).await })
            };

            let mut runner = {
                let sequencer = Arc::clone(&sequencer);
                tokio::spawn(async move { sequencer.run().await })
            };

            let outcome = loop {
                tokio::select! {
                    result = &mut runner => {
                        while let Ok(event) = events.try_recv() {
                            handle_event(&event, &progress, &mut store);
                        }
                        break result;
                    }
                    _ = tokio::signal::ctrl_c() => {
                        progress.println(format!(
                            "{} Interrupt received, pausing after the current step...",
                            "Signal:".yellow().bold()
                        ));
                        sequencer.pause().await;
                    }
                    Some(event) = events.recv() => {
                        handle_event(&event, &progress, &mut store);
                    }
                }
            };

            progress.finish_and_clear();
            watch_cancel.cancel();
            let _ = watcher.await;

            if let Some(persistence) = &persistence {
                persistence.save(&store)?;
            }

            let run_result =
                outcome.map_err(|join| anyhow::anyhow!("discussion task failed: {join}"))?;
            match run_result {
                Ok(RunState::Complete) => {
                    let state = sequencer.state().await;
                    println!(
                        "\n{} Discussion complete after {} round(s)",
                        "OK".green().bold(),
                        state.iteration
                    );
                }
                Ok(_) => {
                    println!(
                        "\n{} Discussion paused; transcript saved up to the last finished step",
                        "Paused:".yellow().bold()
                    );
                }
                Err(error) => {
                    let status = monitor.current().await;
                    if !status.is_unknown() && !status.available {
                        eprintln!("{} {}", "Service:".yellow().bold(), status.message);
                    }
                    return Err(error.into());
                }
            }
        }

        Commands::Ask { question } => {
            let service = create_service(&service_config)?;
            let policy = config.retry.to_policy();

            let reply = with_retry(&policy, || {
                let service = Arc::clone(&service);
                let question = question.clone();
                async move { service.respond(&question).await }
            })
            .await?;

            println!("{reply}");

            if config.sessions.autosave {
                let persistence = config.session_persistence()?;
                let mut store = persistence.load()?;
                store.add_message(MessageRole::User, &question);
                store.add_message(MessageRole::Assistant, &reply);
                persistence.save(&store)?;
            }
        }

        Commands::Ping { watch } => {
            let service = create_service(&service_config)?;
            let monitor = StatusMonitor::new(service).with_check_interval(config.status.interval());

            if watch {
                println!(
                    "{} Checking every {}s (Ctrl-C to stop)",
                    "Watch:".cyan().bold(),
                    config.status.check_interval_secs
                );
                loop {
                    print_status(&monitor.check_once().await);
                    tokio::select! {
                        _ = tokio::time::sleep(config.status.interval()) => {}
                        _ = tokio::signal::ctrl_c() => break,
                    }
                }
            } else {
                let status = monitor.check_once().await;
                print_status(&status);
                if !status.available {
                    std::process::exit(1);
                }
            }
        }

        Commands::Sessions { action } => {
            let persistence = config.session_persistence()?;

            match action {
                SessionsAction::List { json } => {
                    let store = persistence.load()?;

                    if json {
                        println!("{}", serde_json::to_string_pretty(store.sessions())?);
                    } else if store.is_empty() {
                        println!("{} No saved discussions", "Sessions:".cyan().bold());
                    } else {
                        println!(
                            "\n{} Saved discussions ({} total)",
                            "Sessions:".cyan().bold(),
                            store.len()
                        );
                        println!("{}", "─".repeat(60));
                        for session in store.sessions() {
                            let marker = if store.active_id() == Some(session.id) {
                                "→"
                            } else {
                                " "
                            };
                            println!(
                                "   {} {} [{}] {} ({} messages)",
                                marker,
                                session.id,
                                session.updated_at.format("%Y-%m-%d %H:%M"),
                                session.title.bold(),
                                session.messages.len()
                            );
                        }
                    }
                }

                SessionsAction::Show { id } => {
                    let store = persistence.load()?;
                    let session = match id {
                        Some(id) => store.get(id),
                        None => store.active_session(),
                    };
                    let Some(session) = session else {
                        anyhow::bail!("no matching discussion found");
                    };

                    println!("\n{} {}", "Session:".cyan().bold(), session.title.bold());
                    println!("{}", "─".repeat(60));
                    for message in &session.messages {
                        let role = match message.role {
                            MessageRole::User => "you".green().bold(),
                            MessageRole::Assistant => "seminar".cyan().bold(),
                            MessageRole::System => "note".yellow(),
                        };
                        println!("[{role}] {}\n", message.content);
                    }
                }

                SessionsAction::Clear { all } => {
                    if all {
                        persistence.delete()?;
                        println!("{} All discussions deleted", "OK".green().bold());
                    } else {
                        let mut store = persistence.load()?;
                        let Some(active) = store.active_id() else {
                            anyhow::bail!(
                                "no active discussion to delete; use --all to delete everything"
                            );
                        };
                        store.delete_session(active)?;
                        persistence.save(&store)?;
                        println!("{} Active discussion deleted", "OK".green().bold());
                    }
                }
            }
        }
    }

    Ok(())
}

/// Print a one-line service status report.
fn print_status(status: &ServerStatus) {
    let label = if status.available {
        "Service:".green().bold()
    } else {
        "Service:".yellow().bold()
    };
    match status.latency_ms {
        Some(latency) => println!("{label} {} ({latency} ms)", status.message),
        None => println!("{label} {}", status.message),
    }
}

/// Fold a workflow event into the progress display and the transcript.
fn handle_event(event: &WorkflowEvent, progress: &ProgressBar, store: &mut SessionStore) {
    match event {
        WorkflowEvent::IterationStarted { iteration, total } => {
            if *iteration > 1 {
                progress.println(format!(
                    "{} Round {iteration}/{total}",
                    "Round:".cyan().bold()
                ));
                store.add_message(MessageRole::System, format!("Round {iteration} of {total}"));
            }
        }
        WorkflowEvent::StepStarted { kind, .. } => {
            progress.set_message(kind.label());
        }
        WorkflowEvent::StepCompleted { payload, .. } => {
            progress.inc(1);
            match payload {
                StepPayload::Urls(urls) => {
                    progress.println(format!("   found {} sources", urls.len()));
                }
                StepPayload::Documents(documents) => {
                    progress.println(format!("   extracted {} pages", documents.len()));
                }
                StepPayload::Summary(summary) => {
                    store.add_message(
                        MessageRole::System,
                        format!("Summary of sources:\n{summary}"),
                    );
                }
                StepPayload::Reply(reply) => {
                    store.add_message(MessageRole::Assistant, reply);
                    // Suspend rather than println so the reply reaches stdout
                    // even when the bar is hidden (piped output).
                    progress.suspend(|| println!("\n{reply}\n"));
                }
            }
        }
        WorkflowEvent::StepFailed { kind, error, .. } => {
            progress.println(format!(
                "{} {kind} failed: {error}",
                "Step:".red().bold()
            ));
            store.add_message(MessageRole::System, format!("Step '{kind}' failed: {error}"));
        }
        WorkflowEvent::RetryScheduled {
            kind,
            attempt,
            delay,
            error,
        } => {
            progress.println(format!(
                "{} {kind} attempt {attempt} failed ({error}); retrying in {delay:?}",
                "Retry:".yellow()
            ));
        }
        WorkflowEvent::RateLimited {
            kind, retry_after, ..
        } => {
            progress.println(format!(
                "{} {kind} rate limited; waiting {retry_after:?}",
                "Retry:".yellow()
            ));
        }
        WorkflowEvent::IterationCompleted { .. } => {}
        WorkflowEvent::Paused => {
            progress.println(format!("{} Discussion paused", "Paused:".yellow().bold()));
        }
        WorkflowEvent::Resumed => {
            progress.println(format!("{} Discussion resumed", "Resumed:".green().bold()));
        }
        WorkflowEvent::Completed { iterations } => {
            store.add_message(
                MessageRole::System,
                format!("Discussion finished after {iterations} round(s)"),
            );
        }
    }
}
