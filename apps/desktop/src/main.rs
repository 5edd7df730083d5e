mod config;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    dispatch, render_audit, render_lookup, AuditFormModel, ChatSession, ChatView,
    LookupController, LookupEvent, LookupPhase, LookupSnapshot, QueryClient, QueryTransport,
};
use shared::{
    audit::{AuditEdit, AuditPayload, FormSection, NumericField, ToggleField},
    domain::{ChatMode, Environment, LookupMode},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{error::RecvError, Receiver},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mapper", about = "ATT&CK ↔ NIST 800-53 mapper client")]
struct Args {
    /// Overrides the configured API base URL.
    #[arg(long, global = true)]
    server_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up a technique or control. Without QUERY, every stdin line is
    /// treated as an edit of the search box.
    Lookup {
        #[arg(long, default_value_t = LookupMode::Technique)]
        mode: LookupMode,
        query: Option<String>,
    },
    /// Score a password/MFA policy, starting from the default form.
    Audit {
        #[arg(long = "set", value_name = "KEY=VALUE")]
        edits: Vec<AuditEdit>,
        #[arg(long)]
        environment: Option<Environment>,
        #[arg(long)]
        user_count: Option<String>,
    },
    /// Send one chat message.
    Chat {
        #[arg(long)]
        mode: Option<ChatMode>,
        message: String,
    },
    /// List the audit form keys accepted by `audit --set`.
    Fields,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }

    if let Command::Fields = args.command {
        print_fields();
        return Ok(());
    }

    let base_url = settings.base_url()?;
    let client = match settings.request_timeout() {
        Some(timeout) => QueryClient::with_timeout(base_url, timeout)
            .context("failed to build HTTP client")?,
        None => QueryClient::new(base_url),
    };
    info!(server_url = %client.base_url(), "mapper client ready");
    let transport: Arc<dyn QueryTransport> = Arc::new(client);

    match args.command {
        Command::Lookup { mode, query } => {
            let controller = LookupController::with_mode(transport, settings.debounce(), mode);
            match query {
                Some(query) => run_lookup_once(controller, query).await,
                None => run_lookup_stream(controller).await,
            }
        }
        Command::Audit {
            edits,
            environment,
            user_count,
        } => {
            let form = AuditFormModel::new(transport);
            for edit in edits {
                form.apply(edit).await;
            }
            if let Some(environment) = environment {
                form.set_environment(environment).await;
            }
            if let Some(raw) = user_count {
                form.set_number(NumericField::UserCount, &raw).await;
            }
            let result = form.submit().await.context("audit failed")?;
            print!("{}", render_audit(&result));
            Ok(())
        }
        Command::Chat { mode, message } => {
            let session = ChatSession::with_top_k(transport, settings.top_k);
            let Some(response) = session.send(&message, mode).await.context("chat failed")? else {
                bail!("message is empty");
            };
            match dispatch(&response) {
                ChatView::Unrecognized(message) => bail!(message),
                view => print!("{view}"),
            }
            Ok(())
        }
        Command::Fields => Ok(()),
    }
}

fn is_settled(snapshot: &LookupSnapshot) -> bool {
    matches!(
        snapshot.phase,
        LookupPhase::Idle | LookupPhase::Success | LookupPhase::Error
    )
}

fn print_snapshot(snapshot: &LookupSnapshot) {
    match snapshot.phase {
        LookupPhase::Success => {
            if let Some(result) = &snapshot.result {
                println!("{}", render_lookup(result));
            }
        }
        LookupPhase::Error => {
            eprintln!("error: {}", snapshot.error.as_deref().unwrap_or("unknown"));
        }
        LookupPhase::Idle | LookupPhase::Debouncing | LookupPhase::Fetching => {}
    }
}

async fn run_lookup_once(controller: Arc<LookupController>, query: String) -> Result<()> {
    let mut events = controller.subscribe_events();
    controller.input(query).await;
    controller.search().await;

    let snapshot = next_settled(&mut events).await?;
    controller.shutdown().await;
    match snapshot.phase {
        LookupPhase::Success => {
            print_snapshot(&snapshot);
            Ok(())
        }
        LookupPhase::Error => bail!(snapshot.error.unwrap_or_default()),
        _ => bail!("query must be at least 2 characters"),
    }
}

async fn next_settled(events: &mut Receiver<LookupEvent>) -> Result<LookupSnapshot> {
    loop {
        match events.recv().await {
            Ok(LookupEvent::StateChanged(snapshot)) if is_settled(&snapshot) => {
                return Ok(snapshot)
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "lookup: dropped events"),
            Err(RecvError::Closed) => bail!("lookup controller stopped"),
        }
    }
}

async fn run_lookup_stream(controller: Arc<LookupController>) -> Result<()> {
    let mut events = controller.subscribe_events();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line.context("failed to read stdin")? {
                    Some(line) => controller.input(line).await,
                    None => {
                        stdin_open = false;
                        if is_settled(&controller.snapshot().await) {
                            while let Ok(event) = events.try_recv() {
                                if let LookupEvent::StateChanged(snapshot) = event {
                                    print_snapshot(&snapshot);
                                }
                            }
                            break;
                        }
                    }
                }
            }
            event = events.recv() => match event {
                Ok(LookupEvent::StateChanged(snapshot)) => {
                    print_snapshot(&snapshot);
                    if !stdin_open && is_settled(&snapshot) {
                        break;
                    }
                }
                Ok(LookupEvent::FocusRequested) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "lookup: dropped events"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    controller.shutdown().await;
    Ok(())
}

fn print_fields() {
    let defaults = AuditPayload::default();
    for section in FormSection::ALL {
        println!("{}", section.title());
        for field in NumericField::ALL.iter().filter(|f| f.section() == *section) {
            println!(
                "  {:<40} {} (default {})",
                field.key(),
                field.label(),
                defaults.number(*field)
            );
        }
        for field in ToggleField::ALL.iter().filter(|f| f.section() == *section) {
            println!(
                "  {:<40} {} (default {})",
                field.key(),
                field.label(),
                defaults.toggle(*field)
            );
        }
        if *section == FormSection::Deployment {
            let choices: Vec<&str> = Environment::ALL.iter().map(|env| env.as_str()).collect();
            println!(
                "  {:<40} Environment (default {}; one of {})",
                "environment",
                defaults.environment,
                choices.join(", ")
            );
        }
    }
}
