use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use mandi_sahayak::generator::render_context;
use mandi_sahayak::llm::ProviderRequest;
use mandi_sahayak::session::{Assistant, Session, TurnOutcome};
use mandi_sahayak::startup::NO_INDEX_MESSAGE;
use mandi_sahayak::{
    ChatProvider, Cli, Embedder, EmbedderKind, OpenAiChatProvider, OpenAiEmbedder, RagError,
    Startup,
};
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

type DynAssistant = Assistant<Box<dyn Embedder>, Box<dyn ChatProvider>>;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let mut startup = Startup::new(cli.artifact_paths());
    if let Err(err) = startup.load_artifacts() {
        eprintln!("{NO_INDEX_MESSAGE}");
        return Err(anyhow::Error::new(err).context("startup halted"));
    }

    let config = cli.generation_config()?;
    let embedder = build_embedder(&cli)?;
    let provider = build_provider(&cli)?;
    let assistant = startup
        .attach(embedder, provider, config, cli.top_k)
        .map_err(|err| anyhow::Error::new(err).context("startup halted"))?;
    info!(
        state = %startup.state(),
        vectors = assistant.retriever().index().len(),
        records = assistant.retriever().metadata().len(),
        top_k = assistant.top_k(),
        "assistant ready"
    );

    match cli.query.as_deref() {
        Some(question) if cli.dry_run => print_context(&assistant, question),
        Some(question) => ask_once(&assistant, question),
        None => chat_loop(&assistant, cli.dry_run),
    }
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level())
        .with_writer(io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")
}

fn build_embedder(cli: &Cli) -> Result<Box<dyn Embedder>> {
    match cli.embedder {
        EmbedderKind::Openai => {
            let key = cli
                .embed_api_key
                .as_deref()
                .ok_or_else(|| anyhow!("OPENAI_API_KEY must be set for the openai embedder"))?;
            let embedder = OpenAiEmbedder::new(
                key,
                &cli.embed_base_url,
                cli.embed_model.clone(),
                cli.embed_dimensions,
                cli.embed_timeout(),
                cli.embed_max_retries,
            )?;
            Ok(Box::new(embedder))
        }
        EmbedderKind::Local => load_local_embedder(),
    }
}

#[cfg(feature = "local-embeddings")]
fn load_local_embedder() -> Result<Box<dyn Embedder>> {
    use mandi_sahayak::embedder::local::LocalEmbedder;

    Ok(Box::new(LocalEmbedder::load()?))
}

#[cfg(not(feature = "local-embeddings"))]
fn load_local_embedder() -> Result<Box<dyn Embedder>> {
    bail!("the local embedder requires building with `--features local-embeddings`")
}

fn build_provider(cli: &Cli) -> Result<Box<dyn ChatProvider>> {
    match cli.chat_api_key.as_deref() {
        Some(key) => Ok(Box::new(OpenAiChatProvider::new(
            key,
            &cli.chat_base_url,
            cli.chat_timeout(),
        )?)),
        None if cli.dry_run => Ok(Box::new(DisabledProvider)),
        None => bail!("GROQ_API_KEY must be set for the chat-completion provider"),
    }
}

/// Stand-in provider for `--dry-run` sessions without a chat credential.
struct DisabledProvider;

impl ChatProvider for DisabledProvider {
    fn complete(&self, _request: &ProviderRequest<'_>) -> Result<String, RagError> {
        Err(RagError::GenerationFailed(
            "chat model disabled in --dry-run".to_string(),
        ))
    }
}

fn print_context(assistant: &DynAssistant, question: &str) -> Result<()> {
    let hits = assistant
        .retriever()
        .retrieve_scored(question, assistant.top_k())?;
    println!("--- Retrieved Context ({} passages) ---", hits.len());
    for hit in &hits {
        println!("[#{} distance {:.4}] {}", hit.ordinal, hit.distance, hit.record.source);
    }
    let records: Vec<_> = hits.into_iter().map(|hit| hit.record).collect();
    println!("\n{}", render_context(&records));
    Ok(())
}

fn ask_once(assistant: &DynAssistant, question: &str) -> Result<()> {
    let mut session = Session::new();
    let outcome = assistant.handle_turn(&mut session, question);
    if let Some(message) = session.last() {
        println!("{}", message.render());
    }
    match outcome {
        TurnOutcome::Answered { .. } => Ok(()),
        TurnOutcome::Failed(err) => Err(anyhow!(err)),
    }
}

fn chat_loop(assistant: &DynAssistant, dry_run: bool) -> Result<()> {
    let mut session = Session::with_welcome();
    for message in session.messages() {
        println!("{}\n", message.render());
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();
    loop {
        print!("अपना सवाल लिखें... > ");
        stdout.flush().context("failed to flush stdout")?;
        line.clear();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("failed to read from stdin")?;
        if read == 0 {
            println!();
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "/quit" | "/exit") {
            break;
        }
        if dry_run {
            if let Err(err) = print_context(assistant, input) {
                warn!(error = %err, "dry-run retrieval failed");
                println!("⚠️ {err}");
            }
            continue;
        }

        let before = session.messages().len();
        assistant.handle_turn(&mut session, input);
        // The user line is already on screen; print only the reply.
        for message in &session.messages()[before + 1..] {
            println!("{}\n", message.render());
        }
    }
    info!(messages = session.messages().len(), "session ended");
    Ok(())
}
