use super::Runtime;
use crate::cli::commands::{CacheCommands, Cli, Commands, ConfigCommands};
use crate::config::Config;
use crate::coordinator::{LlmPayload, OutboundEvent, Request, Response};
use crate::extract::ExtractionMethod;
use crate::llm::Delivery;
use crate::types::ChatMessage;
use anyhow::{Context, Result, bail};
use std::io::Write;
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;

/// Run one CLI command against the runtime stored in `dir`.
pub async fn dispatch(cli: Cli, dir: &Path) -> Result<()> {
    let runtime = Runtime::open(dir).await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let gateway = &runtime.config.gateway;
            let host = host.unwrap_or_else(|| gateway.host.clone());
            let port = port.unwrap_or(gateway.port);
            crate::gateway::run_gateway(&host, port, runtime.coordinator.clone(), gateway).await
        }
        Commands::Extract { url, method } => {
            let method = method.unwrap_or(runtime.config.default_extraction_method);
            run_extract(&runtime, &url, method).await
        }
        Commands::Ask {
            url,
            question,
            no_stream,
        } => run_ask(&runtime, &url, &question, no_stream).await,
        Commands::Cache { cache_command } => run_cache(&runtime, cache_command).await,
        Commands::Config { config_command } => match config_command {
            ConfigCommands::Show => {
                let shown = toml::to_string_pretty(&masked(&runtime.config))
                    .context("serialize config")?;
                println!("{shown}");
                Ok(())
            }
            ConfigCommands::Reset => {
                runtime.config_store.reset().await?;
                println!("Configuration reset to defaults.");
                Ok(())
            }
        },
    }
}

async fn run_extract(runtime: &Runtime, url: &str, method: ExtractionMethod) -> Result<()> {
    let response = runtime
        .coordinator
        .handle(Request::ReExtractContent {
            url: url.to_string(),
            method: method.to_string(),
            markup: None,
        })
        .await;
    match response {
        Response::ContentUpdated { content } => {
            println!("{content}");
            Ok(())
        }
        Response::ContentUpdateError { error } => bail!("Extraction failed: {error}"),
        other => bail!("Unexpected response: {other:?}"),
    }
}

async fn run_ask(runtime: &Runtime, url: &str, question: &str, no_stream: bool) -> Result<()> {
    let page = match runtime
        .coordinator
        .handle(Request::GetPageData {
            url: url.to_string(),
            markup: None,
        })
        .await
    {
        Response::PageDataLoaded { data } => data,
        Response::PageDataError { error } => bail!("Could not read {url}: {error}"),
        other => bail!("Unexpected response: {other:?}"),
    };

    let mut messages = page.chat_history;
    messages.push(ChatMessage::user(question));
    let payload = LlmPayload {
        messages,
        system_prompt_template: None,
        extracted_page_content: page.content,
        image_base64: None,
        current_url: url.to_string(),
    };
    let delivery = if no_stream {
        Delivery::Atomic
    } else {
        Delivery::Streaming
    };

    let mut events = runtime.coordinator.subscribe();
    match runtime.coordinator.send_llm_message(payload, delivery).await {
        Response::LlmRequestReceived => {}
        Response::LlmError { error } => bail!("{error}"),
        other => bail!("Unexpected response: {other:?}"),
    }

    let mut stdout = std::io::stdout();
    loop {
        match events.recv().await {
            Ok(OutboundEvent::LlmStreamChunk { chunk }) => {
                print!("{chunk}");
                stdout.flush().context("flush stdout")?;
            }
            Ok(OutboundEvent::LlmStreamEnd { full_response }) => {
                if no_stream {
                    println!("{full_response}");
                } else {
                    println!();
                }
                return Ok(());
            }
            Ok(OutboundEvent::LlmError { error }) => bail!("{error}"),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "answer output fell behind");
            }
            Err(RecvError::Closed) => bail!("answer stream closed unexpectedly"),
        }
    }
}

async fn run_cache(runtime: &Runtime, command: CacheCommands) -> Result<()> {
    let cache = runtime.coordinator.cache();
    match command {
        CacheCommands::List => {
            let urls = cache.recent_urls().await?;
            if urls.is_empty() {
                println!("No cached pages.");
            }
            for (position, url) in urls.iter().enumerate() {
                println!("{:>3}. {url}", position + 1);
            }
            Ok(())
        }
        CacheCommands::Clear { url } => {
            let request = match url {
                Some(url) => Request::ClearUrlData { url },
                None => Request::ClearAllData,
            };
            match runtime.coordinator.handle(request).await {
                Response::ClearResult { success: true, .. } => {
                    println!("Cache cleared.");
                    Ok(())
                }
                Response::ClearResult { error, .. } => {
                    bail!("{}", error.unwrap_or_else(|| "clear failed".into()))
                }
                other => bail!("Unexpected response: {other:?}"),
            }
        }
    }
}

/// Copy of `config` with credentials hidden, for display.
fn masked(config: &Config) -> Config {
    fn mask(secret: &mut String) {
        if !secret.is_empty() {
            *secret = "***".into();
        }
    }

    let mut shown = config.clone();
    mask(&mut shown.jina_api_key);
    mask(&mut shown.llm.providers.openai.api_key);
    mask(&mut shown.llm.providers.gemini.api_key);
    shown
}
