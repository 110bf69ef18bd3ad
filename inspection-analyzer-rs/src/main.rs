// inspection-analyzer-rs/src/main.rs
// Main Entry Point for inspection-analyzer
// Runs a sequential analysis batch over the given media URLs

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use media_analysis_sdk::config::{CompositeConfigProvider, MemoryConfigProvider, DEFAULT_PROVIDER};
use media_analysis_sdk::{EdgeFunctionClient, GovernorBuilder, LogNotifier};

mod args;
use args::{CliArgs, UsageError, USAGE};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match CliArgs::parse(env::args().skip(1)) {
        Ok(args) => args,
        Err(UsageError::Help) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

/// Analyze every URL; returns whether all of them succeeded
async fn run(args: CliArgs) -> anyhow::Result<bool> {
    let provider = layered_provider(&args.overrides);

    let backend = EdgeFunctionClient::from_provider(&provider)
        .context("Failed to configure the analysis function client")?;
    log::info!("Analysis function endpoint: {}", backend.config().endpoint());

    let queue = GovernorBuilder::from_provider(&provider)
        .context("Invalid governor configuration")?
        .backend(Arc::new(backend))
        .notifier(Arc::new(LogNotifier))
        .build_sequential()?;
    let queue = Arc::new(queue);

    let interrupted = Arc::clone(&queue);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling the remaining analyses");
            interrupted.cancel();
            interrupted.governor().cancel_all_analysis();
        }
    });

    let state = queue
        .analyze_sequentially(&args.media_urls, &args.question, args.answer.as_deref())
        .await;

    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(!state.has_errors())
}

/// Command-line overrides first, then the environment
fn layered_provider(overrides: &[(String, String)]) -> CompositeConfigProvider {
    let mut flags = MemoryConfigProvider::new();
    for (key, value) in overrides {
        flags.set(key.as_str(), value);
    }

    let mut provider = CompositeConfigProvider::new();
    provider.add_provider(flags);
    provider.add_provider((**DEFAULT_PROVIDER).clone());
    provider
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_analysis_sdk::config::{ConfigProvider, SequentialConfig};
    use std::time::Duration;

    #[test]
    fn test_overrides_take_precedence() {
        let provider = layered_provider(&[
            ("sequential_inter_item_delay".to_string(), "250ms".to_string()),
            ("analysis_function_name".to_string(), "analyze-media-v2".to_string()),
        ]);

        assert_eq!(SequentialConfig::from_provider(&provider).inter_item_delay, Duration::from_millis(250));
        assert_eq!(provider.get_string("analysis_function_name").unwrap(), "analyze-media-v2");
    }
}
