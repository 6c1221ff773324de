//! Subcommand implementations.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use beacon_config_and_utils::{Config, Paths};
use beacon_outbox::{
    Event, InteractionSignal, ObserverError, Pipeline, PipelineConfig, PipelineDeps, RetryOutcome,
    SendOutcome,
};
use beacon_storage::{create_storage, CredentialStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

fn open_pipeline(config: &Config, paths: &Paths) -> anyhow::Result<Pipeline> {
    let deps = PipelineDeps::system(config, paths).context("failed to set up pipeline")?;
    let pipeline = Pipeline::init(PipelineConfig::from_config(config), deps);
    pipeline.set_observer(Arc::new(|event: &Event| -> Result<(), ObserverError> {
        debug!(event_id = %event.event_id(), "Event accepted");
        Ok(())
    }));
    Ok(pipeline)
}

fn report(outcome: &SendOutcome) {
    match outcome {
        SendOutcome::Empty => println!("nothing to send"),
        SendOutcome::Skipped => println!("another send is in flight"),
        SendOutcome::Unauthorized => println!("not logged in; run `beacon login` first"),
        SendOutcome::Delivered { count } => println!("delivered {} event(s)", count),
        SendOutcome::Failed { count, error } => {
            println!("failed to deliver {} event(s), kept for retry: {}", count, error)
        }
    }
}

pub async fn track(config: &Config, paths: &Paths, event_id: &str, props: &str) -> anyhow::Result<()> {
    let pipeline = open_pipeline(config, paths)?;
    let event = match pipeline.track_raw(event_id, props) {
        Ok(event) => event,
        Err(rejection) => bail!("event rejected: {}", rejection),
    };
    info!(event_id = %event.event_id(), "Tracked event from command line");

    report(&pipeline.flush_now().await);
    Ok(())
}

pub async fn flush(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let pipeline = open_pipeline(config, paths)?;
    let unsent = pipeline.unsent_events();
    report(&pipeline.send_batch(unsent).await);
    Ok(())
}

pub async fn retry(
    config: &Config,
    paths: &Paths,
    attempts: Option<u32>,
    interval: Option<u64>,
) -> anyhow::Result<()> {
    let pipeline = open_pipeline(config, paths)?;
    let policy = pipeline.config().retry;
    let attempts = attempts.unwrap_or(policy.max_attempts);
    let interval = interval.map(Duration::from_secs).unwrap_or(policy.interval);

    match pipeline.retry_unsent_events(attempts, interval).await {
        RetryOutcome::NothingToRetry => println!("nothing to retry"),
        RetryOutcome::Drained { attempts } => {
            println!("all events delivered after {} attempt(s)", attempts)
        }
        RetryOutcome::Exhausted { attempts, remaining } => {
            bail!("{} event(s) still pending after {} attempt(s)", remaining, attempts)
        }
    }
    Ok(())
}

pub fn pending(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let pipeline = open_pipeline(config, paths)?;
    for event in pipeline.unsent_events() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

pub fn reset(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let pipeline = open_pipeline(config, paths)?;
    let discarded = pipeline.unsent_events().len();
    pipeline.reset_recovery();
    println!("discarded {} persisted event(s)", discarded);
    Ok(())
}

pub fn login(paths: &Paths, api_key: &str, session_id: &str, user_id: Option<&str>) -> anyhow::Result<()> {
    if api_key.trim().is_empty() || session_id.trim().is_empty() {
        bail!("API key and session id must not be blank");
    }
    let credentials = CredentialStore::new(create_storage(paths)?);
    credentials.set_api_key(api_key)?;
    credentials.set_session_id(session_id)?;
    if let Some(user_id) = user_id {
        credentials.set_user_id(user_id)?;
    }
    info!("Stored collector credentials");
    println!("credentials stored");
    Ok(())
}

pub fn logout(paths: &Paths) -> anyhow::Result<()> {
    CredentialStore::new(create_storage(paths)?).clear()?;
    println!("credentials removed");
    Ok(())
}

/// Line protocol on stdin:
///
/// - `<event_id> [json properties]` tracks an event
/// - `@<dom event>` (for example `@mousemove`) reports an interaction
pub async fn run(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let pipeline = open_pipeline(config, paths)?;
    pipeline.start()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => handle_line(&pipeline, &line),
                    None => {
                        info!("Input closed");
                        break;
                    }
                }
            }
            _ = &mut ctrl_c => {
                info!("Received shutdown signal, exiting...");
                break;
            }
        }
    }

    pipeline.stop_flush();
    report(&pipeline.flush_now().await);
    pipeline.shutdown();
    Ok(())
}

fn handle_line(pipeline: &Pipeline, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    if let Some(name) = line.strip_prefix('@') {
        match InteractionSignal::from_dom_event(name) {
            Some(signal) => pipeline.observe_interaction(signal),
            None => warn!(signal = name, "Unknown interaction signal"),
        }
        return;
    }

    let (event_id, props) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    if let Err(rejection) = pipeline.track_raw(event_id, props) {
        warn!(event_id, error = %rejection, "Event not tracked");
    }
}
