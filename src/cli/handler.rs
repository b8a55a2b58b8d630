use super::error;
use super::output;
use super::{Commands, ConfigAction};
use crate::app::config::Config;
use crate::app::state::AppState;
use crate::download::Controller;
use crate::download::intake::{self, IntakeError};
use crate::download::media::{FormatOption, batch_format_label};
use crate::download::task::{TaskId, TaskState};
use crate::gateway::TaskGateway;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// How often one-shot commands print progress
const FOLLOW_INTERVAL: Duration = Duration::from_millis(500);

/// Handle a CLI command and return exit code
pub async fn handle_command<G: TaskGateway + ?Sized + 'static>(
    command: Commands,
    state: AppState,
    controller: Controller<G>,
) -> i32 {
    let result = match command {
        Commands::Analyze { urls, file, json } => {
            handle_analyze(urls, file, json, &state, &controller).await
        }
        Commands::Download { url, format, json } => {
            handle_download(url, format, json, &state, &controller).await
        }
        Commands::Batch {
            urls,
            file,
            format,
            json,
        } => handle_batch(urls, file, format, json, &state, &controller).await,
        Commands::Config { action } => return handle_config(action, &state).await,
    };

    finish(result)
}

/// Config commands need no backend
pub async fn handle_config(action: ConfigAction, state: &AppState) -> i32 {
    let result = match action {
        ConfigAction::Show { json } => show_config(state, json).await,
        ConfigAction::Path => crate::util::paths::get_app_config_path().map(|path| {
            println!("{}", path.display());
            error::SUCCESS
        }),
        ConfigAction::Reset => reset_config(state).await,
    };
    finish(result)
}

fn finish(result: Result<i32>) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            error::ERROR
        }
    }
}

async fn show_config(state: &AppState, json: bool) -> Result<i32> {
    let config = state.config.read().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&*config)?);
    } else {
        println!("{}", toml::to_string_pretty(&*config)?);
    }
    Ok(error::SUCCESS)
}

async fn reset_config(state: &AppState) -> Result<i32> {
    let mut config = state.config.write().await;
    *config = Config::default();
    config.save()?;
    println!("Configuration reset to defaults");
    Ok(error::SUCCESS)
}

/// Merge positional links with the contents of `--file`
fn collect_links(urls: Vec<String>, file: Option<PathBuf>) -> Result<String> {
    let mut raw = urls.join("\n");
    if let Some(path) = file {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read link file {:?}", path))?;
        raw.push('\n');
        raw.push_str(&content);
    }
    Ok(raw)
}

fn intake_exit_code(e: &IntakeError) -> i32 {
    match e {
        IntakeError::EmptyInput => error::INVALID_INPUT,
        _ => error::ERROR,
    }
}

async fn analyze_timeout(state: &AppState) -> Duration {
    state.config.read().await.intake.analyze_timeout()
}

/// Analyze links and print their formats
async fn handle_analyze<G: TaskGateway + ?Sized + 'static>(
    urls: Vec<String>,
    file: Option<PathBuf>,
    json: bool,
    state: &AppState,
    controller: &Controller<G>,
) -> Result<i32> {
    let raw = collect_links(urls, file)?;
    let timeout = analyze_timeout(state).await;

    match intake::analyze_input(controller.gateway().as_ref(), &raw, timeout).await {
        Ok(items) => {
            println!("{}", output::format_media_list(&items, json));
            Ok(error::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", output::format_dialog(&e.to_dialog(&state.i18n)));
            Ok(intake_exit_code(&e))
        }
    }
}

/// Analyze one link, start the chosen format and follow it
async fn handle_download<G: TaskGateway + ?Sized + 'static>(
    url: String,
    format: Option<String>,
    json: bool,
    state: &AppState,
    controller: &Controller<G>,
) -> Result<i32> {
    let timeout = analyze_timeout(state).await;
    let format_id = match format {
        Some(id) => id,
        None => state.config.read().await.intake.default_format.clone(),
    };

    let urls = [url.trim().to_string()];
    let info = match intake::analyze_urls(controller.gateway().as_ref(), &urls, timeout).await {
        Ok(mut items) if !items.is_empty() => items.remove(0),
        Ok(_) => return Ok(error::ERROR),
        Err(e) => {
            eprintln!("{}", output::format_dialog(&e.to_dialog(&state.i18n)));
            return Ok(intake_exit_code(&e));
        }
    };

    let format = info
        .formats
        .iter()
        .find(|f| f.normalized_id() == format_id)
        .cloned()
        .unwrap_or_else(|| {
            tracing::info!("Format {} not listed for {}, requesting it anyway", format_id, url);
            FormatOption {
                label: batch_format_label(&format_id),
                id: format_id.clone(),
                ext: "MP4".to_string(),
                size: None,
            }
        });

    let started = controller.dispatcher().start_download(info.request_for(&format)).await;
    print_dialogs(controller).await;
    match started {
        Some(id) => follow_tasks(controller, &[id], json).await,
        None => Ok(error::ERROR),
    }
}

/// Batch-start links with one format and follow all of them
async fn handle_batch<G: TaskGateway + ?Sized + 'static>(
    urls: Vec<String>,
    file: Option<PathBuf>,
    format: Option<String>,
    json: bool,
    state: &AppState,
    controller: &Controller<G>,
) -> Result<i32> {
    let raw = collect_links(urls, file)?;
    let format_id = match format {
        Some(id) => id,
        None => state.config.read().await.intake.default_format.clone(),
    };

    let ids = controller.dispatcher().start_batch(&raw, &format_id).await;
    print_dialogs(controller).await;
    if ids.is_empty() {
        let code = if crate::util::url_list::has_urls(&raw) {
            error::ERROR
        } else {
            error::INVALID_INPUT
        };
        return Ok(code);
    }

    follow_tasks(controller, &ids, json).await
}

async fn print_dialogs<G: TaskGateway + ?Sized + 'static>(controller: &Controller<G>) {
    let dialogs = controller.context().lock().await.take_dialogs();
    for dialog in dialogs {
        eprintln!("{}", output::format_dialog(&dialog));
    }
}

/// Print progress until every task is terminal. Ctrl-C cancels the tasks
/// that are still running.
async fn follow_tasks<G: TaskGateway + ?Sized + 'static>(
    controller: &Controller<G>,
    ids: &[TaskId],
    json: bool,
) -> Result<i32> {
    let mut last_lines: HashMap<TaskId, String> = HashMap::new();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        let (lines, finished, all_completed) = {
            let ctx = controller.context().lock().await;
            let mut lines = Vec::new();
            let mut finished = true;
            let mut all_completed = true;
            for id in ids {
                let Some(task) = ctx.registry.get(id) else {
                    continue;
                };
                let line = if json {
                    output::task_json(task).to_string()
                } else {
                    output::format_task(task, ctx.i18n())
                };
                if last_lines.get(id) != Some(&line) {
                    last_lines.insert(id.clone(), line.clone());
                    lines.push(line);
                }
                finished &= task.is_terminal();
                all_completed &= task.state() == TaskState::Completed;
            }
            (lines, finished, all_completed)
        };

        for line in lines {
            println!("{}", line);
        }
        if finished {
            return Ok(if all_completed {
                error::SUCCESS
            } else {
                error::ERROR
            });
        }

        tokio::select! {
            _ = tokio::time::sleep(FOLLOW_INTERVAL) => {}
            _ = &mut interrupt => {
                eprintln!("Interrupted, cancelling downloads...");
                for id in ids {
                    controller.dispatcher().cancel_or_close(id).await;
                }
                return Ok(error::ERROR);
            }
        }
    }
}
