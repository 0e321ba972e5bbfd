//! Interactive front end: one command per line, one controller per shell.

use std::{
    io::Write as _,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::Result;
use client_core::{FileSelection, WorkflowController, WorkflowSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::workflow::{print_alerts, save_artifact, save_preview, warn_missing_sidecars};

const HELP: &str = "\
commands:
  select <path>...  choose the files to upload
  clear             drop the current selection
  upload            send the selection to the backend
  preview           render the uploaded file as a map
  process           reproject the uploaded file
  download          save the processed result
  status            show session and enabled steps
  help              show this text
  quit              leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Select(Vec<PathBuf>),
    Clear,
    Upload,
    Preview,
    Process,
    Download,
    Status,
    Help,
    Quit,
}

impl FromStr for ShellCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        let command = match verb.as_str() {
            "select" => {
                if args.is_empty() {
                    return Err("select needs at least one path".to_string());
                }
                return Ok(ShellCommand::Select(args.into_iter().map(PathBuf::from).collect()));
            }
            "clear" => ShellCommand::Clear,
            "upload" => ShellCommand::Upload,
            "preview" => ShellCommand::Preview,
            "process" => ShellCommand::Process,
            "download" => ShellCommand::Download,
            "status" => ShellCommand::Status,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            other => return Err(format!("unknown command '{other}', try 'help'")),
        };

        if !args.is_empty() {
            return Err(format!("'{verb}' takes no arguments"));
        }
        Ok(command)
    }
}

fn checkbox(enabled: bool) -> &'static str {
    if enabled {
        "[x]"
    } else {
        "[ ]"
    }
}

pub fn render_status(snapshot: &WorkflowSnapshot, selected: usize) -> String {
    let mut lines = vec![format!("stage: {:?}", snapshot.stage)];
    match snapshot.session.active() {
        Some((file_id, filename)) => lines.push(format!("file: {filename} ({file_id})")),
        None => lines.push("file: none uploaded".to_string()),
    }
    lines.push(format!("selected: {selected} file(s)"));
    lines.push(format!(
        "{} preview  {} process  {} download",
        checkbox(snapshot.affordances.preview_enabled),
        checkbox(snapshot.affordances.process_enabled),
        checkbox(snapshot.affordances.download_visible),
    ));
    if let Some(frame) = &snapshot.preview {
        lines.push(format!("preview: {}", frame.object_url));
    }
    if let Some(link) = &snapshot.download_link {
        lines.push(format!("download: {}", link.href));
    }
    if let Some(message) = &snapshot.last_message {
        lines.push(format!("message: {message}"));
    }
    lines.join("\n")
}

pub async fn run(controller: &WorkflowController, output_dir: &Path) -> Result<()> {
    let mut alerts = controller.subscribe_events();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut selection = FileSelection::default();

    println!("{HELP}");
    loop {
        print!("geoflow> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<ShellCommand>() {
            Ok(command) => command,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };

        match command {
            ShellCommand::Select(paths) => match FileSelection::from_paths(&paths).await {
                Ok(picked) => {
                    warn_missing_sidecars(&picked);
                    println!("{} file(s) selected", picked.len());
                    selection = picked;
                }
                Err(err) => eprintln!("{err:#}"),
            },
            ShellCommand::Clear => selection = FileSelection::default(),
            ShellCommand::Upload => {
                if let Ok(session) = controller.upload(std::mem::take(&mut selection)).await {
                    if let Some((file_id, filename)) = session.active() {
                        println!("uploaded {filename} as {file_id}");
                    }
                }
            }
            ShellCommand::Preview => {
                if let Ok(frame) = controller.preview().await {
                    match save_preview(controller, &frame, output_dir).await {
                        Ok(path) => println!("preview saved to {}", path.display()),
                        Err(err) => eprintln!("{err:#}"),
                    }
                }
            }
            ShellCommand::Process => {
                if let Ok(outcome) = controller.process().await {
                    println!("download link: {}", outcome.download_link.href);
                }
            }
            ShellCommand::Download => {
                if let Ok(link) = controller.download().await {
                    match save_artifact(controller, &link, output_dir).await {
                        Ok(path) => println!("result saved to {}", path.display()),
                        Err(err) => eprintln!("{err:#}"),
                    }
                }
            }
            ShellCommand::Status => {
                println!(
                    "{}",
                    render_status(&controller.snapshot().await, selection.len())
                );
            }
            ShellCommand::Help => println!("{HELP}"),
            ShellCommand::Quit => break,
        }
        print_alerts(&mut alerts);
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/shell_tests.rs"]
mod tests;
