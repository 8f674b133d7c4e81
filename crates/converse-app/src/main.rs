//! Converse terminal client - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Apply environment and CLI overrides
//! 3. Build the conversation controller around the selected backend
//! 4. Run a line-oriented chat loop on stdin

mod cli;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use converse_chat::{ConversationController, HostCallbacks, SendOutcome, SpeechInputBridge};
use converse_core::config::ConverseConfig;
use converse_core::types::{AttachmentMeta, Sender};
use converse_core::ThemeResolver;
use converse_llm::select_backend;

use cli::CliArgs;

const HELP: &str = "Commands: /attach <path>, /detach, /mic, /history, /theme, /quit";

/// Logs host notifications.
struct LoggingCallbacks;

impl HostCallbacks for LoggingCallbacks {
    fn on_send(&self, text: &str, attachment: Option<&AttachmentMeta>) {
        tracing::debug!(
            chars = text.chars().count(),
            attachment = attachment.map(|a| a.name.as_str()).unwrap_or(""),
            "Message sent"
        );
    }

    fn on_file_upload(&self, attachment: &AttachmentMeta) {
        tracing::info!(
            name = %attachment.name,
            mime = %attachment.mime_type,
            size_bytes = attachment.size_bytes,
            "File attached"
        );
    }
}

fn print_history(controller: &ConversationController) {
    for message in controller.messages() {
        let who = match message.sender {
            Sender::User => "you",
            Sender::Bot => "bot",
        };
        let attachment = message
            .attachment
            .as_ref()
            .map(|a| format!(" [{}]", a.name))
            .unwrap_or_default();
        println!(
            "{} {}{}: {}",
            message.created_at.format("%H:%M:%S"),
            who,
            attachment,
            message.text
        );
    }
}

async fn attach_file(controller: &ConversationController, path: &str) {
    if path.is_empty() {
        println!("usage: /attach <path>");
        return;
    }
    match controller.attach_path(path).await {
        Ok(()) => {
            let name = controller.attachment().map(|a| a.name).unwrap_or_default();
            println!("attached {}", name);
        }
        Err(e) => println!("cannot attach: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = ConverseConfig::load_or_default(&config_file);
    config.apply_env_overrides();
    if let Some(persona) = args.persona.clone() {
        config.chat.persona_instruction = Some(persona);
    }
    if args.disabled {
        config.chat.disabled = true;
    }

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(args.resolve_log_filter(&config.general.log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Converse v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    let controller = ConversationController::from_config(&config, None)?
        .with_callbacks(Arc::new(LoggingCallbacks));
    // No speech recognizer is available in a terminal session.
    let speech = SpeechInputBridge::from_config(&config.speech, None, controller.input_buffer());
    let themes = ThemeResolver::new();

    println!("Connected to {}. {}", select_backend(&config.providers), HELP);
    print_history(&controller);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        match command {
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            "/attach" => attach_file(&controller, rest.trim()).await,
            "/detach" => match controller.remove_attachment() {
                Some(a) => println!("removed {}", a.meta.name),
                None => println!("nothing attached"),
            },
            "/mic" => {
                if !speech.is_available() {
                    println!("voice input is not available");
                    continue;
                }
                match speech.toggle() {
                    Ok(state) => println!("voice input: {}", state),
                    Err(e) => println!("{}", e),
                }
            }
            "/history" => print_history(&controller),
            "/theme" => {
                let output = themes.resolve(&config.theme);
                for (name, value) in output.variables.iter() {
                    println!("{}: {}", name, value);
                }
            }
            _ => {
                controller.set_input(line);
                match controller.handle_send().await {
                    SendOutcome::Sent { reply, .. } => println!("bot: {}", reply.text),
                    SendOutcome::Ignored(reason) => println!("({})", reason),
                }
            }
        }
    }

    speech.stop();
    tracing::info!("Converse stopped");
    Ok(())
}
