//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, sets up diagnostics, and
//! dispatches to the chat loop or one of the maintenance subcommands.

pub mod say;
pub mod settings;

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::say::run_say;
use crate::cli::settings::{SettingError, SettingRegistry};
use crate::core::config::data::{path_display, Config};
use crate::core::keyring::{mask_key, ApiKeyStore};
use crate::core::providers::{ProviderCatalog, DEFAULT_PROVIDER};
use crate::core::sessions::ChatSessionStore;
use crate::logging::init_tracing;
use crate::ui::chat_loop::{run_chat, ChatOptions};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_SHA"),
    ", built ",
    env!("VERGEN_BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "murmur")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "A full-screen terminal chat client with read-aloud responses")]
#[command(
    long_about = "murmur is a full-screen terminal chat client for OpenAI-compatible APIs. \
Responses stream in as plain text and are re-rendered as markdown when they finish. \
Finished responses can be copied, regenerated, or read aloud.\n\n\
Authentication:\n\
  Use 'murmur key set' to store an OpenAI key in your system keyring, or\n\
  'murmur key set --provider gemini' (or xai) for another provider.\n\n\
Environment Variables (fallback if no key is stored):\n\
  MURMUR_API_KEY    Your OpenAI key\n\
  OPENAI_API_KEY    Also accepted\n\
  GEMINI_API_KEY    Key for Gemini models\n\
  XAI_API_KEY       Key for Grok models\n\
  MURMUR_LOG        Diagnostic log filter (e.g. 'murmur=debug')\n\n\
Controls:\n\
  Enter             Send the message\n\
  Shift/Alt+Enter   Insert a newline\n\
  Esc               Stop the response or close a dialog\n\
  Tab               Switch focus to the chat list\n\
  PgUp/PgDn/Mouse   Scroll the transcript\n\
  Alt+Up/Down       Pick which response the shortcuts act on\n\
  Ctrl+Y            Copy the response\n\
  Ctrl+R            Regenerate the latest response\n\
  Ctrl+P            Listen to the response (again to stop)\n\
  Ctrl+N            New chat\n\
  Ctrl+S            Settings\n\
  Ctrl+E            Choose a persona\n\
  Ctrl+O / Ctrl+I   Attach a file / an image\n\
  Ctrl+X            Remove attachments\n\
  Ctrl+W            Toggle web search for the next message\n\
  Ctrl+G            Toggle image generation for the next message\n\
  Ctrl+L            Pause or resume the transcript file\n\
  Ctrl+B            Show or hide the chat list\n\
  Ctrl+C            Quit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use instead of the configured default
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Append the conversation to this file
    #[arg(short = 't', long, global = true, value_name = "FILE")]
    pub transcript: Option<PathBuf>,

    /// Write diagnostic logs to this file instead of the data directory
    #[arg(long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// Set a configuration value
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set (may be several words)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset a configuration value
    Unset {
        /// Configuration key to unset
        key: String,
    },
    /// Show the configuration and where it lives
    Config,
    /// Manage stored API keys
    Key {
        #[command(subcommand)]
        action: KeyCommand,
    },
    /// List or delete saved chats
    Chats {
        #[command(subcommand)]
        action: ChatsCommand,
    },
    /// Send one prompt without the interface and print the answer
    Say {
        /// Read the answer aloud after printing it
        #[arg(long)]
        listen: bool,
        /// The prompt
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum KeyCommand {
    /// Store an API key in the system keyring (prompts when omitted)
    Set {
        key: Option<String>,
        /// Provider the key belongs to
        #[arg(long, default_value = DEFAULT_PROVIDER)]
        provider: String,
    },
    /// Remove a stored API key
    Remove {
        #[arg(long, default_value = DEFAULT_PROVIDER)]
        provider: String,
    },
}

#[derive(Subcommand)]
pub enum ChatsCommand {
    /// List saved chats, newest first
    List,
    /// Delete a saved chat by id
    Delete { id: String },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log.clone())?;
    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let config = Config::load()?;
            let options = ChatOptions {
                model: args.model,
                transcript_file: args.transcript,
            };
            run_chat(options, config).await
        }
        Commands::Set { key, value } => {
            let registry = SettingRegistry::new();
            let result = registry
                .get(&key)
                .ok_or(SettingError::UnknownKey(key))
                .and_then(|handler| handler.set(&value));
            report_setting(result)
        }
        Commands::Unset { key } => {
            let registry = SettingRegistry::new();
            let result = registry
                .get(&key)
                .ok_or(SettingError::UnknownKey(key))
                .and_then(|handler| handler.unset());
            report_setting(result)
        }
        Commands::Config => {
            print_config()?;
            Ok(())
        }
        Commands::Key { action } => run_key_command(action),
        Commands::Chats { action } => run_chats_command(action),
        Commands::Say { listen, prompt } => run_say(prompt, args.model, listen).await,
    }
}

fn report_setting(result: Result<String, SettingError>) -> Result<(), Box<dyn Error>> {
    match result {
        Ok(message) => {
            println!("{message}");
            Ok(())
        }
        Err(err) => {
            err.print();
            std::process::exit(1);
        }
    }
}

fn print_config() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let registry = SettingRegistry::new();
    println!("Configuration ({}):", path_display(Config::active_path()));
    for key in registry.keys_display_order() {
        if let Some(handler) = registry.get(key) {
            println!("{}", handler.format(&config));
        }
    }
    if !config.models.is_empty() {
        println!("  models: {} catalog override(s)", config.models.len());
    }
    if !config.personas.is_empty() {
        let names: Vec<&str> = config.personas.iter().map(|p| p.name.as_str()).collect();
        println!("  personas: {}", names.join(", "));
    }

    let store = ApiKeyStore::default();
    for provider in ProviderCatalog::new(&config).providers() {
        let key_line = match store.resolve(provider) {
            Ok(Some((key, source))) => format!("{} (from {source})", mask_key(&key)),
            Ok(None) => "(none)".to_string(),
            Err(err) => format!("(none; {err})"),
        };
        println!("  {} key: {key_line}  [{}]", provider.id, provider.base_url);
    }
    Ok(())
}

/// Canonical id of a known provider.
fn known_provider(config: &Config, provider: &str) -> Result<String, Box<dyn Error>> {
    let catalog = ProviderCatalog::new(config);
    match catalog.find(provider) {
        Some(found) => Ok(found.id.clone()),
        None => {
            let ids: Vec<&str> = catalog.providers().iter().map(|p| p.id.as_str()).collect();
            Err(format!("Unknown provider '{provider}'. Known providers: {}", ids.join(", ")).into())
        }
    }
}

fn run_key_command(action: KeyCommand) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let store = ApiKeyStore::default();
    match action {
        KeyCommand::Set { key, provider } => {
            let provider = known_provider(&config, &provider)?;
            let key = match key {
                Some(key) => key,
                None => prompt_line(&format!("{provider} API key: "))?,
            };
            if key.trim().is_empty() {
                return Err("No key given.".into());
            }
            store.store(&provider, &key)?;
            println!("✅ Stored {provider} API key {}", mask_key(key.trim()));
        }
        KeyCommand::Remove { provider } => {
            let provider = known_provider(&config, &provider)?;
            if store.remove(&provider)? {
                println!("✅ Removed the stored {provider} API key");
            } else {
                println!("No {provider} API key was stored");
            }
        }
    }
    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String, Box<dyn Error>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn run_chats_command(action: ChatsCommand) -> Result<(), Box<dyn Error>> {
    let store = ChatSessionStore::open_default()?;
    match action {
        ChatsCommand::List => {
            let chats = store.list()?;
            if chats.is_empty() {
                println!("No saved chats in {}", path_display(store.dir()));
            }
            for chat in chats {
                println!(
                    "{}  {}  {}  {}",
                    chat.id,
                    chat.updated_at.format("%Y-%m-%d %H:%M"),
                    chat.model,
                    chat.title
                );
            }
        }
        ChatsCommand::Delete { id } => {
            store.delete(&id)?;
            println!("✅ Deleted chat {id}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_chat() {
        let args = Args::try_parse_from(["murmur", "--model", "o3-mini"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.model.as_deref(), Some("o3-mini"));
    }

    #[test]
    fn set_collects_multi_word_values() {
        let args =
            Args::try_parse_from(["murmur", "set", "tts-instructions", "Speak", "slowly"]).unwrap();
        match args.command {
            Some(Commands::Set { key, value }) => {
                assert_eq!(key, "tts-instructions");
                assert_eq!(value, vec!["Speak".to_string(), "slowly".to_string()]);
            }
            _ => panic!("expected set"),
        }
    }

    #[test]
    fn say_accepts_listen_and_global_flags() {
        let args = Args::try_parse_from([
            "murmur", "-m", "gpt-4o-mini", "say", "--listen", "hello", "there",
        ])
        .unwrap();
        assert_eq!(args.model.as_deref(), Some("gpt-4o-mini"));
        match args.command {
            Some(Commands::Say { listen, prompt }) => {
                assert!(listen);
                assert_eq!(prompt, vec!["hello".to_string(), "there".to_string()]);
            }
            _ => panic!("expected say"),
        }
    }

    #[test]
    fn key_commands_default_to_openai() {
        let args = Args::try_parse_from(["murmur", "key", "set", "sk-abc"]).unwrap();
        match args.command {
            Some(Commands::Key {
                action: KeyCommand::Set { key, provider },
            }) => {
                assert_eq!(key.as_deref(), Some("sk-abc"));
                assert_eq!(provider, "openai");
            }
            _ => panic!("expected key set"),
        }

        let args = Args::try_parse_from(["murmur", "key", "remove", "--provider", "xai"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Commands::Key {
                action: KeyCommand::Remove { ref provider }
            }) if provider == "xai"
        ));
    }

    #[test]
    fn provider_names_are_checked() {
        let config = Config::default();
        assert_eq!(known_provider(&config, "Gemini").unwrap(), "gemini");
        let err = known_provider(&config, "acme").unwrap_err().to_string();
        assert!(err.contains("openai, gemini, xai"));
    }

    #[test]
    fn chats_delete_takes_an_id() {
        let args = Args::try_parse_from(["murmur", "chats", "delete", "abc123"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Commands::Chats {
                action: ChatsCommand::Delete { .. }
            })
        ));
    }
}
