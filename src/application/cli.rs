#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::io;
use std::io::IsTerminal;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgGroup;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Password;
use strum::VariantNames;
use tokio::fs;
use yansi::Paint;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::services::Sessions;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

async fn print_sessions_list() -> Result<()> {
    let sessions = Sessions::default().list().await?;

    if sessions.is_empty() {
        println!("There are no sessions available. Save a chat from the web UI to keep it!");
    } else {
        let lines = sessions
            .iter()
            .map(|name| return format!("- {name}"))
            .collect::<Vec<String>>();
        println!("{}", lines.join("\n"));
    }

    return Ok(());
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    fs::write(&config_file_path, Config::serialize_default(build())).await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

/// Makes sure an API key is available before anything is served, asking for
/// one on the terminal when none was configured.
pub fn ensure_api_key() -> Result<()> {
    if !Config::get(ConfigKey::ApiKey).is_empty() {
        return Ok(());
    }

    if io::stdin().is_terminal() {
        let api_key = Password::with_theme(&ColorfulTheme::default())
            .with_prompt("OpenRouter API Key")
            .allow_empty_password(true)
            .interact()?;
        Config::set(ConfigKey::ApiKey, api_key.trim());
    }

    if Config::get(ConfigKey::ApiKey).is_empty() {
        bail!(
            "No OpenRouter API key configured. Set OPENROUTER_API_KEY, pass --{}, or add it to {}",
            ConfigKey::ApiKey,
            Config::get(ConfigKey::ConfigFile)
        );
    }

    return Ok(());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_debug() -> Command {
    return Command::new("debug")
        .about("Debug helpers for bogum-chat")
        .hide(true)
        .subcommand(
            Command::new("log-path").about("Output path to debug log file generated when running with environment variable RUST_LOG=bogum_chat")
        )
        .subcommand(
            Command::new("enum-config").about("List all config keys as strings.")
        );
}

fn subcommand_sessions_delete() -> Command {
    return Command::new("delete")
        .about("Delete one or all saved chats.")
        .arg(
            clap::Arg::new("name")
                .short('n')
                .long("name")
                .help("Saved chat name")
                .num_args(1),
        )
        .arg(
            clap::Arg::new("all")
                .long("all")
                .help("Delete all saved chats.")
                .action(ArgAction::SetTrue),
        )
        .group(
            ArgGroup::new("delete-args")
                .args(["name", "all"])
                .required(true),
        );
}

fn subcommand_sessions_rename() -> Command {
    return Command::new("rename")
        .about("Rename a saved chat.")
        .arg(
            clap::Arg::new("from")
                .long("from")
                .help("Current name")
                .num_args(1)
                .required(true),
        )
        .arg(
            clap::Arg::new("to")
                .long("to")
                .help("New name")
                .num_args(1)
                .required(true),
        );
}

fn subcommand_sessions() -> Command {
    return Command::new("sessions")
        .about("Manage saved chats.")
        .arg_required_else_help(true)
        .subcommand(Command::new("dir").about("Print the saved chats directory path."))
        .subcommand(Command::new("list").about("List all saved chats."))
        .subcommand(subcommand_sessions_delete())
        .subcommand(subcommand_sessions_rename());
}

fn subcommand_serve() -> Command {
    return Command::new("serve").about("Start the chat web UI. This is the default command.");
}

fn arg_global(key: ConfigKey, env: &'static str, help: String) -> Arg {
    return Arg::new(key.to_string())
        .long(key.to_string())
        .env(env)
        .num_args(1)
        .help(help)
        .global(true);
}

pub fn build() -> Command {
    let about = format!(
        "{}\n\nVersion: {}\nCommit: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    );

    return Command::new("bogum-chat")
        .about(about)
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(false)
        .subcommand(subcommand_serve())
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_debug())
        .subcommand(subcommand_sessions())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("BOGUM_CHAT_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            arg_global(ConfigKey::ApiKey, "OPENROUTER_API_KEY", "OpenRouter API key used for chat completions.".to_string())
                .hide_env_values(true),
        )
        .arg(arg_global(
            ConfigKey::ApiURL,
            "BOGUM_CHAT_API_URL",
            format!("OpenRouter API URL. Can be swapped to any OpenAI compatible endpoint. [default: {}]", Config::default(ConfigKey::ApiURL)),
        ))
        .arg(arg_global(
            ConfigKey::BackendHealthCheckTimeout,
            "BOGUM_CHAT_BACKEND_HEALTH_CHECK_TIMEOUT",
            format!("Time to wait in milliseconds before timing out when health checking the completion endpoint. [default: {}]", Config::default(ConfigKey::BackendHealthCheckTimeout)),
        ))
        .arg(
            arg_global(
                ConfigKey::Listen,
                "BOGUM_CHAT_LISTEN",
                format!("Address the web UI listens on. [default: {}]", Config::default(ConfigKey::Listen)),
            )
            .short('l'),
        )
        .arg(
            arg_global(
                ConfigKey::Model,
                "BOGUM_CHAT_MODEL",
                format!("Model used for chat completions. [default: {}]", Config::default(ConfigKey::Model)),
            )
            .short('m'),
        )
        .arg(arg_global(
            ConfigKey::ProfileImage,
            "BOGUM_CHAT_PROFILE_IMAGE",
            format!("URL or local file path of the persona's profile image. [default: {}]", Config::default(ConfigKey::ProfileImage)),
        ))
        .arg(arg_global(
            ConfigKey::SessionsDir,
            "BOGUM_CHAT_SESSIONS_DIR",
            format!("Directory saved chats are stored in. [default: {}]", Config::default(ConfigKey::SessionsDir)),
        ));
}

/// Parses arguments and runs any one-shot subcommand. Returns true when the
/// web UI should be started.
pub async fn parse() -> Result<bool> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("debug", debug_matches)) => {
            match debug_matches.subcommand() {
                Some(("log-path", _)) => {
                    let log_path = crate::log_dir().join("debug.log");
                    println!("{}", log_path.to_string_lossy());
                }
                Some(("enum-config", _)) => {
                    let res = ConfigKey::VARIANTS.join("\n");
                    println!("{}", res);
                }
                _ => {
                    subcommand_debug().print_long_help()?;
                }
            }

            return Ok(false);
        }
        Some(("serve", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
            return Ok(false);
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(false);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(false);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(false);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(false);
            }
        },
        Some(("sessions", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
            match subcmd_matches.subcommand() {
                Some(("dir", _)) => {
                    let dir = Sessions::default().cache_dir.to_string_lossy().to_string();
                    println!("{dir}");
                }
                Some(("list", _)) => {
                    print_sessions_list().await?;
                }
                Some(("delete", delete_matches)) => {
                    if let Some(name) = delete_matches.get_one::<String>("name") {
                        Sessions::default().delete(name).await?;
                        println!("Deleted saved chat {name}");
                    } else if delete_matches.get_flag("all") {
                        Sessions::default().delete_all().await?;
                        println!("Deleted all saved chats");
                    } else {
                        subcommand_sessions_delete().print_long_help()?;
                    }
                }
                Some(("rename", rename_matches)) => {
                    let from = rename_matches.get_one::<String>("from");
                    let to = rename_matches.get_one::<String>("to");
                    if let (Some(from), Some(to)) = (from, to) {
                        let file_name = Sessions::default().rename(from, to).await?;
                        println!(
                            "Renamed saved chat {from} to {}",
                            Paint::green(Sessions::display_name(&file_name))
                        );
                    }
                }
                _ => {
                    subcommand_sessions().print_long_help()?;
                }
            }

            return Ok(false);
        }
        _ => {
            Config::load(vec![&matches]).await?;
        }
    }

    return Ok(true);
}
