use clap::{Parser, Subcommand};
use lib::chatbot::{ChatbotStore, ChatbotUpdate};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hookchat")]
#[command(about = "hookchat CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config and an empty chatbot store).
    Init {
        /// Config file path (default: HOOKCHAT_CONFIG_PATH or ~/.hookchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Run the gateway (legacy and strict chat endpoints, widget settings, health).
    Gateway {
        /// Config file path (default: HOOKCHAT_CONFIG_PATH or ~/.hookchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP port (default from config or 15151)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Manage chatbot records in the store.
    Chatbot {
        /// Config file path (default: HOOKCHAT_CONFIG_PATH or ~/.hookchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        #[command(subcommand)]
        action: ChatbotCommand,
    },

    /// Chat with a chatbot through the running gateway's strict endpoint (interactive).
    Chat {
        /// Config file path (default: HOOKCHAT_CONFIG_PATH or ~/.hookchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Chatbot id to talk to.
        #[arg(long, value_name = "ID")]
        chatbot: String,
    },
}

#[derive(Subcommand)]
enum ChatbotCommand {
    /// List chatbots.
    List,

    /// Create a chatbot with default display settings.
    Add {
        /// Display name (default: "My First Chatbot")
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, value_name = "URL")]
        webhook_url: Option<String>,
        /// Primary color as #RRGGBB
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        welcome: Option<String>,
    },

    /// Update fields of an existing chatbot. Pass an empty --webhook-url to clear it.
    Set {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_name = "URL")]
        webhook_url: Option<String>,
        /// Primary color as #RRGGBB
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        welcome: Option<String>,
    },

    /// Delete a chatbot.
    Remove { id: String },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("hookchat {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chatbot { config, action }) => {
            if let Err(e) = run_chatbot(config, action).await {
                log::error!("chatbot command failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, chatbot }) => {
            if let Err(e) = run_chat(config, chatbot).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_gateway(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!("starting gateway on {}:{}", config.gateway.bind, config.gateway.port);
    lib::gateway::run_gateway(config, path).await
}

async fn run_chatbot(config_path: Option<PathBuf>, action: ChatbotCommand) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    let store_path = lib::config::resolve_store_path(&config, &path);
    let store = ChatbotStore::load(&store_path).await?;

    match action {
        ChatbotCommand::List => {
            let records = store.list().await;
            if records.is_empty() {
                println!("no chatbots in {}", store_path.display());
            }
            for r in records {
                let webhook = if r.webhook_url.is_empty() {
                    "(no webhook)"
                } else {
                    r.webhook_url.as_str()
                };
                println!("{}  {}  {}  {}", r.id, r.name, r.primary_color, webhook);
            }
        }
        ChatbotCommand::Add {
            name,
            webhook_url,
            color,
            welcome,
        } => {
            let record = store
                .create(
                    &name,
                    ChatbotUpdate {
                        name: None,
                        webhook_url,
                        primary_color: color,
                        welcome_message: welcome,
                    },
                )
                .await?;
            println!("created chatbot {} ({})", record.id, record.name);
        }
        ChatbotCommand::Set {
            id,
            name,
            webhook_url,
            color,
            welcome,
        } => {
            let record = store
                .update(
                    &id,
                    ChatbotUpdate {
                        name,
                        webhook_url,
                        primary_color: color,
                        welcome_message: welcome,
                    },
                )
                .await?;
            println!("updated chatbot {} ({})", record.id, record.name);
        }
        ChatbotCommand::Remove { id } => {
            let record = store.remove(&id).await?;
            println!("removed chatbot {} ({})", record.id, record.name);
        }
    }
    Ok(())
}

async fn run_chat(config_path: Option<PathBuf>, chatbot_id: String) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, _) = lib::config::load_config(config_path)?;
    let url = format!(
        "http://{}:{}{}",
        config.gateway.bind.trim(),
        config.gateway.port,
        lib::gateway::STRICT_CHAT_PATH
    );
    let client = reqwest::Client::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        match chat_turn(&client, &url, &chatbot_id, input).await {
            Ok(reply) => println!("< {}", reply.trim()),
            Err(e) => eprintln!("chat error: {}", e),
        }
    }

    Ok(())
}

/// One strict-endpoint round trip. Error statuses still carry a displayable `reply` when the
/// failure was upstream; otherwise the `error` field is returned as the error.
async fn chat_turn(
    client: &reqwest::Client,
    url: &str,
    chatbot_id: &str,
    message: &str,
) -> Result<String, String> {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let res = client
        .post(url)
        .json(&serde_json::json!({
            "chatbot_id": chatbot_id,
            "message": message,
            "timestamp": timestamp,
        }))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    let status = res.status();
    let body: serde_json::Value = res.json().await.map_err(|e| e.to_string())?;
    if let Some(reply) = body.get("reply").and_then(|v| v.as_str()) {
        if !status.is_success() {
            log::debug!("gateway answered {}: {}", status, body);
        }
        return Ok(reply.to_string());
    }
    let err = body
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("no reply in gateway response");
    Err(format!("{} ({})", err, status))
}
