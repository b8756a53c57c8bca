use std::sync::Arc;

use anyhow::Result;
use bat::PrettyPrinter;
use clap::Parser;
use cliclack::{input, spinner};
use console::style;
use dotenv::dotenv;

use confab::agent::{Agent, DEFAULT_MAX_ROUNDS};
use confab::models::message::Message;
use confab::providers::configs::{AnthropicProviderConfig, OpenAiProviderConfig, ProviderConfig};
use confab::providers::factory::get_provider;

mod tools;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Provider option (anthropic or open-ai)
    #[arg(short, long, default_value = "anthropic")]
    #[arg(value_enum)]
    provider: ProviderVariant,

    /// Model to use, defaults to the provider's standard model
    #[arg(short, long)]
    model: Option<String>,

    /// System prompt for the session
    #[arg(short, long, default_value = "You are a helpful assistant.")]
    system: String,

    /// Maximum completions per reply before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_ROUNDS)]
    max_rounds: usize,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ProviderVariant {
    Anthropic,
    OpenAi,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let provider = get_provider(load_config(&cli)?)?;
    let registry = Arc::new(tools::build_registry()?);
    let agent = Agent::new(provider, registry).with_system(cli.system.clone());

    println!(
        "confab {}",
        style("- type \"exit\" to end the session").dim()
    );
    println!("\n");

    let mut history: Vec<Message> = Vec::new();

    loop {
        let message_text: String = input("Message:").placeholder("").multiline().interact()?;

        let trimmed = message_text.trim();
        if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
            break;
        }

        let spin = spinner();
        spin.start("awaiting reply");

        match agent.reply(&history, &message_text, cli.max_rounds).await {
            Ok(reply) => {
                spin.stop("");
                render(&reply).await?;

                // Only the text turns go back into history, tool traffic
                // stays within the round that produced it
                history.push(Message::user().with_text(&message_text));
                history.push(Message::assistant().with_text(&reply));
            }
            Err(error) => {
                spin.stop("");
                println!("{}", style(format!("error: {}", error)).red());
            }
        }

        println!("\n");
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ProviderConfig> {
    match cli.provider {
        ProviderVariant::Anthropic => {
            let mut config = AnthropicProviderConfig::from_env()?;
            if let Some(model) = &cli.model {
                config.model = model.clone();
            }
            Ok(ProviderConfig::Anthropic(config))
        }
        ProviderVariant::OpenAi => {
            let mut config = OpenAiProviderConfig::from_env()?;
            if let Some(model) = &cli.model {
                config.model = model.clone();
            }
            Ok(ProviderConfig::OpenAi(config))
        }
    }
}

async fn render(content: &str) -> Result<()> {
    PrettyPrinter::new()
        .input_from_bytes(content.as_bytes())
        .language("markdown")
        .print()?;
    Ok(())
}
