//! rally — serve demo A2A agents and inspect peer directories

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rally_a2a::protocol::{AgentCapabilities, AgentCard, AgentSkill};
use rally_a2a::{A2aServer, TaskHandler};
use rally_host::RemoteAgentDirectory;

#[derive(Parser)]
#[command(name = "rally", version, about = "Agent-to-agent task delegation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the greeting demo agent
    ServeGreeting {
        #[arg(long, default_value_t = 9000)]
        port: u16,
        /// Base URL to advertise on the agent card (defaults to the bind address)
        #[arg(long)]
        public_url: Option<String>,
    },
    /// Serve a friend agent answering availability questions with canned text
    ServeFriend {
        /// Declared agent name, e.g. bob_agent
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 9001)]
        port: u16,
        #[arg(long)]
        public_url: Option<String>,
        /// The availability this friend reports
        #[arg(
            long,
            default_value = "I am free between 10:00 and 14:00 every day this week."
        )]
        availability: String,
    },
    /// Fetch the agent cards behind a set of URLs and print the directory
    Discover {
        /// Comma-separated peer base URLs
        #[arg(long, value_delimiter = ',')]
        urls: Vec<String>,
    },
}

struct GreetingHandler;

#[async_trait]
impl TaskHandler for GreetingHandler {
    async fn handle(&self, _text: &str, _session_id: &str) -> Result<String> {
        Ok("Hello there. Greeting agent says hi!".to_string())
    }
}

struct FriendHandler {
    name: String,
    availability: String,
}

#[async_trait]
impl TaskHandler for FriendHandler {
    async fn handle(&self, text: &str, _session_id: &str) -> Result<String> {
        info!("{} was asked: {text}", self.name);
        Ok(self.availability.clone())
    }
}

fn greeting_card(url: String) -> AgentCard {
    AgentCard {
        name: "greeting_agent".to_string(),
        description: "Greets the user".to_string(),
        url,
        version: "1.0.0".to_string(),
        capabilities: AgentCapabilities::default(),
        skills: vec![AgentSkill {
            id: "greet".to_string(),
            name: "Greet".to_string(),
            description: Some("Returns a greeting".to_string()),
            tags: Some(vec!["greeting".to_string(), "hello".to_string()]),
            examples: Some(vec!["Hey".to_string(), "Hello".to_string()]),
            input_modes: None,
            output_modes: None,
        }],
    }
}

fn friend_card(name: &str, url: String) -> AgentCard {
    AgentCard {
        name: name.to_string(),
        description: format!("{name} shares their pickleball availability"),
        url,
        version: "1.0.0".to_string(),
        capabilities: AgentCapabilities::default(),
        skills: vec![AgentSkill {
            id: "availability".to_string(),
            name: "Share availability".to_string(),
            description: Some("Answers questions about free time slots".to_string()),
            tags: Some(vec!["scheduling".to_string(), "pickleball".to_string()]),
            examples: Some(vec![
                "Are you available for pickleball between 2025-01-01 and 2025-01-03?".to_string(),
            ]),
            input_modes: None,
            output_modes: None,
        }],
    }
}

async fn serve(card: AgentCard, handler: Arc<dyn TaskHandler>, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    A2aServer::new(card, handler).serve(listener).await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rally=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::ServeGreeting { port, public_url } => {
            let url = public_url.unwrap_or_else(|| format!("http://127.0.0.1:{port}"));
            serve(greeting_card(url), Arc::new(GreetingHandler), port).await
        }
        Command::ServeFriend {
            name,
            port,
            public_url,
            availability,
        } => {
            let url = public_url.unwrap_or_else(|| format!("http://127.0.0.1:{port}"));
            let card = friend_card(&name, url);
            let handler = FriendHandler { name, availability };
            serve(card, Arc::new(handler), port).await
        }
        Command::Discover { urls } => {
            let directory = RemoteAgentDirectory::discover(&urls).await;
            println!("{}", directory.describe_all());
            for (url, error) in directory.failures() {
                eprintln!("failed: {url}: {error}");
            }
            Ok(())
        }
    }
}
