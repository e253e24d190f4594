use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::prelude::*;

use handset_sim::{
    ConversationView, Device, Direction, Engine, GatewayClient, OutboxItemView, SimError, ViewSink,
};

/// Canned command bodies the gateway understands; plain message text as far
/// as the engine is concerned.
const QUICK_COMMANDS: &[&str] = &["REG MOTHER CAMP A ZONE 3", "EMERGENCY", "HELP"];

#[derive(Parser)]
#[command(name = "sim-console")]
#[command(about = "Interactive console for driving an SMS-gateway simulator")]
struct Cli {
    /// Base URL of the simulator API
    #[arg(
        long,
        default_value = "http://127.0.0.1:8080/api/simulator",
        env = "SIM_BASE_URL"
    )]
    base_url: String,

    /// Outbox poll interval in milliseconds (0 disables polling)
    #[arg(long, default_value = "2000")]
    poll_ms: u64,

    /// Country calling code assumed for local-format phone numbers
    #[arg(long, default_value = "249")]
    country_code: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn format_time(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%H:%M").to_string()
}

/// Paints engine view models as plain lines. Poll-driven updates interleave
/// with the prompt; that's fine for a tester's console.
struct ConsoleSink;

impl ViewSink for ConsoleSink {
    fn conversation(&self, view: ConversationView) {
        match view {
            ConversationView::Empty => println!("-- no device selected --"),
            ConversationView::Loading => println!("   loading conversation..."),
            ConversationView::Failed(message) => println!("!! {message}"),
            ConversationView::Messages(messages) if messages.is_empty() => {
                println!("-- no messages yet; send one to start the conversation --");
            }
            ConversationView::Messages(messages) => {
                for message in &messages {
                    let arrow = match message.direction {
                        Direction::Inbound => "->",
                        Direction::Outbound => "<-",
                    };
                    let rtl = if message.rtl { " [rtl]" } else { "" };
                    println!(
                        "  {} {} {}{}",
                        format_time(message.timestamp),
                        arrow,
                        message.body,
                        rtl
                    );
                }
            }
        }
    }

    fn devices(&self, devices: &[Device]) {
        if devices.is_empty() {
            println!("devices: (none)");
            return;
        }
        println!("devices:");
        for device in devices {
            if device.label.is_empty() {
                println!("  {} ({} msgs)", device.phone_number, device.message_count);
            } else {
                println!(
                    "  {} [{}] ({} msgs)",
                    device.phone_number, device.label, device.message_count
                );
            }
        }
    }

    fn outbox(&self, items: &[OutboxItemView]) {
        if items.is_empty() {
            println!("outbox: (empty)");
            return;
        }
        println!("outbox ({} messages, newest first):", items.len());
        for item in items {
            let rtl = if item.rtl { " [rtl]" } else { "" };
            println!(
                "  {} To: {} {}{}",
                format_time(item.timestamp),
                item.phone_number,
                item.body,
                rtl
            );
        }
    }

    fn notice(&self, message: &str) {
        eprintln!("!! {message}");
    }
}

fn print_help() {
    println!("commands:");
    println!("  /use <phone>   select (or add) a device by phone number");
    println!("  /devices       refresh the device list");
    println!("  /outbox        refresh the outbox");
    println!("  /reset         clear all conversations and the outbox");
    println!("  /help          this help");
    println!("  /quit          exit");
    println!("anything else is sent as a message from the selected device.");
    println!("quick commands the gateway understands:");
    for cmd in QUICK_COMMANDS {
        println!("  {cmd}");
    }
}

fn print_prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

async fn confirm_reset(lines: &mut Lines<BufReader<Stdin>>) -> Result<bool> {
    print!("reset all conversations and the outbox? [y/N] ");
    let _ = std::io::stdout().flush();
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.debug {
        "handset_sim=debug,info"
    } else {
        "handset_sim=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    let client = GatewayClient::new(&cli.base_url);
    let engine = Arc::new(
        Engine::new(Arc::new(client), Arc::new(ConsoleSink)).with_country_code(&cli.country_code),
    );

    println!("sim-console connected to {} -- /help for commands", cli.base_url);
    engine.bootstrap().await;
    if cli.poll_ms > 0 {
        engine.start_polling(Duration::from_millis(cli.poll_ms));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_prompt();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "/help" => print_help(),
            "/quit" | "/exit" => break,
            "/devices" => engine.refresh_devices().await,
            "/outbox" => engine.refresh_outbox().await,
            "/reset" => {
                if confirm_reset(&mut lines).await? {
                    // Failure is already surfaced through the sink
                    let _ = engine.reset().await;
                } else {
                    println!("reset cancelled");
                }
            }
            _ if line.starts_with("/use") => {
                let phone = line.trim_start_matches("/use").trim();
                if phone.is_empty() {
                    println!("usage: /use <phone>");
                } else {
                    engine.add_device(phone).await;
                }
            }
            _ if line.starts_with('/') => {
                println!("unknown command: {line} (/help for the list)");
            }
            body => {
                if let Err(err @ SimError::Validation(_)) = engine.send_message(body).await {
                    // Transport failures already went through the sink
                    println!("{err}");
                }
            }
        }
        print_prompt();
    }

    engine.stop_polling();
    Ok(())
}
