//! Relay CLI - send a prompt through the schema adapter.

use std::io::{self, IsTerminal, Read, Write};

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;

use relay_core::{
    Config, ContentGenerator, Contents, GenerateContentParameters, GenerationConfig,
    create_generator, estimate_tokens,
};

/// Relay CLI - talk to an OpenAI-compatible endpoint through the content API
#[derive(Parser)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Message to send (reads from stdin if not provided)
    message: Option<String>,

    /// Stream the response as it is generated
    #[arg(short, long)]
    stream: bool,

    /// Print the estimated token count instead of calling the API
    #[arg(short, long)]
    count_tokens: bool,

    /// Override the model from config
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature
    #[arg(short, long)]
    temperature: Option<f64>,

    /// Upper bound on generated tokens
    #[arg(long)]
    max_tokens: Option<u32>,
}

impl Args {
    /// Generation settings, or `None` when no flag asks for any.
    fn generation_config(&self) -> Option<GenerationConfig> {
        if self.temperature.is_none() && self.max_tokens.is_none() {
            return None;
        }
        Some(GenerationConfig {
            temperature: self.temperature,
            max_output_tokens: self.max_tokens,
            ..GenerationConfig::default()
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::load().unwrap_or_default();

    if let Some(ref model) = args.model {
        config.model = model.clone();
    }

    let message = match get_message(&args) {
        Ok(msg) => msg,
        Err(_) => {
            // No input provided, show help
            Args::parse_from(["relay", "--help"]);
            return Ok(());
        }
    };

    // Token counting is local and needs no API key.
    if let Some(output) = local_output(&args, &message) {
        println!("{}", output);
        return Ok(());
    }

    let generator = create_generator(&config).context("Failed to create generator")?;

    let mut request = GenerateContentParameters::new(message);
    if let Some(generation) = args.generation_config() {
        request = request.with_config(generation);
    }

    if !args.stream {
        let response = generator
            .generate_content(request)
            .await
            .context("Request failed")?;
        println!("{}", response.text());
        return Ok(());
    }

    let mut stream = generator
        .generate_content_stream(request)
        .await
        .context("Request failed")?;
    let mut stdout = io::stdout();

    loop {
        tokio::select! {
            chunk = stream.next() => {
                match chunk {
                    Some(Ok(response)) => {
                        print!("{}", response.text());
                        stdout.flush().context("Failed to flush stdout")?;
                    }
                    None => {
                        println!(); // Final newline
                        break;
                    }
                    Some(Err(e)) => {
                        return Err(e).context("Stream error");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n[Interrupted]");
                break;
            }
        }
    }

    Ok(())
}

/// Output of commands answered without contacting the API, if `args` asks
/// for one.
fn local_output(args: &Args, message: &str) -> Option<String> {
    if args.count_tokens {
        return Some(estimate_tokens(&Contents::from(message)).to_string());
    }
    None
}

/// Retrieves the message from arguments or stdin.
///
/// Priority: positional argument > stdin > error (if TTY)
fn get_message(args: &Args) -> io::Result<String> {
    if let Some(msg) = &args.message {
        return Ok(msg.clone());
    }

    if io::stdin().is_terminal() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "No message provided",
        ));
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer.trim_end().to_string())
}
