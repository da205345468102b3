use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use std::io::Read;
use std::sync::Arc;

mod auth;
mod generator;
mod server;
mod summarize;
mod telemetry;
mod tokenizer;

use generator::{Device, OnnxGenerator};
use summarize::{SummarizeOptions, Summarizer};

#[derive(Parser)]
#[command(name = "summarizer", about = "Authenticated text summarization API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve(ServeCmd),
    /// Summarize once from the command line (manual testing)
    Summarize(SummarizeCmd),
}

#[derive(Args)]
struct ModelArgs {
    /// HF Hub model id providing the tokenizer and ONNX weights
    #[arg(long, default_value = "Xenova/t5-small")]
    model: String,
    #[arg(long)]
    encoder_onnx: Option<String>,
    #[arg(long)]
    decoder_onnx: Option<String>,
    #[arg(long, value_enum, default_value_t = Device::Cpu)]
    device: Device,
}

#[derive(Args)]
struct OptionArgs {
    #[arg(long, default_value_t = 400)]
    max_input_tokens: usize,
    #[arg(long, default_value_t = 40)]
    chunk_overlap: usize,
    #[arg(long, default_value_t = 256)]
    max_new_tokens: usize,
    #[arg(long, default_value_t = 4)]
    num_beams: usize,
    #[arg(long, default_value_t = 2.0)]
    length_penalty: f32,
    /// Condense the joined chunk summaries with a final pass
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    summarize_final: bool,
}

impl OptionArgs {
    fn to_options(&self) -> SummarizeOptions {
        SummarizeOptions {
            max_input_tokens: self.max_input_tokens,
            chunk_overlap: self.chunk_overlap,
            max_new_tokens: self.max_new_tokens,
            num_beams: self.num_beams,
            length_penalty: self.length_penalty,
            summarize_final: self.summarize_final,
        }
    }
}

#[derive(Args)]
struct ServeCmd {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = 8000)]
    port: u16,
    #[command(flatten)]
    model: ModelArgs,
    #[command(flatten)]
    options: OptionArgs,
}

#[derive(Args)]
struct SummarizeCmd {
    /// Text to summarize; reads stdin when omitted
    text: Option<String>,
    #[command(flatten)]
    model: ModelArgs,
    #[command(flatten)]
    options: OptionArgs,
}

/// Model load and session build are blocking (possible Hub download).
async fn build_generator(model: ModelArgs) -> Result<OnnxGenerator> {
    tokio::task::spawn_blocking(move || {
        OnnxGenerator::new(
            &model.model,
            model.encoder_onnx.as_deref(),
            model.decoder_onnx.as_deref(),
            model.device,
        )
    })
    .await?
    .context("load summarization model")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    telemetry::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let options = args.options.to_options();
            tracing::info!(model = %args.model.model, "loading model");
            let generator = build_generator(args.model).await?;
            let state = server::AppState::new(
                Summarizer::new(Arc::new(generator)),
                auth::jwt::TokenService::from_env(),
                options,
            );
            server::serve(state, &args.host, args.port).await
        }
        Commands::Summarize(args) => {
            let text = match args.text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let options = args.options.to_options();
            let generator = build_generator(args.model).await?;
            let summarizer = Summarizer::new(Arc::new(generator));
            let summary =
                tokio::task::spawn_blocking(move || summarizer.summarize(&text, &options))
                    .await??;
            println!("{summary}");
            Ok(())
        }
    }
}
