use clap::Parser;
use client::input::{DirectionSource, IdleSource, ScriptedSource};
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Cosmetic player color, relayed to the opponent
    #[arg(short, long, default_value = "#cc8822")]
    color: String,

    /// Ask the server to delay our input frames by this many milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_lag: u64,

    /// Scripted input, e.g. "l:40,.:20,r:40" (ticks per step); idle if omitted
    #[arg(long)]
    script: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("connecting to {}", args.server);
    if args.fake_lag > 0 {
        info!("requesting {}ms artificial latency", args.fake_lag);
    }

    let source: Box<dyn DirectionSource> = match &args.script {
        Some(script) => Box::new(ScriptedSource::parse(script)?),
        None => Box::new(IdleSource),
    };

    let mut client = Client::new(&args.server, args.color, args.fake_lag, source).await?;
    client.run().await?;

    Ok(())
}
