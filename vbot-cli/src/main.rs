//! `vbot`: the command-line entry point around the core pipeline.
//!
//! Per spec §1 the concrete codec/demux/mux libraries are external
//! collaborators outside this core; this binary wires the parts that
//! *are* in scope (broker client, network-packet reassembly, pool
//! heartbeat) end to end, and fails clearly with a usage error when asked
//! for a pipeline stage (decode/encode/local container I/O) that needs a
//! codec library this workspace does not bundle.

mod config;

use std::process::ExitCode as ProcessExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{load_file_overrides, node_id, Args, ExitCode};
use tracing::{error, info};
use vbot_broker_rt::{resilient_client, ThreadPinnedClient, WsBrokerClient};

fn main() -> ProcessExitCode {
    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("vbot: failed to start async runtime: {err:#}");
            return ProcessExitCode::from(ExitCode::Failure as u8);
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ProcessExitCode::from(ExitCode::Ok as u8),
        Err(err) if err.is::<UsageError>() => {
            eprintln!("vbot: {err:#}");
            ProcessExitCode::from(ExitCode::Usage as u8)
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "vbot: fatal error");
            ProcessExitCode::from(ExitCode::Failure as u8)
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct UsageError(String);

async fn run(args: Args) -> Result<()> {
    let _guard = init_tracing()?;

    let overrides = load_file_overrides(&args).context("loading config file")?;
    let bot_id = args
        .bot_id
        .clone()
        .or(overrides.bot_id.clone())
        .ok_or_else(|| UsageError("--bot-id is required (or set it in --config-file)".into()))?;
    let node_id = node_id();

    if args.input_channel.is_none() && args.input_file.is_none() && args.input_url.is_none() && !args.camera {
        bail!(UsageError("no input selected: pass one of --input-channel, --input-file, --input-url, --camera".into()));
    }
    if args.output_channel.is_none() && args.output_file.is_none() && !args.stdout {
        bail!(UsageError("no output selected: pass one of --output-channel, --output-file, --stdout".into()));
    }

    info!(bot_id, node_id, "vbot starting");

    let (_terminator, shutdown) = vbot_streams_rt::system_shutdown();

    let broker_url = args
        .broker_url
        .clone()
        .or(overrides.broker_url)
        .filter(|_| args.input_channel.is_some() || args.output_channel.is_some());

    let client = match broker_url {
        Some(url) => Some(connect_broker(url).await?),
        None => None,
    };

    if args.input_file.is_some() || args.input_url.is_some() || args.camera {
        bail!(UsageError(
            "local file/url/camera sources require a codec/demux library that this build does not bundle; \
             only --input-channel is wired end to end"
                .into()
        ));
    }
    if args.output_file.is_some() {
        bail!(UsageError(
            "local file output requires a container-muxing library that this build does not bundle; \
             only --output-channel and --stdout are wired end to end"
                .into()
        ));
    }

    let Some(client) = client else {
        bail!(UsageError("broker input/output requires --broker-url".into()));
    };

    run_network_relay(client, &args, shutdown).await
}

async fn connect_broker(url: String) -> Result<Arc<dyn vbot_broker::BrokerClient>> {
    let parsed = url::Url::parse(&url).with_context(|| format!("invalid broker url {url}"))?;
    let resilient = resilient_client(move || -> Box<dyn vbot_broker::BrokerClient> {
        Box::new(WsBrokerClient::new(parsed.clone()))
    });
    let io_thread = std::thread::current().id();
    let io_handle = tokio::runtime::Handle::current();
    let pinned = ThreadPinnedClient::new(resilient, io_thread, io_handle);
    let client: Arc<dyn vbot_broker::BrokerClient> = Arc::new(pinned);
    client.start().wait().await.context("connecting to broker")?;
    Ok(client)
}

/// The one local-only flow this build can run end to end: reassemble
/// `network_packet`s off the input channel and republish them, optionally
/// writing `bot_message`s to stdout. Exercises the broker client, the
/// reassembly stage and the pool heartbeat without requiring a codec
/// library.
async fn run_network_relay(
    client: Arc<dyn vbot_broker::BrokerClient>,
    args: &Args,
    shutdown: vbot_streams_rt::SystemShutdown,
) -> Result<()> {
    use futures::stream::StreamExt;

    let input_channel = args
        .input_channel
        .clone()
        .ok_or_else(|| UsageError("--input-channel is required for the network relay".into()))?;

    let source = vbot_broker_rt::rtm_source(client.clone(), input_channel);
    let decoded = vbot_media::decode_network_stream(source);

    let frames_limit = args.frames;
    let mut frames = 0u64;
    let stdout = args.stdout;
    let decoded = decoded
        .inspect(move |packet| {
            if stdout {
                if let Ok(text) = serde_json::to_string(&describe(packet)) {
                    println!("{text}");
                }
            }
        })
        .take_while(move |_| {
            frames += 1;
            let keep = match frames_limit {
                Some(limit) => frames <= limit,
                None => true,
            };
            std::future::ready(keep)
        });

    let relay = async {
        match &args.output_channel {
            Some(channel) => vbot_broker_rt::rtm_sink(client.clone(), channel.clone(), decoded).await,
            None => decoded.for_each(|_| std::future::ready(())).await,
        }
    };

    tokio::select! {
        () = relay => {}
        () = shutdown => info!("vbot: shutdown signal received"),
    }

    let _ = client.stop().wait().await;
    Ok(())
}

fn describe(packet: &vbot_media::EncodedPacket) -> serde_json::Value {
    match packet {
        vbot_media::EncodedPacket::Metadata(m) => serde_json::json!({"codecName": m.codec_name}),
        vbot_media::EncodedPacket::Frame(f) => serde_json::json!({
            "i": [f.id.i1, f.id.i2],
            "t": f.pts,
            "k": f.key_frame,
            "bytes": f.bytes.len(),
        }),
    }
}

fn init_tracing() -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    vbot_streams_rt::init_tracing(&vbot_streams_rt::TracingInitConfig::default())
        .context("initializing tracing")
}
