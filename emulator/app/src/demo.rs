/*++

Licensed under the Apache-2.0 license.

File Name:

    demo.rs

Abstract:

    File contains the APBH DMA workload driven by the emulator binary.

--*/

use anyhow::{bail, Context};
use clap::Parser;
use dma_driver::{
    Command, CompletionWorker, Descriptor, DmaClient, DmaError, Engine, EngineConfig,
    HardwareRevision,
};
use emulator_periph::EmulatedApbh;
use log::{error, info, LevelFilter};
use poll_common::poll_until;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const OWNER: &str = "emulator";
const BUFFER_BASE: usize = 0x2000_0000;
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, name = "APBH DMA Emulator")]
pub struct DmaDemoArgs {
    /// Engine configuration (TOML). Defaults are used when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Block generation, overrides the configuration file.
    #[arg(short, long)]
    pub revision: Option<String>,

    /// Hardware channel to run the transfers on.
    #[arg(long, default_value_t = 0)]
    pub channel: u32,

    /// Total number of descriptors to submit.
    #[arg(short, long, default_value_t = 64)]
    pub transfers: u32,

    /// Descriptors queued per `enable`.
    #[arg(short, long, default_value_t = 8)]
    pub batch: u32,

    /// Bytes moved by each descriptor.
    #[arg(long, default_value_t = 512)]
    pub length: u32,

    #[arg(long, default_value_t = LevelFilter::Info)]
    pub log_level: LevelFilter,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DemoSummary {
    pub transfers: u32,
    pub bytes: u64,
    pub spurious: u64,
    pub errors: u64,
}

/// Counts finished transfers and keeps the descriptors for reuse.
#[derive(Default)]
struct CountingClient {
    completed: AtomicU32,
    bytes: AtomicU64,
    errors: AtomicU32,
    returned: Mutex<Vec<Descriptor>>,
}

impl DmaClient for CountingClient {
    fn transfer_complete(&self, _channel: u32, descriptor: Descriptor) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.bytes
            .fetch_add(descriptor.length as u64, Ordering::Relaxed);
        self.returned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(descriptor);
    }

    fn transfer_error(&self, channel: u32, error: DmaError) {
        error!("ch{}: {}", channel, error);
        self.errors.fetch_add(1, Ordering::Relaxed);
    }
}

fn parse_revision(name: &str) -> anyhow::Result<HardwareRevision> {
    match name.to_lowercase().trim() {
        "mx23" => Ok(HardwareRevision::Mx23),
        "mx28" => Ok(HardwareRevision::Mx28),
        _ => bail!(
            "Invalid revision: {}. Supported revisions are 'mx23' and 'mx28'.",
            name
        ),
    }
}

pub fn load_config(args: &DmaDemoArgs) -> anyhow::Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(revision) = &args.revision {
        config.revision = parse_revision(revision)?;
        let channels = config.revision.layout().channel_count();
        config.channel_count = config
            .channel_count
            .min(channels.saturating_sub(config.channel_base));
        config.validate()?;
    }
    Ok(config)
}

/// Bring up an engine over an emulated block and push `args.transfers`
/// descriptors through one channel.
pub fn run(args: &DmaDemoArgs) -> anyhow::Result<DemoSummary> {
    let config = load_config(args)?;
    if args.batch == 0 || args.batch > config.max_pending {
        bail!(
            "batch must be within 1..={} (max_pending)",
            config.max_pending
        );
    }

    let apbh = Arc::new(EmulatedApbh::new(config.revision));
    let engine = Arc::new(Engine::init(apbh.clone(), config)?);
    let channel = args.channel;
    engine.request(channel, OWNER)?;
    engine.enable_irq(channel, true)?;

    let client = Arc::new(CountingClient::default());
    let mut worker = CompletionWorker::spawn(engine.clone(), client.clone());
    let Some(notifier) = worker.notifier() else {
        bail!("completion worker not running");
    };

    let mut submitted = 0;
    while submitted < args.transfers {
        let batch = args.batch.min(args.transfers - submitted);
        for i in 0..batch {
            let offset = (submitted + i) as usize * args.length as usize;
            let descriptor = engine
                .alloc_descriptor(Command::Write)?
                .with_buffer(BUFFER_BASE + offset, args.length)
                .with_completion(true);
            engine.enqueue(channel, descriptor)?;
        }
        engine.enable(channel)?;
        submitted += batch;

        while apbh.complete_descriptor(channel) {
            if apbh.irq_line() {
                notifier.interrupt(&engine)?;
            }
        }

        poll_until(COMPLETION_TIMEOUT, Duration::from_millis(1), || {
            Ok(client.completed.load(Ordering::Relaxed) >= submitted)
        })?;

        let returned: Vec<Descriptor> = client
            .returned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for descriptor in returned {
            engine.free_descriptor(descriptor)?;
        }
        info!("ch{}: {}/{} transfers done", channel, submitted, args.transfers);
    }

    worker.stop();
    let status = engine.status(channel)?;
    engine.release(channel, OWNER)?;
    engine.shutdown();

    Ok(DemoSummary {
        transfers: client.completed.load(Ordering::Relaxed),
        bytes: client.bytes.load(Ordering::Relaxed),
        spurious: status.spurious,
        errors: status.errors + client.errors.load(Ordering::Relaxed) as u64,
    })
}
