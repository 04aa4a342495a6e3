//! Watches a handful of eventful maps while writer threads mutate them.
//!
//! ```text
//! [writer n] --set/delete--> shard n --hub--+
//!                                           +--> merge --> collector --> recent keys / event log
//! [writer 0] --set/delete--> shard 0 --hub--+
//!                                 \--bucket "hot/"--> hot reader
//! ```
//!
//! Usage: `cairn-watch [config.toml]`

use anyhow::{Context, anyhow};
use cairn_channel::{RecvTimeoutError, merge};
use cairn_codec::Json;
use cairn_config::CairnConfig;
use cairn_maps::{
    BucketWatch, CancelToken, Locked, Map, Marshal, OrderedMap, WatchMsg, WeightedMap,
};
use cairn_set::RigidSet;
use cairn_slice::Rigid;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

type Shard = Map<String, u64, Locked>;
type Event = WatchMsg<String, u64>;

const ROUNDS: u64 = 200;
const IDLE: Duration = Duration::from_secs(2);
const HOT: &str = "hot/";

fn key(shard: usize, i: u64) -> String {
    let zone = if i % 4 == 0 { HOT } else { "cold/" };
    format!("{zone}{shard}-{i}")
}

fn deleted(i: u64) -> bool {
    i % 10 == 0
}

fn produce(n: usize, shard: &Shard) {
    for i in 0..ROUNDS {
        shard.set(key(n, i), i);
    }
    for i in (0..ROUNDS).filter(|i| deleted(*i)) {
        shard.delete(key(n, i).as_str());
    }
    debug!(shard = n, entries = shard.len(), "writer done");
}

/// Events one shard publishes, optionally only those under `prefix`.
fn expected_events(shard: usize, prefix: &str) -> usize {
    let sets = (0..ROUNDS).filter(|i| key(shard, *i).starts_with(prefix));
    let deletes = (0..ROUNDS).filter(|i| deleted(*i) && key(shard, *i).starts_with(prefix));
    sets.count() + deletes.count()
}

fn collect(
    merged: &cairn_channel::Receiver<Event>,
    expected: usize,
    recent: &RigidSet<String, Locked>,
    log: &Rigid<Event, Locked>,
) -> (usize, usize) {
    let (mut seen, mut puts) = (0, 0);
    while seen < expected {
        match merged.recv_timeout(IDLE) {
            Ok(event) => {
                if event.is_put() {
                    puts += 1;
                }
                recent.add([event.key.clone()]);
                log.add([event]);
                seen += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(seen, expected, "collector idle; giving up");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    (seen, puts)
}

fn read_hot(watch: Option<BucketWatch<'_, u64>>, expected: usize) -> usize {
    let Some(watch) = watch else {
        return 0;
    };
    let mut seen = 0;
    while seen < expected && watch.recv_timeout(IDLE).is_ok() {
        seen += 1;
    }
    seen
}

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => CairnConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => CairnConfig::default(),
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!(?config, "starting");

    let cancel = CancelToken::new();
    let shards: Vec<Shard> = (0..config.watchers.max(1))
        .map(|_| Map::<String, u64>::new().safe().eventful(&cancel, config.hub))
        .collect();

    let merged = merge(shards.iter().filter_map(|s| s.watch()).map(|c| c.into_receiver()));
    let recent = RigidSet::<String, Locked>::new(config.rigid_capacity);
    let log = Rigid::<Event, Locked>::new(config.rigid_capacity);
    let hot = shards[0].bucket(HOT);

    let expected: usize = (0..shards.len()).map(|n| expected_events(n, "")).sum();
    let hot_expected = expected_events(0, HOT);

    let ((seen, puts), hot_seen) = thread::scope(|s| {
        let hot_watch = hot.watch();
        let hot_reader = s.spawn(move || read_hot(hot_watch, hot_expected));
        let collector = s.spawn(|| collect(&merged, expected, &recent, &log));
        for (n, shard) in shards.iter().enumerate() {
            s.spawn(move || produce(n, shard));
        }

        let seen = collector.join().map_err(|_| anyhow!("collector panicked"))?;
        let hot_seen = hot_reader.join().map_err(|_| anyhow!("hot reader panicked"))?;
        anyhow::Ok((seen, hot_seen))
    })?;
    info!(seen, puts, deletes = seen - puts, expected, hot_seen, hot_expected, "events relayed");

    let sizes = OrderedMap::<String, usize>::new();
    for (n, shard) in shards.iter().enumerate() {
        sizes.set(format!("shard-{n}"), shard.len());
    }
    info!(%sizes, hot_entries = hot.len(), "shard sizes");

    let newest = WeightedMap::<String, usize>::from_ranked(recent.get_all(), 0..);
    let top: Vec<String> = newest.keys().into_iter().take(5).collect();
    info!(?top, buffered = log.len(), "most recent keys");
    if let Some(last) = log.get_last(1).pop() {
        info!(kind = ?last.kind, key = %last.key, "last event");
    }

    let bytes = shards[0].marshal::<Json>().context("encoding shard 0")?;
    info!(bytes = bytes.len(), "shard 0 snapshot");

    cancel.cancel();
    info!("done");
    Ok(())
}
