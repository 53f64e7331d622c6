//! Watch command: register watches and print events as they arrive.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, bail};

use crate::cli::WatchArgs;
use crate::config::Settings;
use crate::monitor::{DispatchedEvent, FileMonitor, MonitorState};

/// Run watch command.
pub fn run_watch(args: &WatchArgs, settings: &Settings) -> anyhow::Result<()> {
    if args.files.is_empty() && args.patterns.is_empty() {
        bail!("nothing to watch: pass FILE arguments or --pattern ROOT=REGEX");
    }

    let mut config = settings.monitor.clone();
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(ms) = args.poll_interval_ms {
        config.poll_interval_ms = ms;
    }

    let monitor = FileMonitor::from_config(&config).context("failed to start monitor")?;

    for file in &args.files {
        let id = monitor
            .add_file_watch(file)
            .with_context(|| format!("cannot watch {}", file.display()))?;
        eprintln!("Watching {} (watch {id})", file.display());
    }
    for spec in &args.patterns {
        let id = monitor
            .add_path_watch(&spec.root, &spec.regex)
            .with_context(|| format!("cannot watch {} for '{}'", spec.root.display(), spec.regex))?;
        eprintln!(
            "Watching {} for '{}' (watch {id})",
            spec.root.display(),
            spec.regex
        );
    }
    eprintln!("Backend: {}", monitor.backend());

    let deadline = args
        .timeout_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut out = io::stdout().lock();

    loop {
        let event = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                match monitor.poll_timeout(deadline - now) {
                    Some(event) => event,
                    None if monitor.state() == MonitorState::ShutDown => break,
                    None => continue,
                }
            }
            None => match monitor.poll_blocking() {
                Some(event) => event,
                None => break,
            },
        };
        print_event(&mut out, &event, args.json)?;
    }

    let dropped = monitor.dropped_events();
    if dropped > 0 {
        eprintln!("Dropped {dropped} events (queue full)");
    }
    Ok(())
}

fn print_event(out: &mut impl Write, event: &DispatchedEvent, json: bool) -> anyhow::Result<()> {
    if json {
        serde_json::to_writer(&mut *out, event)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{event}")?;
    }
    out.flush()?;
    Ok(())
}
