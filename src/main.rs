#![deny(clippy::all)]
#![warn(clippy::pedantic)]

use chrono::Local;
use colored::Colorize;
use conduit::address::addresses;
use conduit::input::{Config, Opts};
use conduit::scanner::{ProbeConfig, ResultSink, Scanner, TargetIterator};
use conduit::status::ServerInfo;
use conduit::tui::print_opening;
use conduit::{detail, output, warning};
use log::debug;

/// Descriptors kept free for stdio and the runtime itself.
const FILE_DESCRIPTOR_HEADROOM: u64 = 100;
#[cfg(not(unix))]
const DEFAULT_FILE_DESCRIPTORS_LIMIT: u64 = 8000;

/// Prints each server the moment its probe succeeds.
struct Printer {
    plain: bool,
}

impl ResultSink for Printer {
    fn found(&mut self, info: ServerInfo) {
        if self.plain {
            println!("{info}");
            return;
        }
        let mut line = format!(
            "{} [{}] ({}/{})",
            info.endpoint().to_string().purple(),
            info.version().green(),
            info.online(),
            info.max()
        );
        if let Some(description) = info.description() {
            line.push(' ');
            line.push_str(description);
        }
        println!("{line}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut opts: Opts = Opts::read();
    let config = Config::read(opts.config_path.clone())?;
    opts.merge(&config);

    debug!("Main() `opts` arguments are {opts:?}");

    print_opening(opts.greppable, opts.accessible, opts.no_banner);
    detail!(
        format!("Started Conduit on {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
        opts.greppable,
        opts.accessible
    );

    let ulimit = adjust_ulimit_size(&opts);
    let concurrency = infer_concurrency(&opts, ulimit);

    let ports = opts.ports();
    debug!(
        "Scanning {} target spec(s) on {} port(s), {} probes at a time, timeout {:?}, query fallback {}",
        opts.targets.len(),
        ports.len(),
        concurrency,
        opts.timeout(),
        opts.query
    );

    let scanner = Scanner::new(
        concurrency,
        ProbeConfig {
            timeout: opts.timeout(),
            query_fallback: opts.query,
        },
    );
    let targets = TargetIterator::new(addresses(&opts.targets), ports);
    let mut printer = Printer {
        plain: opts.greppable || opts.accessible,
    };

    let session = scanner.run(targets, &mut printer).await;

    output!(session, opts.greppable, opts.accessible);
    Ok(())
}

#[cfg(unix)]
fn adjust_ulimit_size(opts: &Opts) -> u64 {
    use rlimit::Resource;

    if let Some(limit) = opts.ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            detail!(
                format!("Automatically increasing ulimit value to {limit}."),
                opts.greppable,
                opts.accessible
            );
        } else {
            warning!(
                "ERROR. Failed to set ulimit value.",
                opts.greppable,
                opts.accessible
            );
        }
    }

    match Resource::NOFILE.get() {
        Ok((soft, _)) => soft,
        Err(e) => {
            debug!("Could not read the open file limit: {e}");
            u64::MAX
        }
    }
}

#[cfg(not(unix))]
fn adjust_ulimit_size(_opts: &Opts) -> u64 {
    DEFAULT_FILE_DESCRIPTORS_LIMIT
}

/// Lowers the concurrency bound when the open file limit cannot hold one
/// socket per in-flight probe.
fn infer_concurrency(opts: &Opts, ulimit: u64) -> usize {
    let requested = u64::from(opts.size);

    if requested + FILE_DESCRIPTOR_HEADROOM <= ulimit {
        return usize::from(opts.size);
    }

    let lowered = ulimit.saturating_sub(FILE_DESCRIPTOR_HEADROOM).max(1);
    warning!(
        format!(
            "File limit {ulimit} is too low for {requested} concurrent probes, lowering to {lowered}. \
             Use '-u' to raise the ulimit instead."
        ),
        opts.greppable,
        opts.accessible
    );
    usize::try_from(lowered).unwrap_or(usize::MAX)
}
