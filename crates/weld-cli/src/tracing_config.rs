//! `tracing` subscriber wiring for the `weld` binary.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Installs a global subscriber: a tree-indented layer for span-nested
/// build/watch output, filtered by `RUST_LOG` or, absent that, `-v`.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "weld=debug,info" } else { "weld=info,warn" })
    });

    let tree = tracing_tree::HierarchicalLayer::new(2)
        .with_indent_lines(true)
        .with_targets(true)
        .with_bracketed_fields(true);

    let _ = tracing_subscriber::registry().with(filter).with(tree).try_init();
}
