mod rpc;
mod types;
mod watcher;

pub use rpc::JsonRpcChainClient;
pub use types::{ChainClient, ChainError, ObservedTransaction, WhaleAlert, WhaleWallet};
pub use watcher::{WatcherConfig, WhaleWatcher};

#[cfg(test)]
pub use types::MockChainClient;
