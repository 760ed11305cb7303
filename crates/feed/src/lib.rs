pub mod history;
pub mod pnl;
pub mod rest;
pub mod stream;

pub use history::HistoryImporter;
pub use pnl::PnlTracker;
pub use rest::BrokerClient;
pub use stream::QuoteStream;
