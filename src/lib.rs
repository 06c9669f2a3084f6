//! Quorum-paced, lag-tolerant distributed all-reduce
//!
//! A group of workers each holds a vector of floats; every round they
//! collectively compute the elementwise sum so each worker ends up with the
//! aggregate. The protocol is chunked (bounded wire messages), quorum-driven
//! (a configurable fraction of peers is enough to make progress), and
//! lag-tolerant (out-of-round messages are buffered for a configurable
//! window, and rounds falling out of the window are force-completed from
//! whatever arrived).
//!
//! A thin master bootstraps membership and paces the rounds; all block data
//! flows directly between workers.

pub mod buffer;
pub mod config;
pub mod errors;
pub mod logging;
pub mod master;
pub mod protocol;
pub mod transport;
pub mod worker;

pub use buffer::ChunkedRoundBuffer;
pub use config::{MasterConfig, WorkerConfig};
pub use errors::{NodeError, Result};
pub use logging::{init_production_logging, init_simple_logging};
pub use master::Master;
pub use protocol::Message;
pub use transport::{LocalNetwork, LocalTransport, NodeEvent, TcpTransport, Transport};
pub use worker::{
    AllReduceInput, AllReduceOutput, DataSink, DataSource, LoggingSink, MemorySink, RandomSource,
    Reducer, SumReducer, VectorSource, Worker,
};
