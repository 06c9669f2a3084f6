// Worker node: round state machine plus pluggable data callbacks

pub mod data;
mod node;

pub use data::{
    AllReduceInput, AllReduceOutput, DataSink, DataSource, LoggingSink, MemorySink, RandomSource,
    VectorSource,
};
pub use node::{Reducer, SumReducer, Worker};
