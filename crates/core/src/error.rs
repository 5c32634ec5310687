//! Core errors: the turn coordinator's own failure modes, plus `#[from]`
//! conversions for the one or two upstream error types each lower layer
//! exposes. Per §7, most failures the coordinator sees are already facts by
//! the time they get here (dispatcher/autopoiesis errors carry a `to_fact`);
//! this enum only covers what's fatal enough to bubble out of a turn rather
//! than be reasoned about by the kernel.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Kernel(#[from] nsk_kernel::Error),

    #[error(transparent)]
    Transducer(#[from] nsk_transducers::Error),

    #[error(transparent)]
    Dispatch(#[from] nsk_dispatcher::DispatchError),

    #[error(transparent)]
    Shard(#[from] nsk_shards::ShardError),

    #[error(transparent)]
    Autopoiesis(#[from] nsk_autopoiesis::AutopoiesisError),

    #[error(transparent)]
    Context(#[from] nsk_context::ContextError),

    #[error("config error: {0}")]
    Config(String),

    #[error("trace log I/O error: {0}")]
    TraceLogIo(#[from] std::io::Error),

    #[error("trace log record could not be serialized: {0}")]
    TraceLogSerialize(#[from] serde_json::Error),

    #[error("turn coordinator was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
