use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("LLM call failed: {0}")]
    Llm(String),

    #[error("LLM response was not valid {expected}: {raw}")]
    Malformed { expected: &'static str, raw: String },

    #[error("response exceeded maximum length of {max} bytes")]
    TooLong { max: usize },

    #[error("response was not valid UTF-8")]
    NotUtf8,

    #[error("kernel error: {0}")]
    Kernel(#[from] nsk_kernel::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
