pub mod config;
pub mod error;
pub mod types;

pub use error::{SealError, SealResult};
pub use types::{
    decrypted_name, decrypted_name_with, encrypted_name, encrypted_name_with, ProgressFn,
    StreamFormat, ENC_SUFFIX,
};
