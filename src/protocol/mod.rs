//! Wire protocol: HTTP framing and body codecs

pub mod http;
pub mod pairs;

pub use http::{HttpError, Request, Response};
pub use pairs::{decode_pairs, encode_pairs};
