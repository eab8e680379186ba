pub mod decode;
pub mod source;

pub use decode::{clean_body, decode_message, DecodedEmail};
pub use source::{DirSource, MailSource, RawMessage, SourceError};
