pub mod error;
pub mod parser;
pub mod value;

pub use error::MetainfoError;
pub use parser::{create_torrent, from_bencode, from_bytes, load};
pub use value::{Info, Metainfo};
