pub mod libs;

pub use libs::io::reader;
pub use libs::io::writer;
