use std::io;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid plist: {message}")]
    Parse { message: String },

    #[error("Unsupported plist element <{tag}>")]
    UnknownTag { tag: String },

    #[error("Cannot save a plist that has no filename")]
    MissingFilename,

    #[error("Cannot store JSON {kind} at '{path}' in a plist")]
    UnsupportedJson { path: String, kind: &'static str },
}

impl Error {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
        }
    }
}
