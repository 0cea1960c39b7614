//! Barcode scanning sessions.
//!
//! This module binds camera streams to pluggable decoders and manages the
//! lifecycle of that binding. Decoding itself is delegated to a
//! [`Decoder`] backend; this module only decides when a session exists and
//! makes sure it is always released.

mod decoder;
mod error;
mod history;
mod manager;
mod mock;
mod selection;
mod session;

pub use decoder::{
    CancelToken, Decoder, DecoderConfig, DecoderError, DecoderEvent, DecoderFactory, DecoderSink,
    LocatorHints, SinkMessage, Symbology,
};
pub use error::ScanError;
pub use history::ResultLog;
pub use manager::{
    CameraSessionManager, DecodedResult, ScanEvent, ScanStatus, SessionConfig, SessionState,
    SessionStats,
};
pub use mock::{
    DecodeScript, MockDecoder, MockDecoderFactory, MockDecoderHandle, ScriptedDecoder,
    ScriptedDecoderFactory,
};
pub use selection::{enumerate_cameras, select_camera};
pub use session::ScanSession;
