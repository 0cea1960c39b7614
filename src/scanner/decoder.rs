//! Pluggable barcode decoder backend.
//!
//! A decoder is a black box: it is configured once, started, and then reports
//! through a [`DecoderSink`] from whatever thread it analyses frames on. The
//! session manager only acts on those reports from its own thread.

use crate::capture::{ConstraintProfile, MediaConstraints, PatchSize};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Barcode symbologies the scanner recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbology {
    /// Code 128.
    Code128,
    /// EAN-13.
    Ean13,
    /// EAN-8.
    Ean8,
    /// Code 39.
    Code39,
    /// Code 39 restricted to vehicle identification numbers.
    Code39Vin,
    /// Codabar.
    Codabar,
    /// UPC-A.
    UpcA,
    /// UPC-E.
    UpcE,
    /// Interleaved 2 of 5.
    Interleaved2of5,
    /// Standard 2 of 5.
    Standard2of5,
    /// Code 93.
    Code93,
}

impl Symbology {
    /// Fixed set configured on every session. Not selectable per call.
    pub const RETAIL: [Symbology; 11] = [
        Symbology::Code128,
        Symbology::Ean13,
        Symbology::Ean8,
        Symbology::Code39,
        Symbology::Code39Vin,
        Symbology::Codabar,
        Symbology::UpcA,
        Symbology::UpcE,
        Symbology::Interleaved2of5,
        Symbology::Standard2of5,
        Symbology::Code93,
    ];

    /// Reader name understood by common decoder backends.
    pub fn reader_name(self) -> &'static str {
        match self {
            Symbology::Code128 => "code_128_reader",
            Symbology::Ean13 => "ean_reader",
            Symbology::Ean8 => "ean_8_reader",
            Symbology::Code39 => "code_39_reader",
            Symbology::Code39Vin => "code_39_vin_reader",
            Symbology::Codabar => "codabar_reader",
            Symbology::UpcA => "upc_reader",
            Symbology::UpcE => "upc_e_reader",
            Symbology::Interleaved2of5 => "i2of5_reader",
            Symbology::Standard2of5 => "2of5_reader",
            Symbology::Code93 => "code_93_reader",
        }
    }
}

/// Decode-region hints for the locator stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorHints {
    /// Locator patch size.
    pub patch_size: PatchSize,
    /// Analyse frames at half resolution.
    pub half_sample: bool,
}

/// Everything a decoder is initialized with.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    /// Symbologies to try, in order.
    pub symbologies: Vec<Symbology>,
    /// Constraints the stream was opened with.
    pub constraints: MediaConstraints,
    /// Frames analysed per second.
    pub frequency: u32,
    /// Search the frame for codes instead of scanning the centre line.
    pub locate: bool,
    /// Locator tuning.
    pub locator: LocatorHints,
    /// Worker threads the decoder may use.
    pub workers: usize,
}

impl DecoderConfig {
    /// Builds the decoder configuration for a negotiated stream.
    pub fn for_stream(
        constraints: MediaConstraints,
        profile: &ConstraintProfile,
        workers: usize,
    ) -> Self {
        Self {
            symbologies: Symbology::RETAIL.to_vec(),
            constraints,
            frequency: profile.frequency,
            locate: true,
            locator: LocatorHints {
                patch_size: profile.patch_size,
                half_sample: false,
            },
            workers: workers.max(1),
        }
    }

    /// Reader names for every configured symbology.
    pub fn reader_names(&self) -> Vec<&'static str> {
        self.symbologies.iter().map(|s| s.reader_name()).collect()
    }
}

/// Errors raised by a decoder backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecoderError {
    /// Initialization was rejected.
    #[error("decoder initialization failed: {0}")]
    Init(String),
    /// The decoder could not start.
    #[error("decoder failed to start: {0}")]
    Start(String),
    /// `start` was called before `init`.
    #[error("decoder not initialized")]
    NotInitialized,
    /// `stop` was called on a decoder that is not running.
    #[error("decoder already stopped")]
    AlreadyStopped,
}

/// Report from a running decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderEvent {
    /// A code was recognized in a frame.
    Detected(String),
    /// A frame was analysed. `None` is the ordinary no-code-found case.
    Processed(Option<String>),
    /// The decoder failed and cannot continue.
    Error(String),
}

/// A decoder event tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkMessage {
    /// Session the event belongs to.
    pub session_id: u64,
    /// The event itself.
    pub event: DecoderEvent,
}

/// Cooperative cancellation flag shared between a session and its decoder.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels every clone of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where a decoder reports. Cheap to clone and safe to move to workers.
///
/// Once the session is cancelled every emit is dropped and returns `false`.
#[derive(Debug, Clone)]
pub struct DecoderSink {
    session_id: u64,
    tx: Sender<SinkMessage>,
    token: CancelToken,
}

impl DecoderSink {
    /// Creates a sink for one session.
    pub fn new(session_id: u64, tx: Sender<SinkMessage>, token: CancelToken) -> Self {
        Self {
            session_id,
            tx,
            token,
        }
    }

    /// Session this sink reports for.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Returns true once the owning session has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sends an event. Returns false if it was dropped.
    pub fn emit(&self, event: DecoderEvent) -> bool {
        if self.token.is_cancelled() {
            tracing::trace!(session = self.session_id, ?event, "Dropping event for cancelled session");
            return false;
        }
        self.tx
            .send(SinkMessage {
                session_id: self.session_id,
                event,
            })
            .is_ok()
    }

    /// Reports a recognized code.
    pub fn detected(&self, code: impl Into<String>) -> bool {
        self.emit(DecoderEvent::Detected(code.into()))
    }

    /// Reports an analysed frame.
    pub fn processed(&self, code: Option<String>) -> bool {
        self.emit(DecoderEvent::Processed(code))
    }

    /// Reports a fatal decoder error.
    pub fn error(&self, message: impl Into<String>) -> bool {
        self.emit(DecoderEvent::Error(message.into()))
    }
}

/// Trait for decoder backends.
///
/// One instance serves exactly one session and is never shared.
pub trait Decoder {
    /// Configures the decoder and hands it the sink to report through.
    fn init(&mut self, config: &DecoderConfig, sink: DecoderSink) -> Result<(), DecoderError>;

    /// Starts frame analysis.
    fn start(&mut self) -> Result<(), DecoderError>;

    /// Stops frame analysis. Fails with [`DecoderError::AlreadyStopped`] on repeat calls.
    fn stop(&mut self) -> Result<(), DecoderError>;
}

/// Creates a fresh decoder for each session.
pub trait DecoderFactory {
    /// Builds an uninitialized decoder.
    fn create(&mut self) -> Box<dyn Decoder>;
}
