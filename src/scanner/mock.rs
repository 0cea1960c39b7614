//! Mock decoder backends for tests and demos.

use super::decoder::{Decoder, DecoderConfig, DecoderError, DecoderFactory, DecoderSink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockDecoderState {
    config: Option<DecoderConfig>,
    sink: Option<DecoderSink>,
    running: bool,
    stop_calls: usize,
}

/// Test handle onto one [`MockDecoder`].
///
/// Lets a test play the decoder's worker: emit detections, frame reports
/// and runtime errors at any point, including after the session ended.
#[derive(Debug, Clone, Default)]
pub struct MockDecoderHandle {
    state: Arc<Mutex<MockDecoderState>>,
}

impl MockDecoderHandle {
    fn lock(&self) -> MutexGuard<'_, MockDecoderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sink(&self) -> Option<DecoderSink> {
        self.lock().sink.clone()
    }

    /// Reports a detected code. Returns false if the event was dropped.
    pub fn detect(&self, code: &str) -> bool {
        self.sink().is_some_and(|s| s.detected(code))
    }

    /// Reports an analysed frame.
    pub fn process(&self, code: Option<&str>) -> bool {
        self.sink()
            .is_some_and(|s| s.processed(code.map(str::to_string)))
    }

    /// Reports a runtime failure.
    pub fn fail(&self, message: &str) -> bool {
        self.sink().is_some_and(|s| s.error(message))
    }

    /// Returns true between a successful `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Number of `stop` calls, including rejected ones.
    pub fn stop_calls(&self) -> usize {
        self.lock().stop_calls
    }

    /// Configuration the decoder was initialized with.
    pub fn config(&self) -> Option<DecoderConfig> {
        self.lock().config.clone()
    }
}

/// Decoder driven entirely by its [`MockDecoderHandle`].
#[derive(Debug)]
pub struct MockDecoder {
    handle: MockDecoderHandle,
    fail_init: bool,
    fail_start: bool,
}

impl Decoder for MockDecoder {
    fn init(&mut self, config: &DecoderConfig, sink: DecoderSink) -> Result<(), DecoderError> {
        if self.fail_init {
            return Err(DecoderError::Init("mock init failure".into()));
        }
        let mut state = self.handle.lock();
        state.config = Some(config.clone());
        state.sink = Some(sink);
        Ok(())
    }

    fn start(&mut self) -> Result<(), DecoderError> {
        if self.fail_start {
            return Err(DecoderError::Start("mock start failure".into()));
        }
        let mut state = self.handle.lock();
        if state.sink.is_none() {
            return Err(DecoderError::NotInitialized);
        }
        state.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DecoderError> {
        let mut state = self.handle.lock();
        state.stop_calls += 1;
        if !state.running {
            return Err(DecoderError::AlreadyStopped);
        }
        state.running = false;
        Ok(())
    }
}

/// Factory producing [`MockDecoder`]s and keeping a handle to each.
#[derive(Debug, Clone, Default)]
pub struct MockDecoderFactory {
    handles: Arc<Mutex<Vec<MockDecoderHandle>>>,
    fail_init: bool,
    fail_start: bool,
}

impl MockDecoderFactory {
    /// Creates a factory whose decoders always succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every decoder created from now on fails `init`.
    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Every decoder created from now on fails `start`.
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MockDecoderHandle>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of decoders created so far.
    pub fn created(&self) -> usize {
        self.lock().len()
    }

    /// Handle to the most recently created decoder.
    pub fn last(&self) -> Option<MockDecoderHandle> {
        self.lock().last().cloned()
    }
}

impl DecoderFactory for MockDecoderFactory {
    fn create(&mut self) -> Box<dyn Decoder> {
        let handle = MockDecoderHandle::default();
        self.lock().push(handle.clone());
        Box::new(MockDecoder {
            handle,
            fail_init: self.fail_init,
            fail_start: self.fail_start,
        })
    }
}

/// What a [`ScriptedDecoder`] "sees".
#[derive(Debug, Clone, Default)]
pub struct DecodeScript {
    /// Code to recognize, or `None` to never find one.
    pub code: Option<String>,
    /// Empty frames to report before the code appears.
    pub misses: usize,
    /// Overrides the pacing derived from the configured frequency.
    pub frame_interval: Option<Duration>,
}

/// Decoder that analyses frames on a worker thread following a script.
///
/// The worker keeps reporting the code on every frame until stopped, the
/// way real backends do.
#[derive(Debug)]
pub struct ScriptedDecoder {
    script: DecodeScript,
    sink: Option<DecoderSink>,
    interval: Duration,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ScriptedDecoder {
    /// Creates a decoder that will follow `script`.
    pub fn new(script: DecodeScript) -> Self {
        Self {
            script,
            sink: None,
            interval: Duration::from_millis(100),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl Decoder for ScriptedDecoder {
    fn init(&mut self, config: &DecoderConfig, sink: DecoderSink) -> Result<(), DecoderError> {
        self.interval = self
            .script
            .frame_interval
            .unwrap_or_else(|| Duration::from_millis(1000 / u64::from(config.frequency.max(1))));
        self.sink = Some(sink);
        tracing::debug!(
            readers = ?config.reader_names(),
            interval_ms = self.interval.as_millis() as u64,
            "ScriptedDecoder initialized"
        );
        Ok(())
    }

    fn start(&mut self) -> Result<(), DecoderError> {
        let sink = self.sink.clone().ok_or(DecoderError::NotInitialized)?;
        let stop = Arc::clone(&self.stop);
        let interval = self.interval;
        let mut misses = self.script.misses;
        let code = self.script.code.clone();

        let worker = std::thread::Builder::new()
            .name(format!("decoder-{}", sink.session_id()))
            .spawn(move || {
                while !stop.load(Ordering::SeqCst) && !sink.is_cancelled() {
                    std::thread::sleep(interval);
                    match (&code, misses) {
                        (Some(code), 0) => {
                            sink.detected(code.clone());
                        }
                        _ => {
                            misses = misses.saturating_sub(1);
                            sink.processed(None);
                        }
                    }
                }
            })
            .map_err(|e| DecoderError::Start(e.to_string()))?;

        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DecoderError> {
        let worker = self.worker.take().ok_or(DecoderError::AlreadyStopped)?;
        self.stop.store(true, Ordering::SeqCst);
        if worker.join().is_err() {
            tracing::warn!("Decoder worker panicked");
        }
        Ok(())
    }
}

impl Drop for ScriptedDecoder {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Factory handing every session the same script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDecoderFactory {
    script: DecodeScript,
}

impl ScriptedDecoderFactory {
    /// Creates a factory handing out `script`.
    pub fn new(script: DecodeScript) -> Self {
        Self { script }
    }
}

impl DecoderFactory for ScriptedDecoderFactory {
    fn create(&mut self) -> Box<dyn Decoder> {
        Box::new(ScriptedDecoder::new(self.script.clone()))
    }
}
