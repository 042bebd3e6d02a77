//! Instrumented stand-in engine for unit tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::inference::engine::{Engine, EngineError};

/// One recorded engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Generate(String),
    WithContext(String, String),
}

pub struct StubEngine {
    reply: String,
    fail_load: Option<String>,
    panic_load: bool,
    fail_generate: Option<String>,
    panic_generate: bool,
    delay: Duration,
    loads: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<Call>>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self {
            reply: "結果".to_string(),
            fail_load: None,
            panic_load: false,
            fail_generate: None,
            panic_generate: false,
            delay: Duration::ZERO,
            loads: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_load(reason: &str) -> Self {
        Self {
            fail_load: Some(reason.to_string()),
            ..Self::new()
        }
    }

    pub fn panicking_load() -> Self {
        Self {
            panic_load: true,
            ..Self::new()
        }
    }

    pub fn failing_generate(reason: &str) -> Self {
        Self {
            fail_generate: Some(reason.to_string()),
            ..Self::new()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic_generate: true,
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn run(&self, call: Call) -> Result<String, EngineError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(call);

        thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panic_generate {
            panic!("engine exploded");
        }
        match &self.fail_generate {
            Some(reason) => Err(EngineError::Inference(reason.clone())),
            None => Ok(self.reply.clone()),
        }
    }
}

impl Engine for StubEngine {
    type Model = ();

    fn load_model(&self, _path: &Path) -> Result<(), EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.panic_load {
            panic!("native load blew up");
        }
        match &self.fail_load {
            Some(reason) => Err(EngineError::ModelLoad(reason.clone())),
            None => Ok(()),
        }
    }

    fn generate(&self, _model: &mut (), prompt: &str) -> Result<String, EngineError> {
        self.run(Call::Generate(prompt.to_string()))
    }

    fn generate_with_context(
        &self,
        _model: &mut (),
        left_context: &str,
        input: &str,
    ) -> Result<String, EngineError> {
        self.run(Call::WithContext(left_context.to_string(), input.to_string()))
    }
}
