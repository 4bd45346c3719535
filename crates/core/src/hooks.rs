//! Optional observer callbacks fired by pipeline stages

use std::sync::Arc;

use crate::Error;

/// Callback without payload (speech start/end)
pub type SignalHook = Arc<dyn Fn() + Send + Sync>;
/// Callback receiving text (transcripts, responses)
pub type TextHook = Arc<dyn Fn(&str) + Send + Sync>;
/// Error interceptor: `None` suppresses the error, `Some` is the error to raise
pub type ErrorHook = Arc<dyn Fn(&Error) -> Option<Error> + Send + Sync>;

/// Set of optional callbacks
///
/// Hooks own no state; compose several with [`compose_hooks`].
#[derive(Clone, Default)]
pub struct Hooks {
    pub on_speech_start: Option<SignalHook>,
    pub on_speech_end: Option<SignalHook>,
    pub on_transcript: Option<TextHook>,
    pub on_response: Option<TextHook>,
    pub on_error: Option<ErrorHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_speech_start(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_speech_start = Some(Arc::new(f));
        self
    }

    pub fn with_speech_end(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_speech_end = Some(Arc::new(f));
        self
    }

    pub fn with_transcript(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_transcript = Some(Arc::new(f));
        self
    }

    pub fn with_response(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_response = Some(Arc::new(f));
        self
    }

    pub fn with_error(
        mut self,
        f: impl Fn(&Error) -> Option<Error> + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn speech_start(&self) {
        if let Some(f) = &self.on_speech_start {
            f();
        }
    }

    pub fn speech_end(&self) {
        if let Some(f) = &self.on_speech_end {
            f();
        }
    }

    pub fn transcript(&self, text: &str) {
        if let Some(f) = &self.on_transcript {
            f(text);
        }
    }

    pub fn response(&self, text: &str) {
        if let Some(f) = &self.on_response {
            f(text);
        }
    }

    /// Route an error through `on_error`
    ///
    /// Without an error hook the error passes through unchanged.
    pub fn error(&self, err: Error) -> Option<Error> {
        match &self.on_error {
            Some(f) => f(&err),
            None => Some(err),
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_speech_start", &self.on_speech_start.is_some())
            .field("on_speech_end", &self.on_speech_end.is_some())
            .field("on_transcript", &self.on_transcript.is_some())
            .field("on_response", &self.on_response.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Merge several hook sets into one
///
/// Each composite callback invokes the constituents in the order given,
/// skipping unset ones. A callback stays unset when no constituent defines
/// it. `on_error` short-circuits on the first constituent that returns an
/// error; if every constituent suppresses, the composite suppresses too.
pub fn compose_hooks(hooks: impl IntoIterator<Item = Hooks>) -> Hooks {
    let hooks: Vec<Hooks> = hooks.into_iter().collect();

    let speech_start: Vec<SignalHook> = hooks.iter().filter_map(|h| h.on_speech_start.clone()).collect();
    let speech_end: Vec<SignalHook> = hooks.iter().filter_map(|h| h.on_speech_end.clone()).collect();
    let transcript: Vec<TextHook> = hooks.iter().filter_map(|h| h.on_transcript.clone()).collect();
    let response: Vec<TextHook> = hooks.iter().filter_map(|h| h.on_response.clone()).collect();
    let error: Vec<ErrorHook> = hooks.iter().filter_map(|h| h.on_error.clone()).collect();

    Hooks {
        on_speech_start: compose_signal(speech_start),
        on_speech_end: compose_signal(speech_end),
        on_transcript: compose_text(transcript),
        on_response: compose_text(response),
        on_error: compose_error(error),
    }
}

fn compose_signal(hooks: Vec<SignalHook>) -> Option<SignalHook> {
    if hooks.is_empty() {
        return None;
    }
    Some(Arc::new(move || {
        for hook in &hooks {
            hook();
        }
    }))
}

fn compose_text(hooks: Vec<TextHook>) -> Option<TextHook> {
    if hooks.is_empty() {
        return None;
    }
    Some(Arc::new(move |text: &str| {
        for hook in &hooks {
            hook(text);
        }
    }))
}

fn compose_error(hooks: Vec<ErrorHook>) -> Option<ErrorHook> {
    if hooks.is_empty() {
        return None;
    }
    Some(Arc::new(move |err: &Error| {
        hooks.iter().find_map(|hook| hook(err))
    }))
}
