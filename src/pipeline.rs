//! The check, build, capture, execute, present sequence shared by the
//! executing engines. Each stage is a strategy so engines differ only in the
//! parts they swap.

use std::panic::{self, AssertUnwindSafe};

use crate::{
    capture::StdoutCapture,
    environment::EnvironmentRef,
    error::EngineError,
    host::HostFrame,
    runtime::Interpreter,
    safety::Verdict,
    sink::OutputSink,
};

/// Screens a snippet before anything runs.
pub trait SafetyCheck {
    fn check(&self, source: &str) -> Verdict;
}

/// Produces the root scope for one run. Called once per run; the result is
/// never reused.
pub trait EnvironmentBuilder {
    fn build(&self, frame: &HostFrame) -> EnvironmentRef;
}

/// Decides how captured stdout is shown.
pub trait OutputPresenter {
    fn present(&self, console: &str, sink: &mut dyn OutputSink);
}

pub struct ExecutionPipeline<C, E, P> {
    check: C,
    environment: E,
    presenter: P,
}

impl<C, E, P> ExecutionPipeline<C, E, P>
where
    C: SafetyCheck,
    E: EnvironmentBuilder,
    P: OutputPresenter,
{
    pub fn new(check: C, environment: E, presenter: P) -> Self {
        Self {
            check,
            environment,
            presenter,
        }
    }

    /// Runs one snippet end to end. Rejected snippets produce a single fault
    /// and nothing else. Accepted snippets always reach the presenter, after
    /// their widgets and any runtime fault.
    pub fn execute(&self, source: &str, sink: &mut dyn OutputSink) {
        if let Verdict::Rejected(reason) = self.check.check(source) {
            sink.fault(reason.into());
            return;
        }

        let frame = HostFrame::new();
        let env = self.environment.build(&frame);
        let mut interpreter = Interpreter::with_environment(env);
        let capture = StdoutCapture::begin();
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| interpreter.eval_source(source)));
        let console = capture.finish();

        let fault = match outcome {
            Ok(Ok(_)) => None,
            Ok(Err(err)) => Some(EngineError::runtime(&err, source)),
            Err(payload) => Some(EngineError::Runtime {
                message: panic_message(payload.as_ref()),
                location: None,
            }),
        };
        interpreter.release();
        log::debug!(
            "snippet finished: {} bytes of output, {}",
            console.len(),
            if fault.is_some() { "failed" } else { "ok" }
        );

        for widget in frame.drain() {
            sink.widget(widget);
        }
        if let Some(fault) = fault {
            sink.fault(fault.into());
        }
        self.presenter.present(&console, sink);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "interpreter panicked".to_string()
    }
}
