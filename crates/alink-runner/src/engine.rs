//! The protocol engine.
//!
//! The engine reads input one byte at a time through the
//! [`ByteMultiplexer`], walks the command trie, and hands each recognized
//! (or unrecognized) message to its handler. Handler faults are recorded and
//! the next message starts from the root. Only a terminate request or loss
//! of the link ends the loop, and a lost link is recorded like any other
//! fault before the engine stops.

use std::panic::{self, AssertUnwindSafe};

use alink_diagnostics::{Diagnostics, Fault, HANDLED_MESSAGES, UNHANDLED_MESSAGES};
use alink_protocol::{HandlerKind, Step, Trie, COMMAND_TABLE};

use crate::config::AdapterConfig;
use crate::error::EngineError;
use crate::handlers::{CommandHandlers, Control};
use crate::multiplexer::ByteMultiplexer;
use crate::scheduler::Scheduler;
use crate::transport::{BinaryModeGuard, Transport};

/// Why [`Engine::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// A handler requested termination.
    Terminated,
    /// The input side of the link closed.
    InputClosed,
}

/// Reads one message at a time and routes it to its handler.
pub struct Dispatcher {
    trie: Trie<HandlerKind>,
    handlers: CommandHandlers,
    multiplexer: ByteMultiplexer,
    diagnostics: Diagnostics,
    active: Option<HandlerKind>,
}

impl Dispatcher {
    pub fn new(
        trie: Trie<HandlerKind>,
        handlers: CommandHandlers,
        multiplexer: ByteMultiplexer,
        diagnostics: Diagnostics,
    ) -> Self {
        Dispatcher {
            trie,
            handlers,
            multiplexer,
            diagnostics,
            active: None,
        }
    }

    /// Read the next message from `link` and run its handler.
    ///
    /// Stat counters are only updated once the handler has returned
    /// successfully.
    pub fn dispatch_next(&mut self, link: &mut dyn Transport) -> Result<Control, EngineError> {
        self.active = None;

        let mut walk = self.trie.walk();
        let kind = loop {
            let byte = self.multiplexer.next_byte(link)?;
            match walk.push(byte) {
                Step::Continue => {}
                Step::Matched(kind) => break kind,
                Step::Unrecognized => break HandlerKind::Unrecognized,
            }
        };
        let mut buffer = walk.into_buffer();

        self.active = Some(kind);
        let control = self.handlers.handle(kind, &mut buffer, link)?;

        if kind == HandlerKind::Unrecognized {
            self.diagnostics.inc(UNHANDLED_MESSAGES);
        } else {
            self.diagnostics.inc(HANDLED_MESSAGES);
        }
        Ok(control)
    }

    /// Name of the handler running the current message, for crash records.
    fn active_name(&self) -> &'static str {
        self.active.map_or("dispatch", |kind| kind.name())
    }

    pub fn handlers(&self) -> &CommandHandlers {
        &self.handlers
    }
}

/// The adapter: a transport plus everything needed to serve it.
pub struct Engine<T: Transport> {
    transport: T,
    dispatcher: Dispatcher,
    diagnostics: Diagnostics,
    scheduler: Scheduler,
}

impl<T: Transport> Engine<T> {
    /// Build an engine serving the standard command table.
    pub fn new(config: &AdapterConfig, transport: T) -> Result<Self, EngineError> {
        Self::with_table(config, transport, COMMAND_TABLE)
    }

    /// Build an engine serving `table`.
    ///
    /// Fails if the configuration is invalid or the table has conflicting
    /// sequences.
    pub fn with_table(
        config: &AdapterConfig,
        transport: T,
        table: &[(&[u8], HandlerKind)],
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let trie = Trie::build(table.iter().copied())?;

        let diagnostics = Diagnostics::new(config.mem_log_size);
        let scheduler = Scheduler::new(diagnostics.clone());
        let multiplexer =
            ByteMultiplexer::new(scheduler.clone(), config.idle_period(), config.idle_strategy);
        let handlers = CommandHandlers::new(config, diagnostics.clone(), scheduler.clone());

        Ok(Engine {
            transport,
            dispatcher: Dispatcher::new(trie, handlers, multiplexer, diagnostics.clone()),
            diagnostics,
            scheduler,
        })
    }

    /// Serve the link until termination or end of input.
    ///
    /// The transport is in binary mode for the duration and restored
    /// afterwards, on every exit path.
    pub fn run(&mut self) -> Result<Shutdown, EngineError> {
        self.diagnostics
            .info(concat!("alink v", env!("CARGO_PKG_VERSION")));
        self.diagnostics.info("Starting...");
        self.diagnostics.info("~ for debug mode");

        let outcome = match BinaryModeGuard::new(&mut self.transport, true) {
            Ok(mut link) => serve(&mut self.dispatcher, &mut *link, &self.diagnostics),
            Err(e) => Err(EngineError::from(e)),
        };

        match &outcome {
            Ok(shutdown) => tracing::debug!(?shutdown, "Engine stopped"),
            Err(e) => tracing::error!("Engine stopped: {}", e),
        }
        self.diagnostics.info("aLink shutdown");
        outcome
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

fn serve(
    dispatcher: &mut Dispatcher,
    link: &mut dyn Transport,
    diagnostics: &Diagnostics,
) -> Result<Shutdown, EngineError> {
    loop {
        let result = panic::catch_unwind(AssertUnwindSafe(|| dispatcher.dispatch_next(link)));
        match result {
            Ok(Ok(Control::Continue)) => {}
            Ok(Ok(Control::Terminate)) => return Ok(Shutdown::Terminated),
            Ok(Err(e)) if e.is_closed() => return Ok(Shutdown::InputClosed),
            Ok(Err(e)) => {
                let fault = Fault::from_error(e.kind(), &e, dispatcher.active_name(), e.location());
                diagnostics.log_exception(&fault);
                if e.is_link_failure() {
                    return Err(e);
                }
            }
            Err(payload) => {
                let fault = Fault::from_panic(payload.as_ref(), dispatcher.active_name());
                diagnostics.log_exception(&fault);
            }
        }
    }
}
