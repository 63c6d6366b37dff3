//! Command handlers.
//!
//! Each handler receives the bytes that selected it and reads its own fixed
//! length payload and checksum from the link. A message whose checksum does
//! not match is logged once as a warning and otherwise ignored.

use alink_diagnostics::Diagnostics;
use alink_protocol::{
    decode_loco_id, to_hex, verify, HandlerKind, Speed, REPLY_CV_ACK_BUSY, REPLY_CV_ACK_READY,
    REPLY_CV_READ_HEADER, REPLY_PING, REPLY_VERSION_HEADER, REPLY_VERSION_TRAILER,
};

use crate::config::AdapterConfig;
use crate::debug_menu::DebugMenu;
use crate::error::EngineError;
use crate::functions::{CommandInterceptor, DebugAction, FunctionState, FunctionTable};
use crate::registers::CvRegisters;
use crate::scheduler::Scheduler;
use crate::transport::{read_field, BinaryModeGuard, Transport};

/// What the engine does after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Start the next message.
    Continue,
    /// Shut the adapter down.
    Terminate,
}

/// Function states are logged in groups of this many.
const FUNCTIONS_PER_LINE: usize = 4;

/// Handler state shared across messages.
pub struct CommandHandlers {
    diagnostics: Diagnostics,
    scheduler: Scheduler,
    registers: CvRegisters,
    functions: FunctionTable,
    interceptor: CommandInterceptor,
    log_ping: bool,
    device_version: u8,
}

impl CommandHandlers {
    pub fn new(config: &AdapterConfig, diagnostics: Diagnostics, scheduler: Scheduler) -> Self {
        let functions = FunctionTable::new(config.function_banks.clone());
        for function in functions.duplicates() {
            diagnostics.warn(format!("F{} is mapped more than once", function));
        }

        CommandHandlers {
            registers: CvRegisters::with_values(&config.cvs),
            functions,
            interceptor: CommandInterceptor::new(config.debug_loco, config.debug_functions.clone()),
            log_ping: config.log_ping,
            device_version: config.device_version,
            diagnostics,
            scheduler,
        }
    }

    pub fn registers(&self) -> &CvRegisters {
        &self.registers
    }

    /// Run the handler for `kind`.
    pub fn handle(
        &mut self,
        kind: HandlerKind,
        buffer: &mut Vec<u8>,
        link: &mut dyn Transport,
    ) -> Result<Control, EngineError> {
        match kind {
            HandlerKind::Unrecognized => self.unrecognized(buffer),
            HandlerKind::Ping => self.ping(link),
            HandlerKind::Version => self.version(link),
            HandlerKind::LocoSpeed => self.loco_speed(buffer, link),
            HandlerKind::LocoFunction => self.loco_function(buffer, link),
            HandlerKind::CvSelect => self.cv_select(buffer, link),
            HandlerKind::CvRead => self.cv_read(link),
            HandlerKind::CvWrite => self.cv_write(buffer, link),
            HandlerKind::DebugEntry => self.debug_entry(link),
        }
    }

    /// Read the trailing checksum and check it against `buffer`.
    fn checksum_ok(&self, buffer: &[u8], link: &mut dyn Transport) -> Result<bool, EngineError> {
        let claimed = link.read_byte()?;
        match verify(buffer, claimed) {
            Ok(()) => Ok(true),
            Err(e) => {
                self.diagnostics.warn(e.to_string());
                Ok(false)
            }
        }
    }

    fn unrecognized(&self, buffer: &[u8]) -> Result<Control, EngineError> {
        self.diagnostics.warn(to_hex(buffer));
        Ok(Control::Continue)
    }

    fn ping(&self, link: &mut dyn Transport) -> Result<Control, EngineError> {
        if self.log_ping {
            self.diagnostics.info("Ping request");
        }
        link.write_with_checksum(&REPLY_PING)?;
        Ok(Control::Continue)
    }

    fn version(&self, link: &mut dyn Transport) -> Result<Control, EngineError> {
        self.diagnostics.info("Version request");
        let [a, b] = REPLY_VERSION_HEADER;
        link.write_with_checksum(&[a, b, self.device_version, REPLY_VERSION_TRAILER])?;
        Ok(Control::Continue)
    }

    fn loco_speed(
        &self,
        buffer: &mut Vec<u8>,
        link: &mut dyn Transport,
    ) -> Result<Control, EngineError> {
        let loco = read_field::<2>(link, buffer)?;
        let [speed] = read_field::<1>(link, buffer)?;
        if !self.checksum_ok(buffer, link)? {
            return Ok(Control::Continue);
        }

        let loco = decode_loco_id(loco);
        let speed = Speed::from(speed);
        self.diagnostics.info("Loco speed request");
        self.diagnostics.info(format!(" Loco: {}", loco));
        self.diagnostics.info(format!(" Speed: {}", speed.step));
        self.diagnostics.info(format!(" Forward: {}", speed.forward));
        Ok(Control::Continue)
    }

    fn loco_function(
        &self,
        buffer: &mut Vec<u8>,
        link: &mut dyn Transport,
    ) -> Result<Control, EngineError> {
        let bank = buffer.last().copied().unwrap_or_default();
        let loco = read_field::<2>(link, buffer)?;
        let [state] = read_field::<1>(link, buffer)?;
        if !self.checksum_ok(buffer, link)? {
            return Ok(Control::Continue);
        }

        let loco = decode_loco_id(loco);
        let states = self.functions.decode(bank, state)?;

        if self.interceptor.intercepts(loco) {
            return Ok(self.run_debug_actions(&states));
        }

        self.diagnostics.info("Loco func request");
        self.diagnostics.info(format!(" Loco: {}", loco));
        for group in states.chunks(FUNCTIONS_PER_LINE) {
            let line: Vec<String> = group.iter().map(FunctionState::to_string).collect();
            self.diagnostics.info(format!(" {}", line.join(" ")));
        }
        Ok(Control::Continue)
    }

    fn run_debug_actions(&self, states: &[FunctionState]) -> Control {
        for action in self.interceptor.triggered(states) {
            match action {
                DebugAction::ViewStats => {
                    for line in self.diagnostics.stats_report() {
                        self.diagnostics.info(line);
                    }
                }
                DebugAction::Exit => {
                    self.diagnostics.info("Exit requested");
                    return Control::Terminate;
                }
            }
        }
        Control::Continue
    }

    fn cv_select(
        &mut self,
        buffer: &mut Vec<u8>,
        link: &mut dyn Transport,
    ) -> Result<Control, EngineError> {
        let [cv] = read_field::<1>(link, buffer)?;
        if !self.checksum_ok(buffer, link)? {
            return Ok(Control::Continue);
        }

        self.diagnostics.info(format!("Selected CV {}", cv));
        self.registers.select(cv);
        write_cv_ack(link)?;
        Ok(Control::Continue)
    }

    fn cv_read(&self, link: &mut dyn Transport) -> Result<Control, EngineError> {
        let (cv, value) = self.registers.read_current();
        self.diagnostics.info(format!("Reading CV {}", cv));
        self.diagnostics.info(format!(" Value: {}", value));
        let [a, b] = REPLY_CV_READ_HEADER;
        link.write_with_checksum(&[a, b, cv, value])?;
        Ok(Control::Continue)
    }

    fn cv_write(
        &mut self,
        buffer: &mut Vec<u8>,
        link: &mut dyn Transport,
    ) -> Result<Control, EngineError> {
        let [cv, value] = read_field::<2>(link, buffer)?;
        if !self.checksum_ok(buffer, link)? {
            return Ok(Control::Continue);
        }

        self.diagnostics.info(format!("Writing CV {}", cv));
        self.diagnostics.info(format!(" Value: {}", value));
        self.registers.write(cv, value);
        write_cv_ack(link)?;
        Ok(Control::Continue)
    }

    fn debug_entry(&self, link: &mut dyn Transport) -> Result<Control, EngineError> {
        let mut console = BinaryModeGuard::new(link, false)?;
        DebugMenu::new(&self.diagnostics, &self.scheduler).run(&mut *console)
    }
}

/// The command station expects two busy acknowledgements followed by two
/// ready ones.
fn write_cv_ack(link: &mut dyn Transport) -> Result<(), EngineError> {
    link.write_with_checksum(&REPLY_CV_ACK_BUSY)?;
    link.write_with_checksum(&REPLY_CV_ACK_BUSY)?;
    link.write_with_checksum(&REPLY_CV_ACK_READY)?;
    link.write_with_checksum(&REPLY_CV_ACK_READY)?;
    Ok(())
}
