//! Interactive debug menu served over the link in text mode.

use std::time::Duration;

use alink_diagnostics::Diagnostics;

use crate::error::{EngineError, TaskError};
use crate::handlers::Control;
use crate::scheduler::Scheduler;
use crate::transport::Transport;

/// Delay before the scheduled test message and test exception fire.
pub const TEST_EVENT_DELAY: Duration = Duration::from_secs(5);

const TEST_EXCEPTION: &str = "Test Exception";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Return,
    ViewLog,
    Stats,
    TriggerException,
    ScheduleMessage,
    ScheduleException,
    Exit,
}

const MENU_ITEMS: &[(u8, &str, MenuAction)] = &[
    (b'0', "Return to aLink mode", MenuAction::Return),
    (b'1', "View log", MenuAction::ViewLog),
    (b'2', "Stats", MenuAction::Stats),
    (b'5', "Trigger exception", MenuAction::TriggerException),
    (b'6', "Schedule test message", MenuAction::ScheduleMessage),
    (b'7', "Schedule test exception", MenuAction::ScheduleException),
    (b'x', "Exit script", MenuAction::Exit),
];

fn lookup(key: u8) -> Option<MenuAction> {
    MENU_ITEMS
        .iter()
        .find(|(item_key, _, _)| *item_key == key)
        .map(|(_, _, action)| *action)
}

/// The debug menu. Keys not on the menu are ignored.
pub struct DebugMenu<'a> {
    diagnostics: &'a Diagnostics,
    scheduler: &'a Scheduler,
}

impl<'a> DebugMenu<'a> {
    pub fn new(diagnostics: &'a Diagnostics, scheduler: &'a Scheduler) -> Self {
        DebugMenu {
            diagnostics,
            scheduler,
        }
    }

    /// Show the menu and serve key presses until one leaves it.
    pub fn run(&self, link: &mut dyn Transport) -> Result<Control, EngineError> {
        loop {
            show_menu(link)?;
            loop {
                let Some(action) = lookup(link.read_byte()?) else {
                    continue;
                };
                if let Some(control) = self.perform(action, link)? {
                    return Ok(control);
                }
                break;
            }
        }
    }

    /// Returns the control value when the action leaves the menu.
    fn perform(
        &self,
        action: MenuAction,
        link: &mut dyn Transport,
    ) -> Result<Option<Control>, EngineError> {
        match action {
            MenuAction::Return => {
                write_line(link, "Returning to aLink mode")?;
                return Ok(Some(Control::Continue));
            }
            MenuAction::ViewLog => {
                let mut lines = Vec::new();
                self.diagnostics
                    .dump(|severity, text| lines.push(format!("{}: {}", severity, text)));
                for line in lines {
                    write_line(link, &line)?;
                }
            }
            MenuAction::Stats => {
                for line in self.diagnostics.stats_report() {
                    write_line(link, &line)?;
                }
            }
            MenuAction::TriggerException => {
                write_line(link, "Throwing exception...")?;
                return Err(EngineError::test_fault(TEST_EXCEPTION));
            }
            MenuAction::ScheduleMessage => {
                write_line(link, "Scheduling test message in 5 seconds")?;
                self.scheduler
                    .schedule_in(TEST_EVENT_DELAY, log_test_message, self.diagnostics.clone());
            }
            MenuAction::ScheduleException => {
                write_line(link, "Scheduling test exception in 5 seconds")?;
                self.scheduler
                    .schedule_in(TEST_EVENT_DELAY, raise_test_exception, ());
            }
            MenuAction::Exit => {
                write_line(link, "Exit requested")?;
                return Ok(Some(Control::Terminate));
            }
        }
        Ok(None)
    }
}

fn show_menu(link: &mut dyn Transport) -> Result<(), EngineError> {
    write_line(link, "")?;
    write_line(link, "Debug Menu:")?;
    for (key, label, _) in MENU_ITEMS {
        write_line(link, &format!("  {}) {}", char::from(*key), label))?;
    }
    write_line(link, "")
}

fn write_line(link: &mut dyn Transport, text: &str) -> Result<(), EngineError> {
    link.write_all(text.as_bytes())?;
    link.write_all(b"\n")?;
    Ok(())
}

fn log_test_message(diagnostics: Diagnostics) -> Result<(), TaskError> {
    diagnostics.info("Test");
    Ok(())
}

fn raise_test_exception(_: ()) -> Result<(), TaskError> {
    Err(EngineError::test_fault(TEST_EXCEPTION).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use alink_diagnostics::EXCEPTIONS;
    use std::time::Instant;

    fn run_keys(keys: &[u8]) -> (Result<Control, EngineError>, String, Scheduler) {
        let diagnostics = Diagnostics::new(500);
        let scheduler = Scheduler::new(diagnostics.clone());
        let (mut transport, link) = MemoryTransport::pair();
        link.send(keys);
        let result = DebugMenu::new(&diagnostics, &scheduler).run(&mut transport);
        let output = String::from_utf8(link.take_output()).unwrap();
        (result, output, scheduler)
    }

    #[test]
    fn test_menu_listing() {
        let (result, output, _) = run_keys(b"0");
        assert_eq!(result.unwrap(), Control::Continue);
        assert!(output.starts_with("\nDebug Menu:\n  0) Return to aLink mode\n"));
        assert!(output.contains("  x) Exit script\n"));
        assert!(output.ends_with("Returning to aLink mode\n"));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let (result, output, _) = run_keys(b"z9\n0");
        assert_eq!(result.unwrap(), Control::Continue);
        assert_eq!(output.matches("Debug Menu:").count(), 1);
    }

    #[test]
    fn test_exit_terminates() {
        let (result, output, _) = run_keys(b"x");
        assert_eq!(result.unwrap(), Control::Terminate);
        assert!(output.ends_with("Exit requested\n"));
    }

    #[test]
    fn test_stats_then_return_redraws_menu() {
        let (result, output, _) = run_keys(b"20");
        assert!(result.is_ok());
        assert!(output.contains("Uptime: 00:00\n"));
        assert_eq!(output.matches("Debug Menu:").count(), 2);
    }

    #[test]
    fn test_view_log_prefixes_severity() {
        let diagnostics = Diagnostics::new(500);
        diagnostics.warn("21 99");
        let scheduler = Scheduler::new(diagnostics.clone());
        let (mut transport, link) = MemoryTransport::pair();
        link.send(b"10");
        DebugMenu::new(&diagnostics, &scheduler)
            .run(&mut transport)
            .unwrap();
        let output = String::from_utf8(link.take_output()).unwrap();
        assert!(output.contains("WARN: 21 99\n"));
    }

    #[test]
    fn test_trigger_exception() {
        let (result, output, _) = run_keys(b"5");
        assert_eq!(result.unwrap_err().to_string(), "Test Exception");
        assert!(output.ends_with("Throwing exception...\n"));
    }

    #[test]
    fn test_scheduled_test_events() {
        let (result, _, scheduler) = run_keys(b"670");
        assert!(result.is_ok());
        assert_eq!(scheduler.pending(), 2);

        let later = Instant::now() + TEST_EVENT_DELAY + Duration::from_secs(1);
        assert_eq!(scheduler.run_due(later), 2);
        let diagnostics = scheduler.diagnostics();
        assert_eq!(diagnostics.counter(EXCEPTIONS), 1);
        let texts: Vec<String> = diagnostics.entries().into_iter().map(|e| e.text).collect();
        assert_eq!(texts[0], "Test");
        assert_eq!(texts[1], "TaskError: Test Exception");
        assert!(texts[2].contains("raise_test_exception"));
    }

    #[test]
    fn test_closed_link_ends_menu() {
        let diagnostics = Diagnostics::new(500);
        let scheduler = Scheduler::new(diagnostics.clone());
        let (mut transport, mut link) = MemoryTransport::pair();
        link.close();
        let result = DebugMenu::new(&diagnostics, &scheduler).run(&mut transport);
        assert!(matches!(result, Err(e) if e.is_link_failure()));
    }
}
