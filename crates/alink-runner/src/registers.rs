//! Configuration variable (CV) registers.

use std::collections::BTreeMap;

/// Number of CV registers.
pub const CV_COUNT: usize = 256;

/// The CV register table and the currently selected CV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvRegisters {
    values: [u8; CV_COUNT],
    current: u8,
}

impl Default for CvRegisters {
    fn default() -> Self {
        CvRegisters {
            values: [0; CV_COUNT],
            current: 0,
        }
    }
}

impl CvRegisters {
    /// Registers preloaded with `initial` values, all others zero.
    pub fn with_values(initial: &BTreeMap<u8, u8>) -> Self {
        let mut registers = CvRegisters::default();
        for (&cv, &value) in initial {
            registers.values[usize::from(cv)] = value;
        }
        registers
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn get(&self, cv: u8) -> u8 {
        self.values[usize::from(cv)]
    }

    pub fn select(&mut self, cv: u8) {
        self.current = cv;
    }

    /// The current CV and its value.
    pub fn read_current(&self) -> (u8, u8) {
        (self.current, self.get(self.current))
    }

    /// Store `value` in `cv`, which also becomes the current CV.
    pub fn write(&mut self, cv: u8, value: u8) {
        self.current = cv;
        self.values[usize::from(cv)] = value;
    }
}
