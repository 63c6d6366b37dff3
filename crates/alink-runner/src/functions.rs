//! Locomotive function banks and the debug loco interceptor.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// One function's state from a function bank command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionState {
    pub function: u8,
    pub active: bool,
}

impl fmt::Display for FunctionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}{}", self.function, if self.active { '+' } else { '-' })
    }
}

/// Maps function bank ids to their functions, lowest state bit first.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    banks: BTreeMap<u8, Vec<u8>>,
}

impl FunctionTable {
    pub fn new(banks: BTreeMap<u8, Vec<u8>>) -> Self {
        FunctionTable { banks }
    }

    pub fn functions(&self, bank: u8) -> Option<&[u8]> {
        self.banks.get(&bank).map(Vec::as_slice)
    }

    /// Decode a bank's state byte: bit `i` is the state of the bank's `i`-th
    /// function.
    pub fn decode(&self, bank: u8, state: u8) -> Result<Vec<FunctionState>, EngineError> {
        let Some(functions) = self.functions(bank) else {
            return Err(EngineError::unmapped_bank(bank));
        };
        Ok(functions
            .iter()
            .enumerate()
            .map(|(bit, &function)| FunctionState {
                function,
                active: state.checked_shr(bit as u32).is_some_and(|s| s & 1 != 0),
            })
            .collect())
    }

    /// Function ids mapped more than once, across all banks.
    pub fn duplicates(&self) -> Vec<u8> {
        let mut seen = BTreeMap::<u8, usize>::new();
        for function in self.banks.values().flatten() {
            *seen.entry(*function).or_default() += 1;
        }
        seen.into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(function, _)| function)
            .collect()
    }
}

/// Action bound to a function of the debug loco.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugAction {
    /// Log uptime and stat counters.
    ViewStats,
    /// Stop the adapter.
    Exit,
}

/// Routes function commands for one address to debug actions instead of
/// the normal function logging.
#[derive(Debug, Clone)]
pub struct CommandInterceptor {
    address: u16,
    actions: BTreeMap<u8, DebugAction>,
}

impl CommandInterceptor {
    pub fn new(address: u16, actions: BTreeMap<u8, DebugAction>) -> Self {
        CommandInterceptor { address, actions }
    }

    pub fn intercepts(&self, loco: u16) -> bool {
        loco == self.address
    }

    /// Actions triggered by `states`, in bank order. Only active functions
    /// trigger their action.
    pub fn triggered<'a>(
        &'a self,
        states: &'a [FunctionState],
    ) -> impl Iterator<Item = DebugAction> + 'a {
        states
            .iter()
            .filter(|state| state.active)
            .filter_map(|state| self.actions.get(&state.function).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> FunctionTable {
        FunctionTable::new(BTreeMap::from([
            (0x20, vec![1, 2, 3, 4, 0]),
            (0x28, (21..=28).collect()),
        ]))
    }

    #[test]
    fn test_decode_bits_in_bank_order() {
        let states = table().decode(0x20, 0b1_0001).unwrap();
        let text: Vec<String> = states.iter().map(ToString::to_string).collect();
        assert_eq!(text, vec!["F1+", "F2-", "F3-", "F4-", "F0+"]);
    }

    #[test]
    fn test_unmapped_bank() {
        assert!(matches!(
            table().decode(0x21, 0xFF),
            Err(EngineError::UnmappedBank { bank: 0x21, .. })
        ));
    }

    #[test]
    fn test_duplicates() {
        assert!(table().duplicates().is_empty());
        let table = FunctionTable::new(BTreeMap::from([(0x20, vec![1, 2]), (0x21, vec![2, 3, 1])]));
        assert_eq!(table.duplicates(), vec![1, 2]);
    }

    #[test]
    fn test_interceptor_triggers_active_functions_only() {
        let interceptor = CommandInterceptor::new(
            9999,
            BTreeMap::from([(0, DebugAction::ViewStats), (28, DebugAction::Exit)]),
        );
        assert!(interceptor.intercepts(9999));
        assert!(!interceptor.intercepts(3));

        let table = table();
        let states = table.decode(0x20, 0b1_0000).unwrap();
        assert_eq!(
            interceptor.triggered(&states).collect::<Vec<_>>(),
            vec![DebugAction::ViewStats]
        );

        let states = table.decode(0x28, 0x7F).unwrap();
        assert_eq!(interceptor.triggered(&states).count(), 0);
        let states = table.decode(0x28, 0x80).unwrap();
        assert_eq!(
            interceptor.triggered(&states).collect::<Vec<_>>(),
            vec![DebugAction::Exit]
        );
    }
}
