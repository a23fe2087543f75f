use serde::{Deserialize, Serialize};

/// UART action entry (spec.md §6 "UART"): a raw or text byte sequence
/// sent on a named UART, followed by a trailing pause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UartEntry {
    pub uart: u8,
    pub bytes: Vec<u8>,
    pub pause_ms: u32,
}

/// A resolved UART send handed to the worker; identical to the entry
/// today, kept distinct so a future template-rendered body (mirroring
/// `network::NetworkRequestTask`) doesn't change the worker's shape.
#[derive(Debug, Clone)]
pub struct UartTask {
    pub uart: u8,
    pub bytes: Vec<u8>,
    pub pause_ms: u32,
}

pub fn build_task(entry: &UartEntry) -> UartTask {
    UartTask { uart: entry.uart, bytes: entry.bytes.clone(), pause_ms: entry.pause_ms }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_task_carries_the_bytes_and_pause_through_unchanged() {
        let entry = UartEntry { uart: 1, bytes: vec![0xAA, 0x01, 0xFF], pause_ms: 20 };
        let task = build_task(&entry);
        assert_eq!(task.uart, 1);
        assert_eq!(task.bytes, vec![0xAA, 0x01, 0xFF]);
        assert_eq!(task.pause_ms, 20);
    }
}
