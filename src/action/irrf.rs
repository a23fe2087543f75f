use serde::{Deserialize, Serialize};

/// IR/RF transmit action entry (spec.md §6 "IR/RF TX"): either a raw
/// base-83 pulse string or a protocol-code tuple, sent with a carrier
/// frequency, repeat count, and inter-repeat pause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IrRfEntry {
    RawPulses { base83: String, frequency_hz: u32, repeat: u8, inter_repeat_pause_ms: u32 },
    ProtocolCode { protocol: String, code: String, repeat: u8, inter_repeat_pause_ms: u32 },
}

/// A resolved transmit job handed to the IR/RF worker.
#[derive(Debug, Clone)]
pub struct IrRfTask {
    pub pulses_us: Vec<u16>,
    pub frequency_hz: u32,
    pub repeat: u8,
    pub inter_repeat_pause_ms: u32,
}

pub fn build_task(entry: &IrRfEntry) -> IrRfTask {
    match entry {
        IrRfEntry::RawPulses { base83, frequency_hz, repeat, inter_repeat_pause_ms } => IrRfTask {
            pulses_us: crate::irrf::decode_base83_pulses(base83),
            frequency_hz: *frequency_hz,
            repeat: *repeat,
            inter_repeat_pause_ms: *inter_repeat_pause_ms,
        },
        IrRfEntry::ProtocolCode { protocol, code, repeat, inter_repeat_pause_ms } => {
            let parsed = crate::irrf::IrProtocol::parse(protocol);
            let pulses_us = parsed.map(|p| p.encode_code(code)).unwrap_or_default();
            IrRfTask {
                pulses_us,
                frequency_hz: 38_000,
                repeat: *repeat,
                inter_repeat_pause_ms: *inter_repeat_pause_ms,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_pulses_entry_decodes_through_the_base83_codec() {
        let entry = IrRfEntry::RawPulses {
            base83: crate::irrf::encode_base83_pulses(&[9000, 4500, 560]),
            frequency_hz: 38_000,
            repeat: 1,
            inter_repeat_pause_ms: 40,
        };
        let task = build_task(&entry);
        assert_eq!(task.pulses_us, vec![9000, 4500, 560]);
    }
}
