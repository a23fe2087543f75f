use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::model::service::ServiceIndex;

/// Writing this exact value through the "maths" source resets an
/// accumulative free monitor back to zero instead of adding to the
/// running total (spec.md §4.6).
pub const FREE_MONITOR_RESET_SENTINEL: f32 = -2182017.0;

/// Maths operand: a literal, another service's characteristic 0, a
/// wall-clock field, or hardware RNG.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Operand {
    Literal(f32),
    Characteristic(ServiceIndex),
    ClockSecond,
    ClockMinute,
    ClockHour,
    ClockDayOfWeek,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Add,
    Sub,
    RevSub,
    Mul,
    Div,
    RevDiv,
    Mod,
    RevMod,
    Pow,
    RevPow,
    Reciprocal,
    Abs,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MathsOp {
    pub operator: Operator,
    pub operand: Operand,
}

fn apply_operator(value: f32, operator: Operator, operand: f32) -> f32 {
    match operator {
        Operator::Add => value + operand,
        Operator::Sub => value - operand,
        Operator::RevSub => operand - value,
        Operator::Mul => value * operand,
        Operator::Div => value / operand,
        Operator::RevDiv => operand / value,
        Operator::Mod => value % operand,
        Operator::RevMod => operand % value,
        Operator::Pow => value.powf(operand),
        Operator::RevPow => operand.powf(value),
        Operator::Reciprocal => 1.0 / value,
        Operator::Abs => value.abs(),
    }
}

/// An optional anchor searched for in a received byte buffer before the
/// fixed-width value is pulled out (spec.md §4.6 "optional pattern match
/// (text or hex) with byte offsets").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Pattern {
    Text(String),
    Hex(Vec<u8>),
}

impl Pattern {
    fn bytes(&self) -> std::borrow::Cow<'_, [u8]> {
        match self {
            Pattern::Text(s) => std::borrow::Cow::Borrowed(s.as_bytes()),
            Pattern::Hex(b) => std::borrow::Cow::Borrowed(b),
        }
    }
}

/// Fixed-width binary value extraction over an already-received byte
/// buffer (spec.md §4.6): an optional [`Pattern`] anchors the search,
/// then `width` bytes starting `offset` bytes past the anchor (or past
/// the start of the buffer, with no anchor) are read as a
/// little/big-endian signed/unsigned integer. `width` must be 1, 2, 4
/// or 8; anything else never matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub pattern: Option<Pattern>,
    pub offset: usize,
    pub width: u8,
    pub little_endian: bool,
    pub signed: bool,
}

impl Extraction {
    pub fn extract(&self, buf: &[u8]) -> Option<f32> {
        let anchor_end = match &self.pattern {
            Some(pattern) => {
                let needle = pattern.bytes();
                if needle.is_empty() {
                    return None;
                }
                let pos = buf.windows(needle.len()).position(|w| w == &needle[..])?;
                pos + needle.len()
            }
            None => 0,
        };
        let start = anchor_end.checked_add(self.offset)?;
        let end = start.checked_add(self.width as usize)?;
        let bytes = buf.get(start..end)?;

        let raw: i64 = match (self.width, self.signed, self.little_endian) {
            (1, false, _) => bytes[0] as i64,
            (1, true, _) => bytes[0] as i8 as i64,
            (2, false, true) => LittleEndian::read_u16(bytes) as i64,
            (2, false, false) => BigEndian::read_u16(bytes) as i64,
            (2, true, true) => LittleEndian::read_i16(bytes) as i64,
            (2, true, false) => BigEndian::read_i16(bytes) as i64,
            (4, false, true) => LittleEndian::read_u32(bytes) as i64,
            (4, false, false) => BigEndian::read_u32(bytes) as i64,
            (4, true, true) => LittleEndian::read_i32(bytes) as i64,
            (4, true, false) => BigEndian::read_i32(bytes) as i64,
            (8, false, true) => LittleEndian::read_u64(bytes) as i64,
            (8, false, false) => BigEndian::read_u64(bytes) as i64,
            (8, true, true) => LittleEndian::read_i64(bytes),
            (8, true, false) => BigEndian::read_i64(bytes),
            _ => return None,
        };
        Some(raw as f32)
    }
}

/// Which raw source feeds the maths pipeline before post-processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Source {
    /// Value injected externally via a service-manager action.
    Free,
    PulseFrequency { trigger_gpio: Option<(u8, u8)> },
    PulseTime { trigger_gpio: Option<(u8, u8)> },
    Maths { ops: Vec<MathsOp> },
    Adc { inverted: bool },
    /// Byte buffer returned by the service's own network worker task,
    /// parsed with `extraction` (spec.md §4.6). Acquisition (actually
    /// making the request) is `action::network`'s job; this source only
    /// describes how to turn the response into a number.
    Network { extraction: Extraction },
    I2c { trigger_register: Option<u8>, inter_delay_ms: u32, offset: usize, width: u8, signed: bool },
    /// Byte buffer returned by the service's own UART worker task,
    /// parsed with `extraction` the same way as [`Source::Network`].
    UartPattern { extraction: Extraction },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Limits {
    pub lower: f32,
    pub upper: f32,
}

/// Free monitor / free-monitor-accumulative service (spec.md §4.6): a
/// unified "compute a float and publish it as characteristic 0" service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeMonitor {
    pub source: Source,
    pub value: f32,
    pub factor: f32,
    pub offset: f32,
    pub accumulative: bool,
    pub limits: Option<Limits>,
}

impl FreeMonitor {
    pub fn new(source: Source) -> Self {
        FreeMonitor {
            source,
            value: 0.0,
            factor: 1.0,
            offset: 0.0,
            accumulative: false,
            limits: None,
        }
    }

    /// Evaluates the maths operation list against a resolver for
    /// characteristic/clock/RNG operands. Returns `None` if the source
    /// isn't [Source::Maths].
    pub fn evaluate_maths(&self, resolve: impl Fn(Operand) -> f32) -> Option<f32> {
        let Source::Maths { ops } = &self.source else {
            return None;
        };
        let mut value = 0.0f32;
        for op in ops {
            let operand = resolve(op.operand);
            value = apply_operator(value, op.operator, operand);
        }
        Some(value)
    }

    /// Runs post-processing on a freshly read raw value: `factor*value +
    /// offset`, accumulation (reset on the sentinel), and limit discard.
    /// Returns the new characteristic-0 value, or `None` if it was
    /// discarded for being out of `limits`.
    pub fn post_process(&mut self, raw: f32) -> Option<f32> {
        if self.accumulative && raw == FREE_MONITOR_RESET_SENTINEL {
            self.value = 0.0;
            return Some(self.value);
        }

        let processed = self.factor * raw + self.offset;
        if let Some(limits) = self.limits {
            if processed < limits.lower || processed > limits.upper {
                return None;
            }
        }

        self.value = if self.accumulative {
            self.value + processed
        } else {
            processed
        };
        Some(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_reads_little_endian_unsigned_offset_from_a_text_pattern() {
        let extraction = Extraction {
            pattern: Some(Pattern::Text("temp=".to_string())),
            offset: 0,
            width: 2,
            little_endian: true,
            signed: false,
        };
        let buf = b"garbagetemp=\x34\x12trailer";
        assert_eq!(extraction.extract(buf), Some(0x1234 as f32));
    }

    #[test]
    fn extraction_reads_big_endian_signed_value_with_no_pattern() {
        let extraction = Extraction { pattern: None, offset: 1, width: 4, little_endian: false, signed: true };
        let buf = [0xFF, 0xFF, 0xFF, 0xFF, 0xF0];
        assert_eq!(extraction.extract(&buf), Some(-16.0));
    }

    #[test]
    fn extraction_matches_a_hex_pattern_and_rejects_a_missing_one() {
        let extraction =
            Extraction { pattern: Some(Pattern::Hex(vec![0xAA, 0x55])), offset: 0, width: 1, little_endian: true, signed: false };
        assert_eq!(extraction.extract(&[0x00, 0xAA, 0x55, 0x2A]), Some(42.0));
        assert_eq!(extraction.extract(&[0x00, 0xAA, 0x54, 0x2A]), None);
    }

    #[test]
    fn extraction_rejects_an_unsupported_width() {
        let extraction = Extraction { pattern: None, offset: 0, width: 3, little_endian: true, signed: false };
        assert_eq!(extraction.extract(&[1, 2, 3, 4]), None);
    }

    #[test]
    fn maths_scenario_from_spec() {
        let ops = vec![
            MathsOp { operator: Operator::Add, operand: Operand::Literal(5.0) },
            MathsOp { operator: Operator::Mul, operand: Operand::Characteristic(3) },
        ];
        let mut fm = FreeMonitor::new(Source::Maths { ops });
        fm.value = 0.0;

        let raw = fm.evaluate_maths(|operand| match operand {
            Operand::Literal(v) => v,
            Operand::Characteristic(3) => 2.0,
            _ => 0.0,
        }).unwrap();
        assert_eq!(raw, 10.0);

        let result = fm.post_process(raw);
        assert_eq!(result, Some(10.0));
    }

    #[test]
    fn limits_discard_keeps_previous_value() {
        let mut fm = FreeMonitor::new(Source::Free);
        fm.limits = Some(Limits { lower: 0.0, upper: 9.0 });
        fm.value = 0.0;

        let result = fm.post_process(10.0);
        assert_eq!(result, None);
        assert_eq!(fm.value, 0.0);
    }

    #[test]
    fn accumulative_adds_until_sentinel_resets() {
        let mut fm = FreeMonitor::new(Source::Free);
        fm.accumulative = true;
        assert_eq!(fm.post_process(3.0), Some(3.0));
        assert_eq!(fm.post_process(4.0), Some(7.0));
        assert_eq!(fm.post_process(FREE_MONITOR_RESET_SENTINEL), Some(0.0));
    }
}
