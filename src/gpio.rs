use std::collections::HashMap;

/// Extended-GPIO pin reference: `bank=0` is an on-chip pin; `bank>=1`
/// addresses pin `pin` on the `bank`-th MCP23017 expander (spec.md
/// GLOSSARY "Extended GPIO").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtendedPin {
	pub bank: u8,
	pub pin: u8,
}

impl ExtendedPin {
	/// Decodes the `bank*100 + pin` wire encoding used throughout config.
	pub fn decode(raw: i32) -> Self {
		ExtendedPin { bank: (raw / 100) as u8, pin: (raw % 100) as u8 }
	}

	pub fn encode(self) -> i32 {
		self.bank as i32 * 100 + self.pin as i32
	}

	pub fn is_onboard(self) -> bool {
		self.bank == 0
	}
}

/// Boundary trait over on-chip and MCP23017-extended GPIO, plus the
/// handful of other hardware surfaces the action/service layer needs
/// (spec.md §6.1): ADC sampling, I2C transactions, UART framing, the
/// addressable-LED NRZ burst, and the IR/RF carrier-toggling transmit.
/// So the runtime and its service state machines never touch `rppal`
/// directly (spec.md §9 "Cooperative tasks" / testability guidance).
pub trait GpioDriver {
	fn write(&mut self, pin: ExtendedPin, high: bool);
	fn read(&mut self, pin: ExtendedPin) -> bool;
	fn set_pwm_duty(&mut self, pin: ExtendedPin, duty: u16, freq_hz: Option<u32>);

	/// Raw ADC sample at `pin`, 0..=4095 matching the teacher's 12-bit
	/// onboard ADC range.
	fn read_adc(&mut self, pin: ExtendedPin) -> u16;

	/// One write-then-read I2C transaction on `bus` against `address`.
	fn i2c_transaction(&mut self, bus: u8, address: u8, write: &[u8], read_len: usize) -> Result<Vec<u8>, String>;

	/// Sends `bytes` on `uart` and returns whatever arrived within the
	/// driver's own read timeout.
	fn uart_transfer(&mut self, uart: u8, bytes: &[u8]) -> Result<Vec<u8>, String>;

	/// Transmits one NRZ frame on the addressable-LED data pin
	/// (spec.md §6 "Addressable LED on-wire").
	fn transmit_nrz(&mut self, pin: ExtendedPin, bytes: &[u8]);

	/// Runs the carrier-toggling IR/RF transmit loop for `pulses_us`
	/// at `frequency_hz`, repeated `repeat` times with `inter_repeat_pause_ms`
	/// between repeats (spec.md §4.9). The interrupts-disabled toggling
	/// itself is behind this boundary; this crate only produces the
	/// pulse train.
	fn transmit_ir(&mut self, pulses_us: &[u16], frequency_hz: u32, repeat: u8, inter_repeat_pause_ms: u32);
}

/// In-memory double used by tests and by the `demo` feature build.
#[derive(Debug, Default)]
pub struct MemoryGpio {
	levels: HashMap<ExtendedPin, bool>,
	duty: HashMap<ExtendedPin, (u16, Option<u32>)>,
	adc: HashMap<ExtendedPin, u16>,
	pub nrz_frames: Vec<(ExtendedPin, Vec<u8>)>,
	pub ir_transmits: Vec<(Vec<u16>, u32, u8, u32)>,
	pub i2c_responses: HashMap<(u8, u8), Vec<u8>>,
	pub uart_responses: HashMap<u8, Vec<u8>>,
}

impl MemoryGpio {
	pub fn new() -> Self {
		MemoryGpio::default()
	}

	pub fn duty_of(&self, pin: ExtendedPin) -> Option<(u16, Option<u32>)> {
		self.duty.get(&pin).copied()
	}

	pub fn set_adc(&mut self, pin: ExtendedPin, value: u16) {
		self.adc.insert(pin, value);
	}
}

impl GpioDriver for MemoryGpio {
	fn write(&mut self, pin: ExtendedPin, high: bool) {
		self.levels.insert(pin, high);
	}

	fn read(&mut self, pin: ExtendedPin) -> bool {
		*self.levels.get(&pin).unwrap_or(&false)
	}

	fn set_pwm_duty(&mut self, pin: ExtendedPin, duty: u16, freq_hz: Option<u32>) {
		self.duty.insert(pin, (duty, freq_hz));
	}

	fn read_adc(&mut self, pin: ExtendedPin) -> u16 {
		*self.adc.get(&pin).unwrap_or(&0)
	}

	fn i2c_transaction(&mut self, bus: u8, address: u8, _write: &[u8], read_len: usize) -> Result<Vec<u8>, String> {
		let mut response = self.i2c_responses.get(&(bus, address)).cloned().unwrap_or_default();
		response.resize(read_len, 0);
		Ok(response)
	}

	fn uart_transfer(&mut self, uart: u8, _bytes: &[u8]) -> Result<Vec<u8>, String> {
		Ok(self.uart_responses.get(&uart).cloned().unwrap_or_default())
	}

	fn transmit_nrz(&mut self, pin: ExtendedPin, bytes: &[u8]) {
		self.nrz_frames.push((pin, bytes.to_vec()));
	}

	fn transmit_ir(&mut self, pulses_us: &[u16], frequency_hz: u32, repeat: u8, inter_repeat_pause_ms: u32) {
		self.ir_transmits.push((pulses_us.to_vec(), frequency_hz, repeat, inter_repeat_pause_ms));
	}
}

/// Real `rppal`-backed [`GpioDriver`], gated behind the `gpio-driver`
/// feature (spec.md §6.1: the onboard-hardware collaborator this trait
/// boundary stands in for). Built from the board-level pin assignments
/// in [`crate::config::GeneralConfig`], since `transmit_ir`/`transmit_nrz`
/// carry no pin of their own in the trait — the physical IR/RF pin is a
/// fixed board property, not a per-call argument.
#[cfg(feature = "gpio-driver")]
mod rppal_driver {
	use std::collections::HashMap;
	use std::time::{Duration, Instant};

	use rppal::gpio::{Gpio, InputPin, Level, OutputPin};
	use rppal::i2c::I2c;
	use rppal::uart::{Parity, Uart};

	use super::ExtendedPin;
	use crate::gpio::GpioDriver;

	fn spin_wait(duration: Duration) {
		let start = Instant::now();
		while start.elapsed() < duration {
			std::hint::spin_loop();
		}
	}

	pub struct RppalGpio {
		gpio: Gpio,
		outputs: HashMap<ExtendedPin, OutputPin>,
		inputs: HashMap<ExtendedPin, InputPin>,
		i2c_buses: HashMap<u8, I2c>,
		uarts: HashMap<u8, Uart>,
		ir_tx_pin: Option<ExtendedPin>,
		ir_tx_inverted: bool,
		rf_tx_pin: Option<ExtendedPin>,
		rf_tx_inverted: bool,
		warned_extended_bank: bool,
		warned_adc: bool,
	}

	impl RppalGpio {
		/// `ir_tx_pin`/`rf_tx_pin` use the same `bank*100+pin` raw
		/// encoding as the rest of config (spec.md §6); only bank 0
		/// (onboard) is supported by this driver.
		pub fn new(
			ir_tx_pin: Option<i32>,
			ir_tx_inverted: bool,
			rf_tx_pin: Option<i32>,
			rf_tx_inverted: bool,
		) -> Result<Self, rppal::gpio::Error> {
			Ok(RppalGpio {
				gpio: Gpio::new()?,
				outputs: HashMap::new(),
				inputs: HashMap::new(),
				i2c_buses: HashMap::new(),
				uarts: HashMap::new(),
				ir_tx_pin: ir_tx_pin.map(ExtendedPin::decode),
				ir_tx_inverted,
				rf_tx_pin: rf_tx_pin.map(ExtendedPin::decode),
				rf_tx_inverted,
				warned_extended_bank: false,
				warned_adc: false,
			})
		}

		fn warn_extended_bank(&mut self, pin: ExtendedPin) {
			if !self.warned_extended_bank {
				self.warned_extended_bank = true;
				tracing::warn!("MCP23017 bank {} has no onboard driver; pin {} ignored", pin.bank, pin.pin);
			}
		}

		fn output_pin(&mut self, pin: ExtendedPin) -> Option<&mut OutputPin> {
			if !pin.is_onboard() {
				self.warn_extended_bank(pin);
				return None;
			}
			if !self.outputs.contains_key(&pin) {
				match self.gpio.get(pin.pin) {
					Ok(p) => {
						self.outputs.insert(pin, p.into_output());
					}
					Err(err) => {
						tracing::error!("failed to claim pin {} as output: {err}", pin.pin);
						return None;
					}
				}
			}
			self.outputs.get_mut(&pin)
		}

		fn input_pin(&mut self, pin: ExtendedPin) -> Option<&InputPin> {
			if !pin.is_onboard() {
				self.warn_extended_bank(pin);
				return None;
			}
			if !self.inputs.contains_key(&pin) {
				match self.gpio.get(pin.pin) {
					Ok(p) => {
						self.inputs.insert(pin, p.into_input());
					}
					Err(err) => {
						tracing::error!("failed to claim pin {} as input: {err}", pin.pin);
						return None;
					}
				}
			}
			self.inputs.get(&pin)
		}

		fn i2c_bus(&mut self, bus: u8) -> Option<&mut I2c> {
			if !self.i2c_buses.contains_key(&bus) {
				match I2c::with_bus(bus) {
					Ok(i2c) => {
						self.i2c_buses.insert(bus, i2c);
					}
					Err(err) => {
						tracing::error!("failed to open i2c bus {bus}: {err}");
						return None;
					}
				}
			}
			self.i2c_buses.get_mut(&bus)
		}

		/// `uart 0` is the onboard UART (`/dev/serial0`); any other index
		/// is assumed to be a USB-serial adapter, matching the teacher's
		/// own onboard-plus-USB UART addressing.
		fn uart(&mut self, uart_id: u8) -> Option<&mut Uart> {
			if !self.uarts.contains_key(&uart_id) {
				let path = if uart_id == 0 { "/dev/serial0".to_string() } else { format!("/dev/ttyUSB{}", uart_id - 1) };
				match Uart::with_path(&path, 9600, Parity::None, 8, 1) {
					Ok(mut uart) => {
						if let Err(err) = uart.set_read_mode(0, Duration::from_millis(200)) {
							tracing::error!("failed to set read mode on uart {uart_id}: {err}");
						}
						self.uarts.insert(uart_id, uart);
					}
					Err(err) => {
						tracing::error!("failed to open uart {uart_id} at {path}: {err}");
						return None;
					}
				}
			}
			self.uarts.get_mut(&uart_id)
		}

		/// Toggles `pin` carrier-modulated at `frequency_hz` for `pulses_us[0]`,
		/// idle for `pulses_us[1]`, alternating, `repeat` times with
		/// `inter_repeat_pause_ms` between repeats. Busy-wait timed, since
		/// this driver has no interrupts-disabled critical section to run
		/// the toggling in; precision is best-effort.
		fn transmit_pulse_train(&mut self, pin: ExtendedPin, inverted: bool, pulses_us: &[u16], frequency_hz: u32, repeat: u8, inter_repeat_pause_ms: u32) {
			let half_carrier = if frequency_hz > 0 { Duration::from_secs_f64(1.0 / (2.0 * frequency_hz as f64)) } else { Duration::ZERO };
			let (mark_level, space_level) = (!inverted, inverted);
			let Some(output) = self.output_pin(pin) else { return };
			for _ in 0..repeat.max(1) {
				for (i, &pulse_us) in pulses_us.iter().enumerate() {
					let mark = i % 2 == 0;
					let pulse = Duration::from_micros(pulse_us as u64);
					let deadline = Instant::now() + pulse;
					if mark && frequency_hz > 0 {
						while Instant::now() < deadline {
							if mark_level {
								output.set_high();
							} else {
								output.set_low();
							}
							spin_wait(half_carrier);
							if space_level {
								output.set_high();
							} else {
								output.set_low();
							}
							spin_wait(half_carrier);
						}
					} else {
						if (mark && mark_level) || (!mark && space_level) {
							output.set_high();
						} else {
							output.set_low();
						}
						spin_wait(pulse);
					}
				}
				output.set_low();
				spin_wait(Duration::from_millis(inter_repeat_pause_ms as u64));
			}
		}
	}

	impl GpioDriver for RppalGpio {
		fn write(&mut self, pin: ExtendedPin, high: bool) {
			if let Some(output) = self.output_pin(pin) {
				if high {
					output.set_high();
				} else {
					output.set_low();
				}
			}
		}

		fn read(&mut self, pin: ExtendedPin) -> bool {
			match self.input_pin(pin) {
				Some(input) => input.read() == Level::High,
				None => false,
			}
		}

		fn set_pwm_duty(&mut self, pin: ExtendedPin, duty: u16, freq_hz: Option<u32>) {
			let freq = freq_hz.unwrap_or(1000).max(1) as f64;
			let period = Duration::from_secs_f64(1.0 / freq);
			let pulse_width = period.mul_f64(duty as f64 / u16::MAX as f64);
			if let Some(output) = self.output_pin(pin) {
				if let Err(err) = output.set_pwm(period, pulse_width) {
					tracing::error!("failed to set software pwm on pin {}: {err}", pin.pin);
				}
			}
		}

		/// The Raspberry Pi has no onboard ADC (spec.md §6.1's acquisition
		/// hardware is an out-of-scope collaborator); this driver logs once
		/// and reads as 0, the same documented-limitation pattern as the
		/// MCP23017-bank gap above.
		fn read_adc(&mut self, pin: ExtendedPin) -> u16 {
			if !self.warned_adc {
				self.warned_adc = true;
				tracing::warn!("no onboard ADC on this platform; read_adc({}, {}) returning 0", pin.bank, pin.pin);
			}
			0
		}

		fn i2c_transaction(&mut self, bus: u8, address: u8, write: &[u8], read_len: usize) -> Result<Vec<u8>, String> {
			let Some(i2c) = self.i2c_bus(bus) else { return Err(format!("i2c bus {bus} unavailable")) };
			i2c.set_slave_address(address as u16).map_err(|e| e.to_string())?;
			let mut response = vec![0u8; read_len];
			if write.is_empty() && read_len > 0 {
				i2c.read(&mut response).map_err(|e| e.to_string())?;
			} else if read_len == 0 {
				i2c.write(write).map_err(|e| e.to_string())?;
			} else {
				i2c.write_read(write, &mut response).map_err(|e| e.to_string())?;
			}
			Ok(response)
		}

		fn uart_transfer(&mut self, uart_id: u8, bytes: &[u8]) -> Result<Vec<u8>, String> {
			let Some(uart) = self.uart(uart_id) else { return Err(format!("uart {uart_id} unavailable")) };
			uart.write(bytes).map_err(|e| e.to_string())?;
			let mut response = vec![0u8; 256];
			let read = uart.read(&mut response).map_err(|e| e.to_string())?;
			response.truncate(read);
			Ok(response)
		}

		fn transmit_nrz(&mut self, pin: ExtendedPin, bytes: &[u8]) {
			// WS2812-class timing; best-effort busy-wait, not interrupt-disabled.
			const T0H: Duration = Duration::from_nanos(350);
			const T0L: Duration = Duration::from_nanos(800);
			const T1H: Duration = Duration::from_nanos(700);
			const T1L: Duration = Duration::from_nanos(600);
			let Some(output) = self.output_pin(pin) else { return };
			for &byte in bytes {
				for i in (0..8).rev() {
					let bit_set = (byte >> i) & 1 == 1;
					let (high, low) = if bit_set { (T1H, T1L) } else { (T0H, T0L) };
					output.set_high();
					spin_wait(high);
					output.set_low();
					spin_wait(low);
				}
			}
		}

		fn transmit_ir(&mut self, pulses_us: &[u16], frequency_hz: u32, repeat: u8, inter_repeat_pause_ms: u32) {
			// frequency_hz > 0 is a carrier-modulated IR code; frequency_hz
			// == 0 is an uncarried OOK RF code. Neither the trait nor
			// `IrRfTask` name a pin, so the choice of physical pin follows
			// from which board-level TX line matches that encoding.
			let (pin, inverted) = if frequency_hz > 0 {
				(self.ir_tx_pin, self.ir_tx_inverted)
			} else {
				(self.rf_tx_pin, self.rf_tx_inverted)
			};
			let Some(pin) = pin else {
				tracing::warn!("transmit_ir called with no matching TX pin configured");
				return;
			};
			self.transmit_pulse_train(pin, inverted, pulses_us, frequency_hz, repeat, inter_repeat_pause_ms);
		}
	}
}

#[cfg(feature = "gpio-driver")]
pub use rppal_driver::RppalGpio;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extended_pin_round_trips_bank_and_pin() {
		let p = ExtendedPin::decode(204);
		assert_eq!(p.bank, 2);
		assert_eq!(p.pin, 4);
		assert_eq!(p.encode(), 204);
		assert!(!p.is_onboard());
	}

	#[test]
	fn onboard_pins_use_bank_zero() {
		let p = ExtendedPin::decode(17);
		assert!(p.is_onboard());
		assert_eq!(p.pin, 17);
	}

	#[test]
	fn memory_gpio_records_writes_and_duty() {
		let mut gpio = MemoryGpio::new();
		let pin = ExtendedPin { bank: 0, pin: 5 };
		gpio.write(pin, true);
		assert!(gpio.read(pin));
		gpio.set_pwm_duty(pin, 4096, Some(1000));
		assert_eq!(gpio.duty_of(pin), Some((4096, Some(1000))));
	}
}
