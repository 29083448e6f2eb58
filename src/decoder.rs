use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin, PinState},
};

use crate::bus::BusTimingReader;
use crate::config::Config;
use crate::error::{BusError, Phase};
use crate::frame::RawFrame;

/// Number of data bits in one frame.
const FRAME_BITS: u8 = 40;

/// Runs a closure with task preemption and interrupts held off.
///
/// Implementations must restore the previous state when the closure returns,
/// whatever it returns.
pub trait Uninterruptible {
    fn run<R>(&mut self, f: impl FnOnce() -> R) -> R;
}

/// [`Uninterruptible`] backed by the `critical-section` implementation the
/// platform provides.
#[derive(Clone, Copy, Debug, Default)]
pub struct CriticalSection;

impl Uninterruptible for CriticalSection {
    fn run<R>(&mut self, f: impl FnOnce() -> R) -> R {
        critical_section::with(|_cs| f())
    }
}

/// Reads raw frames from a DHT22 on an open-drain data line.
///
/// The pin must idle high through a pull-up. Driving it low pulls the line
/// down, driving it high releases the line to the sensor.
pub struct FrameDecoder<PIN, D, S = CriticalSection> {
    pin: PIN,
    delay: D,
    section: S,
    config: Config,
}

impl<PIN, D, E> FrameDecoder<PIN, D>
where
    PIN: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayNs,
{
    /// Creates a decoder that masks interrupts through `critical-section`.
    ///
    /// # Arguments
    ///
    /// * `pin` - The GPIO pin connected to the DHT22 data line. Must support both input and output.
    /// * `delay` - A delay provider with microsecond resolution.
    /// * `config` - Bus timing.
    pub fn new(pin: PIN, delay: D, config: Config) -> Self {
        Self::with_section(pin, delay, CriticalSection, config)
    }
}

impl<PIN, D, S, E> FrameDecoder<PIN, D, S>
where
    PIN: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayNs,
    S: Uninterruptible,
{
    /// Creates a decoder with a custom uninterruptible section.
    pub fn with_section(pin: PIN, delay: D, section: S, config: Config) -> Self {
        Self {
            pin,
            delay,
            section,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Releases the line so the pull-up holds it high while idle.
    pub fn release(&mut self) -> Result<(), E> {
        self.pin.set_high()
    }

    /// Performs one complete bus transaction.
    ///
    /// Sends the start pulse, waits through the handshake and samples
    /// 40 bits, all without being interrupted. Nothing is returned unless
    /// every bit arrived.
    ///
    /// # Errors
    ///
    /// * [`BusError::Timeout`] with the phase whose wait ran out
    /// * [`BusError::Pin`] if the GPIO driver failed
    pub fn decode(&mut self) -> Result<RawFrame, BusError<E>> {
        let Self {
            pin,
            delay,
            section,
            config,
        } = self;
        section.run(|| Self::transaction(pin, delay, config))
    }

    fn transaction(pin: &mut PIN, delay: &mut D, config: &Config) -> Result<RawFrame, BusError<E>> {
        // MCU sends start request
        pin.set_low()?;
        delay.delay_us(config.start_pulse_us);
        pin.set_high()?;
        delay.delay_us(config.settle_us);

        let timeout = config.phase_timeout_us;
        let mut bus = BusTimingReader::new(pin, delay, config.poll_step_us);

        // Sensor acknowledges: low, high, then low again before the first bit
        for (n, level) in [PinState::Low, PinState::High, PinState::Low]
            .into_iter()
            .enumerate()
        {
            bus.await_level(timeout, level)
                .map_err(|e| e.at(Phase::Handshake(n as u8)))?;
        }

        let mut data = [0u8; 5];
        for i in 0..FRAME_BITS {
            let phase = Phase::Bit(i);
            bus.await_level(timeout, PinState::High)
                .map_err(|e| e.at(phase))?;
            let high_us = bus
                .await_level(timeout, PinState::Low)
                .map_err(|e| e.at(phase))?;

            if high_us > config.bit_threshold_us {
                data[usize::from(i / 8)] |= 1 << (7 - i % 8);
            }
        }

        Ok(RawFrame(data))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::cell::Cell;
    use embedded_hal_mock::eh1::MockError;
    use embedded_hal_mock::eh1::delay::CheckedDelay;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::delay::Transaction as DelayTx;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as MockState, Transaction as PinTx,
    };
    use std::io::ErrorKind;
    use std::rc::Rc;

    /// Bus timing used by the mocked transactions: short timeouts keep the
    /// transaction lists small.
    pub(crate) const TEST_CONFIG: Config = Config {
        phase_timeout_us: 100,
        ..Config::DEFAULT
    };

    /// High time of a `0` bit, in polls.
    const ZERO_HIGH_US: usize = 26;
    /// High time of a `1` bit, in polls.
    const ONE_HIGH_US: usize = 70;

    pub(crate) fn start_sequence() -> Vec<PinTx> {
        vec![
            // MCU pulls the line low, then releases it
            PinTx::set(MockState::Low),
            PinTx::set(MockState::High),
        ]
    }

    pub(crate) fn handshake() -> Vec<PinTx> {
        vec![
            PinTx::get(MockState::Low),
            PinTx::get(MockState::High),
            PinTx::get(MockState::Low),
        ]
    }

    // Helper to encode one bit as a rising edge and a high pulse
    fn encode_bit(high_us: usize) -> Vec<PinTx> {
        let mut tx = vec![PinTx::get(MockState::High)]; // rising edge
        tx.extend(std::iter::repeat_n(PinTx::get(MockState::High), high_us));
        tx.push(PinTx::get(MockState::Low)); // falling edge
        tx
    }

    // Helper to encode one byte into 8 bits (MSB first)
    pub(crate) fn encode_byte(byte: u8) -> Vec<PinTx> {
        (0..8)
            .flat_map(|i| {
                let bit = (byte >> (7 - i)) & 1 == 1;
                encode_bit(if bit { ONE_HIGH_US } else { ZERO_HIGH_US })
            })
            .collect()
    }

    /// Pin transactions of one complete, successful bus transaction.
    pub(crate) fn frame_sequence(bytes: [u8; 5]) -> Vec<PinTx> {
        let mut tx = start_sequence();
        tx.extend(handshake());
        for byte in bytes {
            tx.extend(encode_byte(byte));
        }
        tx
    }

    /// Pin transactions of a transaction where the sensor never answers.
    pub(crate) fn silent_sequence(config: &Config) -> Vec<PinTx> {
        let mut tx = start_sequence();
        tx.extend(std::iter::repeat_n(
            PinTx::get(MockState::High),
            config.phase_timeout_us as usize,
        ));
        tx
    }

    /// Counts entries into and exits from the uninterruptible section.
    #[derive(Clone, Default)]
    struct CountingSection {
        entered: Rc<Cell<u32>>,
        exited: Rc<Cell<u32>>,
    }

    impl Uninterruptible for CountingSection {
        fn run<R>(&mut self, f: impl FnOnce() -> R) -> R {
            self.entered.set(self.entered.get() + 1);
            let r = f();
            self.exited.set(self.exited.get() + 1);
            r
        }
    }

    #[test]
    fn test_start_sequence() {
        let mut expect = start_sequence();
        expect.extend(handshake());
        // Line stays low after the handshake: first bit never starts
        expect.extend(std::iter::repeat_n(PinTx::get(MockState::Low), 100));

        let mut pin = PinMock::new(&expect);

        let mut delay_transactions = vec![DelayTx::delay_us(1100), DelayTx::delay_us(30)];
        delay_transactions.extend(std::iter::repeat_n(DelayTx::delay_us(1), 100));
        let mut delay = CheckedDelay::new(&delay_transactions);

        let mut dht = FrameDecoder::new(pin.clone(), &mut delay, TEST_CONFIG);
        assert_eq!(
            dht.decode().unwrap_err(),
            BusError::Timeout {
                phase: Phase::Bit(0)
            }
        );

        pin.done();
        delay.done();
    }

    #[test]
    fn test_decode_valid() {
        let bytes = [0x02, 0x10, 0x81, 0x04, 0x97];
        let mut pin = PinMock::new(&frame_sequence(bytes));

        let mut dht = FrameDecoder::new(pin.clone(), NoopDelay, TEST_CONFIG);
        let frame = dht.decode().unwrap();

        assert_eq!(frame, RawFrame(bytes));
        pin.done();
    }

    #[test]
    fn test_decode_bad_checksum_still_returns_frame() {
        let bytes = [0x01, 0x90, 0x00, 0xF6, 0x81];
        let mut pin = PinMock::new(&frame_sequence(bytes));

        let mut dht = FrameDecoder::new(pin.clone(), NoopDelay, TEST_CONFIG);

        assert_eq!(dht.decode(), Ok(RawFrame(bytes)));
        pin.done();
    }

    #[test]
    fn test_bit_threshold() {
        // 40us is still a zero, 41us is a one
        let mut expect = start_sequence();
        expect.extend(handshake());
        expect.extend(encode_bit(40));
        expect.extend(encode_bit(41));
        for _ in 2..40 {
            expect.extend(encode_bit(ZERO_HIGH_US));
        }
        let mut pin = PinMock::new(&expect);

        let mut dht = FrameDecoder::new(pin.clone(), NoopDelay, TEST_CONFIG);

        assert_eq!(dht.decode(), Ok(RawFrame([0b0100_0000, 0, 0, 0, 0])));
        pin.done();
    }

    #[test]
    fn test_handshake_timeouts() {
        for phase in 0..3usize {
            let mut expect = start_sequence();
            expect.extend(handshake().into_iter().take(phase));
            // The level the sensor should have switched away from
            let stuck = if phase == 1 {
                MockState::Low
            } else {
                MockState::High
            };
            expect.extend(std::iter::repeat_n(PinTx::get(stuck), 100));
            let mut pin = PinMock::new(&expect);

            let mut dht = FrameDecoder::new(pin.clone(), NoopDelay, TEST_CONFIG);

            assert_eq!(
                dht.decode(),
                Err(BusError::Timeout {
                    phase: Phase::Handshake(phase as u8)
                })
            );
            pin.done();
        }
    }

    #[test]
    fn test_bit_timeout_reports_index() {
        let mut expect = start_sequence();
        expect.extend(handshake());
        expect.extend(encode_byte(0xAB));
        expect.extend(encode_byte(0xCD));
        // Bit 16 starts but the line never falls again
        expect.push(PinTx::get(MockState::High));
        expect.extend(std::iter::repeat_n(PinTx::get(MockState::High), 100));
        let mut pin = PinMock::new(&expect);

        let mut dht = FrameDecoder::new(pin.clone(), NoopDelay, TEST_CONFIG);

        assert_eq!(
            dht.decode(),
            Err(BusError::Timeout {
                phase: Phase::Bit(16)
            })
        );
        pin.done();
    }

    #[test]
    fn test_section_exited_on_every_path() {
        let section = CountingSection::default();

        // Timeout path
        let mut pin = PinMock::new(&silent_sequence(&TEST_CONFIG));
        let mut dht =
            FrameDecoder::with_section(pin.clone(), NoopDelay, section.clone(), TEST_CONFIG);
        assert!(dht.decode().is_err());
        pin.done();
        assert_eq!(section.entered.get(), 1);
        assert_eq!(section.exited.get(), 1);

        // Success path
        let mut pin = PinMock::new(&frame_sequence([0; 5]));
        let mut dht =
            FrameDecoder::with_section(pin.clone(), NoopDelay, section.clone(), TEST_CONFIG);
        assert!(dht.decode().is_ok());
        pin.done();
        assert_eq!(section.entered.get(), 2);
        assert_eq!(section.exited.get(), 2);
    }

    #[test]
    fn test_pin_error_exits_section() {
        let section = CountingSection::default();
        let mut pin = PinMock::new(&[
            PinTx::set(MockState::Low).with_error(MockError::Io(ErrorKind::Other)),
        ]);

        let mut dht =
            FrameDecoder::with_section(pin.clone(), NoopDelay, section.clone(), TEST_CONFIG);

        assert!(matches!(
            dht.decode(),
            Err(BusError::Pin(MockError::Io(ErrorKind::Other)))
        ));
        assert_eq!(section.entered.get(), 1);
        assert_eq!(section.exited.get(), 1);
        pin.done();
    }

    #[test]
    fn test_pin_error_while_sampling() {
        let section = CountingSection::default();
        let mut expect = start_sequence();
        expect.extend(handshake());
        expect.push(PinTx::get(MockState::High).with_error(MockError::Io(ErrorKind::Other)));
        let mut pin = PinMock::new(&expect);

        let mut dht =
            FrameDecoder::with_section(pin.clone(), NoopDelay, section.clone(), TEST_CONFIG);

        assert!(matches!(dht.decode(), Err(BusError::Pin(_))));
        assert_eq!(section.exited.get(), section.entered.get());
        pin.done();
    }

    #[test]
    fn test_release() {
        let mut pin = PinMock::new(&[PinTx::set(MockState::High)]);

        let mut dht = FrameDecoder::new(pin.clone(), NoopDelay, Config::DEFAULT);
        dht.release().unwrap();

        assert_eq!(dht.config(), &Config::DEFAULT);
        pin.done();
    }
}
