//! DS3231 real-time clock driver.

use crate::error::Result;
use crate::hal::{lock_bus, SharedBus, TimeSource};
use chrono::{Datelike, Local, NaiveDateTime, Timelike};

pub const I2C_ADDR: u8 = 0x68;

// Time registers, seconds first
const SECOND: u8 = 0x00;
const MINUTE: u8 = 0x01;
const HOUR: u8 = 0x02;
const DAY: u8 = 0x03;
const DATE: u8 = 0x04;
const MONTH: u8 = 0x05;
const YEAR: u8 = 0x06;

const CONTROL: u8 = 0x0E;
// Control value enabling the 8.192kHz square-wave output
const SQUARE_WAVE_8KHZ: u8 = 0x18;

// The month register carries the century flag in its MSB
const CENTURY_BIT: u8 = 0x80;

pub(crate) fn bcd_to_dec(bcd: u8) -> u8 {
    ((bcd & 0x70) >> 4) * 10 + (bcd & 0x0F)
}

pub(crate) fn dec_to_bcd(dec: u8) -> u8 {
    let (tens, units) = (dec / 10, dec % 10);
    (tens << 4) + units
}

pub struct Ds3231 {
    bus: SharedBus,
    address: u8,
}

impl Ds3231 {
    pub fn new(bus: SharedBus, address: u8) -> Result<Self> {
        let rtc = Self { bus, address };
        lock_bus(&rtc.bus)?.write_register(rtc.address, CONTROL, SQUARE_WAVE_8KHZ)?;
        Ok(rtc)
    }

    /// Current time formatted `YYYY-MM-DD HH:MM:SS`.
    pub fn now(&mut self) -> Result<String> {
        let mut data = [0u8; 7];
        lock_bus(&self.bus)?.read_block(self.address, SECOND, &mut data)?;

        let second = bcd_to_dec(data[0]);
        let minute = bcd_to_dec(data[1]);
        let hour = bcd_to_dec(data[2]);
        // data[3] is the weekday, unused in the formatted output
        let date = bcd_to_dec(data[4]);
        let month = bcd_to_dec(data[5] & !CENTURY_BIT);
        let year = bcd_to_dec(data[6]) as u16 + 2000;

        Ok(format!(
            "{year:04}-{month:02}-{date:02} {hour:02}:{minute:02}:{second:02}"
        ))
    }

    /// Set the clock to an explicit time, or to the system clock when `None`.
    pub fn set_time(&mut self, time: Option<NaiveDateTime>) -> Result<()> {
        let t = time.unwrap_or_else(|| Local::now().naive_local());

        let mut bus = lock_bus(&self.bus)?;
        bus.write_register(self.address, SECOND, dec_to_bcd(t.second() as u8))?;
        bus.write_register(self.address, MINUTE, dec_to_bcd(t.minute() as u8))?;
        bus.write_register(self.address, HOUR, dec_to_bcd(t.hour() as u8))?;
        bus.write_register(
            self.address,
            DAY,
            dec_to_bcd(t.weekday().number_from_monday() as u8),
        )?;
        bus.write_register(self.address, DATE, dec_to_bcd(t.day() as u8))?;
        bus.write_register(
            self.address,
            MONTH,
            dec_to_bcd(t.month() as u8) | CENTURY_BIT,
        )?;
        bus.write_register(self.address, YEAR, dec_to_bcd((t.year() % 100) as u8))?;
        Ok(())
    }
}

impl TimeSource for Ds3231 {
    fn now(&mut self) -> Result<String> {
        Ds3231::now(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bcd_round_trip() {
        for value in 0..=59u8 {
            assert_eq!(bcd_to_dec(dec_to_bcd(value)), value);
        }
    }

    #[test]
    fn test_bcd_encoding() {
        assert_eq!(dec_to_bcd(0), 0x00);
        assert_eq!(dec_to_bcd(9), 0x09);
        assert_eq!(dec_to_bcd(10), 0x10);
        assert_eq!(dec_to_bcd(59), 0x59);
        assert_eq!(bcd_to_dec(0x47), 47);
    }

    use crate::hal::{shared_bus, I2cBus};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MapBus {
        registers: Arc<Mutex<HashMap<u8, u8>>>,
    }

    impl I2cBus for MapBus {
        fn write_register(&mut self, _addr: u8, reg: u8, value: u8) -> Result<()> {
            self.registers.lock().unwrap().insert(reg, value);
            Ok(())
        }

        fn read_register(&mut self, _addr: u8, reg: u8) -> Result<u8> {
            Ok(*self.registers.lock().unwrap().get(&reg).unwrap_or(&0))
        }

        fn read_block(&mut self, _addr: u8, reg: u8, buf: &mut [u8]) -> Result<()> {
            let registers = self.registers.lock().unwrap();
            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = *registers.get(&(reg + i as u8)).unwrap_or(&0);
            }
            Ok(())
        }
    }

    #[test]
    fn test_set_time_round_trips_through_registers() {
        let registers = Arc::new(Mutex::new(HashMap::new()));
        let bus = shared_bus(MapBus {
            registers: registers.clone(),
        });
        let mut rtc = Ds3231::new(bus, I2C_ADDR).unwrap();

        let t = chrono::NaiveDate::from_ymd_opt(2026, 8, 7)
            .unwrap()
            .and_hms_opt(14, 35, 9)
            .unwrap();
        rtc.set_time(Some(t)).unwrap();

        {
            let regs = registers.lock().unwrap();
            assert_eq!(regs[&SECOND], 0x09);
            assert_eq!(regs[&MINUTE], 0x35);
            assert_eq!(regs[&HOUR], 0x14);
            assert_eq!(regs[&MONTH], 0x08 | CENTURY_BIT);
            assert_eq!(regs[&YEAR], 0x26);
        }

        assert_eq!(rtc.now().unwrap(), "2026-08-07 14:35:09");
    }
}
