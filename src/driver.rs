// SPDX-License-Identifier: Apache-2.0

//! Session with the external sampling driver and the measurement bracket
//!
//! The driver samples whatever runs while it is armed. How it samples is its
//! own business; this module only opens the device and flips it on and off
//! around the secure call using the iocuddle crate.

use std::fs::{File, OpenOptions};
use std::hint::black_box;
use std::io::Result;
use std::os::raw::c_void;
use std::path::Path;

use iocuddle::{Ioctl, Write};
use log::{error, trace};

/// `_IO('z', 0x01)`: start sampling (INSTALL_TIMER)
const ARM: Ioctl<Write, c_void> = unsafe { Ioctl::classic(0x7a01) };

/// `_IO('z', 0x02)`: stop sampling (UNINSTALL_TIMER)
const DISARM: Ioctl<Write, c_void> = unsafe { Ioctl::classic(0x7a02) };

/// Something that samples execution while armed
pub trait Monitor {
    /// Start sampling.
    fn arm(&mut self) -> Result<()>;

    /// Stop sampling.
    fn disarm(&mut self) -> Result<()>;
}

/// An open session with the sampling driver
///
/// The session is closed when this is dropped.
#[derive(Debug)]
pub struct Device(File);

impl Device {
    /// Open a session with the driver behind `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;

        Ok(Self(file))
    }
}

impl Monitor for Device {
    fn arm(&mut self) -> Result<()> {
        ARM.ioctl(&mut self.0)?;
        Ok(())
    }

    fn disarm(&mut self) -> Result<()> {
        DISARM.ioctl(&mut self.0)?;
        Ok(())
    }
}

/// An armed monitor
///
/// Disarms the monitor when finished or dropped, whichever comes first, so
/// every successful arm is matched by exactly one disarm.
pub struct Bracket<'a, M: Monitor + ?Sized> {
    monitor: &'a mut M,
    armed: bool,
}

impl<'a, M: Monitor + ?Sized> Bracket<'a, M> {
    /// Arm `monitor`. Nothing needs undoing if this fails.
    pub fn arm(monitor: &'a mut M) -> Result<Self> {
        monitor.arm()?;
        trace!("monitor armed");

        Ok(Self {
            monitor,
            armed: true,
        })
    }

    /// Disarm the monitor, reporting any failure to do so.
    pub fn finish(mut self) -> Result<()> {
        self.armed = false;
        let result = self.monitor.disarm();
        trace!("monitor disarmed");
        result
    }
}

impl<M: Monitor + ?Sized> Drop for Bracket<'_, M> {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            if let Err(e) = self.monitor.disarm() {
                error!("failed to disarm monitor: {}", e);
            }
        }
    }
}

/// Busy wait for `iterations` rounds.
fn settle(iterations: u32) {
    for i in 0..iterations {
        black_box(i);
    }
}

/// Run `f` exactly once with `monitor` armed.
///
/// The armed window is padded with `pad` spin iterations on each side of
/// `f`. The monitor is disarmed whatever `f` returns. A failure to disarm is
/// only logged: the result of `f` is what the caller needs to see.
pub fn measure<M, T>(monitor: &mut M, pad: u32, f: impl FnOnce() -> T) -> Result<T>
where
    M: Monitor + ?Sized,
{
    let bracket = Bracket::arm(monitor)?;

    settle(pad);
    let result = f();
    settle(pad);

    if let Err(e) = bracket.finish() {
        error!("failed to disarm monitor: {}", e);
    }

    Ok(result)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::io::{Error, ErrorKind};
    use std::sync::{Arc, Mutex};

    /// A monitor which records its transitions into a shared journal
    #[derive(Default)]
    pub struct Fake {
        pub journal: Arc<Mutex<Vec<&'static str>>>,
        pub fail_arm: bool,
        pub fail_disarm: bool,
    }

    impl Fake {
        pub fn events(&self) -> Vec<&'static str> {
            self.journal.lock().unwrap().clone()
        }
    }

    impl Monitor for Fake {
        fn arm(&mut self) -> Result<()> {
            if self.fail_arm {
                return Err(Error::new(ErrorKind::Other, "arm"));
            }
            self.journal.lock().unwrap().push("arm");
            Ok(())
        }

        fn disarm(&mut self) -> Result<()> {
            self.journal.lock().unwrap().push("disarm");
            match self.fail_disarm {
                true => Err(Error::new(ErrorKind::Other, "disarm")),
                false => Ok(()),
            }
        }
    }

    #[test]
    fn brackets_the_call() {
        let mut fake = Fake::default();
        let journal = fake.journal.clone();

        let value = measure(&mut fake, 8, || {
            journal.lock().unwrap().push("call");
            5
        })
        .unwrap();

        assert_eq!(value, 5);
        assert_eq!(fake.events(), ["arm", "call", "disarm"]);
    }

    #[test]
    fn disarms_on_failed_call() {
        let mut fake = Fake::default();
        let result: Result<std::result::Result<i64, ()>> =
            measure(&mut fake, 0, || Err(()));

        assert_eq!(result.unwrap(), Err(()));
        assert_eq!(fake.events(), ["arm", "disarm"]);
    }

    #[test]
    fn disarms_on_drop() {
        let mut fake = Fake::default();
        {
            let _bracket = Bracket::arm(&mut fake).unwrap();
        }
        assert_eq!(fake.events(), ["arm", "disarm"]);
    }

    #[test]
    fn disarms_on_panic() {
        let mut fake = Fake::default();
        let journal = fake.journal.clone();

        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            measure(&mut fake, 0, || -> i64 { panic!("secure call blew up") })
        }));

        assert!(caught.is_err());
        assert_eq!(*journal.lock().unwrap(), ["arm", "disarm"]);
    }

    #[test]
    fn failed_arm_skips_call() {
        let mut fake = Fake {
            fail_arm: true,
            ..Default::default()
        };
        let mut called = false;

        assert!(measure(&mut fake, 0, || called = true).is_err());
        assert!(!called);
        assert!(fake.events().is_empty());
    }

    #[test]
    fn failed_disarm_keeps_result() {
        let mut fake = Fake {
            fail_disarm: true,
            ..Default::default()
        };

        assert_eq!(measure(&mut fake, 0, || 9).unwrap(), 9);
        assert_eq!(fake.events(), ["arm", "disarm"]);
    }

    #[test]
    fn finish_disarms_once() {
        let mut fake = Fake::default();
        Bracket::arm(&mut fake).unwrap().finish().unwrap();
        assert_eq!(fake.events(), ["arm", "disarm"]);
    }

    #[test]
    fn open_missing_device() {
        let dir = tempfile::tempdir().unwrap();
        let err = Device::open(dir.path().join("cachezoom")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
