// actuator.rs

use std::{convert::Infallible, fmt::Debug};

use anyhow::anyhow;
use embedded_hal::digital::{ErrorType, OutputPin};
use log::*;

/// Anything that can switch the cooler. High output means cooling.
pub trait CoolerOutput {
    fn set_cooler(&mut self, on: bool) -> anyhow::Result<()>;
}

impl<P> CoolerOutput for P
where
    P: OutputPin,
    P::Error: Debug,
{
    fn set_cooler(&mut self, on: bool) -> anyhow::Result<()> {
        let res = if on { self.set_high() } else { self.set_low() };
        res.map_err(|e| anyhow!("Cooler pin write failed: {e:?}"))
    }
}

/// Stand-in output for the host simulator.
#[derive(Debug, Default)]
pub struct SimulatedCooler;

impl ErrorType for SimulatedCooler {
    type Error = Infallible;
}

impl OutputPin for SimulatedCooler {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        info!("Cooler output LOW");
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        info!("Cooler output HIGH");
        Ok(())
    }
}

// EOF
