use embedded_hal::digital::{ErrorType, InputPin, OutputPin, PinState};

/// The single data line shared by host and sensor.
///
/// The host drives the line during the start request and then hands it to
/// the sensor by switching to input, relying on the external pull-up to hold
/// it high while nobody drives it.
pub trait DigitalLine: ErrorType {
    /// Configures the pin to drive the line.
    fn set_output(&mut self) -> Result<(), Self::Error>;

    /// Stops driving the line so the sensor can pull it low.
    fn set_input(&mut self) -> Result<(), Self::Error>;

    fn set_level(&mut self, level: PinState) -> Result<(), Self::Error>;

    fn is_high(&mut self) -> Result<bool, Self::Error>;

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// [`DigitalLine`] for a pin configured as open-drain output.
///
/// An open-drain pin can be read while it is an output, and driving it high
/// releases the line. Switching to "input" is therefore the same as setting
/// it high, and switching to "output" needs no reconfiguration.
#[derive(Debug)]
pub struct OpenDrain<P> {
    pin: P,
}

impl<P> OpenDrain<P>
where
    P: InputPin + OutputPin,
{
    pub fn new(pin: P) -> Self {
        OpenDrain { pin }
    }

    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: ErrorType> ErrorType for OpenDrain<P> {
    type Error = P::Error;
}

impl<P> DigitalLine for OpenDrain<P>
where
    P: InputPin + OutputPin,
{
    fn set_output(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_input(&mut self) -> Result<(), Self::Error> {
        self.pin.set_high()
    }

    fn set_level(&mut self, level: PinState) -> Result<(), Self::Error> {
        self.pin.set_state(level)
    }

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.pin.is_high()
    }
}
