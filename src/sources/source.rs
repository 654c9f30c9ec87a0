//! Signal source trait and sample reading

use std::path::PathBuf;

/// Errors raised while reading the converter
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("analog input {0} is not available on this source")]
    UnknownInput(u8),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unparseable converter value {value:?} from {path}")]
    Parse { path: PathBuf, value: String },
}

/// One converter reading, discarded once mapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleReading {
    /// Analog input the code was read from
    pub input: u8,
    /// Device-native raw code
    pub raw: u16,
}

/// A shared converter multiplexed across analog inputs
///
/// Sampling selects the input and performs one conversion. Selection is a
/// side effect on the shared converter, so a caller reads one input at a time.
pub trait SignalSource {
    /// Human-readable name of the backend
    fn name(&self) -> &str;

    /// Full-scale raw code
    fn max_code(&self) -> u16;

    /// Select `input` and convert once
    fn sample(&mut self, input: u8) -> Result<u16, SourceError>;

    /// Sample into a reading
    fn read(&mut self, input: u8) -> Result<SampleReading, SourceError> {
        let raw = self.sample(input)?;
        Ok(SampleReading { input, raw })
    }
}

impl<S: SignalSource + ?Sized> SignalSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn max_code(&self) -> u16 {
        (**self).max_code()
    }

    fn sample(&mut self, input: u8) -> Result<u16, SourceError> {
        (**self).sample(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u16);

    impl SignalSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn max_code(&self) -> u16 {
            4095
        }

        fn sample(&mut self, input: u8) -> Result<u16, SourceError> {
            if input > 2 {
                return Err(SourceError::UnknownInput(input));
            }
            Ok(self.0)
        }
    }

    #[test]
    fn test_read_wraps_sample() {
        let mut source = Fixed(1234);
        let reading = source.read(1).unwrap();
        assert_eq!(reading, SampleReading { input: 1, raw: 1234 });
    }

    #[test]
    fn test_boxed_source_delegates() {
        let mut source: Box<dyn SignalSource> = Box::new(Fixed(7));
        assert_eq!(source.name(), "fixed");
        assert_eq!(source.max_code(), 4095);
        assert!(matches!(source.sample(5), Err(SourceError::UnknownInput(5))));
    }
}
