use std::ffi::OsString;

use tracing::{debug, warn};

/// Process arguments converted to the runtime's text representation.
///
/// Arguments that are not valid Unicode are converted lossily. The buffers
/// live for the whole bootstrap and are released when this is dropped,
/// whatever the outcome of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeArgs {
    args: Vec<String>,
}

impl RuntimeArgs {
    pub fn convert<I>(raw: I) -> Self
    where
        I: IntoIterator<Item = OsString>,
    {
        let args = raw
            .into_iter()
            .enumerate()
            .map(|(index, arg)| match arg.into_string() {
                Ok(arg) => arg,
                Err(arg) => {
                    let lossy = arg.to_string_lossy().into_owned();
                    warn!(index, arg = %lossy, "argument is not valid unicode");
                    lossy
                }
            })
            .collect::<Vec<_>>();
        debug!(count = args.len(), "arguments converted");
        Self { args }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.args.clone()
    }
}

impl Drop for RuntimeArgs {
    fn drop(&mut self) {
        debug!(count = self.args.len(), "argument buffers released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert() {
        let args = RuntimeArgs::convert(["driver", "--steps", "4"].map(OsString::from));
        assert_eq!(args.as_slice(), ["driver", "--steps", "4"]);
        assert_eq!(args.len(), 3);
        assert!(RuntimeArgs::convert(Vec::new()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_invalid_unicode_is_lossy() {
        use std::os::unix::ffi::OsStringExt;
        let raw = OsString::from_vec(vec![b'a', 0xff, b'b']);
        let args = RuntimeArgs::convert(vec![raw]);
        assert_eq!(args.as_slice(), ["a\u{fffd}b"]);
    }
}
