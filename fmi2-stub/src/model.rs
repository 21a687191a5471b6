//! The stub model: variables, stepping and state serialization, independent of the C ABI.

use fmi2_sys::fmi2::fmi2ValueReference;

/// Header of a serialized FMU state.
const STATE_MAGIC: &[u8; 4] = b"STB2";
const STATE_VERSION: u32 = 2;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ModelError {
    #[error("Unknown {kind} value reference {vr}")]
    UnknownReference {
        kind: &'static str,
        vr: fmi2ValueReference,
    },
    #[error("{kind} variable {vr} is read-only")]
    ReadOnly {
        kind: &'static str,
        vr: fmi2ValueReference,
    },
    #[error("Unsupported derivative order {0}")]
    DerivativeOrder(i32),
    #[error("Serialized state is truncated")]
    Truncated,
    #[error("Serialized state has an invalid header")]
    BadHeader,
    #[error("Serialized state version {0} is not supported")]
    Version(u32),
    #[error("Serialized state contains invalid UTF-8")]
    Utf8,
}

/// All variables of the model; this is what an FMU state captures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    pub a: f64,
    pub b: f64,
    pub integral: f64,
    pub time: f64,
    pub max_step: f64,
    pub int_a: i32,
    pub int_b: i32,
    pub pending_polls: i32,
    pub steps: i32,
    pub bool_a: bool,
    pub bool_b: bool,
    pub fail_next_step: bool,
    pub warn: bool,
    pub str_a: String,
    pub str_b: String,
    pub terminated: bool,
    pub last_successful_time: f64,
}

/// Outcome of [`Values::check_step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepCheck {
    Proceed,
    /// The step exceeds `max_step`
    TooLarge,
    /// The step passes the stop time; the model was advanced up to it
    StopTimeReached,
    Fatal,
}

impl Values {
    pub fn get_real(&self, vr: fmi2ValueReference) -> Result<f64, ModelError> {
        match vr {
            0 => Ok(self.a),
            1 => Ok(self.b),
            2 => Ok(self.a + self.b),
            3 => Ok(self.integral),
            4 => Ok(self.time),
            5 => Ok(self.max_step),
            _ => Err(ModelError::UnknownReference { kind: "Real", vr }),
        }
    }

    pub fn set_real(&mut self, vr: fmi2ValueReference, value: f64) -> Result<(), ModelError> {
        match vr {
            0 => self.a = value,
            1 => self.b = value,
            5 => self.max_step = value,
            2..=4 => return Err(ModelError::ReadOnly { kind: "Real", vr }),
            _ => return Err(ModelError::UnknownReference { kind: "Real", vr }),
        }
        Ok(())
    }

    pub fn get_integer(&self, vr: fmi2ValueReference) -> Result<i32, ModelError> {
        match vr {
            3 => Ok(self.int_a),
            4 => Ok(self.int_b),
            5 => Ok(self.int_a.wrapping_add(self.int_b)),
            6 => Ok(self.pending_polls),
            7 => Ok(self.steps),
            _ => Err(ModelError::UnknownReference {
                kind: "Integer",
                vr,
            }),
        }
    }

    pub fn set_integer(&mut self, vr: fmi2ValueReference, value: i32) -> Result<(), ModelError> {
        match vr {
            3 => self.int_a = value,
            4 => self.int_b = value,
            6 => self.pending_polls = value,
            5 | 7 => return Err(ModelError::ReadOnly { kind: "Integer", vr }),
            _ => {
                return Err(ModelError::UnknownReference {
                    kind: "Integer",
                    vr,
                })
            }
        }
        Ok(())
    }

    pub fn get_boolean(&self, vr: fmi2ValueReference) -> Result<bool, ModelError> {
        match vr {
            6 => Ok(self.bool_a),
            7 => Ok(self.bool_b),
            8 => Ok(self.bool_a || self.bool_b),
            9 => Ok(self.fail_next_step),
            10 => Ok(self.warn),
            _ => Err(ModelError::UnknownReference {
                kind: "Boolean",
                vr,
            }),
        }
    }

    pub fn set_boolean(&mut self, vr: fmi2ValueReference, value: bool) -> Result<(), ModelError> {
        match vr {
            6 => self.bool_a = value,
            7 => self.bool_b = value,
            9 => self.fail_next_step = value,
            10 => self.warn = value,
            8 => return Err(ModelError::ReadOnly { kind: "Boolean", vr }),
            _ => {
                return Err(ModelError::UnknownReference {
                    kind: "Boolean",
                    vr,
                })
            }
        }
        Ok(())
    }

    pub fn get_string(&self, vr: fmi2ValueReference) -> Result<String, ModelError> {
        match vr {
            9 => Ok(self.str_a.clone()),
            10 => Ok(self.str_b.clone()),
            11 => Ok(format!("{}{}", self.str_a, self.str_b)),
            _ => Err(ModelError::UnknownReference { kind: "String", vr }),
        }
    }

    pub fn set_string(&mut self, vr: fmi2ValueReference, value: &str) -> Result<(), ModelError> {
        match vr {
            9 => self.str_a = value.to_owned(),
            10 => self.str_b = value.to_owned(),
            11 => return Err(ModelError::ReadOnly { kind: "String", vr }),
            _ => return Err(ModelError::UnknownReference { kind: "String", vr }),
        }
        Ok(())
    }

    /// Partial derivative of the Real output `unknown` with respect to the Real input `known`.
    pub fn partial_derivative(
        &self,
        unknown: fmi2ValueReference,
        known: fmi2ValueReference,
    ) -> Result<f64, ModelError> {
        if unknown != 2 {
            return Err(ModelError::UnknownReference {
                kind: "output",
                vr: unknown,
            });
        }
        match known {
            0 | 1 => Ok(1.0),
            _ => Err(ModelError::UnknownReference {
                kind: "input",
                vr: known,
            }),
        }
    }

    /// Decide whether a step of size `h` starting at `t` can be computed.
    pub fn check_step(&mut self, t: f64, h: f64, stop_time: Option<f64>) -> StepCheck {
        if self.fail_next_step {
            return StepCheck::Fatal;
        }
        if self.max_step > 0.0 && h > self.max_step {
            return StepCheck::TooLarge;
        }
        if let Some(stop) = stop_time {
            if t + h > stop + 1e-9 * stop.abs().max(1.0) {
                if stop > t {
                    self.advance(t, stop - t);
                }
                self.terminated = true;
                return StepCheck::StopTimeReached;
            }
        }
        StepCheck::Proceed
    }

    /// Integrate `a + b` over `[t, t + h]`.
    pub fn advance(&mut self, t: f64, h: f64) {
        self.integral += (self.a + self.b) * h;
        self.time = t + h;
        self.steps = self.steps.wrapping_add(1);
        self.last_successful_time = self.time;
    }

    /// Little-endian encoding, prefixed with [`STATE_MAGIC`] and a version.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        out.extend_from_slice(STATE_MAGIC);
        out.extend_from_slice(&STATE_VERSION.to_le_bytes());
        for real in [
            self.a,
            self.b,
            self.integral,
            self.time,
            self.max_step,
            self.last_successful_time,
        ] {
            out.extend_from_slice(&real.to_le_bytes());
        }
        for int in [self.int_a, self.int_b, self.pending_polls, self.steps] {
            out.extend_from_slice(&int.to_le_bytes());
        }
        for flag in [
            self.bool_a,
            self.bool_b,
            self.fail_next_step,
            self.warn,
            self.terminated,
        ] {
            out.push(flag as u8);
        }
        for string in [&self.str_a, &self.str_b] {
            out.extend_from_slice(&(string.len() as u32).to_le_bytes());
            out.extend_from_slice(string.as_bytes());
        }
        out
    }

    pub fn serialized_size(&self) -> usize {
        4 + 4 + 6 * 8 + 4 * 4 + 5 + 4 + self.str_a.len() + 4 + self.str_b.len()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ModelError> {
        let mut reader = Reader(bytes);
        if reader.take(4)? != STATE_MAGIC {
            return Err(ModelError::BadHeader);
        }
        let version = reader.u32()?;
        if version != STATE_VERSION {
            return Err(ModelError::Version(version));
        }
        let mut values = Values {
            a: reader.f64()?,
            b: reader.f64()?,
            integral: reader.f64()?,
            time: reader.f64()?,
            max_step: reader.f64()?,
            last_successful_time: reader.f64()?,
            int_a: reader.i32()?,
            int_b: reader.i32()?,
            pending_polls: reader.i32()?,
            steps: reader.i32()?,
            ..Default::default()
        };
        values.bool_a = reader.flag()?;
        values.bool_b = reader.flag()?;
        values.fail_next_step = reader.flag()?;
        values.warn = reader.flag()?;
        values.terminated = reader.flag()?;
        values.str_a = reader.string()?;
        values.str_b = reader.string()?;
        Ok(values)
    }
}

struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ModelError> {
        if self.0.len() < n {
            return Err(ModelError::Truncated);
        }
        let (head, tail) = self.0.split_at(n);
        self.0 = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ModelError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, ModelError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, ModelError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64, ModelError> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn flag(&mut self) -> Result<bool, ModelError> {
        Ok(self.take(1)?[0] != 0)
    }

    fn string(&mut self) -> Result<String, ModelError> {
        let len = self.u32()? as usize;
        String::from_utf8(self.take(len)?.to_vec()).map_err(|_| ModelError::Utf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Values {
        Values {
            a: 1.5,
            b: -0.25,
            integral: 3.0,
            time: 0.5,
            int_a: 7,
            int_b: -2,
            steps: 12,
            bool_b: true,
            warn: true,
            str_a: "foo".to_owned(),
            str_b: "bär".to_owned(),
            last_successful_time: 0.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_computed_outputs() {
        let values = sample();
        assert_eq!(values.get_real(2), Ok(1.25));
        assert_eq!(values.get_integer(5), Ok(5));
        assert_eq!(values.get_boolean(8), Ok(true));
        assert_eq!(values.get_string(11), Ok("foobär".to_owned()));
    }

    #[test]
    fn test_read_only_and_unknown() {
        let mut values = Values::default();
        assert_eq!(
            values.set_real(2, 1.0),
            Err(ModelError::ReadOnly { kind: "Real", vr: 2 })
        );
        assert_eq!(
            values.get_integer(42),
            Err(ModelError::UnknownReference {
                kind: "Integer",
                vr: 42
            })
        );
        assert!(values.set_string(11, "x").is_err());
        assert!(values.set_boolean(8, true).is_err());
    }

    #[test]
    fn test_serialized_state() {
        let values = sample();
        let bytes = values.serialize();
        assert_eq!(bytes.len(), values.serialized_size());
        assert_eq!(Values::deserialize(&bytes), Ok(values));

        assert_eq!(
            Values::deserialize(&bytes[..bytes.len() - 1]),
            Err(ModelError::Truncated)
        );
        let mut corrupt = bytes.clone();
        corrupt[0] = b'X';
        assert_eq!(Values::deserialize(&corrupt), Err(ModelError::BadHeader));
        corrupt = bytes;
        corrupt[4] = 9;
        assert_eq!(Values::deserialize(&corrupt), Err(ModelError::Version(9)));
    }

    #[test]
    fn test_step_checks() {
        let mut values = Values {
            a: 1.0,
            b: 1.0,
            max_step: 0.1,
            ..Default::default()
        };
        assert_eq!(values.check_step(0.0, 0.2, None), StepCheck::TooLarge);
        assert_eq!(values.check_step(0.0, 0.1, Some(1.0)), StepCheck::Proceed);

        assert_eq!(
            values.check_step(0.95, 0.1, Some(1.0)),
            StepCheck::StopTimeReached
        );
        assert!(values.terminated);
        assert!((values.last_successful_time - 1.0).abs() < 1e-12);
        assert!((values.integral - 0.1).abs() < 1e-12);

        values.fail_next_step = true;
        assert_eq!(values.check_step(0.0, 0.01, None), StepCheck::Fatal);
    }
}
