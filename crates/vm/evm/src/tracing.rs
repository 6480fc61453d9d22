use std::time::Duration;

use bytes::Bytes;
use ethereum_types::Address;
use serde::Serialize;

use crate::errors::VMError;

/// Receives the start and end of every top-level call when the instance
/// runs with `debug` enabled.
pub trait Tracer {
    fn capture_start(
        &mut self,
        from: Address,
        to: Address,
        is_create: bool,
        input: &Bytes,
        gas: u64,
        value: u64,
    );

    fn capture_end(
        &mut self,
        output: &Bytes,
        gas_used: u64,
        elapsed: Duration,
        error: Option<&VMError>,
    );
}

/// Records one [`TracerCallFrame`] per traced top-level call.
#[derive(Debug, Default)]
pub struct CallTracer {
    pub callframes: Vec<TracerCallFrame>,
    /// Frame opened by `capture_start` and not yet closed.
    pending: Option<TracerCallFrame>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum CallType {
    #[default]
    #[serde(rename = "CALL")]
    Call,
    #[serde(rename = "CREATE")]
    Create,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct TracerCallFrame {
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub from: Address,
    pub to: Address,
    #[serde(serialize_with = "to_hex")]
    pub value: u64,
    #[serde(serialize_with = "to_hex")]
    pub gas: u64,
    #[serde(rename = "gasUsed", serialize_with = "to_hex")]
    pub gas_used: u64,
    #[serde(serialize_with = "to_hex")]
    pub input: Bytes,
    #[serde(serialize_with = "to_hex")]
    pub output: Bytes,
    #[serde(rename = "elapsedMicros")]
    pub elapsed_micros: u64,
    #[serde(serialize_with = "option_string_empty_as_str")]
    pub error: Option<String>,
}

impl CallTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a call was started and never ended.
    pub fn has_pending_call(&self) -> bool {
        self.pending.is_some()
    }
}

impl Tracer for CallTracer {
    fn capture_start(
        &mut self,
        from: Address,
        to: Address,
        is_create: bool,
        input: &Bytes,
        gas: u64,
        value: u64,
    ) {
        let call_type = if is_create {
            CallType::Create
        } else {
            CallType::Call
        };
        self.pending = Some(TracerCallFrame {
            call_type,
            from,
            to,
            value,
            gas,
            input: input.clone(),
            ..Default::default()
        });
    }

    fn capture_end(
        &mut self,
        output: &Bytes,
        gas_used: u64,
        elapsed: Duration,
        error: Option<&VMError>,
    ) {
        // An end without a start still gets recorded so that no result is lost.
        let mut callframe = self.pending.take().unwrap_or_default();
        callframe.gas_used = gas_used;
        callframe.output = output.clone();
        callframe.elapsed_micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        callframe.error = error.map(ToString::to_string);
        self.callframes.push(callframe);
    }
}

fn to_hex<T, S>(x: &T, s: S) -> Result<S::Ok, S::Error>
where
    T: std::fmt::LowerHex,
    S: serde::Serializer,
{
    s.serialize_str(&format!("0x{x:x}"))
}

fn option_string_empty_as_str<S>(x: &Option<String>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(x.as_deref().unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_tracer_serializes_like_geth_call_frames() {
        let mut tracer = CallTracer::new();
        tracer.capture_start(
            Address::from_low_u64_be(1),
            Address::from_low_u64_be(2),
            false,
            &Bytes::from_static(&[0xab, 0xcd]),
            1_000,
            5,
        );
        assert!(tracer.has_pending_call());
        tracer.capture_end(
            &Bytes::from_static(&[0x01]),
            400,
            Duration::from_micros(3),
            Some(&VMError::ExecutionReverted),
        );
        assert!(!tracer.has_pending_call());

        let json = serde_json::to_value(&tracer.callframes).unwrap();
        let frame = &json[0];
        assert_eq!(frame["type"], "CALL");
        assert_eq!(frame["gas"], "0x3e8");
        assert_eq!(frame["gasUsed"], "0x190");
        assert_eq!(frame["value"], "0x5");
        assert_eq!(frame["input"], "0xabcd");
        assert_eq!(frame["output"], "0x01");
        assert_eq!(frame["error"], "Execution reverted");
    }
}
