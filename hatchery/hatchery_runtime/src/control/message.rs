//! Wire-method decoding.
//!
//! Control requests arrive as a method name plus JSON arguments. They are
//! decoded exactly once, at this boundary, into the closed [`ControlOp`]
//! set; everything past the dispatcher works with typed operations only.

use serde::Deserialize;
use serde_json::Value;

use hatchery_core::error::ControlError;
use hatchery_core::types::EntryPoint;

/// Wire method name for spawning an isolate.
pub const METHOD_SPAWN_ISOLATE: &str = "spawn_isolate";
/// Wire method name for killing a single isolate.
pub const METHOD_KILL_ISOLATE: &str = "kill_isolate";
/// Wire method name for listing active isolates.
pub const METHOD_GET_ISOLATE_LIST: &str = "get_isolate_list";
/// Wire method name for killing every isolate.
pub const METHOD_KILL_ALL_ISOLATES: &str = "kill_all_isolates";

/// The closed set of control-plane operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlOp {
    /// Queue a new isolate under the given id.
    SpawnIsolate {
        isolate_id: String,
        entry_point: EntryPoint,
    },

    /// Tear down a single isolate.
    KillIsolate { isolate_id: String },

    /// List the ids of all active isolates.
    GetIsolateList,

    /// Tear down every isolate and cancel pending spawns.
    KillAllIsolates,
}

#[derive(Deserialize)]
struct SpawnIsolateArgs {
    isolate_id: String,
    entry_point: EntryPoint,
}

#[derive(Deserialize)]
struct KillIsolateArgs {
    isolate_id: String,
}

impl ControlOp {
    /// Decode a wire method and its arguments.
    ///
    /// Unknown methods map to `NotImplemented`; known methods with
    /// malformed arguments map to `InvalidArguments`.
    pub fn decode(method: &str, arguments: &Value) -> Result<Self, ControlError> {
        match method {
            METHOD_SPAWN_ISOLATE => {
                let args: SpawnIsolateArgs = decode_args(method, arguments)?;
                Ok(Self::SpawnIsolate {
                    isolate_id: args.isolate_id,
                    entry_point: args.entry_point,
                })
            }
            METHOD_KILL_ISOLATE => {
                let args: KillIsolateArgs = decode_args(method, arguments)?;
                Ok(Self::KillIsolate {
                    isolate_id: args.isolate_id,
                })
            }
            METHOD_GET_ISOLATE_LIST => Ok(Self::GetIsolateList),
            METHOD_KILL_ALL_ISOLATES => Ok(Self::KillAllIsolates),
            other => Err(ControlError::NotImplemented(other.to_string())),
        }
    }
}

fn decode_args<T: serde::de::DeserializeOwned>(
    method: &str,
    arguments: &Value,
) -> Result<T, ControlError> {
    serde_json::from_value(arguments.clone()).map_err(|err| ControlError::InvalidArguments {
        method: method.to_string(),
        reason: err.to_string(),
    })
}
