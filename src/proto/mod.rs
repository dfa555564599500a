//! Protocol Buffer definitions and generated code for the discovery service.
//!
//! Types are generated by [`tonic-build`] from `proto/mads.proto`. The JSON
//! mapping used by the HTTP binding comes from the `serde` derives added at
//! build time; `bytes` fields travel as base64 strings.

pub mod v1 {
    tonic::include_proto!("mads.v1");
}

pub use v1::*;

use prost::Message;

use crate::ProtocolError;
use crate::Result;

#[cfg(test)]
mod proto_test;

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl DiscoveryRequest {
    /// First request of a session: no version, no nonce.
    pub fn initial(
        client_id: &str,
        type_url: &str,
    ) -> Self {
        Self {
            node: Some(Node::new(client_id)),
            type_url: type_url.to_string(),
            ..Default::default()
        }
    }

    /// Accepts `response` by echoing its version and nonce.
    pub fn ack(
        client_id: &str,
        response: &DiscoveryResponse,
    ) -> Self {
        Self {
            version_info: response.version_info.clone(),
            node: Some(Node::new(client_id)),
            type_url: response.type_url.clone(),
            response_nonce: response.nonce.clone(),
            ..Default::default()
        }
    }

    /// Rejects the response identified by `rejected_nonce` while staying on
    /// `acked_version`.
    pub fn nack(
        client_id: &str,
        type_url: &str,
        acked_version: &str,
        rejected_nonce: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            version_info: acked_version.to_string(),
            node: Some(Node::new(client_id)),
            type_url: type_url.to_string(),
            response_nonce: rejected_nonce.to_string(),
            error_detail: Some(ErrorDetail {
                code: tonic::Code::InvalidArgument as i32,
                message: reason.into(),
            }),
            ..Default::default()
        }
    }

    pub fn node_id(&self) -> &str {
        self.node.as_ref().map(|n| n.id.as_str()).unwrap_or_default()
    }

    pub fn is_nack(&self) -> bool {
        self.error_detail.is_some()
    }
}

impl TypedPayload {
    pub fn pack<M: Message>(
        type_url: &str,
        message: &M,
    ) -> Self {
        Self {
            type_url: type_url.to_string(),
            value: message.encode_to_vec(),
        }
    }

    pub fn unpack<M: Message + Default>(
        &self,
        expected_type_url: &str,
    ) -> Result<M> {
        if self.type_url != expected_type_url {
            return Err(ProtocolError::UnexpectedType {
                expected: expected_type_url.to_string(),
                actual: self.type_url.clone(),
            }
            .into());
        }
        Ok(M::decode(self.value.as_slice())?)
    }
}

/// serde adapter for protobuf `bytes` in JSON.
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(
        bytes: &[u8],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}
