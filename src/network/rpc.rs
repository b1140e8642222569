//! Wire message types for node-to-node communication.

use crate::error::{NetworkError, Result};
use crate::index::Bitmap;
use crate::query::TermQuery;
use crate::types::Document;
use serde::{Deserialize, Serialize};

/// Maximum accepted frame size.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Arguments of a search call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: TermQuery,
    pub on_flag: Option<Bitmap>,
    pub off_flag: Option<Bitmap>,
    pub or_flags: Vec<Bitmap>,
}

/// A request to an index worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Index a document.
    AddDoc(Document),

    /// Delete a document by business ID.
    DeleteDoc { doc_id: String },

    /// Evaluate a boolean query.
    Search(SearchRequest),

    /// Number of documents on the node.
    Count,

    /// Envelope carrying one of the four operations as an opaque
    /// payload, for routing through an intermediary that only inspects
    /// the tag.
    Forward(ForwardRequest),
}

/// Response to a [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    /// Number of documents affected by a write.
    Affected(u64),

    /// Documents matching a search.
    Docs(Vec<Document>),

    /// Document count.
    Count(u64),

    /// The remote operation failed.
    Error(String),
}

/// Tag identifying the operation inside a [`ForwardRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    AddDoc,
    DeleteDoc,
    Search,
    Count,
}

/// Generic forwarding envelope: a request-type tag plus the serialized
/// arguments of that request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardRequest {
    pub kind: RequestKind,
    pub payload: Vec<u8>,
}

impl ForwardRequest {
    /// Wrap a direct request into an envelope.
    pub fn wrap(request: &Request) -> Result<Self> {
        let (kind, payload) = match request {
            Request::AddDoc(doc) => (RequestKind::AddDoc, bincode::serialize(doc)?),
            Request::DeleteDoc { doc_id } => (RequestKind::DeleteDoc, bincode::serialize(doc_id)?),
            Request::Search(search) => (RequestKind::Search, bincode::serialize(search)?),
            Request::Count => (RequestKind::Count, Vec::new()),
            Request::Forward(_) => {
                return Err(NetworkError::Serialization(
                    "cannot nest forwarding envelopes".to_string(),
                )
                .into())
            }
        };
        Ok(Self { kind, payload })
    }

    /// Decode the envelope back into the direct request it carries.
    ///
    /// Each tag dispatches to its own decoder; an unknown payload shape
    /// fails with a deserialization error.
    pub fn unwrap(&self) -> Result<Request> {
        let request = match self.kind {
            RequestKind::AddDoc => Request::AddDoc(decode_payload(&self.payload)?),
            RequestKind::DeleteDoc => Request::DeleteDoc {
                doc_id: decode_payload(&self.payload)?,
            },
            RequestKind::Search => Request::Search(decode_payload(&self.payload)?),
            RequestKind::Count => Request::Count,
        };
        Ok(request)
    }
}

fn decode_payload<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> Result<T> {
    bincode::deserialize(payload)
        .map_err(|e| NetworkError::Deserialization(e.to_string()).into())
}

/// Encode a request to bytes.
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    Ok(bincode::serialize(request)?)
}

/// Decode a request from bytes.
pub fn decode_request(data: &[u8]) -> Result<Request> {
    bincode::deserialize(data)
        .map_err(|e| NetworkError::Deserialization(e.to_string()).into())
}

/// Encode a response to bytes.
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    Ok(bincode::serialize(response)?)
}

/// Decode a response from bytes.
pub fn decode_response(data: &[u8]) -> Result<Response> {
    bincode::deserialize(data)
        .map_err(|e| NetworkError::Deserialization(e.to_string()).into())
}

/// Frame a payload with a u32 big-endian length prefix.
pub fn frame(data: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(4 + data.len());
    framed.extend_from_slice(&(data.len() as u32).to_be_bytes());
    framed.extend_from_slice(data);
    framed
}
