//! Wire transport: message types, TCP server and client connection.

pub mod client;
pub mod rpc;
pub mod server;

pub use client::Connection;
pub use rpc::{
    decode_request, decode_response, encode_request, encode_response, frame, ForwardRequest,
    Request, RequestKind, Response, SearchRequest,
};
pub use server::{NetworkServer, RequestHandler};
