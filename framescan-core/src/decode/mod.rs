//! Decode dispatch: the worker protocol, the worker resource, and the
//! single-flight channel the scheduler talks to.
//!
//! | Module     | Purpose                                                  |
//! |------------|----------------------------------------------------------|
//! | `protocol` | Request/reply messages, `Decoder` trait, fault capture   |
//! | `worker`   | `DecodeWorker` owned resource, thread or caller endpoint |
//! | `channel`  | Correlation by id, deadline, stale-reply discard         |

pub mod channel;
pub mod protocol;
pub mod worker;

pub use channel::{DEFAULT_DECODE_TIMEOUT, DecodeChannel, DecodeOutcome, PendingDecode};
pub use protocol::{DecodedSymbol, Decoder, DecoderFault, RequestId, WorkerReply, WorkerRequest};
pub use worker::{DecodeWorker, WorkerEndpoint};
