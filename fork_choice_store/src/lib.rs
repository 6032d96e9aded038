pub use crate::{
    error::Error,
    proto_array::{ProtoArray, ProtoNode},
    store::{LatestMessage, Store},
};

mod error;
mod proto_array;
mod store;
