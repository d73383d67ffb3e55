//! `tonic` codec carrying serde messages as JSON.
//!
//! Lets the gateway forward calls without generated protobuf types: the
//! request is written as JSON into the gRPC frame and the response frame is
//! read back as JSON.

use std::marker::PhantomData;

use bytes::{Buf, BufMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::Status;

/// Codec encoding `E` and decoding `D` as JSON.
pub struct JsonCodec<E, D> {
    _marker: PhantomData<fn(E) -> D>,
}

impl<E, D> Default for JsonCodec<E, D> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<E, D> Codec for JsonCodec<E, D>
where
    E: Serialize + Send + 'static,
    D: DeserializeOwned + Send + 'static,
{
    type Encode = E;
    type Decode = D;

    type Encoder = JsonEncoder<E>;
    type Decoder = JsonDecoder<D>;

    fn encoder(&mut self) -> Self::Encoder {
        JsonEncoder(PhantomData)
    }

    fn decoder(&mut self) -> Self::Decoder {
        JsonDecoder(PhantomData)
    }
}

pub struct JsonEncoder<E>(PhantomData<fn(E)>);

impl<E: Serialize> Encoder for JsonEncoder<E> {
    type Item = E;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        serde_json::to_writer(dst.writer(), &item)
            .map_err(|e| Status::internal(format!("failed to encode request: {}", e)))
    }
}

pub struct JsonDecoder<D>(PhantomData<fn() -> D>);

impl<D: DeserializeOwned> Decoder for JsonDecoder<D> {
    type Item = D;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let item = serde_json::from_reader(src.reader())
            .map_err(|e| Status::internal(format!("failed to decode response: {}", e)))?;
        Ok(Some(item))
    }
}
