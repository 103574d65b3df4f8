//! Message framing and codec for the transport layer.
//!
//! Every message travels as a 4-byte big-endian length prefix followed by
//! the rkyv-serialized payload.

use rkyv::util::AlignedVec;

use crate::message::{Request, Response};
use crate::Error;

/// Maximum frame payload size (4 MB).
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Encode a payload with a length prefix.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, Error> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(Error::InvalidMessage(format!(
            "payload size {} exceeds maximum {}",
            payload.len(),
            MAX_MESSAGE_SIZE
        )));
    }

    let len = payload.len() as u32;
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Decode the payload length from a 4-byte header.
pub fn decode_frame_length(header: &[u8; LENGTH_PREFIX_SIZE]) -> Result<usize, Error> {
    let len = u32::from_be_bytes(*header) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(Error::InvalidMessage(format!(
            "frame length {} exceeds maximum {}",
            len, MAX_MESSAGE_SIZE
        )));
    }
    Ok(len)
}

/// Extract the payload from a complete frame.
pub fn extract_payload(frame: &[u8]) -> Result<&[u8], Error> {
    if frame.len() < LENGTH_PREFIX_SIZE {
        return Err(Error::InvalidMessage("frame too short".to_string()));
    }

    let mut header = [0u8; LENGTH_PREFIX_SIZE];
    header.copy_from_slice(&frame[..LENGTH_PREFIX_SIZE]);
    let len = decode_frame_length(&header)?;

    if frame.len() < LENGTH_PREFIX_SIZE + len {
        return Err(Error::InvalidMessage(format!(
            "frame incomplete: have {}, need {}",
            frame.len(),
            LENGTH_PREFIX_SIZE + len
        )));
    }

    Ok(&frame[LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + len])
}

/// Copy a payload into an aligned buffer, as rkyv requires for access.
fn aligned(payload: &[u8]) -> AlignedVec<16> {
    let mut buffer: AlignedVec<16> = AlignedVec::new();
    buffer.extend_from_slice(payload);
    buffer
}

/// Serialize and frame a request.
pub fn encode_request(request: &Request) -> Result<Vec<u8>, Error> {
    let payload = rkyv::to_bytes::<rkyv::rancor::Error>(request)
        .map_err(|e| Error::Serialization(format!("failed to serialize request: {}", e)))?;
    encode_frame(&payload)
}

/// Unframe and deserialize a request.
pub fn decode_request(frame: &[u8]) -> Result<Request, Error> {
    let buffer = aligned(extract_payload(frame)?);
    rkyv::from_bytes::<Request, rkyv::rancor::Error>(&buffer)
        .map_err(|e| Error::Deserialization(format!("failed to deserialize request: {}", e)))
}

/// Serialize and frame a response.
pub fn encode_response(response: &Response) -> Result<Vec<u8>, Error> {
    let payload = rkyv::to_bytes::<rkyv::rancor::Error>(response)
        .map_err(|e| Error::Serialization(format!("failed to serialize response: {}", e)))?;
    encode_frame(&payload)
}

/// Unframe and deserialize a response.
pub fn decode_response(frame: &[u8]) -> Result<Response, Error> {
    let buffer = aligned(extract_payload(frame)?);
    rkyv::from_bytes::<Response, rkyv::rancor::Error>(&buffer)
        .map_err(|e| Error::Deserialization(format!("failed to deserialize response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Operation, ResponsePayload};
    use crate::record::{FieldValue, LineData, RecordData, RecordKey};
    use crate::value::Value;

    #[test]
    fn test_encode_frame_small() {
        let frame = encode_frame(b"hello").unwrap();
        assert_eq!(frame.len(), LENGTH_PREFIX_SIZE + 5);
        assert_eq!(&frame[..4], &[0, 0, 0, 5]);
        assert_eq!(&frame[4..], b"hello");
    }

    #[test]
    fn test_encode_frame_too_large() {
        let payload = vec![0u8; MAX_MESSAGE_SIZE + 1];
        assert!(encode_frame(&payload).is_err());
    }

    #[test]
    fn test_decode_frame_length_too_large() {
        let header = ((MAX_MESSAGE_SIZE as u32) + 1).to_be_bytes();
        assert!(decode_frame_length(&header).is_err());
    }

    #[test]
    fn test_extract_payload() {
        assert!(extract_payload(&[]).unwrap_err().to_string().contains("too short"));
        assert!(extract_payload(&[0, 0, 0, 5, 1]).is_err());
        // Trailing bytes beyond the declared length are ignored.
        assert_eq!(extract_payload(&[0, 0, 0, 2, 1, 2, 3]).unwrap(), &[1, 2]);
    }

    #[test]
    fn test_request_codec() {
        let data = RecordData {
            fields: vec![
                FieldValue::new("CardCode", "ZZZ002"),
                FieldValue::new("DocDate", Value::parse_date("2015-06-10").unwrap()),
            ],
            lines: vec![LineData {
                fields: vec![
                    FieldValue::new("ItemCode", "ITEM001"),
                    FieldValue::new("Quantity", 1.0),
                ],
            }],
        };
        let request = Request::new(7, 3, Operation::Add { record_type: 17, data });

        let frame = encode_request(&request).unwrap();
        assert_eq!(decode_request(&frame).unwrap(), request);
    }

    #[test]
    fn test_response_codec() {
        let response = Response::ok(7, ResponsePayload::Added { key: RecordKey::Entry(12) });
        let frame = encode_response(&response).unwrap();
        assert_eq!(decode_response(&frame).unwrap(), response);
    }

    #[test]
    fn test_decode_garbage() {
        let frame = encode_frame(b"not an archived request").unwrap();
        assert!(matches!(decode_request(&frame), Err(Error::Deserialization(_))));
    }
}
