use super::{Command, Value};
use crate::error::HeapgrowError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Largest bulk string or array the decoder will accept
const MAX_FRAME_LEN: usize = 512 * 1024 * 1024;

/// Deepest array nesting accepted in one reply
const MAX_DEPTH: usize = 32;

/// RESP2 framing for `tokio_util::codec::Framed`
#[derive(Debug, Default, Clone, Copy)]
pub struct RespCodec;

impl Decoder for RespCodec {
    type Item = Value;
    type Error = HeapgrowError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Value>, HeapgrowError> {
        match parse(&src[..], 0, 0)? {
            Some((value, used)) => {
                src.advance(used);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<Value> for RespCodec {
    type Error = HeapgrowError;

    fn encode(&mut self, item: Value, dst: &mut BytesMut) -> Result<(), HeapgrowError> {
        write_value(&item, dst);
        Ok(())
    }
}

impl Encoder<Command> for RespCodec {
    type Error = HeapgrowError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), HeapgrowError> {
        let args = item.args();
        put_header(dst, b'*', args.len() as i64);
        for arg in args {
            put_bulk(dst, arg);
        }
        Ok(())
    }
}

fn write_value(value: &Value, dst: &mut BytesMut) {
    match value {
        Value::Simple(s) => put_line(dst, b'+', s.as_bytes()),
        Value::Error(s) => put_line(dst, b'-', s.as_bytes()),
        Value::Integer(n) => put_header(dst, b':', *n),
        Value::Bulk(Some(b)) => put_bulk(dst, b),
        Value::Bulk(None) => dst.put_slice(b"$-1\r\n"),
        Value::Array(None) => dst.put_slice(b"*-1\r\n"),
        Value::Array(Some(items)) => {
            put_header(dst, b'*', items.len() as i64);
            for item in items {
                write_value(item, dst);
            }
        }
    }
}

fn put_line(dst: &mut BytesMut, prefix: u8, body: &[u8]) {
    dst.reserve(body.len() + 3);
    dst.put_u8(prefix);
    dst.put_slice(body);
    dst.put_slice(b"\r\n");
}

fn put_header(dst: &mut BytesMut, prefix: u8, n: i64) {
    put_line(dst, prefix, n.to_string().as_bytes());
}

fn put_bulk(dst: &mut BytesMut, data: &Bytes) {
    put_header(dst, b'$', data.len() as i64);
    dst.reserve(data.len() + 2);
    dst.put_slice(data);
    dst.put_slice(b"\r\n");
}

/// Position just past the next CRLF at or after `pos`, plus the line body
fn read_line(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = buf.get(pos..)?;
    let end = rest.windows(2).position(|w| w == b"\r\n")?;
    Some((&rest[..end], pos + end + 2))
}

fn parse_int(line: &[u8]) -> Result<i64, HeapgrowError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            HeapgrowError::Protocol(format!("invalid length {:?}", String::from_utf8_lossy(line)))
        })
}

fn checked_len(n: i64) -> Result<usize, HeapgrowError> {
    let len = usize::try_from(n)
        .map_err(|_| HeapgrowError::Protocol(format!("negative length {}", n)))?;
    if len > MAX_FRAME_LEN {
        return Err(HeapgrowError::Protocol(format!("frame length {} over limit", len)));
    }
    Ok(len)
}

/// Parse one value starting at `pos`; `Ok(None)` means more bytes are needed
fn parse(buf: &[u8], pos: usize, depth: usize) -> Result<Option<(Value, usize)>, HeapgrowError> {
    let Some(&kind) = buf.get(pos) else {
        return Ok(None);
    };
    let Some((line, next)) = read_line(buf, pos + 1) else {
        return Ok(None);
    };

    match kind {
        b'+' => Ok(Some((Value::Simple(String::from_utf8_lossy(line).into_owned()), next))),
        b'-' => Ok(Some((Value::Error(String::from_utf8_lossy(line).into_owned()), next))),
        b':' => Ok(Some((Value::Integer(parse_int(line)?), next))),
        b'$' => {
            let n = parse_int(line)?;
            if n == -1 {
                return Ok(Some((Value::Bulk(None), next)));
            }
            let len = checked_len(n)?;
            if buf.len() < next + len + 2 {
                return Ok(None);
            }
            if &buf[next + len..next + len + 2] != b"\r\n" {
                return Err(HeapgrowError::Protocol("bulk string missing CRLF".into()));
            }
            let data = Bytes::copy_from_slice(&buf[next..next + len]);
            Ok(Some((Value::Bulk(Some(data)), next + len + 2)))
        }
        b'*' => {
            let n = parse_int(line)?;
            if n == -1 {
                return Ok(Some((Value::Array(None), next)));
            }
            if depth >= MAX_DEPTH {
                return Err(HeapgrowError::Protocol(format!(
                    "arrays nested deeper than {}",
                    MAX_DEPTH
                )));
            }
            let len = checked_len(n)?;
            let mut items = Vec::with_capacity(len.min(1024));
            let mut cursor = next;
            for _ in 0..len {
                match parse(buf, cursor, depth + 1)? {
                    Some((item, after)) => {
                        items.push(item);
                        cursor = after;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((Value::Array(Some(items)), cursor)))
        }
        other => Err(HeapgrowError::Protocol(format!("unknown reply type byte 0x{:02x}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> (Vec<Value>, usize) {
        let mut codec = RespCodec;
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(v) = codec.decode(&mut buf).unwrap() {
            out.push(v);
        }
        (out, buf.len())
    }

    #[test]
    fn rejects_runaway_nesting() {
        let mut nested = b"*1\r\n".repeat(MAX_DEPTH);
        nested.extend_from_slice(b":1\r\n");
        let (values, _) = decode_all(&nested);
        assert_eq!(values.len(), 1);

        let too_deep = b"*1\r\n".repeat(MAX_DEPTH + 1);
        let err = RespCodec.decode(&mut BytesMut::from(&too_deep[..])).unwrap_err();
        assert!(matches!(err, HeapgrowError::Protocol(_)), "{}", err);
    }

    #[test]
    fn encodes_command_as_bulk_array() {
        let mut buf = BytesMut::new();
        RespCodec.encode(Command::new("SERVER").arg("EXT"), &mut buf).unwrap();
        assert_eq!(&buf[..], b"*2\r\n$6\r\nSERVER\r\n$3\r\nEXT\r\n");
    }

    #[test]
    fn decodes_pipelined_replies_in_order() {
        let (values, left) = decode_all(b"+OK\r\n:42\r\n-ERR bad\r\n$-1\r\n");
        assert_eq!(left, 0);
        assert_eq!(
            values,
            vec![
                Value::Simple("OK".into()),
                Value::Integer(42),
                Value::Error("ERR bad".into()),
                Value::Bulk(None),
            ]
        );
    }

    #[test]
    fn waits_for_split_frames() {
        let mut codec = RespCodec;
        let mut buf = BytesMut::from(&b"*2\r\n$9\r\nheap_"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"size\r\n:10");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\r\n");
        let value = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            value,
            Value::Array(Some(vec![Value::bulk("heap_size"), Value::Integer(10)]))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn bulk_strings_may_contain_crlf() {
        let (values, _) = decode_all(b"$4\r\na\r\nb\r\n");
        assert_eq!(values, vec![Value::bulk("a\r\nb")]);
    }

    #[test]
    fn rejects_garbage() {
        let mut buf = BytesMut::from(&b"?what\r\n"[..]);
        assert!(RespCodec.decode(&mut buf).is_err());
        let mut buf = BytesMut::from(&b"$abc\r\n"[..]);
        assert!(RespCodec.decode(&mut buf).is_err());
    }

    #[test]
    fn value_encoding_decodes_back() {
        let original = Value::Array(Some(vec![
            Value::bulk("message"),
            Value::bulk("__tmpchan__:3"),
            Value::Integer(-5),
            Value::Array(None),
        ]));
        let mut buf = BytesMut::new();
        RespCodec.encode(original.clone(), &mut buf).unwrap();
        assert_eq!(RespCodec.decode(&mut buf).unwrap(), Some(original));
    }
}
