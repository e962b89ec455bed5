#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use session_protocol::core::codec::FrameCodec;
use session_protocol::Frame;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // tag split and stream framing must reject garbage without panicking
    let _ = Frame::from_bytes(data);

    let mut codec = FrameCodec::new(64 * 1024);
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
});
