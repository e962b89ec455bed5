#![no_main]

use libfuzzer_sys::fuzz_target;
use session_protocol::core::binary::BinaryReader;
use session_protocol::protocol::packets::{Disconnect, HandshakeRequest, HandshakeResponse};
use session_protocol::{Frame, Packet};

fuzz_target!(|data: &[u8]| {
    if let Ok(req) = HandshakeRequest::decode(&mut BinaryReader::new(data)) {
        // anything that decodes must survive re-encoding
        if let Ok(frame) = Frame::from_packet(&req) {
            assert!(frame.decode::<HandshakeRequest>().is_ok());
        }
    }
    let _ = HandshakeResponse::decode(&mut BinaryReader::new(data));
    let _ = Disconnect::decode(&mut BinaryReader::new(data));
});
