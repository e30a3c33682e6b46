//! RTP packet construction and RTSP interleaved binary framing
//! (RFC 3550 header layout, RFC 2326 §10.12 framing).

use crate::protocol_constants::{INTERLEAVED_MAGIC, RTP_PAYLOAD_TYPE_PCMA, RTP_VERSION};

/// Mutable RTP sequencing state for one backchannel session: current
/// sequence number, timestamp, and the session's SSRC.
pub struct RtpState {
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpState {
    /// Creates a new RTP state with a random SSRC and sequence/timestamp
    /// starting at 0.
    pub fn new(ssrc: u32) -> Self {
        Self {
            sequence: 0,
            timestamp: 0,
            ssrc,
        }
    }

    /// Builds a 12-byte RTP header + payload for one A-law chunk, then
    /// advances sequence (by 1) and timestamp (by the payload byte count),
    /// both wrapping on overflow.
    pub fn build_packet(&mut self, payload: &[u8]) -> Vec<u8> {
        let mut packet = Vec::with_capacity(12 + payload.len());
        packet.push((RTP_VERSION << 6) & 0xC0); // V=2, P=0, X=0, CC=0
        packet.push(RTP_PAYLOAD_TYPE_PCMA & 0x7F); // M=0, PT=8
        packet.extend_from_slice(&self.sequence.to_be_bytes());
        packet.extend_from_slice(&self.timestamp.to_be_bytes());
        packet.extend_from_slice(&self.ssrc.to_be_bytes());
        packet.extend_from_slice(payload);

        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(payload.len() as u32);

        packet
    }
}

/// Wraps an RTP packet in the RTSP interleaved binary frame:
/// `0x24 | channel:u8 | len:u16_be | rtp_bytes`.
pub fn wrap_interleaved(channel: u8, rtp_packet: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + rtp_packet.len());
    frame.push(INTERLEAVED_MAGIC);
    frame.push(channel);
    frame.extend_from_slice(&(rtp_packet.len() as u16).to_be_bytes());
    frame.extend_from_slice(rtp_packet);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_packet_header_fields_match_rfc3550_layout() {
        let mut state = RtpState::new(0xDEAD_BEEF);
        let payload = vec![0xD5u8; 320];
        let packet = state.build_packet(&payload);

        assert_eq!(packet.len(), 12 + 320);
        assert_eq!(packet[0], 0x80); // V=2 in top two bits, rest zero
        assert_eq!(packet[1], 8); // PT=8, marker clear
        assert_eq!(&packet[2..4], &0u16.to_be_bytes()); // sequence starts at 0
        assert_eq!(&packet[4..8], &0u32.to_be_bytes()); // timestamp starts at 0
        assert_eq!(&packet[8..12], &0xDEAD_BEEFu32.to_be_bytes());
        assert_eq!(&packet[12..], payload.as_slice());
    }

    #[test]
    fn sequence_and_timestamp_advance_by_expected_amounts() {
        let mut state = RtpState::new(1);
        let payload = vec![0u8; 320];

        state.build_packet(&payload);
        assert_eq!(state.sequence, 1);
        assert_eq!(state.timestamp, 320);

        state.build_packet(&payload);
        assert_eq!(state.sequence, 2);
        assert_eq!(state.timestamp, 640);
    }

    #[test]
    fn sequence_wraps_at_u16_boundary() {
        let mut state = RtpState::new(1);
        state.sequence = u16::MAX;
        state.build_packet(&[0u8; 4]);
        assert_eq!(state.sequence, 0);
    }

    #[test]
    fn interleaved_header_matches_spec_worked_example() {
        // 320-byte A-law payload -> 332-byte RTP packet -> 0x014C length.
        let mut state = RtpState::new(1);
        let payload = vec![0xD5u8; 320];
        let rtp = state.build_packet(&payload);
        let framed = wrap_interleaved(0x00, &rtp);

        assert_eq!(&framed[0..4], &[0x24, 0x00, 0x01, 0x4C]);
    }
}
