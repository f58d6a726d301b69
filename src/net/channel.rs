use crate::net::packet::{PacketReader, PacketWriter};

/// Frame header in front of every datagram: a delivery flag and a
/// 16-bit sequence number. Reliable frames skip the freshness filter
/// and are always handed to the simulation; unreliable frames
/// (position traffic) are dropped when stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub reliable: bool,
    pub sequence: u16,
}

pub fn frame(header: FrameHeader, payload: &[u8]) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(payload.len() + 3);
    writer.write_bool(header.reliable);
    writer.write_u16_le(header.sequence);
    writer.write_bytes(payload);
    writer.into_vec()
}

pub fn unframe(data: &[u8]) -> Option<(FrameHeader, &[u8])> {
    let mut reader = PacketReader::new(data);
    let reliable = reader.read_bool()?;
    let sequence = reader.read_u16_le()?;
    let payload = reader.read_bytes(reader.remaining())?;
    Some((FrameHeader { reliable, sequence }, payload))
}

/// Freshness filter for the unreliable channel. Sequence numbers wrap
/// at 16 bits, so freshness is judged on the signed distance from the
/// newest accepted number.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    newest: Option<u16>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a frame exactly when it is newer than everything seen
    /// so far; duplicates and stragglers report false.
    pub fn accept(&mut self, sequence: u16) -> bool {
        match self.newest {
            None => {
                self.newest = Some(sequence);
                true
            }
            Some(newest) => {
                let ahead = sequence.wrapping_sub(newest) as i16 > 0;
                if ahead {
                    self.newest = Some(sequence);
                }
                ahead
            }
        }
    }
}

/// Outbound counter for one connection's unreliable stream.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    next: u16,
}

impl SequenceCounter {
    pub fn advance(&mut self) -> u16 {
        let sequence = self.next;
        self.next = self.next.wrapping_add(1);
        sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrip() {
        let header = FrameHeader {
            reliable: true,
            sequence: 0xbeef,
        };
        let framed = frame(header, b"payload");
        let (decoded, payload) = unframe(&framed).expect("well-formed frame");
        assert_eq!(decoded, header);
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn stale_sequences_are_rejected() {
        let mut tracker = SequenceTracker::new();
        assert!(tracker.accept(5));
        assert!(!tracker.accept(5), "duplicate");
        assert!(!tracker.accept(3), "straggler");
        assert!(tracker.accept(6));
    }

    #[test]
    fn freshness_survives_wraparound() {
        let mut tracker = SequenceTracker::new();
        assert!(tracker.accept(u16::MAX - 1));
        assert!(tracker.accept(u16::MAX));
        assert!(tracker.accept(0), "wrapped but newer");
        assert!(!tracker.accept(u16::MAX), "pre-wrap straggler");
    }

    #[test]
    fn truncated_frame_is_none() {
        assert!(unframe(&[0x01]).is_none());
    }
}
