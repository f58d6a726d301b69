#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        if self.remaining() < 1 {
            return None;
        }
        let value = self.data[self.pos];
        self.pos += 1;
        Some(value)
    }

    pub fn read_u16_le(&mut self) -> Option<u16> {
        if self.remaining() < 2 {
            return None;
        }
        let lo = self.data[self.pos] as u16;
        let hi = self.data[self.pos + 1] as u16;
        self.pos += 2;
        Some(lo | (hi << 8))
    }

    pub fn read_u32_le(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let b0 = self.data[self.pos] as u32;
        let b1 = self.data[self.pos + 1] as u32;
        let b2 = self.data[self.pos + 2] as u32;
        let b3 = self.data[self.pos + 3] as u32;
        self.pos += 4;
        Some(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    pub fn read_u64_le(&mut self) -> Option<u64> {
        let low = self.read_u32_le()? as u64;
        let high = self.read_u32_le()? as u64;
        Some(low | (high << 32))
    }

    pub fn read_i32_le(&mut self) -> Option<i32> {
        self.read_u32_le().map(|value| value as i32)
    }

    pub fn read_i64_le(&mut self) -> Option<i64> {
        self.read_u64_le().map(|value| value as i64)
    }

    pub fn read_f32_le(&mut self) -> Option<f32> {
        self.read_u32_le().map(f32::from_bits)
    }

    pub fn read_f64_le(&mut self) -> Option<f64> {
        self.read_u64_le().map(f64::from_bits)
    }

    pub fn read_bool(&mut self) -> Option<bool> {
        self.read_u8().map(|value| value != 0)
    }

    pub fn read_string(&mut self) -> Option<String> {
        let len = self.read_u16_le()? as usize;
        let bytes = self.read_bytes(len)?;
        Some(String::from_utf8_lossy(bytes).to_string())
    }

    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.remaining() < len {
            return None;
        }
        let start = self.pos;
        self.pos += len;
        Some(&self.data[start..start + len])
    }

    pub fn skip(&mut self, len: usize) -> Option<()> {
        if self.remaining() < len {
            return None;
        }
        self.pos += len;
        Some(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct PacketWriter {
    data: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_u16_le(&mut self, value: u16) {
        self.data.push((value & 0xff) as u8);
        self.data.push((value >> 8) as u8);
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.data.push((value & 0xff) as u8);
        self.data.push(((value >> 8) & 0xff) as u8);
        self.data.push(((value >> 16) & 0xff) as u8);
        self.data.push(((value >> 24) & 0xff) as u8);
    }

    pub fn write_u64_le(&mut self, value: u64) {
        self.write_u32_le((value & 0xffff_ffff) as u32);
        self.write_u32_le((value >> 32) as u32);
    }

    pub fn write_i32_le(&mut self, value: i32) {
        self.write_u32_le(value as u32);
    }

    pub fn write_i64_le(&mut self, value: i64) {
        self.write_u64_le(value as u64);
    }

    pub fn write_f32_le(&mut self, value: f32) {
        self.write_u32_le(value.to_bits());
    }

    pub fn write_f64_le(&mut self, value: f64) {
        self.write_u64_le(value.to_bits());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn write_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        let len = bytes.len().min(u16::MAX as usize);
        self.write_u16_le(len as u16);
        self.data.extend_from_slice(&bytes[..len]);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_roundtrip() {
        let mut writer = PacketWriter::new();
        writer.write_u8(0x12);
        writer.write_u16_le(0x3456);
        writer.write_i32_le(-1234);
        writer.write_i64_le(-56789012345);
        writer.write_f32_le(1.5);
        writer.write_bool(true);

        let mut reader = PacketReader::new(writer.as_slice());
        assert_eq!(reader.read_u8(), Some(0x12));
        assert_eq!(reader.read_u16_le(), Some(0x3456));
        assert_eq!(reader.read_i32_le(), Some(-1234));
        assert_eq!(reader.read_i64_le(), Some(-56789012345));
        assert_eq!(reader.read_f32_le(), Some(1.5));
        assert_eq!(reader.read_bool(), Some(true));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn string_roundtrip() {
        let mut writer = PacketWriter::new();
        writer.write_string("health potion");
        writer.write_u8(0x7f);
        let mut reader = PacketReader::new(writer.as_slice());
        assert_eq!(reader.read_string().as_deref(), Some("health potion"));
        assert_eq!(reader.read_u8(), Some(0x7f));
    }

    #[test]
    fn short_reads_return_none() {
        let mut reader = PacketReader::new(&[0x01, 0x02]);
        assert_eq!(reader.read_u32_le(), None);
        assert_eq!(reader.read_u16_le(), Some(0x0201));
        assert_eq!(reader.read_u8(), None);
    }
}
